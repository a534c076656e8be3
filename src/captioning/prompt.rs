//! Shared captioning protocol: the system instruction every provider sends
//! and the parser for the delimited answer it asks for.
//!
//! Backends are asked to answer in the form
//! `<caption>...</caption><tags>a, b, c</tags>`. Anything that deviates is
//! degraded, never rejected: a missing caption becomes `"Unknown"` and
//! unparseable tags become an empty list.

use std::collections::HashSet;
use std::sync::OnceLock;

use captioneer_common::UNKNOWN_CAPTION;
use regex::Regex;

/// Fixed vocabulary the backend must pick tags from.
pub const TAG_VOCABULARY: &[&str] = &[
    "animal", "animals", "architecture", "art", "baby", "beach", "bicycle", "bird", "boat",
    "book", "bridge", "building", "car", "cat", "celebration", "child", "christmas", "city",
    "clouds", "coast", "concert", "desert", "document", "dog", "drink", "family", "field",
    "fireworks", "flower", "flowers", "food", "forest", "friends", "garden", "group", "hiking",
    "holiday", "horse", "indoor", "insect", "lake", "landscape", "macro", "meme", "mountain",
    "museum", "music", "nature", "night", "ocean", "outdoor", "painting", "park", "party",
    "people", "person", "pet", "pets", "plant", "portrait", "rain", "river", "road", "room",
    "ruins", "screenshot", "selfie", "sky", "snow", "sport", "street", "sunrise", "sunset",
    "text", "train", "travel", "tree", "vehicle", "water", "waterfall", "wedding", "wildlife",
    "winter",
];

/// The system instruction sent with every caption request.
pub fn system_prompt() -> &'static str {
    static PROMPT: OnceLock<String> = OnceLock::new();
    PROMPT.get_or_init(|| {
        format!(
            "You are a helpful assistant that generates captions for images. \
             Captions you generate are not less than 32 characters long, not longer than 256 \
             characters and describe everything important present in the image. \
             Use <caption></caption> to wrap the caption. \
             Additionally, assign zero or more tags that fit the image. Always wrap the tags \
             inside <tags></tags> and use comma as separator. You can only pick from the \
             following tags: `{}`\n\n\
             Examples of correct answer:\n\n\
             `<caption>A beautiful sunset over the ocean</caption><tags>ocean, sunset, beach, mountain</tags>`\n\n\
             `<caption>A close-up of a cat</caption><tags>cat, animal, pet, pets, animals</tags>`",
            TAG_VOCABULARY.join("`, `")
        )
    })
}

/// Caption and tags extracted from a backend answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedResponse {
    pub caption: String,
    pub tags: Vec<String>,
}

fn caption_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<caption>(.*?)</caption>").expect("valid caption regex"))
}

// An unterminated final block runs to the end of the text.
fn tags_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<tags?>(.*?)(?:</tags?>|\z)").expect("valid tags regex"))
}

fn markup_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("valid markup regex"))
}

/// Parse a backend answer into caption and tags.
///
/// The caption is the first `<caption>` block, trimmed; tags are collected
/// from every `<tags>` block, split on commas, trimmed, and deduplicated in
/// order of appearance.
pub fn parse_response(content: &str) -> ParsedResponse {
    let caption = caption_regex()
        .captures(content)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .filter(|c| !c.is_empty())
        .unwrap_or(UNKNOWN_CAPTION)
        .to_string();

    let mut seen = HashSet::new();
    let tags = tags_regex()
        .captures_iter(content)
        .filter_map(|c| c.get(1))
        .flat_map(|block| {
            markup_regex()
                .replace_all(block.as_str(), "")
                .split(',')
                .map(|tag| {
                    tag.trim_matches(|c: char| c.is_whitespace() || c == '`' || c == '"')
                        .to_string()
                })
                .collect::<Vec<_>>()
        })
        .filter(|tag| !tag.is_empty())
        .filter(|tag| seen.insert(tag.clone()))
        .collect();

    ParsedResponse { caption, tags }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_caption_and_tags() {
        let parsed = parse_response("<caption>A cat on a mat</caption><tags>cat, animal</tags>");
        assert_eq!(parsed.caption, "A cat on a mat");
        assert_eq!(parsed.tags, vec!["cat", "animal"]);
    }

    #[test]
    fn missing_tags_block_gives_empty_tags() {
        let parsed = parse_response("<caption>A quiet mountain lake at dawn</caption>");
        assert_eq!(parsed.caption, "A quiet mountain lake at dawn");
        assert!(parsed.tags.is_empty());
    }

    #[test]
    fn missing_caption_defaults_to_unknown() {
        let parsed = parse_response("I cannot see the image. <tags>text</tags>");
        assert_eq!(parsed.caption, "Unknown");
        assert_eq!(parsed.tags, vec!["text"]);
    }

    #[test]
    fn empty_caption_defaults_to_unknown() {
        assert_eq!(parse_response("<caption>  </caption>").caption, "Unknown");
    }

    #[test]
    fn first_caption_wins() {
        let parsed = parse_response("<caption>first</caption> <caption>second</caption>");
        assert_eq!(parsed.caption, "first");
    }

    #[test]
    fn caption_may_span_lines() {
        let parsed = parse_response("<caption>A dog\nrunning on the beach</caption>");
        assert_eq!(parsed.caption, "A dog\nrunning on the beach");
    }

    #[test]
    fn tags_from_multiple_blocks_are_flattened() {
        let parsed = parse_response(
            "<caption>Sunset</caption>\n<tags>sunset, ocean</tags>\n<tags> beach ,sky </tags>",
        );
        assert_eq!(parsed.tags, vec!["sunset", "ocean", "beach", "sky"]);
    }

    #[test]
    fn unterminated_tags_block_runs_to_end() {
        let parsed = parse_response("<caption>Snowy street</caption><tags>snow, street, winter");
        assert_eq!(parsed.tags, vec!["snow", "street", "winter"]);
    }

    #[test]
    fn tags_are_deduplicated_and_cleaned() {
        let parsed = parse_response("<tags>`cat`, cat, , \"pet\"</tags>");
        assert_eq!(parsed.tags, vec!["cat", "pet"]);
    }

    #[test]
    fn singular_tag_delimiter_is_accepted() {
        let parsed = parse_response("<caption>x</caption><tag>dog</tag>");
        assert_eq!(parsed.tags, vec!["dog"]);
    }

    #[test]
    fn garbage_yields_defaults() {
        let parsed = parse_response("");
        assert_eq!(parsed.caption, "Unknown");
        assert!(parsed.tags.is_empty());
    }

    #[test]
    fn system_prompt_lists_vocabulary() {
        let prompt = system_prompt();
        assert!(prompt.contains("<caption></caption>"));
        assert!(prompt.contains("<tags></tags>"));
        for tag in TAG_VOCABULARY {
            assert!(prompt.contains(&format!("`{tag}`")), "missing tag {tag}");
        }
    }
}
