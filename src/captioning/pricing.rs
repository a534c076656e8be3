//! Token pricing for paid caption backends.
//!
//! Rates are US dollars per 1000 tokens. A model missing from the table is an
//! error rather than a free call: silently pricing it at zero would make the
//! running cost total lie.

use captioneer_common::{Error, Result};

/// Per-1000-token rates for one model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelRates {
    pub prompt_per_1k: f64,
    pub completion_per_1k: f64,
}

impl ModelRates {
    /// Cost of a single call.
    pub fn cost(&self, prompt_tokens: u64, completion_tokens: u64) -> f64 {
        (prompt_tokens as f64 * self.prompt_per_1k
            + completion_tokens as f64 * self.completion_per_1k)
            / 1000.0
    }
}

const OPENAI_RATES: &[(&str, ModelRates)] = &[
    (
        "gpt-4o",
        ModelRates {
            prompt_per_1k: 0.0025,
            completion_per_1k: 0.01,
        },
    ),
    (
        "gpt-4o-mini",
        ModelRates {
            prompt_per_1k: 0.00015,
            completion_per_1k: 0.0006,
        },
    ),
    (
        "gpt-4-turbo",
        ModelRates {
            prompt_per_1k: 0.01,
            completion_per_1k: 0.03,
        },
    ),
];

/// Look up the rates for an OpenAI model.
pub fn openai_rates(model: &str) -> Result<ModelRates> {
    OPENAI_RATES
        .iter()
        .find(|(name, _)| *name == model)
        .map(|(_, rates)| *rates)
        .ok_or_else(|| Error::unknown_model(model))
}

/// Models with known OpenAI pricing, in curated order.
pub fn openai_models() -> Vec<String> {
    OPENAI_RATES.iter().map(|(name, _)| name.to_string()).collect()
}
