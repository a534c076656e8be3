//! CLI end-to-end tests
//!
//! Tests for the captioneer command-line interface. Every test points
//! `--config` into a temp directory so user configuration is never read.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::tempdir;

/// Get a command for the captioneer binary, isolated in `dir`
#[allow(deprecated)]
fn captioneer_cmd(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("captioneer").unwrap();
    cmd.current_dir(dir)
        .env("RUST_LOG", "off")
        .arg("--config")
        .arg(dir.join("captioneer.toml"));
    cmd
}

#[test]
fn test_cli_no_args_shows_help() {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("captioneer").unwrap();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_help_flag() {
    let temp = tempdir().unwrap();
    captioneer_cmd(temp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("captioneer"))
        .stdout(predicate::str::contains("scan"));
}

#[test]
fn test_cli_version_command() {
    let temp = tempdir().unwrap();
    captioneer_cmd(temp.path())
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_list_empty_catalog_as_json() {
    let temp = tempdir().unwrap();
    captioneer_cmd(temp.path())
        .args(["list", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[]"));
}

#[test]
fn test_cli_scan_requires_configured_provider() {
    let temp = tempdir().unwrap();
    let photos = temp.path().join("photos");
    fs::create_dir_all(&photos).unwrap();
    fs::write(photos.join("a.jpg"), b"fake").unwrap();

    captioneer_cmd(temp.path())
        .arg("scan")
        .arg(&photos)
        .assert()
        .failure()
        .stderr(predicate::str::contains("not configured"));

    // Nothing was added to the catalog.
    assert!(!temp.path().join("images.json").exists());
}

#[test]
fn test_cli_configure_then_status() {
    let temp = tempdir().unwrap();
    let config_file = temp.path().join("captioneer.toml");
    fs::write(&config_file, "# my captioneer settings\nrequest_timeout_secs = 30\n").unwrap();

    captioneer_cmd(temp.path())
        .args(["configure", "--provider", "ollama", "--model", "llava:13b"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Saved settings"));

    let saved = fs::read_to_string(&config_file).unwrap();
    assert!(saved.contains("# my captioneer settings"));
    assert!(saved.contains("llava:13b"));

    captioneer_cmd(temp.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Provider: ollama"))
        .stdout(predicate::str::contains("llava:13b"))
        .stdout(predicate::str::contains("Images: 0"));
}

#[test]
fn test_cli_configure_rejects_api_key_for_ollama() {
    let temp = tempdir().unwrap();
    captioneer_cmd(temp.path())
        .args(["configure", "--provider", "ollama", "--api-key", "sk-nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("API key"));
}

#[test]
fn test_cli_validate_rejects_zero_timeout() {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join("captioneer.toml"), "request_timeout_secs = 0\n").unwrap();

    captioneer_cmd(temp.path())
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("request_timeout_secs"));
}

#[test]
fn test_cli_unknown_provider_is_rejected() {
    let temp = tempdir().unwrap();
    captioneer_cmd(temp.path())
        .args(["configure", "--provider", "gemini"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown provider"));
}
