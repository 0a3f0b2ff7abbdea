//! Integration tests for `logflow query` and `logflow status` against a
//! storage directory populated by hand.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use chrono::{TimeZone, Utc};
use logflow_core::types::{LogFormat, ParsedEntry};
use logflow_pipeline::storage::SegmentName;
use tempfile::TempDir;

fn logflow(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_logflow"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run logflow binary")
}

fn entry(second: u32, level: &str, service: &str) -> ParsedEntry {
    let mut entry = ParsedEntry::new(
        format!("2024-01-15T12:00:{second:02}Z"),
        format!("{level} from {service}"),
        LogFormat::Json,
    );
    entry.level = level.to_owned();
    entry.service = Some(service.to_owned());
    entry.message = Some(format!("event {second}"));
    entry
}

fn seed(dir: &Path) -> Vec<ParsedEntry> {
    let entries = vec![
        entry(1, "INFO", "auth"),
        entry(2, "ERROR", "billing"),
        entry(3, "ERROR", "auth"),
        entry(4, "WARNING", "auth"),
    ];
    let t = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).single().expect("time");
    let body: String = entries
        .iter()
        .map(|e| serde_json::to_string(e).expect("encode") + "\n")
        .collect();
    fs::write(dir.join(SegmentName::new(1, t).file_name()), body).expect("write segment");
    entries
}

#[test]
fn test_query_json_returns_entries_oldest_first() {
    let dir = TempDir::new().expect("tempdir");
    let stored = seed(dir.path());

    let output = logflow(&[
        "query",
        "--storage-dir",
        dir.path().to_str().expect("utf8 path"),
        "--output",
        "json",
    ]);

    assert!(output.status.success(), "{:?}", output);
    let back: Vec<ParsedEntry> = serde_json::from_slice(&output.stdout).expect("json array");
    assert_eq!(back, stored);
}

#[test]
fn test_query_filters_by_level_and_field() {
    let dir = TempDir::new().expect("tempdir");
    seed(dir.path());

    let output = logflow(&[
        "query",
        "--storage-dir",
        dir.path().to_str().expect("utf8 path"),
        "--level",
        "error",
        "--field",
        "service=auth",
    ]);

    assert!(output.status.success());
    let text = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("[2024-01-15T12:00:03Z] ERROR"));
}

#[test]
fn test_query_limit_and_pattern() {
    let dir = TempDir::new().expect("tempdir");
    seed(dir.path());

    let output = logflow(&[
        "query",
        "--storage-dir",
        dir.path().to_str().expect("utf8 path"),
        "--pattern",
        "AUTH",
        "-n",
        "2",
        "--output",
        "json",
    ]);

    assert!(output.status.success());
    let back: Vec<ParsedEntry> = serde_json::from_slice(&output.stdout).expect("json array");
    let seconds: Vec<&str> = back.iter().map(|e| e.timestamp.as_str()).collect();
    assert_eq!(seconds, vec!["2024-01-15T12:00:01Z", "2024-01-15T12:00:03Z"]);
}

#[test]
fn test_query_filters_by_date_without_index() {
    let dir = TempDir::new().expect("tempdir");
    seed(dir.path());
    let storage = dir.path().to_str().expect("utf8 path");

    let output = logflow(&[
        "query", "--storage-dir", storage, "--date", "2024-01-15", "--level", "ERROR", "--output",
        "json",
    ]);
    assert!(output.status.success(), "{:?}", output);
    let back: Vec<ParsedEntry> = serde_json::from_slice(&output.stdout).expect("json array");
    assert_eq!(back.len(), 2);

    let output = logflow(&[
        "query", "--storage-dir", storage, "--date", "2024-01-16", "--output", "json",
    ]);
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "[]");

    let output = logflow(&["query", "--storage-dir", storage, "--date", "15/01/2024"]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_query_invalid_since_fails() {
    let dir = TempDir::new().expect("tempdir");
    let output = logflow(&[
        "query",
        "--storage-dir",
        dir.path().to_str().expect("utf8 path"),
        "--since",
        "last tuesday",
    ]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("since"));
}

#[test]
fn test_query_empty_storage_prints_empty_array() {
    let dir = TempDir::new().expect("tempdir");
    let output = logflow(&[
        "query",
        "--storage-dir",
        dir.path().to_str().expect("utf8 path"),
        "--output",
        "json",
    ]);
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "[]");
}

#[test]
fn test_status_reports_each_configured_stage() {
    let dir = TempDir::new().expect("tempdir");
    let root = dir.path();
    let config_path = root.join("logflow.toml");
    fs::write(
        &config_path,
        format!(
            r#"
[parser]
input_dir = {batches}
output_dir = {parsed}
state_file = {parser_state}

[storage]
input_dir = {parsed}
storage_dir = {segments}
state_file = {storage_state}
"#,
            batches = toml_path(&root.join("batches")),
            parsed = toml_path(&root.join("parsed")),
            segments = toml_path(&root.join("segments")),
            parser_state = toml_path(&root.join("parser.json")),
            storage_state = toml_path(&root.join("storage.json")),
        ),
    )
    .expect("write config");

    let output = logflow(&[
        "-c",
        config_path.to_str().expect("utf8 path"),
        "status",
        "--output",
        "json",
    ]);

    assert!(output.status.success(), "{:?}", output);
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    let stages = report["stages"].as_array().expect("stages");
    assert_eq!(stages.len(), 2);
    assert_eq!(stages[0]["stage"], "parser");
    assert_eq!(stages[0]["health"], "not_started");
    assert_eq!(stages[1]["stage"], "storage");
    assert!(!root.join("parser.json").exists(), "status never writes state");
}

fn toml_path(path: &Path) -> String {
    toml::Value::String(path.display().to_string()).to_string()
}
