//! Integration tests for `logflow config`.
//!
//! Runs the built binary against real config files.

use std::fs;
use std::process::{Command, Output};

use tempfile::TempDir;

fn logflow(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_logflow"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run logflow binary")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

const VALID: &str = r#"
[general]
log_level = "info"
log_format = "json"

[collector]
source_file = "/var/log/app.log"
output_dir = "/var/lib/logflow/batches"
state_file = "/var/lib/logflow/state/collector.json"
batch_size = 200

[storage]
input_dir = "/var/lib/logflow/parsed"
storage_dir = "/var/lib/logflow/segments"
state_file = "/var/lib/logflow/state/storage.json"
rotation_size_mb = 0.5
"#;

#[test]
fn test_config_validate_valid_toml() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("logflow.toml");
    fs::write(&config_path, VALID).expect("should write config");

    let output = logflow(&[
        "-c",
        config_path.to_str().expect("utf8 path"),
        "config",
        "validate",
        "--output",
        "json",
    ]);

    assert!(output.status.success(), "valid config should pass");
    let report: serde_json::Value = serde_json::from_str(&stdout(&output)).expect("json report");
    assert_eq!(report["valid"], true);
    assert_eq!(report["stages"], serde_json::json!(["collector", "storage"]));
}

#[test]
fn test_config_validate_malformed_toml_exits_with_config_code() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("bad.toml");
    fs::write(&config_path, "[general\nlog_level = \"info\"\n").expect("should write");

    let output = logflow(&[
        "-c",
        config_path.to_str().expect("utf8 path"),
        "config",
        "validate",
    ]);

    assert_eq!(output.status.code(), Some(2));
    assert!(stdout(&output).contains("INVALID"));
}

#[test]
fn test_config_validate_bad_filter_regex() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("logflow.toml");
    fs::write(
        &config_path,
        r#"
[collector]
source_file = "/var/log/app.log"
output_dir = "/tmp/batches"
state_file = "/tmp/collector.json"

[[collector.filters]]
pattern = "[unclosed"
action = "include"
"#,
    )
    .expect("should write");

    let output = logflow(&[
        "-c",
        config_path.to_str().expect("utf8 path"),
        "config",
        "validate",
    ]);

    assert_eq!(output.status.code(), Some(2));
    assert!(stdout(&output).contains("collector.filters"));
}

#[test]
fn test_config_validate_missing_file() {
    let output = logflow(&["-c", "/nonexistent/logflow.toml", "config", "validate"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stdout(&output).contains("not found"));
}

#[test]
fn test_config_show_section_includes_defaults() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("logflow.toml");
    fs::write(&config_path, VALID).expect("should write config");

    let output = logflow(&[
        "-c",
        config_path.to_str().expect("utf8 path"),
        "config",
        "show",
        "--section",
        "storage",
    ]);

    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("rotation_size_mb = 0.5"));
    assert!(text.contains("rotation_hours = 24.0"), "default is filled in");
    assert!(text.contains("compression_enabled = true"));
}

#[test]
fn test_config_show_yaml_file() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("logflow.yaml");
    fs::write(
        &config_path,
        r#"
parser:
  input_dir: /var/lib/logflow/batches
  output_dir: /var/lib/logflow/parsed
  state_file: /var/lib/logflow/state/parser.json
  format: syslog
"#,
    )
    .expect("should write config");

    let output = logflow(&[
        "-c",
        config_path.to_str().expect("utf8 path"),
        "config",
        "show",
        "--section",
        "parser",
    ]);

    assert!(output.status.success());
    assert!(stdout(&output).contains("format = \"syslog\""));
}

#[test]
fn test_config_show_unknown_section_fails() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("logflow.toml");
    fs::write(&config_path, VALID).expect("should write config");

    let output = logflow(&[
        "-c",
        config_path.to_str().expect("utf8 path"),
        "config",
        "show",
        "--section",
        "ebpf",
    ]);

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown section"));
}

#[test]
fn test_config_env_override_is_shown() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("logflow.toml");
    fs::write(&config_path, VALID).expect("should write config");

    let output = Command::new(env!("CARGO_BIN_EXE_logflow"))
        .args([
            "-c",
            config_path.to_str().expect("utf8 path"),
            "config",
            "show",
            "--section",
            "collector",
        ])
        .env("LOGFLOW_COLLECTOR_BATCH_SIZE", "25")
        .output()
        .expect("failed to run logflow binary");

    assert!(output.status.success());
    assert!(stdout(&output).contains("batch_size = 25"));
}
