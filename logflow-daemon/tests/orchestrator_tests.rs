//! Orchestrator integration tests.
//!
//! Each test builds a config whose paths live in a temp dir, runs one stage
//! until the cancel token fires and checks what the stage left on disk.

use std::path::Path;
use std::time::Duration;

use logflow_core::config::LogflowConfig;
use logflow_daemon::orchestrator::{Orchestrator, StageKind};

/// TOML string literal for a path.
fn quoted(path: &Path) -> String {
    toml::Value::String(path.display().to_string()).to_string()
}

fn pipeline_config(root: &Path) -> LogflowConfig {
    let toml_str = format!(
        r#"
[general]
log_level = "info"

[collector]
source_file = {source}
output_dir = {batches}
state_file = {collector_state}
poll_interval = 0.01
batch_size = 10

[parser]
input_dir = {batches}
output_dir = {parsed}
state_file = {parser_state}
poll_interval = 0.01
format = "json"

[storage]
input_dir = {parsed}
storage_dir = {segments}
state_file = {storage_state}
poll_interval = 0.01
"#,
        source = quoted(&root.join("app.log")),
        batches = quoted(&root.join("batches")),
        parsed = quoted(&root.join("parsed")),
        segments = quoted(&root.join("segments")),
        collector_state = quoted(&root.join("state/collector.json")),
        parser_state = quoted(&root.join("state/parser.json")),
        storage_state = quoted(&root.join("state/storage.json")),
    );
    LogflowConfig::parse(&toml_str).expect("failed to parse pipeline config")
}

async fn count_files(dir: &Path) -> usize {
    let mut count = 0;
    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return 0;
    };
    while let Some(entry) = entries.next_entry().await.expect("read_dir") {
        if !entry.file_name().to_string_lossy().starts_with('.') {
            count += 1;
        }
    }
    count
}

async fn wait_for_files(dir: &Path, expected: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while count_files(dir).await < expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("stage output did not appear in time");
}

async fn run_stage_until(orchestrator: Orchestrator, dir: &Path, expected: usize) {
    let cancel = orchestrator.cancel_token();
    let handle = tokio::spawn(orchestrator.run_until_cancelled());
    wait_for_files(dir, expected).await;
    cancel.cancel();

    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("stage did not stop after cancel")
        .expect("stage task panicked");
    assert!(result.is_ok(), "stage should stop cleanly: {:?}", result.err());
}

#[tokio::test]
async fn test_stages_run_in_turn_and_stop_on_cancel() {
    let root = tempfile::tempdir().expect("tempdir");
    let config = pipeline_config(root.path());
    tokio::fs::write(
        root.path().join("app.log"),
        concat!(
            r#"{"timestamp":"2024-01-15T12:00:00Z","level":"INFO","message":"one"}"#,
            "\n",
            r#"{"timestamp":"2024-01-15T12:00:01Z","level":"ERROR","message":"two"}"#,
            "\n",
        ),
    )
    .await
    .expect("write source");

    let collector = Orchestrator::build_from_config(config.clone(), StageKind::Collector)
        .expect("collector orchestrator");
    assert_eq!(collector.stage(), StageKind::Collector);
    run_stage_until(collector, &root.path().join("batches"), 1).await;

    let parser = Orchestrator::build_from_config(config.clone(), StageKind::Parser)
        .expect("parser orchestrator");
    run_stage_until(parser, &root.path().join("parsed"), 1).await;

    let storage =
        Orchestrator::build_from_config(config, StageKind::Storage).expect("storage orchestrator");
    let segments = root.path().join("segments");
    run_stage_until(storage, &segments, 1).await;

    let mut entries = tokio::fs::read_dir(&segments).await.expect("segments dir");
    let mut stored = String::new();
    while let Some(entry) = entries.next_entry().await.expect("read_dir") {
        stored.push_str(
            &tokio::fs::read_to_string(entry.path())
                .await
                .expect("read segment"),
        );
    }
    assert_eq!(stored.lines().count(), 2);
    assert!(stored.contains("\"message\":\"two\""));
}

#[tokio::test]
async fn test_build_rejects_missing_stage_section() {
    let config = LogflowConfig::parse(
        r#"
[general]
log_level = "info"
"#,
    )
    .expect("parse");

    for stage in [StageKind::Collector, StageKind::Parser, StageKind::Storage] {
        let result = Orchestrator::build_from_config(config.clone(), stage);
        assert!(result.is_err(), "{stage} stage without a section must fail");
    }
}

#[tokio::test]
async fn test_build_rejects_invalid_config() {
    let root = tempfile::tempdir().expect("tempdir");
    let mut config = pipeline_config(root.path());
    config.general.log_level = "loud".to_owned();

    let result = Orchestrator::build_from_config(config, StageKind::Collector);
    assert!(result.is_err());
}

#[tokio::test]
async fn test_build_from_missing_file_fails() {
    let result = Orchestrator::build(Path::new("/nonexistent/logflow.toml"), StageKind::Parser).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_fatal_stage_error_ends_run() {
    let root = tempfile::tempdir().expect("tempdir");
    let config = pipeline_config(root.path());
    tokio::fs::create_dir_all(root.path().join("state"))
        .await
        .expect("state dir");
    tokio::fs::write(root.path().join("state/storage.json"), "{ not json")
        .await
        .expect("corrupt state");

    let orchestrator =
        Orchestrator::build_from_config(config, StageKind::Storage).expect("orchestrator");
    let result = tokio::time::timeout(Duration::from_secs(5), orchestrator.run_until_cancelled())
        .await
        .expect("run should end on its own");
    assert!(result.is_err(), "corrupt state must stop the stage");
}
