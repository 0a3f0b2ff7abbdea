//! End-to-end tests: source file through every stage to a query result.

use std::path::Path;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use logflow_core::config::{
    CollectorConfig, EntryFilterConfig, FilterAction, ParserConfig, QueryConfig, RawFilterConfig,
    StorageConfig,
};
use logflow_core::types::{LogFormat, ParsedEntry, ParserFormat};
use logflow_pipeline::query::{QueryEngine, QueryFilter, QueryRequest, ResponseFormat};
use logflow_pipeline::storage::{SegmentState, list_segments};
use logflow_pipeline::{Collector, ParserStage, Stage, StageRunner, StorageStage};

struct Layout {
    _root: tempfile::TempDir,
    collector: CollectorConfig,
    parser: ParserConfig,
    storage: StorageConfig,
    query: QueryConfig,
}

fn layout() -> Layout {
    let root = tempfile::tempdir().expect("tempdir");
    let dir = root.path();
    Layout {
        collector: CollectorConfig {
            source_file: dir.join("source/app.log"),
            output_dir: dir.join("batches"),
            state_file: dir.join("state/collector.json"),
            poll_interval: 0.01,
            batch_size: 2,
            filters: vec![RawFilterConfig {
                pattern: "GET /healthz".to_owned(),
                action: FilterAction::Exclude,
            }],
        },
        parser: ParserConfig {
            input_dir: dir.join("batches"),
            output_dir: dir.join("parsed"),
            state_file: dir.join("state/parser.json"),
            poll_interval: 0.01,
            filters: vec![EntryFilterConfig {
                field: "level".to_owned(),
                pattern: "^DEBUG$".to_owned(),
                action: FilterAction::Exclude,
            }],
            format: ParserFormat::Auto,
        },
        storage: StorageConfig {
            input_dir: dir.join("parsed"),
            storage_dir: dir.join("segments"),
            state_file: dir.join("state/storage.json"),
            poll_interval: 0.01,
            rotation_size_mb: 5.0,
            rotation_hours: 24.0,
            compression_enabled: true,
        },
        query: QueryConfig {
            storage_dir: dir.join("segments"),
            default_limit: 50,
        },
        _root: root,
    }
}

async fn append(path: &Path, lines: &[&str]) {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.expect("source dir");
    }
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .expect("open source");
    for line in lines {
        file.write_all(line.as_bytes()).await.expect("write");
        file.write_all(b"\n").await.expect("write");
    }
    file.flush().await.expect("flush");
}

const MIXED: &[&str] = &[
    r#"{"timestamp":"2024-01-15T12:00:00Z","level":"INFO","service":"auth","message":"login ok"}"#,
    r#"10.0.0.1 - - [15/Jan/2024:12:00:01 +0000] "GET /healthz HTTP/1.1" 200 2"#,
    r#"10.0.0.2 - - [15/Jan/2024:12:00:02 +0000] "GET /orders HTTP/1.1" 500 120"#,
    r#"{"timestamp":"2024-01-15T12:00:03Z","level":"DEBUG","message":"cache miss"}"#,
    "<11>Jan 15 12:00:04 db1 postgres[42]: connection refused",
    "this line matches no known format",
    r#"10.0.0.3 - - [15/Jan/2024:12:00:05 +0000] "POST /login HTTP/1.1" 401 0 "-" "curl/8.0""#,
];

async fn run_all_once(collector: &mut Collector, parser: &mut ParserStage, storage: &mut StorageStage) {
    collector.poll_once().await.expect("collector cycle");
    parser.poll_once().await.expect("parser cycle");
    storage.poll_once().await.expect("storage cycle");
}

#[tokio::test]
async fn source_lines_reach_query_in_order() {
    let l = layout();
    let mut collector = Collector::open(&l.collector).await.expect("collector");
    let mut parser = ParserStage::open(&l.parser).await.expect("parser");
    let mut storage = StorageStage::open(&l.storage).await.expect("storage");

    append(&l.collector.source_file, MIXED).await;
    run_all_once(&mut collector, &mut parser, &mut storage).await;

    // healthz dropped by the collector, DEBUG by the parser, one undecodable
    assert_eq!(collector.stats().lines_filtered, 1);
    assert_eq!(parser.stats().entries_filtered, 1);
    assert_eq!(parser.stats().decode_failures, 1);

    let engine = QueryEngine::new(&l.query);
    let result = engine
        .search(&QueryFilter::new(), None)
        .await
        .expect("search");
    let formats: Vec<LogFormat> = result.entries.iter().map(|e| e.format).collect();
    assert_eq!(
        formats,
        vec![
            LogFormat::Json,
            LogFormat::Apache,
            LogFormat::Syslog,
            LogFormat::Nginx
        ]
    );
    assert_eq!(result.entries[1].level, "ERROR");
    assert_eq!(result.entries[2].level, "ERROR");
    assert_eq!(result.entries[3].level, "WARNING");
}

#[tokio::test]
async fn query_filters_and_formats_stored_entries() {
    let l = layout();
    let mut collector = Collector::open(&l.collector).await.expect("collector");
    let mut parser = ParserStage::open(&l.parser).await.expect("parser");
    let mut storage = StorageStage::open(&l.storage).await.expect("storage");
    append(&l.collector.source_file, MIXED).await;
    run_all_once(&mut collector, &mut parser, &mut storage).await;

    let engine = QueryEngine::new(&l.query);

    let errors = engine
        .execute(&QueryRequest {
            format: ResponseFormat::Text,
            filter: QueryFilter::new().level("error"),
            limit: None,
        })
        .await
        .expect("query");
    assert_eq!(errors.count, 2);
    let first = errors.body.lines().next().expect("one line");
    assert!(first.contains("10.0.0.2"));
    assert!(first.ends_with("/orders -> 500"));

    let json = engine
        .execute(&QueryRequest {
            format: ResponseFormat::Json,
            filter: QueryFilter::new().field("method", "POST"),
            limit: Some(10),
        })
        .await
        .expect("query");
    let back: Vec<ParsedEntry> = serde_json::from_str(&json.body).expect("json body");
    assert_eq!(back.len(), 1);
    assert_eq!(back[0].field("status_code").as_deref(), Some("401"));
    assert_eq!(back[0].field("user_agent").as_deref(), Some("curl/8.0"));
}

#[tokio::test]
async fn restarted_stages_do_not_duplicate_entries() {
    let l = layout();
    {
        let mut collector = Collector::open(&l.collector).await.expect("collector");
        let mut parser = ParserStage::open(&l.parser).await.expect("parser");
        let mut storage = StorageStage::open(&l.storage).await.expect("storage");
        append(&l.collector.source_file, &MIXED[..3]).await;
        run_all_once(&mut collector, &mut parser, &mut storage).await;
    }

    let mut collector = Collector::open(&l.collector).await.expect("collector");
    let mut parser = ParserStage::open(&l.parser).await.expect("parser");
    let mut storage = StorageStage::open(&l.storage).await.expect("storage");
    append(&l.collector.source_file, &MIXED[3..]).await;
    run_all_once(&mut collector, &mut parser, &mut storage).await;
    run_all_once(&mut collector, &mut parser, &mut storage).await;

    let result = QueryEngine::new(&l.query)
        .search(&QueryFilter::new(), None)
        .await
        .expect("search");
    assert_eq!(result.entries.len(), 4);
}

#[tokio::test]
async fn rotated_segments_stay_queryable() {
    let l = layout();
    let mut collector = Collector::open(&l.collector).await.expect("collector");
    let mut parser = ParserStage::open(&l.parser).await.expect("parser");
    let mut storage = StorageStage::open(&l.storage).await.expect("storage");

    append(&l.collector.source_file, MIXED).await;
    run_all_once(&mut collector, &mut parser, &mut storage).await;
    let later = chrono::Utc::now() + chrono::Duration::hours(48);
    storage.rotate_if_due(later).await.expect("rotate");

    append(&l.collector.source_file, &MIXED[..1]).await;
    run_all_once(&mut collector, &mut parser, &mut storage).await;

    let segments = list_segments(&l.storage.storage_dir, Some(&storage.state().active_segment_name))
        .await
        .expect("segments");
    let states: Vec<SegmentState> = segments.iter().map(|s| s.state).collect();
    assert_eq!(states, vec![SegmentState::Compressed, SegmentState::Active]);

    let result = QueryEngine::new(&l.query)
        .search(&QueryFilter::new(), None)
        .await
        .expect("search");
    assert_eq!(result.entries.len(), 5);
    assert_eq!(result.entries[4].service.as_deref(), Some("auth"));
}

#[tokio::test]
async fn level_and_date_queries_are_served_from_index() {
    let l = layout();
    let mut collector = Collector::open(&l.collector).await.expect("collector");
    let mut parser = ParserStage::open(&l.parser).await.expect("parser");
    let mut storage = StorageStage::open(&l.storage).await.expect("storage");
    append(&l.collector.source_file, MIXED).await;
    run_all_once(&mut collector, &mut parser, &mut storage).await;
    storage
        .rotate_if_due(chrono::Utc::now() + chrono::Duration::hours(48))
        .await
        .expect("rotate");
    append(&l.collector.source_file, &MIXED[2..3]).await;
    run_all_once(&mut collector, &mut parser, &mut storage).await;

    let engine = QueryEngine::new(&l.query);
    let errors = engine
        .search(&QueryFilter::new().level("error"), None)
        .await
        .expect("search");
    assert!(errors.indexed);
    let formats: Vec<LogFormat> = errors.entries.iter().map(|e| e.format).collect();
    assert_eq!(
        formats,
        vec![LogFormat::Apache, LogFormat::Syslog, LogFormat::Apache]
    );

    // syslog timestamps carry no year, so only dated formats match a day
    let day = engine
        .search(&QueryFilter::new().date("2024-01-15").expect("date"), None)
        .await
        .expect("search");
    assert!(day.indexed);
    let formats: Vec<LogFormat> = day.entries.iter().map(|e| e.format).collect();
    assert_eq!(
        formats,
        vec![
            LogFormat::Json,
            LogFormat::Apache,
            LogFormat::Nginx,
            LogFormat::Apache
        ]
    );

    let errors_that_day = engine
        .execute(&QueryRequest {
            format: ResponseFormat::Json,
            filter: QueryFilter::new()
                .level("ERROR")
                .date("2024-01-15")
                .expect("date"),
            limit: Some(1),
        })
        .await
        .expect("query");
    let back: Vec<ParsedEntry> = serde_json::from_str(&errors_that_day.body).expect("json body");
    assert_eq!(back.len(), 1);
    assert_eq!(back[0].field("status_code").as_deref(), Some("500"));
}

#[tokio::test]
async fn runner_drives_collector_until_cancelled() {
    let l = layout();
    append(&l.collector.source_file, &MIXED[..3]).await;

    let cancel = CancellationToken::new();
    let collector = Collector::open(&l.collector).await.expect("collector");
    let runner = StageRunner::new(collector, cancel.clone());
    let handle = tokio::spawn(runner.run());

    let output = l.collector.output_dir.clone();
    let published = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let files = logflow_pipeline::queue::list(&output, logflow_pipeline::queue::BATCH_FILES)
                .await
                .expect("list");
            if !files.is_empty() {
                return files.len();
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("batch published in time");
    assert_eq!(published, 1);

    cancel.cancel();
    let collector = handle.await.expect("join").expect("clean stop");
    assert_eq!(collector.cursor().last_sequence, 1);
}
