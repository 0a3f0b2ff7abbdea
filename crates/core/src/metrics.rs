//! Metric names and descriptions.
//!
//! All Prometheus metric names are defined here. Stages call
//! `metrics::counter!()`, `metrics::gauge!()` and `metrics::histogram!()` with
//! these constants; without an installed recorder the calls are no-ops.
//!
//! # Naming
//!
//! - prefix: `logflow_`
//! - stage: `collector_`, `parser_`, `storage_`, `query_`, `stage_`
//! - suffix: `_total` (counter), `_seconds` (histogram), none (gauge)
//!
//! ```ignore
//! metrics::counter!(logflow_core::metrics::COLLECTOR_LINES_READ_TOTAL).increment(1);
//! ```

// ─── label keys ─────────────────────────────────────────────────────

/// Stage label key (collector, parser, storage)
pub const LABEL_STAGE: &str = "stage";

/// Decoder label key (json, apache, nginx, syslog, auto)
pub const LABEL_FORMAT: &str = "format";

/// Output format label key (text, json)
pub const LABEL_OUTPUT: &str = "output";

// ─── collector ──────────────────────────────────────────────────────

/// Collector: complete lines read from the source (counter)
pub const COLLECTOR_LINES_READ_TOTAL: &str = "logflow_collector_lines_read_total";

/// Collector: lines dropped by raw filters (counter)
pub const COLLECTOR_LINES_FILTERED_TOTAL: &str = "logflow_collector_lines_filtered_total";

/// Collector: batch files published (counter)
pub const COLLECTOR_BATCHES_WRITTEN_TOTAL: &str = "logflow_collector_batches_written_total";

/// Collector: source truncations or replacements detected (counter)
pub const COLLECTOR_SOURCE_RESETS_TOTAL: &str = "logflow_collector_source_resets_total";

/// Collector: lines longer than one read window, split into several records (counter)
pub const COLLECTOR_LINES_SPLIT_TOTAL: &str = "logflow_collector_lines_split_total";

// ─── parser ─────────────────────────────────────────────────────────

/// Parser: batch files consumed (counter)
pub const PARSER_FILES_PROCESSED_TOTAL: &str = "logflow_parser_files_processed_total";

/// Parser: entries written to parsed files (counter)
pub const PARSER_ENTRIES_WRITTEN_TOTAL: &str = "logflow_parser_entries_written_total";

/// Parser: lines that failed to decode (counter, label: format)
pub const PARSER_DECODE_FAILURES_TOTAL: &str = "logflow_parser_decode_failures_total";

/// Parser: entries dropped by entry filters (counter)
pub const PARSER_ENTRIES_FILTERED_TOTAL: &str = "logflow_parser_entries_filtered_total";

// ─── storage ────────────────────────────────────────────────────────

/// Storage: entries appended to segments (counter)
pub const STORAGE_ENTRIES_APPENDED_TOTAL: &str = "logflow_storage_entries_appended_total";

/// Storage: bytes appended to segments (counter)
pub const STORAGE_BYTES_APPENDED_TOTAL: &str = "logflow_storage_bytes_appended_total";

/// Storage: segment rotations (counter)
pub const STORAGE_ROTATIONS_TOTAL: &str = "logflow_storage_rotations_total";

/// Storage: failed segment compressions (counter)
pub const STORAGE_COMPRESSION_FAILURES_TOTAL: &str = "logflow_storage_compression_failures_total";

/// Storage: current active segment size in bytes (gauge)
pub const STORAGE_ACTIVE_SEGMENT_BYTES: &str = "logflow_storage_active_segment_bytes";

// ─── query ──────────────────────────────────────────────────────────

/// Query: requests served (counter, label: output)
pub const QUERY_REQUESTS_TOTAL: &str = "logflow_query_requests_total";

/// Query: stored lines skipped because they did not decode (counter)
pub const QUERY_UNDECODABLE_LINES_TOTAL: &str = "logflow_query_undecodable_lines_total";

// ─── stage loop ─────────────────────────────────────────────────────

/// Stage: duration of one poll cycle (histogram, label: stage)
pub const STAGE_CYCLE_DURATION_SECONDS: &str = "logflow_stage_cycle_duration_seconds";

/// Stage: cycles that ended in a transient error (counter, label: stage)
pub const STAGE_TRANSIENT_ERRORS_TOTAL: &str = "logflow_stage_transient_errors_total";

/// Poll cycle histogram buckets (seconds), 1ms to 30s.
pub const CYCLE_DURATION_BUCKETS: [f64; 9] = [0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0];

/// Registers HELP text for every metric.
///
/// Call once after the global recorder is installed.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    describe_counter!(
        COLLECTOR_LINES_READ_TOTAL,
        "Complete lines read from the source file"
    );
    describe_counter!(
        COLLECTOR_LINES_FILTERED_TOTAL,
        "Raw lines dropped by collector filter rules"
    );
    describe_counter!(
        COLLECTOR_BATCHES_WRITTEN_TOTAL,
        "Batch files published by the collector"
    );
    describe_counter!(
        COLLECTOR_SOURCE_RESETS_TOTAL,
        "Times the source file was found truncated or replaced"
    );
    describe_counter!(
        COLLECTOR_LINES_SPLIT_TOTAL,
        "Overlong source lines split across several records"
    );

    describe_counter!(
        PARSER_FILES_PROCESSED_TOTAL,
        "Batch files consumed by the parser"
    );
    describe_counter!(
        PARSER_ENTRIES_WRITTEN_TOTAL,
        "Structured entries written by the parser"
    );
    describe_counter!(
        PARSER_DECODE_FAILURES_TOTAL,
        "Lines that could not be decoded"
    );
    describe_counter!(
        PARSER_ENTRIES_FILTERED_TOTAL,
        "Entries dropped by parser filter rules"
    );

    describe_counter!(
        STORAGE_ENTRIES_APPENDED_TOTAL,
        "Entries appended to storage segments"
    );
    describe_counter!(
        STORAGE_BYTES_APPENDED_TOTAL,
        "Bytes appended to storage segments"
    );
    describe_counter!(STORAGE_ROTATIONS_TOTAL, "Storage segment rotations");
    describe_counter!(
        STORAGE_COMPRESSION_FAILURES_TOTAL,
        "Closed segments left uncompressed after a compression failure"
    );
    describe_gauge!(
        STORAGE_ACTIVE_SEGMENT_BYTES,
        "Size of the active storage segment in bytes"
    );

    describe_counter!(QUERY_REQUESTS_TOTAL, "Query requests served");
    describe_counter!(
        QUERY_UNDECODABLE_LINES_TOTAL,
        "Stored lines skipped by queries because they did not decode"
    );

    describe_histogram!(
        STAGE_CYCLE_DURATION_SECONDS,
        "Duration of one stage poll cycle in seconds"
    );
    describe_counter!(
        STAGE_TRANSIENT_ERRORS_TOTAL,
        "Poll cycles that ended with a retryable error"
    );
}
