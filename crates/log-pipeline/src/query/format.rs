//! Result rendering.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use logflow_core::types::ParsedEntry;

use crate::error::LogPipelineError;

/// Output format selector of a query request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    #[default]
    Text,
    Json,
}

impl ResponseFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for ResponseFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseFormat {
    type Err = LogPipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(LogPipelineError::Query(format!(
                "unknown format '{other}', expected text or json"
            ))),
        }
    }
}

/// Renders a list of entries.
pub trait Formatter: Send + Sync {
    fn content_type(&self) -> &'static str;

    fn render(&self, entries: &[ParsedEntry]) -> Result<String, LogPipelineError>;
}

/// Formatter for `format`.
pub fn formatter_for(format: ResponseFormat) -> Box<dyn Formatter> {
    match format {
        ResponseFormat::Text => Box::new(TextFormatter),
        ResponseFormat::Json => Box::new(JsonFormatter),
    }
}

/// One fixed-width line per entry:
/// `[timestamp] LEVEL   host            METHOD path -> status`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextFormatter;

impl TextFormatter {
    pub fn line(entry: &ParsedEntry) -> String {
        let host = entry
            .field("remote_host")
            .or_else(|| entry.field("hostname"))
            .unwrap_or_default();
        let method = entry.field("method").unwrap_or_default();
        let path = entry.field("path").unwrap_or_default();
        let status = entry.field("status_code").unwrap_or_default();
        format!(
            "[{}] {:7} {:15} {:6} {} -> {}",
            entry.timestamp, entry.level, host, method, path, status
        )
    }
}

impl Formatter for TextFormatter {
    fn content_type(&self) -> &'static str {
        "text/plain; charset=utf-8"
    }

    fn render(&self, entries: &[ParsedEntry]) -> Result<String, LogPipelineError> {
        Ok(entries
            .iter()
            .map(Self::line)
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

/// Pretty-printed JSON array in result order.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn content_type(&self) -> &'static str {
        "application/json"
    }

    fn render(&self, entries: &[ParsedEntry]) -> Result<String, LogPipelineError> {
        serde_json::to_string_pretty(entries)
            .map_err(|e| LogPipelineError::Query(format!("cannot encode results: {e}")))
    }
}
