//! JSON line parser.
//!
//! A line decodes when it is a JSON object with a `timestamp` key. Known keys
//! (`level`, `id`, `service`, `user_id`, `request_id`, `duration_ms`,
//! `message`, `source_file`, `tags`) populate the named entry fields; scalar
//! values are coerced to strings where the entry expects one. Every other key
//! is carried over unchanged in the entry's extra fields. Incoming `raw` and
//! `format` keys are replaced by the line itself and `json`.
//!
//! ```
//! use logflow_core::pipeline::LogParser;
//! use logflow_pipeline::parser::JsonParser;
//!
//! let entry = JsonParser::default()
//!     .parse(r#"{"timestamp":"2024-01-15T12:00:00Z","service":"auth","status":401}"#)?;
//! assert_eq!(entry.level, "UNKNOWN");
//! assert_eq!(entry.field("status").as_deref(), Some("401"));
//! # Ok::<(), logflow_core::error::DecodeError>(())
//! ```

use serde_json::{Map, Value};

use logflow_core::error::DecodeError;
use logflow_core::pipeline::LogParser;
use logflow_core::types::{LogFormat, ParsedEntry, value_to_string};

/// JSON object parser.
#[derive(Debug, Clone)]
pub struct JsonParser {
    /// Lines longer than this are rejected without parsing
    max_input_size: usize,
}

impl JsonParser {
    pub fn new() -> Self {
        Self {
            max_input_size: 1024 * 1024, // 1MB
        }
    }

    pub fn with_max_input_size(mut self, size: usize) -> Self {
        self.max_input_size = size;
        self
    }
}

impl Default for JsonParser {
    fn default() -> Self {
        Self::new()
    }
}

impl LogParser for JsonParser {
    fn format_name(&self) -> &str {
        "json"
    }

    fn parse(&self, line: &str) -> Result<ParsedEntry, DecodeError> {
        if line.trim().is_empty() {
            return Err(DecodeError::Empty);
        }
        if line.len() > self.max_input_size {
            return Err(DecodeError::InvalidJson {
                reason: format!(
                    "input too large: {} bytes (max: {})",
                    line.len(),
                    self.max_input_size
                ),
            });
        }

        let value: Value = serde_json::from_str(line).map_err(|e| DecodeError::InvalidJson {
            reason: e.to_string(),
        })?;
        let Value::Object(mut obj) = value else {
            return Err(DecodeError::NotObject);
        };

        let timestamp = obj
            .remove("timestamp")
            .ok_or_else(|| DecodeError::MissingField {
                field: "timestamp".to_owned(),
            })?;

        let mut entry = ParsedEntry::new(value_to_string(&timestamp), line, LogFormat::Json);
        if let Some(level) = take_string(&mut obj, "level") {
            entry.level = level;
        }
        entry.id = take_string(&mut obj, "id");
        entry.service = take_string(&mut obj, "service");
        entry.user_id = take_string(&mut obj, "user_id");
        entry.request_id = take_string(&mut obj, "request_id");
        entry.message = take_string(&mut obj, "message");
        entry.source_file = take_string(&mut obj, "source_file");
        entry.duration_ms = obj.remove("duration_ms").and_then(|v| match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        });
        entry.tags = match obj.remove("tags") {
            Some(Value::Array(items)) => items.iter().map(value_to_string).collect(),
            Some(Value::String(tag)) => vec![tag],
            _ => Vec::new(),
        };

        obj.remove("raw");
        obj.remove("format");
        entry.fields = obj;
        Ok(entry)
    }
}

/// Removes `key` and coerces it to a string; `null` counts as absent.
fn take_string(obj: &mut Map<String, Value>, key: &str) -> Option<String> {
    match obj.remove(key)? {
        Value::Null => None,
        other => Some(value_to_string(&other)),
    }
}
