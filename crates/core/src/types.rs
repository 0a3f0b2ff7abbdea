//! Domain types shared between stages.
//!
//! [`ParsedEntry`] is the unit the parser stage writes, storage appends and
//! query reads back. On disk it is a single flat JSON object per line.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Level assigned when a line carries none.
pub const UNKNOWN_LEVEL: &str = "UNKNOWN";

/// Format a stored entry was decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Apache,
    Nginx,
    Syslog,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Apache => "apache",
            Self::Nginx => "nginx",
            Self::Syslog => "syslog",
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoder selection for the parser stage.
///
/// `Auto` inspects each line: JSON objects first, then `<pri>` syslog, then
/// nginx combined, then apache combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParserFormat {
    #[default]
    Auto,
    Json,
    Apache,
    Nginx,
    Syslog,
}

impl FromStr for ParserFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "json" => Ok(Self::Json),
            "apache" => Ok(Self::Apache),
            "nginx" => Ok(Self::Nginx),
            "syslog" => Ok(Self::Syslog),
            other => Err(format!(
                "unknown parser format '{other}', expected auto, json, apache, nginx or syslog"
            )),
        }
    }
}

fn default_level() -> String {
    UNKNOWN_LEVEL.to_owned()
}

/// A structured log record.
///
/// `timestamp`, `level` and `raw` are always present. Format specific keys
/// (request method, status code, syslog facility, arbitrary JSON extras) live
/// in `fields` and are flattened into the top-level object when serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedEntry {
    pub timestamp: String,
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub raw: String,
    pub format: LogFormat,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ParsedEntry {
    /// Creates an entry with only the mandatory parts set.
    pub fn new(timestamp: impl Into<String>, raw: impl Into<String>, format: LogFormat) -> Self {
        Self {
            timestamp: timestamp.into(),
            level: default_level(),
            id: None,
            service: None,
            user_id: None,
            request_id: None,
            duration_ms: None,
            message: None,
            source_file: None,
            tags: Vec::new(),
            raw: raw.into(),
            format,
            fields: Map::new(),
        }
    }

    /// Looks up a field by name and coerces it to a string.
    ///
    /// Named fields are checked first, then the extras map. Numbers and
    /// booleans render as their JSON text, arrays and objects as compact JSON,
    /// `null` as an empty string. Returns `None` when the field is absent.
    pub fn field(&self, name: &str) -> Option<String> {
        match name {
            "timestamp" => Some(self.timestamp.clone()),
            "level" => Some(self.level.clone()),
            "id" => self.id.clone(),
            "service" => self.service.clone(),
            "user_id" => self.user_id.clone(),
            "request_id" => self.request_id.clone(),
            "duration_ms" => self.duration_ms.map(|d| Value::from(d).to_string()),
            "message" => self.message.clone(),
            "source_file" => self.source_file.clone(),
            "tags" => Some(self.tags.join(",")),
            "raw" => Some(self.raw.clone()),
            "format" => Some(self.format.as_str().to_owned()),
            other => self.fields.get(other).map(value_to_string),
        }
    }

    /// Inserts an extra field.
    pub fn insert_field(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }
}

/// Coerces a JSON value into its plain string form.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ParsedEntry {
        let mut entry = ParsedEntry::new(
            "2024-05-01T12:00:00+00:00",
            r#"{"timestamp":"2024-05-01T12:00:00+00:00"}"#,
            LogFormat::Json,
        );
        entry.level = "ERROR".to_owned();
        entry.service = Some("auth".to_owned());
        entry.duration_ms = Some(12.5);
        entry.insert_field("status_code", 503);
        entry.insert_field("path", "/login");
        entry
    }

    #[test]
    fn new_entry_defaults_to_unknown_level() {
        let entry = ParsedEntry::new("t", "raw", LogFormat::Apache);
        assert_eq!(entry.level, UNKNOWN_LEVEL);
    }

    #[test]
    fn field_lookup_coerces_to_string() {
        let entry = sample();
        assert_eq!(entry.field("level").as_deref(), Some("ERROR"));
        assert_eq!(entry.field("status_code").as_deref(), Some("503"));
        assert_eq!(entry.field("path").as_deref(), Some("/login"));
        assert_eq!(entry.field("duration_ms").as_deref(), Some("12.5"));
        assert_eq!(entry.field("format").as_deref(), Some("json"));
        assert_eq!(entry.field("user_id"), None);
        assert_eq!(entry.field("nope"), None);
    }

    #[test]
    fn serializes_as_flat_object() {
        let entry = sample();
        let value = serde_json::to_value(&entry).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj["status_code"], 503);
        assert_eq!(obj["format"], "json");
        assert!(!obj.contains_key("fields"));
        assert!(!obj.contains_key("user_id"));
    }

    #[test]
    fn json_roundtrip_preserves_entry() {
        let entry = sample();
        let line = serde_json::to_string(&entry).unwrap();
        let back: ParsedEntry = serde_json::from_str(&line).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn missing_level_deserializes_as_unknown() {
        let line = r#"{"timestamp":"t","raw":"r","format":"syslog"}"#;
        let entry: ParsedEntry = serde_json::from_str(line).unwrap();
        assert_eq!(entry.level, UNKNOWN_LEVEL);
    }

    #[test]
    fn parser_format_from_str() {
        assert_eq!("NGINX".parse::<ParserFormat>(), Ok(ParserFormat::Nginx));
        assert!("xml".parse::<ParserFormat>().is_err());
    }

    #[test]
    fn value_to_string_handles_null_and_arrays() {
        assert_eq!(value_to_string(&Value::Null), "");
        assert_eq!(value_to_string(&serde_json::json!([1, 2])), "[1,2]");
    }
}
