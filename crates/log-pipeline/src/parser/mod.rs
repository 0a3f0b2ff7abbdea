//! Line decoders and the parser stage.
//!
//! Every decoder implements core's [`LogParser`] trait. [`ParserRouter`]
//! selects the decoder for the configured [`ParserFormat`]; in `auto` mode it
//! tries them in a fixed order with cheap prefix checks first:
//!
//! 1. line starts with `{`: JSON
//! 2. line starts with `<` and a digit: RFC 3164 syslog
//! 3. Nginx combined (more specific)
//! 4. Apache combined
//!
//! ```
//! use logflow_core::types::{LogFormat, ParserFormat};
//! use logflow_pipeline::parser::ParserRouter;
//!
//! let router = ParserRouter::for_format(ParserFormat::Auto);
//! let entry = router.parse(r#"1.2.3.4 - - [10/Oct/2023:13:55:36 +0000] "GET / HTTP/1.1" 200 5"#)?;
//! assert_eq!(entry.format, LogFormat::Apache);
//! # Ok::<(), logflow_core::error::DecodeError>(())
//! ```

pub mod clf;
pub mod json;
mod scan;
pub mod stage;
pub mod syslog;

pub use clf::ClfParser;
pub use json::JsonParser;
pub use stage::{ParserCursor, ParserStage};
pub use syslog::SyslogParser;

use logflow_core::error::DecodeError;
use logflow_core::pipeline::LogParser;
use logflow_core::types::{ParsedEntry, ParserFormat};

/// Decoder selection for one parser stage.
pub struct ParserRouter {
    format: ParserFormat,
    /// Decoders in detection order
    parsers: Vec<Box<dyn LogParser>>,
}

impl ParserRouter {
    /// Builds the decoder set for `format`.
    pub fn for_format(format: ParserFormat) -> Self {
        let parsers: Vec<Box<dyn LogParser>> = match format {
            ParserFormat::Auto => vec![
                Box::new(JsonParser::default()),
                Box::new(SyslogParser::new()),
                Box::new(ClfParser::nginx()),
                Box::new(ClfParser::apache()),
            ],
            ParserFormat::Json => vec![Box::new(JsonParser::default())],
            ParserFormat::Apache => vec![Box::new(ClfParser::apache())],
            ParserFormat::Nginx => vec![Box::new(ClfParser::nginx())],
            ParserFormat::Syslog => vec![Box::new(SyslogParser::new())],
        };
        Self { format, parsers }
    }

    pub fn format(&self) -> ParserFormat {
        self.format
    }

    /// Name used in logs and metric labels.
    pub fn format_name(&self) -> &'static str {
        match self.format {
            ParserFormat::Auto => "auto",
            ParserFormat::Json => "json",
            ParserFormat::Apache => "apache",
            ParserFormat::Nginx => "nginx",
            ParserFormat::Syslog => "syslog",
        }
    }

    pub fn registered_formats(&self) -> Vec<&str> {
        self.parsers.iter().map(|p| p.format_name()).collect()
    }

    /// Decodes one line.
    pub fn parse(&self, line: &str) -> Result<ParsedEntry, DecodeError> {
        if line.trim().is_empty() {
            return Err(DecodeError::Empty);
        }

        if self.format != ParserFormat::Auto {
            return match self.parsers.first() {
                Some(parser) => parser.parse(line),
                None => Err(no_match(self.format_name())),
            };
        }

        for parser in &self.parsers {
            if !worth_trying(parser.format_name(), line) {
                continue;
            }
            if let Ok(entry) = parser.parse(line) {
                return Ok(entry);
            }
        }
        Err(no_match("auto"))
    }
}

impl Default for ParserRouter {
    fn default() -> Self {
        Self::for_format(ParserFormat::Auto)
    }
}

/// Prefix checks that gate the JSON and syslog decoders in auto mode.
fn worth_trying(format_name: &str, line: &str) -> bool {
    match format_name {
        "json" => line.starts_with('{'),
        "syslog" => {
            let mut chars = line.chars();
            chars.next() == Some('<') && chars.next().is_some_and(|c| c.is_ascii_digit())
        }
        _ => true,
    }
}

fn no_match(format: &str) -> DecodeError {
    DecodeError::NoMatch {
        format: format.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logflow_core::types::LogFormat;

    const APACHE: &str =
        r#"192.168.1.7 - - [13/Feb/2026:06:47:53 +0000] "GET /index.html HTTP/1.1" 200 1043"#;
    const NGINX: &str = r#"192.168.1.7 - - [13/Feb/2026:06:47:53 +0000] "GET /index.html HTTP/1.1" 200 1043 "-" "Mozilla/5.0""#;

    #[test]
    fn auto_detects_each_format() {
        let router = ParserRouter::default();
        assert_eq!(
            router
                .parse(r#"{"timestamp":"2024-01-01T00:00:00Z"}"#)
                .unwrap()
                .format,
            LogFormat::Json
        );
        assert_eq!(
            router
                .parse("<34>Oct 11 22:14:15 host su: failed")
                .unwrap()
                .format,
            LogFormat::Syslog
        );
        assert_eq!(router.parse(NGINX).unwrap().format, LogFormat::Nginx);
        assert_eq!(router.parse(APACHE).unwrap().format, LogFormat::Apache);
    }

    #[test]
    fn auto_rejects_unknown_lines() {
        let router = ParserRouter::default();
        assert_eq!(
            router.parse("just some text"),
            Err(DecodeError::NoMatch {
                format: "auto".to_owned()
            })
        );
    }

    #[test]
    fn auto_falls_through_when_json_lacks_timestamp() {
        let router = ParserRouter::default();
        assert!(router.parse(r#"{"level":"INFO"}"#).is_err());
    }

    #[test]
    fn fixed_format_reports_specific_error() {
        let router = ParserRouter::for_format(ParserFormat::Json);
        assert_eq!(router.parse("[1]"), Err(DecodeError::NotObject));
        assert!(router.parse(APACHE).is_err());
    }

    #[test]
    fn registered_formats_follow_detection_order() {
        let router = ParserRouter::default();
        assert_eq!(
            router.registered_formats(),
            vec!["json", "syslog", "nginx", "apache"]
        );
        assert_eq!(
            ParserRouter::for_format(ParserFormat::Nginx).registered_formats(),
            vec!["nginx"]
        );
    }

    #[test]
    fn syslog_gate_requires_digit() {
        assert!(worth_trying("syslog", "<1>"));
        assert!(!worth_trying("syslog", "<a>"));
        assert!(!worth_trying("json", "[1]"));
    }
}
