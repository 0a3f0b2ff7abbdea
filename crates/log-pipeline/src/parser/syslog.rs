//! RFC 3164 (BSD) syslog parser.
//!
//! ```text
//! <34>Oct 11 22:14:15 mymachine su[230]: 'su root' failed for lonvick
//! ```
//!
//! PRI decodes into facility (`pri / 8`) and severity (`pri % 8`); severity
//! maps to a level (0-3 `ERROR`, 4 `WARNING`, 5-6 `INFO`, 7 `DEBUG`). The
//! timestamp carries no year and is kept as written.

use serde_json::Value;

use logflow_core::error::DecodeError;
use logflow_core::pipeline::LogParser;
use logflow_core::types::{LogFormat, ParsedEntry};

use super::scan::Scanner;

/// Largest valid PRI: facility 23 * 8 + severity 7.
const MAX_SYSLOG_PRI: u32 = 191;

/// BSD syslog parser.
#[derive(Debug, Clone, Default)]
pub struct SyslogParser;

impl SyslogParser {
    pub fn new() -> Self {
        Self
    }

    fn parse_line(line: &str) -> Option<ParsedEntry> {
        let mut s = Scanner::new(line);

        s.expect('<')?;
        let pri: u32 = s.digits(1, 3)?.parse().ok()?;
        if pri > MAX_SYSLOG_PRI {
            return None;
        }
        s.expect('>')?;

        // "Mmm dd hh:mm:ss" with flexible spacing before the day
        let ts_start = s.rest();
        let month = s.take_while(|c| c.is_alphanumeric() || c == '_')?;
        if month.chars().count() != 3 {
            return None;
        }
        s.whitespace()?;
        s.digits(1, 2)?;
        s.whitespace()?;
        s.digits(2, 2)?;
        s.expect(':')?;
        s.digits(2, 2)?;
        s.expect(':')?;
        s.digits(2, 2)?;
        let timestamp = &ts_start[..ts_start.len() - s.rest().len()];
        s.expect(' ')?;

        let hostname = s.token()?;
        s.expect(' ')?;

        let tag = s.take_while(|c| c.is_alphanumeric() || matches!(c, '_' | '/' | '.' | '-'))?;
        let pid = if s.expect('[').is_some() {
            let pid = s.digits(1, 20)?;
            s.expect(']')?;
            Some(pid)
        } else {
            None
        };
        s.expect(':')?;
        s.expect(' ')?;
        let message = s.rest();

        let mut entry = ParsedEntry::new(timestamp, line, LogFormat::Syslog);
        entry.level = level_from_severity(pri % 8).to_owned();
        entry.message = Some(message.to_owned());
        entry.insert_field("hostname", hostname);
        entry.insert_field("tag", tag);
        if let Some(pid) = pid {
            entry.insert_field("pid", pid);
        }
        entry.insert_field("facility", Value::from(pri / 8));
        Some(entry)
    }
}

impl LogParser for SyslogParser {
    fn format_name(&self) -> &str {
        "syslog"
    }

    fn parse(&self, line: &str) -> Result<ParsedEntry, DecodeError> {
        if line.trim().is_empty() {
            return Err(DecodeError::Empty);
        }
        Self::parse_line(line).ok_or_else(|| DecodeError::NoMatch {
            format: "syslog".to_owned(),
        })
    }
}

fn level_from_severity(severity: u32) -> &'static str {
    match severity {
        0..=3 => "ERROR",
        4 => "WARNING",
        5 | 6 => "INFO",
        _ => "DEBUG",
    }
}
