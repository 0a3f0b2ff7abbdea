//! Combined Log Format parsers (Apache and Nginx).
//!
//! ```text
//! host ident user [10/Oct/2023:13:55:36 +0000] "GET /a HTTP/1.1" 200 2326
//! host - user [10/Oct/2023:13:55:36 +0000] "GET /a HTTP/1.1" 200 2326 "referer" "agent"
//! ```
//!
//! The Nginx variant requires the literal `-` ident and the two trailing
//! quoted fields; the Apache variant ends after the size. A `-` status or size
//! is recorded as 0. The bracketed time is converted to RFC 3339 when it
//! parses and kept verbatim otherwise. Level follows the status code:
//! below 400 `INFO`, below 500 `WARNING`, otherwise `ERROR`.

use chrono::DateTime;
use serde_json::Value;

use logflow_core::error::DecodeError;
use logflow_core::pipeline::LogParser;
use logflow_core::types::{LogFormat, ParsedEntry};

use super::scan::Scanner;

const CLF_TIME_FORMAT: &str = "%d/%b/%Y:%H:%M:%S %z";

/// Which dialect of the combined format to accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClfVariant {
    Apache,
    Nginx,
}

/// Apache/Nginx access log parser.
#[derive(Debug, Clone)]
pub struct ClfParser {
    variant: ClfVariant,
}

impl ClfParser {
    pub fn apache() -> Self {
        Self {
            variant: ClfVariant::Apache,
        }
    }

    pub fn nginx() -> Self {
        Self {
            variant: ClfVariant::Nginx,
        }
    }

    pub fn variant(&self) -> ClfVariant {
        self.variant
    }

    fn no_match(&self) -> DecodeError {
        DecodeError::NoMatch {
            format: self.format_name().to_owned(),
        }
    }

    fn parse_line(&self, line: &str) -> Option<ParsedEntry> {
        let mut s = Scanner::new(line);

        let host = s.token()?;
        s.expect(' ')?;
        let ident = s.token()?;
        if self.variant == ClfVariant::Nginx && ident != "-" {
            return None;
        }
        s.expect(' ')?;
        s.token()?; // user
        s.expect(' ')?;

        s.expect('[')?;
        let time = s.until(']')?;
        if time.is_empty() {
            return None;
        }
        s.expect(' ')?;

        s.expect('"')?;
        let request = s.until('"')?;
        s.expect(' ')?;

        let status = numeric_or_dash(&mut s, 3, 3)?;
        s.expect(' ')?;
        let size = numeric_or_dash(&mut s, 1, 20)?;

        let trailer = match self.variant {
            ClfVariant::Apache => None,
            ClfVariant::Nginx => {
                s.expect(' ')?;
                s.expect('"')?;
                let referer = s.until('"')?;
                s.expect(' ')?;
                s.expect('"')?;
                let user_agent = s.until('"')?;
                Some((referer, user_agent))
            }
        };
        if !s.is_empty() {
            return None;
        }

        let mut parts = request.splitn(3, ' ');
        let method = parts.next().unwrap_or_default();
        let path = parts.next().unwrap_or_default();
        let protocol = parts.next().unwrap_or_default();

        let timestamp = DateTime::parse_from_str(time, CLF_TIME_FORMAT)
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_else(|_| time.to_owned());

        let format = match self.variant {
            ClfVariant::Apache => LogFormat::Apache,
            ClfVariant::Nginx => LogFormat::Nginx,
        };

        let mut entry = ParsedEntry::new(timestamp, line, format);
        entry.level = level_from_status(status).to_owned();
        entry.insert_field("remote_host", host);
        entry.insert_field("method", method);
        entry.insert_field("path", path);
        entry.insert_field("protocol", protocol);
        entry.insert_field("status_code", Value::from(status));
        entry.insert_field("body_bytes", Value::from(size));
        if let Some((referer, user_agent)) = trailer {
            entry.insert_field("referer", referer);
            entry.insert_field("user_agent", user_agent);
        }
        Some(entry)
    }
}

impl LogParser for ClfParser {
    fn format_name(&self) -> &str {
        match self.variant {
            ClfVariant::Apache => "apache",
            ClfVariant::Nginx => "nginx",
        }
    }

    fn parse(&self, line: &str) -> Result<ParsedEntry, DecodeError> {
        if line.trim().is_empty() {
            return Err(DecodeError::Empty);
        }
        self.parse_line(line).ok_or_else(|| self.no_match())
    }
}

/// Digits within the given length bounds, or `-` meaning 0.
fn numeric_or_dash(s: &mut Scanner<'_>, min: usize, max: usize) -> Option<u64> {
    if s.expect('-').is_some() {
        return Some(0);
    }
    s.digits(min, max)?.parse().ok()
}

/// HTTP status to level.
pub fn level_from_status(status: u64) -> &'static str {
    if status < 400 {
        "INFO"
    } else if status < 500 {
        "WARNING"
    } else {
        "ERROR"
    }
}
