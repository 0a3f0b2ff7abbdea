//! Entry selection for queries.

use chrono::{DateTime, NaiveDate, Utc};
use regex::{Regex, RegexBuilder};

use logflow_core::types::ParsedEntry;

use crate::error::LogPipelineError;
use crate::storage::index::{IndexKey, entry_date, parse_date};

/// Conditions an entry must meet to be returned. All set conditions must hold.
#[derive(Debug, Clone, Default)]
pub struct QueryFilter {
    /// Inclusive lower bound on the entry timestamp
    pub since: Option<DateTime<Utc>>,
    /// Inclusive upper bound on the entry timestamp
    pub until: Option<DateTime<Utc>>,
    /// Level, compared case-insensitively
    pub level: Option<String>,
    /// Calendar date the entry timestamp starts with
    pub date: Option<NaiveDate>,
    /// Exact field values
    pub fields: Vec<(String, String)>,
    /// Case-insensitive search over the stored line
    pub pattern: Option<Regex>,
}

impl QueryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the lower bound from an RFC 3339 string.
    pub fn since(mut self, value: &str) -> Result<Self, LogPipelineError> {
        self.since = Some(parse_bound("since", value)?);
        Ok(self)
    }

    /// Sets the upper bound from an RFC 3339 string.
    pub fn until(mut self, value: &str) -> Result<Self, LogPipelineError> {
        self.until = Some(parse_bound("until", value)?);
        Ok(self)
    }

    pub fn level(mut self, level: impl Into<String>) -> Self {
        self.level = Some(level.into());
        self
    }

    /// Restricts to one `YYYY-MM-DD` day.
    pub fn date(mut self, value: &str) -> Result<Self, LogPipelineError> {
        self.date = Some(parse_date(value)?);
        Ok(self)
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn pattern(mut self, pattern: &str) -> Result<Self, LogPipelineError> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| LogPipelineError::Query(format!("invalid pattern '{pattern}': {e}")))?;
        self.pattern = Some(regex);
        Ok(self)
    }

    /// Parses a `name=value` field condition.
    pub fn field_expr(self, expr: &str) -> Result<Self, LogPipelineError> {
        match expr.split_once('=') {
            Some((name, value)) if !name.trim().is_empty() => Ok(self.field(name.trim(), value)),
            _ => Err(LogPipelineError::Query(format!(
                "invalid field condition '{expr}', expected name=value"
            ))),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.since.is_none()
            && self.until.is_none()
            && self.level.is_none()
            && self.date.is_none()
            && self.fields.is_empty()
            && self.pattern.is_none()
    }

    /// Index keys that answer this filter exactly, when level and date are
    /// its only conditions.
    pub fn index_keys(&self) -> Option<Vec<IndexKey>> {
        if self.since.is_some()
            || self.until.is_some()
            || !self.fields.is_empty()
            || self.pattern.is_some()
        {
            return None;
        }
        let mut keys = Vec::with_capacity(2);
        if let Some(level) = &self.level {
            keys.push(IndexKey::level(level)?);
        }
        if let Some(date) = self.date {
            keys.push(IndexKey::date(date));
        }
        (!keys.is_empty()).then_some(keys)
    }

    /// Cheap check on the stored line before decoding it.
    pub fn matches_line(&self, line: &str) -> bool {
        self.pattern.as_ref().is_none_or(|re| re.is_match(line))
    }

    /// Whether a decoded entry satisfies the structured conditions.
    pub fn matches_entry(&self, entry: &ParsedEntry) -> bool {
        if let Some(level) = &self.level {
            if !entry.level.eq_ignore_ascii_case(level) {
                return false;
            }
        }

        if let Some(date) = self.date {
            if entry_date(&entry.timestamp) != Some(date) {
                return false;
            }
        }

        if self.since.is_some() || self.until.is_some() {
            let Ok(ts) = DateTime::parse_from_rfc3339(&entry.timestamp) else {
                return false;
            };
            let ts = ts.with_timezone(&Utc);
            if self.since.is_some_and(|since| ts < since) {
                return false;
            }
            if self.until.is_some_and(|until| ts > until) {
                return false;
            }
        }

        self.fields
            .iter()
            .all(|(name, value)| entry.field(name).as_deref() == Some(value.as_str()))
    }
}

fn parse_bound(name: &str, value: &str) -> Result<DateTime<Utc>, LogPipelineError> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| LogPipelineError::Query(format!("invalid {name} timestamp '{value}': {e}")))
}
