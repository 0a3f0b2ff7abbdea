//! Ordered include/exclude filtering.
//!
//! Rules are tried in declaration order and the first rule whose pattern
//! matches its subject decides: `include` keeps, `exclude` drops. When no rule
//! matches the item is kept, so an empty rule list keeps everything.
//!
//! The collector filters raw lines, where every rule sees the whole line. The
//! parser filters entries, where each rule sees one named field coerced to a
//! string (a missing field is the empty string).
//!
//! ```
//! use logflow_core::config::{EntryFilterConfig, FilterAction};
//! use logflow_core::types::{LogFormat, ParsedEntry};
//! use logflow_pipeline::filter::FilterEngine;
//!
//! let engine = FilterEngine::for_entries(&[EntryFilterConfig {
//!     field: "level".to_owned(),
//!     pattern: "DEBUG".to_owned(),
//!     action: FilterAction::Exclude,
//! }])?;
//!
//! let mut entry = ParsedEntry::new("2024-01-01T00:00:00Z", "raw", LogFormat::Json);
//! entry.level = "DEBUG".to_owned();
//! assert!(!engine.keep_entry(&entry));
//! # Ok::<(), logflow_pipeline::LogPipelineError>(())
//! ```

pub mod rule;

pub use rule::FilterRule;

use std::borrow::Cow;

use logflow_core::config::{EntryFilterConfig, FilterAction, RawFilterConfig};
use logflow_core::types::ParsedEntry;

use crate::error::LogPipelineError;

/// Evaluates `rules` against one subject string.
pub fn evaluate(rules: &[FilterRule], subject: &str) -> bool {
    decide(rules, |_| Cow::Borrowed(subject))
}

/// First-match decision where each rule chooses its own subject.
fn decide<'a, F>(rules: &[FilterRule], mut subject_for: F) -> bool
where
    F: FnMut(&FilterRule) -> Cow<'a, str>,
{
    for rule in rules {
        if rule.is_match(&subject_for(rule)) {
            return rule.action() == FilterAction::Include;
        }
    }
    true
}

/// Compiled rule list for one stage.
#[derive(Debug, Clone, Default)]
pub struct FilterEngine {
    rules: Vec<FilterRule>,
}

impl FilterEngine {
    /// Compiles collector rules. An invalid pattern is a config error.
    pub fn for_raw_lines(configs: &[RawFilterConfig]) -> Result<Self, LogPipelineError> {
        let rules = configs
            .iter()
            .enumerate()
            .map(|(idx, cfg)| {
                FilterRule::new(None, &cfg.pattern, cfg.action)
                    .map_err(|e| invalid_pattern("collector", idx, e))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    /// Compiles parser rules. An invalid pattern is a config error.
    pub fn for_entries(configs: &[EntryFilterConfig]) -> Result<Self, LogPipelineError> {
        let rules = configs
            .iter()
            .enumerate()
            .map(|(idx, cfg)| {
                FilterRule::new(Some(cfg.field.clone()), &cfg.pattern, cfg.action)
                    .map_err(|e| invalid_pattern("parser", idx, e))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[FilterRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Decides whether a raw line is kept.
    pub fn keep_line(&self, line: &str) -> bool {
        evaluate(&self.rules, line)
    }

    /// Decides whether an entry is kept.
    ///
    /// Rules without a field match against the raw line.
    pub fn keep_entry(&self, entry: &ParsedEntry) -> bool {
        decide(&self.rules, |rule| match rule.field() {
            Some(field) => Cow::Owned(entry.field(field).unwrap_or_default()),
            None => Cow::Borrowed(entry.raw.as_str()),
        })
    }
}

fn invalid_pattern(stage: &str, idx: usize, err: regex::Error) -> LogPipelineError {
    LogPipelineError::Config {
        field: format!("{stage}.filters[{idx}].pattern"),
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logflow_core::types::LogFormat;
    use proptest::prelude::*;

    fn entry_with_level(level: &str) -> ParsedEntry {
        let mut entry = ParsedEntry::new("2024-01-01T00:00:00Z", "line", LogFormat::Json);
        entry.level = level.to_owned();
        entry
    }

    fn raw(pattern: &str, action: FilterAction) -> RawFilterConfig {
        RawFilterConfig {
            pattern: pattern.to_owned(),
            action,
        }
    }

    #[test]
    fn empty_rules_keep_everything() {
        let engine = FilterEngine::default();
        assert!(engine.keep_line("anything"));
        assert!(engine.keep_entry(&entry_with_level("DEBUG")));
    }

    #[test]
    fn exclude_debug_level_entries() {
        let engine = FilterEngine::for_entries(&[EntryFilterConfig {
            field: "level".to_owned(),
            pattern: "DEBUG".to_owned(),
            action: FilterAction::Exclude,
        }])
        .unwrap();

        let kept: Vec<bool> = ["INFO", "ERROR", "DEBUG", "WARNING"]
            .iter()
            .map(|level| engine.keep_entry(&entry_with_level(level)))
            .collect();
        assert_eq!(kept, vec![true, true, false, true]);
    }

    #[test]
    fn first_matching_rule_wins() {
        let engine = FilterEngine::for_raw_lines(&[
            raw("/healthz", FilterAction::Include),
            raw("GET", FilterAction::Exclude),
        ])
        .unwrap();
        assert!(engine.keep_line("GET /healthz 200"));
        assert!(!engine.keep_line("GET /index.html 200"));
        assert!(engine.keep_line("POST /login 302"));
    }

    #[test]
    fn pattern_is_a_search_not_anchored() {
        let rules = vec![FilterRule::new(None, "ERR", FilterAction::Exclude).unwrap()];
        assert!(!evaluate(&rules, "2024 [ERROR] boom"));
    }

    #[test]
    fn include_only_rule_keeps_non_matching_lines() {
        let engine =
            FilterEngine::for_raw_lines(&[raw("important", FilterAction::Include)]).unwrap();
        assert!(engine.keep_line("important line"));
        assert!(engine.keep_line("ordinary line"));
    }

    #[test]
    fn missing_field_is_matched_as_empty_string() {
        let engine = FilterEngine::for_entries(&[EntryFilterConfig {
            field: "user_id".to_owned(),
            pattern: "^$".to_owned(),
            action: FilterAction::Exclude,
        }])
        .unwrap();
        assert!(!engine.keep_entry(&entry_with_level("INFO")));

        let mut with_user = entry_with_level("INFO");
        with_user.user_id = Some("u-1".to_owned());
        assert!(engine.keep_entry(&with_user));
    }

    #[test]
    fn numeric_extra_field_is_coerced() {
        let engine = FilterEngine::for_entries(&[EntryFilterConfig {
            field: "status_code".to_owned(),
            pattern: "^5".to_owned(),
            action: FilterAction::Exclude,
        }])
        .unwrap();
        let mut entry = entry_with_level("ERROR");
        entry.insert_field("status_code", 502);
        assert!(!engine.keep_entry(&entry));
    }

    #[test]
    fn invalid_regex_is_config_error() {
        let err = FilterEngine::for_raw_lines(&[raw("(unclosed", FilterAction::Exclude)])
            .unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("collector.filters[0].pattern"));
    }

    proptest! {
        #[test]
        fn no_match_means_keep(subject in "[a-z ]{0,40}") {
            // patterns over digits never match a lowercase/space subject
            let rules = vec![
                FilterRule::new(None, "[0-9]+", FilterAction::Exclude).unwrap(),
                FilterRule::new(None, "^[0-9]", FilterAction::Include).unwrap(),
            ];
            prop_assert!(evaluate(&rules, &subject));
        }

        #[test]
        fn first_match_decides(subject in "[a-z]{1,20}", include_first in any::<bool>()) {
            let (first, second) = if include_first {
                (FilterAction::Include, FilterAction::Exclude)
            } else {
                (FilterAction::Exclude, FilterAction::Include)
            };
            let rules = vec![
                FilterRule::new(None, ".", first).unwrap(),
                FilterRule::new(None, ".", second).unwrap(),
            ];
            prop_assert_eq!(evaluate(&rules, &subject), include_first);
        }
    }
}
