//! A single compiled filter rule.

use regex::Regex;

use logflow_core::config::FilterAction;

/// Pattern compiled once at stage start-up.
#[derive(Debug, Clone)]
pub struct FilterRule {
    field: Option<String>,
    pattern: Regex,
    action: FilterAction,
}

impl FilterRule {
    pub fn new(
        field: Option<String>,
        pattern: &str,
        action: FilterAction,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            field,
            pattern: Regex::new(pattern)?,
            action,
        })
    }

    /// Field the rule inspects; `None` for raw-line rules.
    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    pub fn action(&self) -> FilterAction {
        self.action
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// Unanchored search.
    pub fn is_match(&self, subject: &str) -> bool {
        self.pattern.is_match(subject)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_source_pattern() {
        let rule = FilterRule::new(Some("level".to_owned()), "^WARN", FilterAction::Include)
            .unwrap();
        assert_eq!(rule.pattern(), "^WARN");
        assert_eq!(rule.field(), Some("level"));
        assert!(rule.is_match("WARNING"));
        assert!(!rule.is_match("a WARNING"));
    }
}
