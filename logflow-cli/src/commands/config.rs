//! `logflow config` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use logflow_core::config::LogflowConfig;
use logflow_pipeline::FilterEngine;

use crate::cli::{ConfigAction, ConfigArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

const SECTIONS: &[&str] = &["general", "collector", "parser", "storage", "query", "metrics"];

/// Execute the `config` command.
pub async fn execute(
    args: ConfigArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        ConfigAction::Validate => execute_validate(config_path, writer).await,
        ConfigAction::Show { section } => execute_show(config_path, section, writer).await,
    }
}

/// Loads and validates the file, then compiles every filter pattern so a
/// bad regex is reported here rather than when a daemon starts.
///
/// # Errors
///
/// Returns `CliError::Config` after rendering the report if anything failed.
async fn execute_validate(config_path: &Path, writer: &OutputWriter) -> Result<(), CliError> {
    info!(path = %config_path.display(), "validating configuration");

    let report = match LogflowConfig::load(config_path).await {
        Ok(config) => validation_report(config_path, &config),
        Err(e) => ConfigValidationReport {
            source: config_path.display().to_string(),
            valid: false,
            stages: Vec::new(),
            errors: vec![e.to_string()],
        },
    };

    writer.render(&report)?;

    if !report.valid {
        return Err(CliError::Config("configuration is invalid".to_owned()));
    }
    Ok(())
}

/// Checks the filters of a config that already passed `validate()`.
pub fn validation_report(config_path: &Path, config: &LogflowConfig) -> ConfigValidationReport {
    let mut errors = Vec::new();
    let mut stages = Vec::new();

    if let Some(collector) = &config.collector {
        stages.push("collector");
        if let Err(e) = FilterEngine::for_raw_lines(&collector.filters) {
            errors.push(format!("collector.filters: {e}"));
        }
    }
    if let Some(parser) = &config.parser {
        stages.push("parser");
        if let Err(e) = FilterEngine::for_entries(&parser.filters) {
            errors.push(format!("parser.filters: {e}"));
        }
    }
    if config.storage.is_some() {
        stages.push("storage");
    }
    if config.query.is_some() {
        stages.push("query");
    }

    ConfigValidationReport {
        source: config_path.display().to_string(),
        valid: errors.is_empty(),
        stages,
        errors,
    }
}

/// Shows the effective configuration (file + env overrides + defaults).
///
/// # Errors
///
/// `CliError::Command` for an unknown or unconfigured section.
async fn execute_show(
    config_path: &Path,
    section: Option<String>,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    info!(path = %config_path.display(), "loading configuration");

    let config = LogflowConfig::load(config_path).await?;
    let report = show_report(config_path, &config, section.as_deref())?;
    writer.render(&report)?;
    Ok(())
}

pub fn show_report(
    config_path: &Path,
    config: &LogflowConfig,
    section: Option<&str>,
) -> Result<ConfigReport, CliError> {
    let config_toml = match section {
        None => to_toml(config)?,
        Some("general") => to_toml(&config.general)?,
        Some("collector") => to_toml(config.collector()?)?,
        Some("parser") => to_toml(config.parser()?)?,
        Some("storage") => to_toml(config.storage()?)?,
        Some("query") => to_toml(config.query()?)?,
        Some("metrics") => to_toml(&config.metrics)?,
        Some(other) => {
            return Err(CliError::Command(format!(
                "unknown section: {} (expected: {})",
                other,
                SECTIONS.join(", ")
            )));
        }
    };

    Ok(ConfigReport {
        source: config_path.display().to_string(),
        section: section.map(str::to_owned),
        config_toml,
    })
}

fn to_toml<T: Serialize>(value: &T) -> Result<String, CliError> {
    toml::to_string_pretty(value)
        .map_err(|e| CliError::Command(format!("failed to serialize configuration: {e}")))
}

/// Configuration display report.
///
/// `config_toml` is only used for text rendering.
#[derive(Serialize)]
pub struct ConfigReport {
    pub source: String,
    /// None = full config
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(skip)]
    pub config_toml: String,
}

impl Render for ConfigReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        if let Some(ref section) = self.section {
            let section_label = format!("[{}]", section);
            writeln!(
                w,
                "Configuration {} (source: {})",
                section_label.bold(),
                self.source
            )?;
        } else {
            writeln!(w, "Configuration (source: {})", self.source.bold())?;
        }

        writeln!(w)?;
        write!(w, "{}", self.config_toml)?;
        Ok(())
    }
}

/// Configuration validation report.
#[derive(Serialize)]
pub struct ConfigValidationReport {
    pub source: String,
    pub valid: bool,
    /// Stage and query sections present in the file
    pub stages: Vec<&'static str>,
    /// Empty if valid
    pub errors: Vec<String>,
}

impl Render for ConfigValidationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Config Validation: {}", self.source.bold())?;

        if self.valid {
            writeln!(w, "  Result: {}", "VALID".green().bold())?;
        } else {
            writeln!(w, "  Result: {}", "INVALID".red().bold())?;
        }
        if !self.stages.is_empty() {
            writeln!(w, "  Sections: {}", self.stages.join(", "))?;
        }
        for err in &self.errors {
            writeln!(w, "  Error: {}", err.red())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
[general]
log_level = "info"

[collector]
source_file = "/var/log/app.log"
output_dir = "/var/lib/logflow/batches"
state_file = "/var/lib/logflow/state/collector.json"

[[collector.filters]]
pattern = "GET /healthz"
action = "exclude"

[query]
storage_dir = "/var/lib/logflow/segments"
"#;

    fn render(report: &impl Render) -> String {
        let mut buffer = Vec::new();
        report.render_text(&mut buffer).expect("render");
        String::from_utf8(buffer).expect("valid UTF-8")
    }

    #[test]
    fn test_validation_report_lists_sections() {
        let config = LogflowConfig::parse(FULL).expect("parse");
        let report = validation_report(Path::new("logflow.toml"), &config);
        assert!(report.valid);
        assert_eq!(report.stages, vec!["collector", "query"]);
        assert!(render(&report).contains("VALID"));
    }

    #[test]
    fn test_validation_report_catches_bad_filter_regex() {
        let config = LogflowConfig::parse(
            r#"
[parser]
input_dir = "/b"
output_dir = "/p"
state_file = "/s.json"

[[parser.filters]]
field = "level"
pattern = "(DEBUG"
action = "exclude"
"#,
        )
        .expect("parse");
        let report = validation_report(Path::new("bad.toml"), &config);
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].starts_with("parser.filters"));
        let text = render(&report);
        assert!(text.contains("INVALID"));
        assert!(text.contains("parser.filters"));
    }

    #[test]
    fn test_show_report_full_and_section() {
        let config = LogflowConfig::parse(FULL).expect("parse");

        let full = show_report(Path::new("logflow.toml"), &config, None).expect("full");
        assert!(full.config_toml.contains("[collector]"));
        assert!(full.config_toml.contains("[query]"));
        assert!(!full.config_toml.contains("[storage]"), "absent section not shown");

        let query = show_report(Path::new("logflow.toml"), &config, Some("query")).expect("query");
        assert!(query.config_toml.contains("default_limit = 50"));
        let text = render(&query);
        assert!(text.contains("[query]"));
        assert!(text.contains("logflow.toml"));
    }

    #[test]
    fn test_show_report_rejects_unknown_and_missing_sections() {
        let config = LogflowConfig::parse(FULL).expect("parse");

        let unknown = show_report(Path::new("logflow.toml"), &config, Some("ebpf"));
        match unknown {
            Err(CliError::Command(msg)) => assert!(msg.contains("unknown section: ebpf")),
            _ => panic!("expected unknown section error"),
        }

        let missing = show_report(Path::new("logflow.toml"), &config, Some("storage"));
        assert!(missing.is_err(), "storage is not configured");
    }

    #[test]
    fn test_config_report_json_skips_toml_body() {
        let report = ConfigReport {
            source: "logflow.toml".to_owned(),
            section: Some("parser".to_owned()),
            config_toml: "format = \"auto\"".to_owned(),
        };
        let parsed = serde_json::to_value(&report).expect("json");
        assert_eq!(parsed["section"].as_str(), Some("parser"));
        assert!(parsed.get("config_toml").is_none());
    }
}
