//! `logflow status` command handler
//!
//! Reads each configured stage's state file and the directories between
//! stages. Nothing is written, so it is safe to run next to live daemons.

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use logflow_core::config::{CollectorConfig, LogflowConfig, ParserConfig, StorageConfig};
use logflow_core::state::StateFile;
use logflow_pipeline::queue::{self, BATCH_FILES, PARSED_FILES};
use logflow_pipeline::storage::list_segments;
use logflow_pipeline::{ParserCursor, RotationState, SourceCursor};

use crate::cli::StatusArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `status` command.
pub async fn execute(
    args: StatusArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let config = LogflowConfig::load(config_path).await?;
    let report = build_status_report(&config, args.verbose).await?;
    writer.render(&report)?;
    Ok(())
}

pub async fn build_status_report(
    config: &LogflowConfig,
    verbose: bool,
) -> Result<StatusReport, CliError> {
    let mut stages = Vec::new();
    if let Some(collector) = &config.collector {
        stages.push(collector_status(collector, verbose).await?);
    }
    if let Some(parser) = &config.parser {
        stages.push(parser_status(parser, verbose).await?);
    }

    let mut segments = Vec::new();
    if let Some(storage) = &config.storage {
        let (status, active) = storage_status(storage, verbose).await?;
        stages.push(status);
        if verbose {
            segments = list_segments(&storage.storage_dir, active.as_deref())
                .await?
                .into_iter()
                .map(|s| SegmentSummary {
                    name: s.name,
                    state: s.state.to_string(),
                    size_bytes: s.size_bytes,
                })
                .collect();
        }
    }

    Ok(StatusReport { stages, segments })
}

/// Loaded state, or why there is none.
enum Loaded<T> {
    Present(T),
    Missing,
    Unreadable(String),
}

async fn load_state<T>(path: &Path) -> Loaded<T>
where
    T: Serialize + DeserializeOwned,
{
    match StateFile::<T>::new(path).load().await {
        Ok(Some(state)) => Loaded::Present(state),
        Ok(None) => Loaded::Missing,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "state file unreadable");
            Loaded::Unreadable(e.to_string())
        }
    }
}

fn status_from<T>(
    stage: &'static str,
    state_file: &Path,
    loaded: Loaded<T>,
    verbose: bool,
    describe: impl FnOnce(&T) -> String,
) -> (StageStatus, Option<T>) {
    let mut status = StageStatus {
        stage,
        health: StageHealth::NotStarted,
        progress: None,
        pending_files: None,
        error: None,
        state_file: verbose.then(|| state_file.display().to_string()),
    };
    let state = match loaded {
        Loaded::Present(state) => {
            status.health = StageHealth::Ok;
            status.progress = Some(describe(&state));
            Some(state)
        }
        Loaded::Missing => None,
        Loaded::Unreadable(reason) => {
            status.health = StageHealth::Unreadable;
            status.error = Some(reason);
            None
        }
    };
    (status, state)
}

async fn collector_status(
    config: &CollectorConfig,
    verbose: bool,
) -> Result<StageStatus, CliError> {
    let loaded = load_state::<SourceCursor>(&config.state_file).await;
    let source_size = tokio::fs::metadata(&config.source_file)
        .await
        .ok()
        .map(|m| m.len());

    let (mut status, _) = status_from("collector", &config.state_file, loaded, verbose, |c| {
        match source_size {
            Some(size) => format!(
                "offset {} of {} bytes, last batch {}",
                c.byte_offset, size, c.last_sequence
            ),
            None => format!(
                "offset {} (source missing), last batch {}",
                c.byte_offset, c.last_sequence
            ),
        }
    });
    status.pending_files = Some(queue::list(&config.output_dir, BATCH_FILES).await?.len());
    Ok(status)
}

async fn parser_status(config: &ParserConfig, verbose: bool) -> Result<StageStatus, CliError> {
    let loaded = load_state::<ParserCursor>(&config.state_file).await;
    let (mut status, cursor) = status_from("parser", &config.state_file, loaded, verbose, |c| {
        match &c.last_processed {
            Some(name) => format!("last batch {name}"),
            None => "no batch processed".to_owned(),
        }
    });
    let after = cursor.and_then(|c| c.last_sequence());
    status.pending_files = Some(
        queue::list_after(&config.input_dir, BATCH_FILES, after)
            .await?
            .len(),
    );
    Ok(status)
}

async fn storage_status(
    config: &StorageConfig,
    verbose: bool,
) -> Result<(StageStatus, Option<String>), CliError> {
    let loaded = load_state::<RotationState>(&config.state_file).await;
    let (mut status, state) = status_from("storage", &config.state_file, loaded, verbose, |s| {
        format!(
            "active {} ({} bytes since {})",
            s.active_segment_name,
            s.size_bytes,
            s.start_time.to_rfc3339()
        )
    });
    let after = state
        .as_ref()
        .and_then(|s| s.last_processed_input.as_deref())
        .and_then(|name| PARSED_FILES.sequence_of(name));
    status.pending_files = Some(
        queue::list_after(&config.input_dir, PARSED_FILES, after)
            .await?
            .len(),
    );
    Ok((status, state.map(|s| s.active_segment_name)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageHealth {
    Ok,
    NotStarted,
    Unreadable,
}

impl StageHealth {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::NotStarted => "not started",
            Self::Unreadable => "unreadable",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub stages: Vec<StageStatus>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub segments: Vec<SegmentSummary>,
}

#[derive(Debug, Serialize)]
pub struct StageStatus {
    pub stage: &'static str,
    pub health: StageHealth,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<String>,
    /// Files waiting in the stage's output (collector) or input directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_files: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_file: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SegmentSummary {
    pub name: String,
    pub state: String,
    pub size_bytes: u64,
}

impl Render for StatusReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        if self.stages.is_empty() {
            writeln!(w, "No stage sections configured.")?;
            return Ok(());
        }

        writeln!(w, "{:<10} {:<12} {:<8} Progress", "Stage", "State", "Pending")?;
        writeln!(w, "{}", "-".repeat(72))?;

        for s in &self.stages {
            let health = match s.health {
                StageHealth::Ok => s.health.as_str().green(),
                StageHealth::NotStarted => s.health.as_str().yellow(),
                StageHealth::Unreadable => s.health.as_str().red().bold(),
            };
            let pending = s
                .pending_files
                .map(|n| n.to_string())
                .unwrap_or_else(|| "-".to_owned());
            writeln!(
                w,
                "{:<10} {:<12} {:<8} {}",
                s.stage,
                health,
                pending,
                s.progress.as_deref().unwrap_or("-")
            )?;
            if let Some(error) = &s.error {
                writeln!(w, "  {}", error.red())?;
            }
            if let Some(path) = &s.state_file {
                writeln!(w, "  {}", path.dimmed())?;
            }
        }

        if !self.segments.is_empty() {
            writeln!(w)?;
            writeln!(w, "{:<48} {:<11} Bytes", "Segment", "State")?;
            for seg in &self.segments {
                writeln!(w, "{:<48} {:<11} {}", seg.name, seg.state, seg.size_bytes)?;
            }
        }

        Ok(())
    }
}
