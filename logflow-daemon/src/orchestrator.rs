//! Stage assembly and lifecycle.
//!
//! The [`Orchestrator`] validates the configuration, checks that the section
//! for its stage is present, opens the stage and drives it with a
//! [`StageRunner`] until SIGTERM/SIGINT cancels the shared token. A fatal
//! stage error ends the run with an error so the process exits non-zero.

use std::fmt;
use std::path::Path;

use anyhow::Result;
use clap::ValueEnum;
use tokio_util::sync::CancellationToken;

use logflow_core::config::LogflowConfig;
use logflow_pipeline::{Collector, ParserStage, Stage, StageRunner, StorageStage};

use crate::metrics_server;

/// Stage a daemon process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StageKind {
    Collector,
    Parser,
    Storage,
}

impl StageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Collector => "collector",
            Self::Parser => "parser",
            Self::Storage => "storage",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runs one stage of the pipeline.
pub struct Orchestrator {
    config: LogflowConfig,
    stage: StageKind,
    cancel: CancellationToken,
}

impl Orchestrator {
    /// Loads `config_path` (with environment overrides) and builds.
    pub async fn build(config_path: &Path, stage: StageKind) -> Result<Self> {
        let config = LogflowConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config, stage)
    }

    /// Builds from an already-loaded configuration.
    ///
    /// Installs the metrics recorder when `[metrics]` is enabled.
    pub fn build_from_config(config: LogflowConfig, stage: StageKind) -> Result<Self> {
        check_stage_config(&config, stage)?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
        }

        tracing::info!(stage = %stage, "orchestrator initialized");
        Ok(Self {
            config,
            stage,
            cancel: CancellationToken::new(),
        })
    }

    pub fn stage(&self) -> StageKind {
        self.stage
    }

    pub fn config(&self) -> &LogflowConfig {
        &self.config
    }

    /// Token that stops the stage after its current cycle.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs until SIGTERM or SIGINT.
    pub async fn run(self) -> Result<()> {
        let cancel = self.cancel.clone();
        let signals = tokio::spawn(async move {
            match wait_for_shutdown_signal().await {
                Ok(signal) => tracing::info!(signal, "shutdown signal received"),
                Err(e) => tracing::error!(error = %e, "signal handling failed, shutting down"),
            }
            cancel.cancel();
        });

        let result = self.run_until_cancelled().await;
        signals.abort();
        result
    }

    /// Runs until the cancel token fires or the stage fails fatally.
    pub async fn run_until_cancelled(self) -> Result<()> {
        let cancel = self.cancel;
        match self.stage {
            StageKind::Collector => {
                let stage = Collector::open(self.config.collector()?).await?;
                drive(stage, cancel).await
            }
            StageKind::Parser => {
                let stage = ParserStage::open(self.config.parser()?).await?;
                drive(stage, cancel).await
            }
            StageKind::Storage => {
                let stage = StorageStage::open(self.config.storage()?).await?;
                drive(stage, cancel).await
            }
        }
    }
}

/// Validates `config` and checks that `stage` has its section.
pub fn check_stage_config(config: &LogflowConfig, stage: StageKind) -> Result<()> {
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;
    let present = match stage {
        StageKind::Collector => config.collector().map(|_| ()),
        StageKind::Parser => config.parser().map(|_| ()),
        StageKind::Storage => config.storage().map(|_| ()),
    };
    present.map_err(|e| anyhow::anyhow!("cannot run {} stage: {}", stage, e))
}

async fn drive<S: Stage>(stage: S, cancel: CancellationToken) -> Result<()> {
    let name = stage.name();
    StageRunner::new(stage, cancel)
        .run()
        .await
        .map(|_| ())
        .map_err(|e| anyhow::anyhow!("{} stage stopped on fatal error: {}", name, e))
}

/// Waits for SIGTERM or SIGINT and returns which one arrived.
#[cfg(unix)]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("failed to listen for ctrl-c: {}", e))?;
    Ok("ctrl-c")
}
