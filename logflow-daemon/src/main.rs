use anyhow::Result;
use clap::Parser;

use logflow_core::config::LogflowConfig;
use logflow_daemon::cli::DaemonCli;
use logflow_daemon::logging::init_tracing;
use logflow_daemon::orchestrator::{Orchestrator, check_stage_config};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    let mut config = LogflowConfig::load(&cli.config)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load config {}: {}", cli.config.display(), e))?;
    if let Some(level) = cli.log_level {
        config.general.log_level = level;
    }
    if let Some(format) = cli.log_format {
        config.general.log_format = format;
    }

    if cli.validate {
        check_stage_config(&config, cli.stage)?;
        println!(
            "configuration OK: {} ({} stage)",
            cli.config.display(),
            cli.stage
        );
        return Ok(());
    }

    init_tracing(&config.general)?;
    tracing::info!(
        stage = %cli.stage,
        config = %cli.config.display(),
        version = env!("CARGO_PKG_VERSION"),
        "logflow-daemon starting"
    );

    let orchestrator = Orchestrator::build_from_config(config, cli.stage)?;
    let result = orchestrator.run().await;
    match &result {
        Ok(()) => tracing::info!(stage = %cli.stage, "logflow-daemon shut down"),
        Err(e) => tracing::error!(stage = %cli.stage, error = %e, "logflow-daemon failed"),
    }
    result
}
