//! `logflow query` command handler

use std::path::Path;

use tracing::{info, warn};

use logflow_core::config::{LogflowConfig, QueryConfig};
use logflow_pipeline::{QueryEngine, QueryFilter, QueryRequest, ResponseFormat};

use crate::cli::{OutputFormat, QueryArgs};
use crate::error::CliError;
use crate::output::OutputWriter;

/// Limit used when neither `--limit` nor a `[query]` section sets one.
pub const DEFAULT_LIMIT: usize = 50;

/// Execute the `query` command.
///
/// The engine renders the body itself, so the global `--output` flag selects
/// the response format rather than going through [`crate::output::Render`].
pub async fn execute(
    args: QueryArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let query_config = resolve_query_config(&args, config_path).await?;
    let filter = build_filter(&args)?;
    let engine = QueryEngine::new(&query_config);

    info!(
        storage_dir = %engine.storage_dir().display(),
        limit = args.limit.unwrap_or(engine.default_limit()),
        "querying stored segments"
    );

    let request = QueryRequest {
        format: response_format(writer.format()),
        filter,
        limit: args.limit,
    };
    let response = engine.execute(&request).await?;
    if response.skipped > 0 {
        warn!(
            skipped = response.skipped,
            "some stored lines could not be decoded and were skipped"
        );
    }

    writer.write_body(&response.body)?;
    Ok(())
}

/// `--storage-dir` wins and makes the config file optional. Otherwise the
/// `[query]` section is used, falling back to `[storage] storage_dir`.
pub async fn resolve_query_config(
    args: &QueryArgs,
    config_path: &Path,
) -> Result<QueryConfig, CliError> {
    if let Some(dir) = &args.storage_dir {
        return Ok(QueryConfig {
            storage_dir: dir.clone(),
            default_limit: DEFAULT_LIMIT,
        });
    }

    let config = LogflowConfig::load(config_path).await?;
    if let Some(query) = config.query {
        return Ok(query);
    }
    if let Some(storage) = config.storage {
        return Ok(QueryConfig {
            storage_dir: storage.storage_dir,
            default_limit: DEFAULT_LIMIT,
        });
    }
    Err(CliError::Config(format!(
        "{} has no [query] or [storage] section; pass --storage-dir",
        config_path.display()
    )))
}

pub fn build_filter(args: &QueryArgs) -> Result<QueryFilter, CliError> {
    let mut filter = QueryFilter::new();
    if let Some(since) = &args.since {
        filter = filter.since(since)?;
    }
    if let Some(until) = &args.until {
        filter = filter.until(until)?;
    }
    if let Some(level) = &args.level {
        filter = filter.level(level.as_str());
    }
    if let Some(date) = &args.date {
        filter = filter.date(date)?;
    }
    for expr in &args.fields {
        filter = filter.field_expr(expr)?;
    }
    if let Some(pattern) = &args.pattern {
        filter = filter.pattern(pattern)?;
    }
    Ok(filter)
}

fn response_format(output: OutputFormat) -> ResponseFormat {
    match output {
        OutputFormat::Text => ResponseFormat::Text,
        OutputFormat::Json => ResponseFormat::Json,
    }
}
