//! Cooperative poll loop shared by the collector, parser and storage stages.
//!
//! A stage runs one full cycle, then sleeps for its poll interval or until
//! cancelled. Cancellation is only observed between cycles, so a cycle always
//! finishes its writes and state update. Transient errors are logged and
//! retried on the next cycle; fatal errors end the loop.

use std::future::Future;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use logflow_core::metrics as m;

use crate::error::LogPipelineError;

/// Outcome of one poll cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Input units consumed (lines or files)
    pub consumed: u64,
    /// Output units produced (batches, entries)
    pub produced: u64,
    /// Units dropped by filters or decode failures
    pub dropped: u64,
}

impl CycleReport {
    pub fn is_idle(&self) -> bool {
        self.consumed == 0 && self.produced == 0 && self.dropped == 0
    }

    pub fn merge(&mut self, other: CycleReport) {
        self.consumed += other.consumed;
        self.produced += other.produced;
        self.dropped += other.dropped;
    }
}

/// A pipeline stage driven by [`StageRunner`].
pub trait Stage: Send {
    /// Stage name for logs and metric labels
    fn name(&self) -> &'static str;

    /// Delay between cycles
    fn poll_interval(&self) -> Duration;

    /// Runs one complete cycle.
    fn poll_once(&mut self) -> impl Future<Output = Result<CycleReport, LogPipelineError>> + Send;
}

/// Drives a [`Stage`] until cancelled or a fatal error occurs.
pub struct StageRunner<S> {
    stage: S,
    cancel: CancellationToken,
}

impl<S: Stage> StageRunner<S> {
    pub fn new(stage: S, cancel: CancellationToken) -> Self {
        Self { stage, cancel }
    }

    pub fn stage(&self) -> &S {
        &self.stage
    }

    /// Runs the loop. Returns the stage on clean shutdown.
    pub async fn run(mut self) -> Result<S, LogPipelineError> {
        let name = self.stage.name();
        let interval = self.stage.poll_interval();
        info!(
            stage = name,
            poll_interval_ms = interval.as_millis() as u64,
            "stage started"
        );

        while !self.cancel.is_cancelled() {
            let started = Instant::now();
            match self.stage.poll_once().await {
                Ok(report) => {
                    metrics::histogram!(m::STAGE_CYCLE_DURATION_SECONDS, m::LABEL_STAGE => name)
                        .record(started.elapsed().as_secs_f64());
                    if report.is_idle() {
                        debug!(stage = name, "cycle idle");
                    } else {
                        info!(
                            stage = name,
                            consumed = report.consumed,
                            produced = report.produced,
                            dropped = report.dropped,
                            "cycle complete"
                        );
                    }
                }
                Err(e) if !e.is_fatal() => {
                    metrics::counter!(m::STAGE_TRANSIENT_ERRORS_TOTAL, m::LABEL_STAGE => name)
                        .increment(1);
                    warn!(stage = name, error = %e, "cycle failed, retrying next poll");
                }
                Err(e) => {
                    error!(stage = name, error = %e, "fatal stage error, stopping");
                    return Err(e);
                }
            }

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        info!(stage = name, "stage stopped");
        Ok(self.stage)
    }
}
