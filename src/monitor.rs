//! Refresh engine: fetch, normalize, render, sleep, repeat.

use std::time::Duration;

use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use crate::config::MonitorTarget;
use crate::error::{MonitorError, Result};
use crate::normalize::{normalize_pipeline, str_at};
use crate::output::Renderer;
use crate::pipeline::{Pipeline, PipelineStatus};
use crate::providers::PipelineSource;

/// What the engine needs to know about a monitoring session.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    /// Repository in `workspace/repo` form
    pub repo: String,
    pub target: MonitorTarget,
    /// Time between cycles; zero renders a single snapshot
    pub interval: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// No refresh interval was configured
    SingleShot,
    /// The pipeline reached a terminal status
    Terminal(PipelineStatus),
    /// The user asked to stop while waiting for the next cycle
    Cancelled,
}

/// Summary of a finished monitoring session.
#[derive(Debug, Clone)]
pub struct MonitorReport {
    /// Cycles attempted, including failed refreshes
    pub cycles: usize,
    pub last_snapshot: Pipeline,
    pub stop_reason: StopReason,
}

pub struct RefreshEngine<S, R> {
    source: S,
    renderer: R,
    settings: MonitorSettings,
}

impl<S: PipelineSource, R: Renderer> RefreshEngine<S, R> {
    pub fn new(source: S, renderer: R, settings: MonitorSettings) -> Self {
        Self {
            source,
            renderer,
            settings,
        }
    }

    /// Runs the monitoring loop until the pipeline finishes, the token is
    /// cancelled, or (in single-shot mode) the first snapshot is rendered.
    ///
    /// A "latest on branch" target is resolved once; later cycles refetch the
    /// same pipeline by id.
    ///
    /// # Errors
    ///
    /// Any failure before the first snapshot is returned. Afterwards only
    /// non-retryable errors (see [`MonitorError::is_retryable`]) end the loop.
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<MonitorReport> {
        let mut cycles = 1;
        self.renderer.cycle_started(cycles);

        let (pipeline_id, first) = match self.first_cycle().await {
            Ok(resolved) => resolved,
            Err(e) => {
                self.renderer.cycle_failed(cycles, &e);
                return Err(e);
            }
        };
        info!("Monitoring pipeline {pipeline_id} ({})", first.status);
        self.renderer.render(&first)?;

        if self.settings.interval.is_zero() {
            return Ok(MonitorReport {
                cycles,
                last_snapshot: first,
                stop_reason: StopReason::SingleShot,
            });
        }

        let mut current = first;

        loop {
            if current.is_terminal() {
                info!("Pipeline {pipeline_id} finished with status {}", current.status);
                return Ok(MonitorReport {
                    cycles,
                    stop_reason: StopReason::Terminal(current.status.clone()),
                    last_snapshot: current,
                });
            }

            debug!("Next refresh in {:?}", self.settings.interval);
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("Monitoring of pipeline {pipeline_id} cancelled");
                    return Ok(MonitorReport {
                        cycles,
                        last_snapshot: current,
                        stop_reason: StopReason::Cancelled,
                    });
                }
                () = tokio::time::sleep(self.settings.interval) => {}
            }

            cycles += 1;
            self.renderer.cycle_started(cycles);

            match self.refresh(&pipeline_id).await {
                Ok(snapshot) => {
                    self.renderer.render(&snapshot)?;
                    current = snapshot;
                }
                Err(e) if e.is_retryable() => {
                    warn!("Refresh cycle {cycles} for pipeline {pipeline_id} failed: {e}");
                    self.renderer.cycle_failed(cycles, &e);
                }
                Err(e) => {
                    self.renderer.cycle_failed(cycles, &e);
                    return Err(e);
                }
            }
        }
    }

    async fn first_cycle(&self) -> Result<(String, Pipeline)> {
        let repo = &self.settings.repo;

        let (pipeline_id, raw) = match &self.settings.target {
            MonitorTarget::Pipeline(id) => {
                let raw = self.source.fetch_pipeline(repo, id).await?;
                (id.clone(), raw)
            }
            MonitorTarget::LatestOnBranch(branch) => {
                let raw = self.source.fetch_latest_pipeline(repo, Some(branch)).await?;
                let id = str_at(&raw, &["uuid"])
                    .filter(|id| !id.is_empty())
                    .ok_or_else(|| {
                        MonitorError::normalization("uuid", "latest pipeline has no identifier")
                    })?
                    .to_string();
                debug!("Branch {branch} resolved to pipeline {id}");
                (id, raw)
            }
        };

        let snapshot = self.snapshot(&pipeline_id, &raw).await?;
        Ok((pipeline_id, snapshot))
    }

    async fn refresh(&self, pipeline_id: &str) -> Result<Pipeline> {
        let raw = self
            .source
            .fetch_pipeline(&self.settings.repo, pipeline_id)
            .await?;
        self.snapshot(pipeline_id, &raw).await
    }

    async fn snapshot(&self, pipeline_id: &str, raw: &serde_json::Value) -> Result<Pipeline> {
        let repo = &self.settings.repo;
        let steps = self.source.fetch_steps(repo, pipeline_id).await?;
        let variables = self.source.fetch_variables(repo, pipeline_id).await?;
        normalize_pipeline(raw, &steps, &variables)
    }
}
