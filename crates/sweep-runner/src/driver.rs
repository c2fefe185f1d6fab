//! Sequential sweep driver.
//!
//! Points run strictly one after another. Each point creates its topics,
//! optionally drains burst credits, runs the performance test, and feeds the
//! parsed result to the stop condition, which decides whether the iterator
//! advances normally or skips the rest of the current phase.
//!
//! Any error escaping a point is fatal to the whole sweep. Before it is
//! returned, every topic carrying the sweep's test prefix is deleted on a
//! best-effort basis.

use crate::collect::collect_results;
use crate::depletion::{deplete_credits, DepletionOptions};
use crate::facade::{forget_job, wait_for_job, JobFacade};
use crate::metrics::MetricSource;
use crate::sink::ResultSink;
use crate::summary::{SkipRecord, SweepSummary};
use anyhow::{Context, Result};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use sweep_core::{
    derive_run_parameters, evaluate, test_prefix, Decision, FacadeCommand, RetryPolicy,
    RunParameters, RunResult, Step, SweepIterator, TestSpecification,
};
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct DriverOptions {
    /// Wait between liveness polls of a performance-test job
    pub job_poll_interval: Duration,
    pub depletion: DepletionOptions,
    /// Applied when worker output is still incomplete
    pub collect_retry: RetryPolicy,
    /// Delete a point's topics once its result is collected
    pub delete_topics_after_run: bool,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            job_poll_interval: Duration::from_secs(10),
            depletion: DepletionOptions::default(),
            collect_retry: RetryPolicy::default(),
            delete_topics_after_run: true,
        }
    }
}

pub struct SweepDriver {
    facade: Arc<dyn JobFacade>,
    metrics: Arc<dyn MetricSource>,
    options: DriverOptions,
    test_id: u32,
}

impl SweepDriver {
    pub fn new(facade: Arc<dyn JobFacade>, metrics: Arc<dyn MetricSource>, test_id: u32) -> Self {
        Self {
            facade,
            metrics,
            options: DriverOptions::default(),
            test_id,
        }
    }

    pub fn with_options(mut self, options: DriverOptions) -> Self {
        self.options = options;
        self
    }

    pub fn test_id(&self) -> u32 {
        self.test_id
    }

    /// Run every point of `spec`, writing each result to `sink` as it finishes.
    pub async fn run(
        &self,
        spec: &TestSpecification,
        sink: &mut dyn ResultSink,
    ) -> Result<SweepSummary> {
        let sweep = SweepIterator::from_spec(spec)?;
        info!(
            "Starting test {}: {} combinations over {} axes, skip axis '{}'",
            self.test_id,
            sweep.total_combinations(),
            sweep.radices().len(),
            spec.skip_axis_name()
        );

        match self.run_points(spec, &sweep, sink).await {
            Ok(summary) => {
                info!(
                    "Test {} complete: {} points run, {} elided",
                    self.test_id, summary.points_run, summary.points_elided
                );
                Ok(summary)
            }
            Err(e) => {
                error!("Test {} aborted: {:#}", self.test_id, e);
                self.cleanup().await;
                Err(e)
            }
        }
    }

    async fn cleanup(&self) {
        let prefix = test_prefix(self.test_id);
        info!("Deleting topics with prefix {}", prefix);
        if let Err(e) = self.facade.delete_test_topics(&prefix).await {
            error!("Cleanup of topics with prefix {} failed: {:#}", prefix, e);
        }
    }

    async fn run_points(
        &self,
        spec: &TestSpecification,
        sweep: &SweepIterator,
        sink: &mut dyn ResultSink,
    ) -> Result<SweepSummary> {
        let skip_axis = spec.skip_axis();
        let total = sweep.total_combinations();
        let mut summary = SweepSummary::new(self.test_id, total);
        let mut state = sweep.start();
        let mut last_series = None;

        loop {
            let flat_index = sweep.flat_index(&state);
            let series_index = sweep.series_index(&state, skip_axis);
            let combination = spec.decode(&state)?;
            let params = derive_run_parameters(&combination, flat_index, series_index, self.test_id)?;

            info!(
                "Point {}/{} (phase {}): {}",
                flat_index + 1,
                total,
                series_index,
                combination
            );
            info!(
                "  {} MB/s requested, {} workers, {} records/sec per producer",
                params.cluster_throughput_mb_per_sec, params.num_jobs, params.records_per_sec
            );

            let new_series = last_series != Some(series_index);
            last_series = Some(series_index);

            let mut result = self
                .run_point(spec, &params, combination.to_json(), new_series, &mut summary)
                .await
                .with_context(|| format!("Point {flat_index} ({combination}) failed"))?;

            let step = match evaluate(spec.stop_condition(), &result) {
                Decision::Advance => sweep.advance(state),
                Decision::SkipAxis => {
                    let elided = sweep.elided_by_skip(&state, skip_axis);
                    let ratio = result.sent_div_requested_mb_per_sec();
                    info!(
                        "Skipping {} remaining points along '{}' after point {} (ratio {:.4})",
                        elided,
                        spec.skip_axis_name(),
                        flat_index,
                        ratio
                    );
                    result.skipped_remaining = true;
                    summary.record_skip(SkipRecord {
                        flat_index,
                        series_index,
                        ratio,
                        elided,
                    });
                    sweep.skip_and_advance(state, skip_axis)?
                }
            };

            sink.write(&result)?;
            summary.record(result);

            match step {
                Step::Next(next) => state = next,
                Step::Done => break,
            }
        }

        sink.flush()?;
        summary.complete();
        Ok(summary)
    }

    async fn run_point(
        &self,
        spec: &TestSpecification,
        params: &RunParameters,
        combination: Value,
        new_series: bool,
        summary: &mut SweepSummary,
    ) -> Result<RunResult> {
        self.facade
            .run_command(FacadeCommand::CreateTopics, params)
            .await
            .with_context(|| format!("Failed to create topic {}", params.topic_name))?;

        if let Some(config) = spec.depletion() {
            if new_series || config.every_run {
                let report = deplete_credits(
                    self.facade.as_ref(),
                    self.metrics.as_ref(),
                    params,
                    config,
                    &self.options.depletion,
                )
                .await?;
                summary.depletions += 1;
                info!(
                    "Credits depleted after {} polls (peak {:.1} MB/s)",
                    report.polls, report.peak_mb_per_sec
                );
            }
        }

        let job = self
            .facade
            .submit(FacadeCommand::RunPerformanceTest, params)
            .await
            .context("Failed to submit performance test")?;
        let status = wait_for_job(self.facade.as_ref(), &job, self.options.job_poll_interval)
            .await
            .with_context(|| format!("Failed to wait for job {job}"))?;
        if status.failed > 0 {
            warn!(
                "{} of {} workers of job {} failed",
                status.failed, status.total, job
            );
        }

        let workers = collect_results(
            self.facade.as_ref(),
            &job,
            params.num_jobs,
            &self.options.collect_retry,
        )
        .await;
        forget_job(self.facade.as_ref(), &job).await;
        let workers = workers?;
        let result = RunResult::from_workers(params, combination, &workers);
        info!(
            "  sent {:.2} of {:.1} MB/s, avg latency {:.1} ms, max latency {:.1} ms",
            result.sent_mb_per_sec,
            result.requested_mb_per_sec,
            result.avg_latency_ms,
            result.max_latency_ms
        );

        if self.options.delete_topics_after_run {
            if let Err(e) = self
                .facade
                .run_command(FacadeCommand::DeleteTopics, params)
                .await
            {
                warn!("Failed to delete topic {}: {:#}", params.topic_name, e);
            }
        }

        Ok(result)
    }
}
