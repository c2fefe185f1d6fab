//! Runtime configuration assembled from command-line options.

pub mod duration;

use crate::{ClusterOpts, RunOpts};
use std::path::PathBuf;
use std::time::Duration;
use sweep_core::RetryPolicy;
use sweep_runner::{
    DepletionOptions, DriverOptions, FacadeContext, LocalProcessFacade, MetricWindow,
};

/// Everything `perf-sweep run` needs besides the test specification itself.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    pub spec_path: PathBuf,
    pub test_id: u32,
    pub facade: FacadeConfig,
    pub metrics_endpoint: String,
    pub output: Option<PathBuf>,
    pub driver: DriverOptions,
}

#[derive(Debug, Clone)]
pub struct FacadeConfig {
    pub context: FacadeContext,
    pub program: PathBuf,
    pub leading_args: Vec<String>,
    pub barrier_interval: Duration,
}

impl FacadeConfig {
    pub fn from_opts(opts: &ClusterOpts) -> Self {
        Self {
            context: FacadeContext {
                region: opts.region.clone(),
                cluster_id: opts.cluster_id.clone(),
            },
            program: opts.worker_program.clone(),
            leading_args: opts.worker_args.clone(),
            barrier_interval: opts.barrier_interval,
        }
    }

    pub fn build(&self) -> LocalProcessFacade {
        LocalProcessFacade::new(&self.program, self.context.clone())
            .with_leading_args(self.leading_args.clone())
            .with_barrier_interval(self.barrier_interval)
    }
}

impl SweepConfig {
    pub fn from_opts(opts: &RunOpts) -> Self {
        let retry = RetryPolicy::default()
            .with_max_attempts(opts.retry_attempts)
            .with_initial_backoff(opts.retry_initial_backoff);

        let driver = DriverOptions {
            job_poll_interval: opts.job_poll_interval,
            depletion: DepletionOptions {
                poll_interval: opts.poll_interval,
                window: MetricWindow {
                    lookback: opts.metric_window,
                    period: opts.metric_window,
                },
                retry: retry.clone(),
            },
            collect_retry: retry,
            delete_topics_after_run: !opts.keep_topics,
        };

        Self {
            spec_path: opts.spec.clone(),
            test_id: opts.test_id.unwrap_or_else(|| rand::random_range(1..=99_999)),
            facade: FacadeConfig::from_opts(&opts.cluster),
            metrics_endpoint: opts.metrics_endpoint.clone(),
            output: opts.output.clone(),
            driver,
        }
    }
}
