//! Polling loop that drains burst credits before a measured run.

use crate::facade::{forget_job, JobFacade, JobId};
use crate::metrics::{MetricSource, MetricWindow};
use crate::retry::retry_async;
use anyhow::{Context, Result};
use std::time::Duration;
use sweep_core::{
    DepletionAction, DepletionConfiguration, DepletionController, DepletionState, FacadeCommand,
    Observation, RetryPolicy, RunParameters, SweepError,
};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct DepletionOptions {
    /// Wait between two polls of the burst job
    pub poll_interval: Duration,
    pub window: MetricWindow,
    /// Applied to each ingress query
    pub retry: RetryPolicy,
}

impl Default for DepletionOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            window: MetricWindow::default(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Outcome of a successful depletion phase.
#[derive(Debug, Clone, PartialEq)]
pub struct DepletionReport {
    pub job: JobId,
    pub polls: u32,
    /// Highest ingress sample seen while bursting
    pub peak_mb_per_sec: f64,
    /// Ingress sample that crossed the lower threshold
    pub final_mb_per_sec: f64,
}

/// Run the burst job until ingress rises above the upper threshold and then
/// falls below the lower one.
///
/// Returns [`SweepError::DepletionFailure`] if the burst job finishes first.
pub async fn deplete_credits(
    facade: &dyn JobFacade,
    metrics: &dyn MetricSource,
    params: &RunParameters,
    config: &DepletionConfiguration,
    options: &DepletionOptions,
) -> Result<DepletionReport> {
    let controller = DepletionController::new(config);
    let transition = controller.start(DepletionState::Idle);
    let burst = params.for_depletion(config);

    info!(
        "Depleting credits on {} with {} workers (upper {} MB/s, lower {} MB/s)",
        burst.depletion_topic_name,
        burst.num_jobs,
        controller.upper(),
        controller.lower()
    );

    debug_assert_eq!(transition.action, DepletionAction::StartBurst);
    let job = facade
        .submit(FacadeCommand::DepleteCredits, &burst)
        .await
        .context("Failed to submit burst job")?;

    let mut state = transition.next;
    let mut polls = 0u32;
    let mut peak = 0.0f64;
    let mut last = 0.0f64;

    loop {
        tokio::time::sleep(options.poll_interval).await;
        polls += 1;

        let status = facade
            .status(&job)
            .await
            .with_context(|| format!("Failed to query burst job {job}"))?;

        let observation = if status.is_finished() {
            Observation::finished()
        } else {
            let sample = retry_async(&options.retry, "ingress query", || {
                metrics.ingress_throughput(options.window)
            })
            .await;
            match sample {
                Ok(sample) => {
                    peak = peak.max(sample.mb_per_sec);
                    last = sample.mb_per_sec;
                    Observation::sample(sample.mb_per_sec)
                }
                Err(e) => {
                    if let Err(stop_err) = facade.terminate(&job).await {
                        warn!("Failed to terminate burst job {}: {:#}", job, stop_err);
                    }
                    forget_job(facade, &job).await;
                    return Err(e.context("Ingress query failed during credit depletion"));
                }
            }
        };

        let previous = state;
        let transition = controller.step(state, observation);
        if transition.next != state {
            info!(
                "Depletion {} -> {} after {} polls (ingress {:.1} MB/s)",
                state, transition.next, polls, last
            );
        }
        state = transition.next;

        if transition.action == DepletionAction::StopBurst {
            facade
                .terminate(&job)
                .await
                .with_context(|| format!("Failed to terminate burst job {job}"))?;
        }

        if state.is_terminal() {
            forget_job(facade, &job).await;
        }

        match state {
            DepletionState::Done => {
                return Ok(DepletionReport {
                    job,
                    polls,
                    peak_mb_per_sec: peak,
                    final_mb_per_sec: last,
                });
            }
            DepletionState::Aborted => {
                return Err(SweepError::DepletionFailure(format!(
                    "burst job {} finished while {} after {} polls (peak {:.1} MB/s)",
                    job, previous, polls, peak
                ))
                .into());
            }
            _ => {}
        }
    }
}
