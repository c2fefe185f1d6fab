//! Single facade invocation for `perf-sweep exec`.

use anyhow::{Context, Result};
use std::path::Path;
use std::time::Duration;
use sweep_core::{FacadeCommand, RunParameters, WorkerOutput};
use sweep_runner::{wait_for_job, JobFacade};
use tracing::info;

/// Run one command selector with parameters read from a JSON file.
///
/// Topic commands run to completion and return no output; load commands are
/// submitted as a job and return each worker's output once all finished.
pub async fn execute(
    facade: &dyn JobFacade,
    command: &str,
    params_path: &Path,
    poll_interval: Duration,
) -> Result<Vec<WorkerOutput>> {
    let command: FacadeCommand = command.parse()?;

    let content = std::fs::read_to_string(params_path)
        .with_context(|| format!("Failed to read parameters file: {params_path:?}"))?;
    let params: RunParameters = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse parameters file: {params_path:?}"))?;

    info!("Executing {} for topic {}", command, params.topic_name);

    match command {
        FacadeCommand::CreateTopics | FacadeCommand::DeleteTopics => {
            facade.run_command(command, &params).await?;
            Ok(Vec::new())
        }
        FacadeCommand::DepleteCredits | FacadeCommand::RunPerformanceTest => {
            let job = facade.submit(command, &params).await?;
            let status = wait_for_job(facade, &job, poll_interval).await?;
            info!(
                "Job {} finished: {} succeeded, {} failed",
                job, status.succeeded, status.failed
            );
            facade.worker_output(&job).await
        }
    }
}
