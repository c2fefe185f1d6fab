//! Result collection from a finished performance-test job.

use crate::facade::{JobFacade, JobId};
use crate::retry::retry_async;
use anyhow::Result;
use sweep_core::{ensure_complete, parse_worker_output, RetryPolicy, WorkerResult};
use tracing::debug;

/// Fetch and parse every worker's output, retrying until all `expected`
/// workers have reported a summary line or failed.
///
/// Worker output can lag behind job completion, so a short read surfaces as
/// `IncompleteResults` and goes through `retry`.
pub async fn collect_results(
    facade: &dyn JobFacade,
    job: &JobId,
    expected: usize,
    retry: &RetryPolicy,
) -> Result<Vec<WorkerResult>> {
    retry_async(retry, "result collection", || async {
        let outputs = facade.worker_output(job).await?;
        let workers: Vec<WorkerResult> = outputs.iter().map(parse_worker_output).collect();
        debug!(
            "Job {}: {} outputs, {} with summaries, {} failed",
            job,
            workers.len(),
            workers.iter().filter(|w| w.has_summary()).count(),
            workers.iter().filter(|w| !w.success).count()
        );
        ensure_complete(&workers, expected)?;
        Ok(workers)
    })
    .await
}
