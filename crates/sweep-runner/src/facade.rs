//! Job execution facade: the boundary to whatever runs benchmark workers.
//!
//! The facade is driven by command selectors ([`FacadeCommand`]) plus flags
//! derived from [`RunParameters`]. Topic administration commands run to
//! completion; load commands are submitted as jobs of `num_jobs` parallel
//! workers and polled for liveness.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use sweep_core::{FacadeCommand, RunParameters, WorkerOutput};
use tracing::{debug, warn};

/// Cluster the facade targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacadeContext {
    pub region: String,
    pub cluster_id: String,
}

/// Handle of a submitted job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub String);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Liveness counts of a job's parallel workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JobStatus {
    pub total: usize,
    pub running: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl JobStatus {
    /// Workers in a terminal state.
    pub fn terminal(&self) -> usize {
        self.succeeded + self.failed
    }

    /// Every worker reached a terminal state.
    pub fn is_finished(&self) -> bool {
        self.terminal() >= self.total
    }
}

/// Runs benchmark workers against the cluster.
#[async_trait]
pub trait JobFacade: Send + Sync {
    /// Run a command to completion (topic administration).
    async fn run_command(&self, command: FacadeCommand, params: &RunParameters) -> Result<()>;

    /// Delete every topic whose name starts with `prefix`.
    async fn delete_test_topics(&self, prefix: &str) -> Result<()>;

    /// Launch `params.num_jobs` parallel workers running `command`.
    async fn submit(&self, command: FacadeCommand, params: &RunParameters) -> Result<JobId>;

    async fn status(&self, job: &JobId) -> Result<JobStatus>;

    /// Stop every worker of the job that is still running.
    async fn terminate(&self, job: &JobId) -> Result<()>;

    /// Output lines of each worker that has finished.
    async fn worker_output(&self, job: &JobId) -> Result<Vec<WorkerOutput>>;

    /// Drop whatever the facade still holds for a job. The job id is invalid
    /// afterwards.
    async fn forget(&self, _job: &JobId) -> Result<()> {
        Ok(())
    }
}

/// `forget` that only logs on failure.
pub async fn forget_job(facade: &dyn JobFacade, job: &JobId) {
    if let Err(e) = facade.forget(job).await {
        warn!("Failed to release job {}: {:#}", job, e);
    }
}

/// Command-line flags for one facade invocation.
pub fn facade_args(
    command: FacadeCommand,
    ctx: &FacadeContext,
    params: &RunParameters,
    worker_index: Option<usize>,
) -> Vec<String> {
    let mut args = vec![
        command.to_string(),
        "--region".to_string(),
        ctx.region.clone(),
        "--cluster-id".to_string(),
        ctx.cluster_id.clone(),
    ];
    let mut flag = |name: &str, value: String| {
        args.push(format!("--{name}"));
        args.push(value);
    };

    flag("num-jobs", params.num_jobs.to_string());
    flag("topic-name", params.topic_name.clone());
    flag("depletion-topic-name", params.depletion_topic_name.clone());
    flag("record-size-byte", params.record_size_byte.to_string());
    flag("records-per-sec", params.records_per_sec.to_string());
    flag("num-partitions", params.num_partitions.to_string());
    flag("replication-factor", params.replication_factor.to_string());
    flag("duration-sec", params.duration_sec.to_string());
    flag("producer-props", params.producer_props.clone());
    flag("consumer-props", params.consumer_props.clone());
    flag("num-producers", params.num_producers.to_string());
    flag("num-consumer-groups", params.num_consumer_groups.to_string());
    flag("size-consumer-group", params.consumer_group_size.to_string());
    flag("num-records-producer", params.num_records_producer.to_string());
    flag("num-records-consumer", params.num_records_consumer.to_string());
    if let Some(index) = worker_index {
        flag("worker-index", index.to_string());
    }

    args
}

/// Poll a job until every worker is terminal.
pub async fn wait_for_job(
    facade: &dyn JobFacade,
    job: &JobId,
    poll_interval: Duration,
) -> Result<JobStatus> {
    loop {
        let status = facade.status(job).await?;
        if status.is_finished() {
            return Ok(status);
        }
        debug!(
            "Job {} still running: {}/{} workers terminal",
            job,
            status.terminal(),
            status.total
        );
        tokio::time::sleep(poll_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sweep_core::{derive_run_parameters, SweepState, TestSpecification};

    fn params() -> RunParameters {
        let spec = TestSpecification::from_json(
            &json!({
                "parameters": {
                    "cluster_throughput_mb_per_sec": [24],
                    "consumer_groups": [{"num_groups": 1, "size": 2}],
                    "num_producers": [2],
                    "client_props": [{"producer": "acks=all", "consumer": "fetch.min.bytes=1"}],
                    "num_partitions": [12],
                    "record_size_byte": [1024],
                    "replication_factor": [3],
                    "duration_sec": [60]
                }
            })
            .to_string(),
        )
        .unwrap();
        let combination = spec.decode(&SweepState::from_digits(vec![0; 8])).unwrap();
        derive_run_parameters(&combination, 0, 0, 5).unwrap()
    }

    fn value_of<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn test_facade_args() {
        let ctx = FacadeContext {
            region: "eu-west-1".to_string(),
            cluster_id: "bench-cluster".to_string(),
        };
        let args = facade_args(FacadeCommand::RunPerformanceTest, &ctx, &params(), Some(3));

        assert_eq!(args[0], "run-performance-test");
        assert_eq!(value_of(&args, "--region"), Some("eu-west-1"));
        assert_eq!(value_of(&args, "--cluster-id"), Some("bench-cluster"));
        assert_eq!(value_of(&args, "--num-jobs"), Some("4"));
        assert_eq!(value_of(&args, "--records-per-sec"), Some("12288"));
        assert_eq!(value_of(&args, "--producer-props"), Some("acks=all"));
        assert_eq!(value_of(&args, "--size-consumer-group"), Some("2"));
        assert_eq!(value_of(&args, "--worker-index"), Some("3"));

        let admin = facade_args(FacadeCommand::CreateTopics, &ctx, &params(), None);
        assert_eq!(admin[0], "create-topics");
        assert_eq!(value_of(&admin, "--worker-index"), None);
    }

    #[test]
    fn test_job_status() {
        let status = JobStatus {
            total: 4,
            running: 1,
            succeeded: 2,
            failed: 1,
        };
        assert_eq!(status.terminal(), 3);
        assert!(!status.is_finished());

        let done = JobStatus {
            running: 0,
            succeeded: 3,
            ..status
        };
        assert!(done.is_finished());
    }
}
