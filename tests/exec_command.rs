//! `perf-sweep exec` against a recording facade.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;
use sweep_core::{plan_sweep, FacadeCommand, RunParameters, SweepError, TestSpecification, WorkerOutput};
use sweep_runner::{JobFacade, JobId, JobStatus};

#[derive(Default)]
struct RecordingFacade {
    seen: Mutex<Vec<(FacadeCommand, String)>>,
}

#[async_trait]
impl JobFacade for RecordingFacade {
    async fn run_command(&self, command: FacadeCommand, params: &RunParameters) -> Result<()> {
        self.seen
            .lock()
            .unwrap()
            .push((command, params.topic_name.clone()));
        Ok(())
    }

    async fn delete_test_topics(&self, _prefix: &str) -> Result<()> {
        Ok(())
    }

    async fn submit(&self, command: FacadeCommand, params: &RunParameters) -> Result<JobId> {
        self.seen
            .lock()
            .unwrap()
            .push((command, params.topic_name.clone()));
        Ok(JobId(format!("job-{}", params.num_jobs)))
    }

    async fn status(&self, _job: &JobId) -> Result<JobStatus> {
        Ok(JobStatus {
            total: 2,
            running: 0,
            succeeded: 2,
            failed: 0,
        })
    }

    async fn terminate(&self, _job: &JobId) -> Result<()> {
        Ok(())
    }

    async fn worker_output(&self, _job: &JobId) -> Result<Vec<WorkerOutput>> {
        Ok((0..2)
            .map(|worker_index| WorkerOutput {
                worker_index,
                success: true,
                lines: vec![
                    "800 records sent, 80.0 records/sec (0.08 MB/sec), 3.0 ms avg latency, 11.0 ms max latency".to_string(),
                ],
            })
            .collect())
    }
}

fn params_file(dir: &std::path::Path) -> (std::path::PathBuf, RunParameters) {
    let spec = TestSpecification::from_yaml(
        r#"
parameters:
  cluster_throughput_mb_per_sec: [4]
  consumer_groups: [{ num_groups: 0, size: 0 }]
  num_producers: [2]
  client_props: [{ producer: "acks=1", consumer: "" }]
  num_partitions: [3]
  record_size_byte: [512]
  replication_factor: [2]
  duration_sec: [30]
"#,
    )
    .unwrap();
    let params = plan_sweep(&spec, 31).unwrap().remove(0).params;
    let path = dir.join("point.json");
    std::fs::write(&path, serde_json::to_string(&params).unwrap()).unwrap();
    (path, params)
}

#[test]
fn test_exec_admin_command() {
    let dir = tempfile::tempdir().unwrap();
    let (path, params) = params_file(dir.path());
    let facade = RecordingFacade::default();

    let outputs = tokio_test::block_on(perf_sweep::exec::execute(
        &facade,
        "create-topics",
        &path,
        Duration::from_millis(1),
    ))
    .unwrap();

    assert!(outputs.is_empty());
    assert_eq!(
        facade.seen.lock().unwrap().as_slice(),
        &[(FacadeCommand::CreateTopics, params.topic_name)]
    );
}

#[test]
fn test_exec_load_command_returns_worker_output() {
    let dir = tempfile::tempdir().unwrap();
    let (path, _) = params_file(dir.path());
    let facade = RecordingFacade::default();

    let outputs = tokio_test::block_on(perf_sweep::exec::execute(
        &facade,
        "run-performance-test",
        &path,
        Duration::from_millis(1),
    ))
    .unwrap();

    assert_eq!(outputs.len(), 2);
    let parsed = sweep_core::parse_worker_output(&outputs[1]);
    assert_eq!(parsed.producer.unwrap().records_sent, 800);
}

#[test]
fn test_exec_unknown_command() {
    let dir = tempfile::tempdir().unwrap();
    let (path, _) = params_file(dir.path());
    let facade = RecordingFacade::default();

    let err = tokio_test::block_on(perf_sweep::exec::execute(
        &facade,
        "reboot-brokers",
        &path,
        Duration::from_millis(1),
    ))
    .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<SweepError>(),
        Some(SweepError::UnknownCommand(c)) if c == "reboot-brokers"
    ));
    assert!(facade.seen.lock().unwrap().is_empty());
}
