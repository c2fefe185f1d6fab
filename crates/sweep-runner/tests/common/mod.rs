//! In-memory cluster and metric fakes shared by the runner tests.

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use sweep_core::{FacadeCommand, RunParameters, SweepError, WorkerOutput};
use sweep_runner::{IngressSample, JobFacade, JobId, JobStatus, MetricSource, MetricWindow};

/// Facade interaction recorded by [`FakeCluster`].
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    RunCommand(FacadeCommand, usize),
    Submit(FacadeCommand, usize, usize),
    Terminate(String),
    Forget(String),
    DeleteTestTopics(String),
}

struct FakeJob {
    command: FacadeCommand,
    params: RunParameters,
    terminated: bool,
    status_queries: u32,
}

#[derive(Default)]
struct FakeState {
    next_job: u64,
    jobs: HashMap<JobId, FakeJob>,
    calls: Vec<Call>,
}

/// Cluster whose producers top out at a fixed aggregate throughput.
pub struct FakeCluster {
    capacity_mb_per_sec: f64,
    fail_create_at: Option<usize>,
    fail_cleanup: bool,
    missing_outputs: usize,
    crashing_worker: Option<usize>,
    burst_finishes_after: Option<u32>,
    state: Mutex<FakeState>,
}

impl FakeCluster {
    pub fn saturating_at(capacity_mb_per_sec: f64) -> Self {
        Self {
            capacity_mb_per_sec,
            fail_create_at: None,
            fail_cleanup: false,
            missing_outputs: 0,
            crashing_worker: None,
            burst_finishes_after: None,
            state: Mutex::new(FakeState::default()),
        }
    }

    pub fn unbounded() -> Self {
        Self::saturating_at(f64::INFINITY)
    }

    /// `create-topics` exits non-zero for the point at `flat_index`.
    pub fn failing_create_at(mut self, flat_index: usize) -> Self {
        self.fail_create_at = Some(flat_index);
        self
    }

    pub fn failing_cleanup(mut self) -> Self {
        self.fail_cleanup = true;
        self
    }

    /// That many workers of every performance test never report.
    pub fn missing_outputs(mut self, count: usize) -> Self {
        self.missing_outputs = count;
        self
    }

    /// The worker at `worker_index` of every performance test exits non-zero
    /// without printing a summary.
    pub fn crashing_worker(mut self, worker_index: usize) -> Self {
        self.crashing_worker = Some(worker_index);
        self
    }

    /// Burst jobs finish on their own after `polls` status queries.
    pub fn burst_finishes_after(mut self, polls: u32) -> Self {
        self.burst_finishes_after = Some(polls);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| predicate(c)).count()
    }

    pub fn cleanups(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::DeleteTestTopics(prefix) => Some(prefix),
                _ => None,
            })
            .collect()
    }

    fn sent_per_producer(&self, params: &RunParameters) -> f64 {
        params
            .cluster_throughput_mb_per_sec
            .min(self.capacity_mb_per_sec)
            / params.num_producers as f64
    }
}

#[async_trait]
impl JobFacade for FakeCluster {
    async fn run_command(&self, command: FacadeCommand, params: &RunParameters) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .calls
            .push(Call::RunCommand(command, params.flat_index));
        if command == FacadeCommand::CreateTopics && self.fail_create_at == Some(params.flat_index)
        {
            return Err(SweepError::WorkerLaunchFailure(format!(
                "create-topics exited with 1 for {}",
                params.topic_name
            ))
            .into());
        }
        Ok(())
    }

    async fn delete_test_topics(&self, prefix: &str) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .calls
            .push(Call::DeleteTestTopics(prefix.to_string()));
        if self.fail_cleanup {
            anyhow::bail!("delete-topics exited with 2");
        }
        Ok(())
    }

    async fn submit(&self, command: FacadeCommand, params: &RunParameters) -> Result<JobId> {
        let mut state = self.state.lock().unwrap();
        let job = JobId(format!("{command}-{}", state.next_job));
        state.next_job += 1;
        state
            .calls
            .push(Call::Submit(command, params.flat_index, params.num_jobs));
        state.jobs.insert(
            job.clone(),
            FakeJob {
                command,
                params: params.clone(),
                terminated: false,
                status_queries: 0,
            },
        );
        Ok(job)
    }

    async fn status(&self, job: &JobId) -> Result<JobStatus> {
        let mut state = self.state.lock().unwrap();
        let fake = state
            .jobs
            .get_mut(job)
            .ok_or_else(|| anyhow::anyhow!("unknown job {job}"))?;
        fake.status_queries += 1;

        let total = fake.params.num_jobs;
        let crashed = match (fake.command, self.crashing_worker) {
            (FacadeCommand::RunPerformanceTest, Some(index)) if index < total => 1,
            _ => 0,
        };
        let finished = match fake.command {
            FacadeCommand::DepleteCredits => {
                fake.terminated
                    || self
                        .burst_finishes_after
                        .is_some_and(|polls| fake.status_queries > polls)
            }
            _ => true,
        };

        Ok(if finished {
            JobStatus {
                total,
                running: 0,
                succeeded: total - crashed,
                failed: crashed,
            }
        } else {
            JobStatus {
                total,
                running: total,
                succeeded: 0,
                failed: 0,
            }
        })
    }

    async fn terminate(&self, job: &JobId) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Terminate(job.0.clone()));
        if let Some(fake) = state.jobs.get_mut(job) {
            fake.terminated = true;
        }
        Ok(())
    }

    async fn forget(&self, job: &JobId) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Forget(job.0.clone()));
        state
            .jobs
            .remove(job)
            .map(|_| ())
            .ok_or_else(|| anyhow::anyhow!("unknown job {job}"))
    }

    async fn worker_output(&self, job: &JobId) -> Result<Vec<WorkerOutput>> {
        let state = self.state.lock().unwrap();
        let fake = state
            .jobs
            .get(job)
            .ok_or_else(|| anyhow::anyhow!("unknown job {job}"))?;
        let params = &fake.params;
        let per_producer = self.sent_per_producer(params);
        let reporting = params.num_jobs.saturating_sub(self.missing_outputs);

        Ok((0..reporting)
            .map(|worker_index| {
                if self.crashing_worker == Some(worker_index) {
                    return WorkerOutput {
                        worker_index,
                        success: false,
                        lines: vec![
                            "Starting worker".to_string(),
                            "Exception in thread \"main\" java.lang.OutOfMemoryError".to_string(),
                        ],
                    };
                }
                let line = if worker_index < params.num_producers {
                    format!(
                        "{} records sent, {:.1} records/sec ({:.2} MB/sec), 4.5 ms avg latency, 120.0 ms max latency",
                        params.num_records_producer,
                        per_producer * 1024.0,
                        per_producer
                    )
                } else {
                    format!(
                        "Processed a total of {} records, {:.1} records/sec",
                        params.num_records_consumer,
                        per_producer * 1024.0
                    )
                };
                WorkerOutput {
                    worker_index,
                    success: true,
                    lines: vec!["Starting worker".to_string(), line],
                }
            })
            .collect())
    }
}

/// Replays a fixed ingress trace, wrapping around at the end.
pub struct ScriptedMetrics {
    trace: Vec<f64>,
    failures_before_each: usize,
    calls: AtomicUsize,
    failures: AtomicUsize,
}

impl ScriptedMetrics {
    pub fn new(trace: Vec<f64>) -> Self {
        Self {
            trace,
            failures_before_each: 0,
            calls: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
        }
    }

    /// Every sample is preceded by `count` transient failures.
    pub fn flaky(mut self, count: usize) -> Self {
        self.failures_before_each = count;
        self
    }

    pub fn samples_served(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetricSource for ScriptedMetrics {
    async fn ingress_throughput(&self, _window: MetricWindow) -> Result<IngressSample> {
        if self.failures_before_each > 0 {
            let failed = self.failures.fetch_add(1, Ordering::SeqCst);
            if failed < self.failures_before_each {
                return Err(SweepError::TransientMetricQuery("rate exceeded".to_string()).into());
            }
            self.failures.store(0, Ordering::SeqCst);
        }
        if self.trace.is_empty() {
            return Err(SweepError::TransientMetricQuery("no datapoints".to_string()).into());
        }
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(IngressSample {
            mb_per_sec: self.trace[index % self.trace.len()],
            max_deviation: 0.0,
        })
    }
}

pub const DOCUMENTED_SPEC: &str = r#"
parameters:
  cluster_throughput_mb_per_sec: [12, 24, 36, 48, 60, 72, 84, 96, 108, 120, 132, 144, 156, 168]
  consumer_groups:
    - { num_groups: 0, size: 0 }
    - { num_groups: 1, size: 6 }
    - { num_groups: 2, size: 6 }
  num_producers: [6]
  client_props:
    - { producer: "acks=all linger.ms=5 batch.size=262114", consumer: "" }
  num_partitions: [36]
  record_size_byte: [1024]
  replication_factor: [3]
  duration_sec: [3600]
skip_remaining_throughput:
  less-than: [sent_div_requested_mb_per_sec, 0.995]
"#;

/// Two throughputs by two consumer groups, with credit depletion.
pub fn depletion_spec(every_run: bool) -> String {
    format!(
        r#"
parameters:
  cluster_throughput_mb_per_sec: [8, 16]
  consumer_groups: [{{ num_groups: 0, size: 0 }}, {{ num_groups: 1, size: 2 }}]
  num_producers: [2]
  client_props: [{{ producer: "acks=1", consumer: "" }}]
  num_partitions: [6]
  record_size_byte: [1024]
  replication_factor: [3]
  duration_sec: [60]
depletion_configuration:
  upper_threshold: {{ mb_per_sec: 185 }}
  lower_threshold: {{ mb_per_sec: 150 }}
  approximate_timeout_hours: 1
  every_run: {every_run}
"#
    )
}
