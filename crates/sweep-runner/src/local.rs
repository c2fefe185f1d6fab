//! Job facade that runs workers as local child processes.
//!
//! Every facade invocation executes the configured worker program with the
//! command selector as its first argument. Submitted jobs spawn one tokio task
//! per worker; each task joins the start barrier before launching its process
//! and records the process output once it exits.

use crate::barrier::{wait_for_start, WorkerCounter};
use crate::facade::{facade_args, FacadeContext, JobFacade, JobId, JobStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use sweep_core::{FacadeCommand, RunParameters, SweepError, WorkerOutput};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

#[derive(Default)]
struct JobProgress {
    succeeded: usize,
    failed: usize,
    outputs: Vec<WorkerOutput>,
    launch_errors: Vec<String>,
}

struct JobRecord {
    total: usize,
    counter: WorkerCounter,
    progress: Mutex<JobProgress>,
    stop: watch::Sender<bool>,
}

enum WorkerExit {
    Finished(WorkerOutput),
    LaunchFailed(String),
}

/// Runs a worker program locally, one child process per worker.
pub struct LocalProcessFacade {
    program: PathBuf,
    /// Passed before the command selector, e.g. a script for an interpreter
    leading_args: Vec<String>,
    ctx: FacadeContext,
    barrier_interval: Duration,
    next_job: AtomicU64,
    jobs: Mutex<HashMap<JobId, Arc<JobRecord>>>,
}

impl LocalProcessFacade {
    pub fn new(program: impl Into<PathBuf>, ctx: FacadeContext) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
            ctx,
            barrier_interval: Duration::from_secs(1),
            next_job: AtomicU64::new(0),
            jobs: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_leading_args(mut self, args: Vec<String>) -> Self {
        self.leading_args = args;
        self
    }

    fn command_line(&self, args: Vec<String>) -> Vec<String> {
        let mut full = self.leading_args.clone();
        full.extend(args);
        full
    }

    pub fn with_barrier_interval(mut self, interval: Duration) -> Self {
        self.barrier_interval = interval;
        self
    }

    async fn run_to_completion(&self, args: Vec<String>) -> Result<()> {
        let label = args.first().cloned().unwrap_or_default();
        let args = self.command_line(args);
        debug!("Running {:?} {}", self.program, args.join(" "));

        let output = Command::new(&self.program)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                SweepError::WorkerLaunchFailure(format!(
                    "failed to spawn {:?} for {}: {}",
                    self.program, label, e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SweepError::WorkerLaunchFailure(format!(
                "{} exited with {}: {}",
                label,
                output.status,
                stderr.trim()
            ))
            .into());
        }
        Ok(())
    }

    async fn record(&self, job: &JobId) -> Result<Arc<JobRecord>> {
        self.jobs
            .lock()
            .await
            .get(job)
            .cloned()
            .with_context(|| format!("Unknown job {job}"))
    }
}

#[async_trait]
impl JobFacade for LocalProcessFacade {
    async fn run_command(&self, command: FacadeCommand, params: &RunParameters) -> Result<()> {
        self.run_to_completion(facade_args(command, &self.ctx, params, None))
            .await
    }

    async fn delete_test_topics(&self, prefix: &str) -> Result<()> {
        let args = vec![
            FacadeCommand::DeleteTopics.to_string(),
            "--region".to_string(),
            self.ctx.region.clone(),
            "--cluster-id".to_string(),
            self.ctx.cluster_id.clone(),
            "--topic-prefix".to_string(),
            prefix.to_string(),
        ];
        self.run_to_completion(args).await
    }

    async fn submit(&self, command: FacadeCommand, params: &RunParameters) -> Result<JobId> {
        let total = params.num_jobs;
        let job = JobId(format!(
            "{}-{}",
            command,
            self.next_job.fetch_add(1, Ordering::SeqCst)
        ));
        let (stop, _) = watch::channel(false);
        let record = Arc::new(JobRecord {
            total,
            counter: WorkerCounter::new(),
            progress: Mutex::new(JobProgress::default()),
            stop,
        });
        self.jobs.lock().await.insert(job.clone(), record.clone());

        info!("Submitting {} with {} workers as job {}", command, total, job);

        for worker_index in 0..total {
            let program = self.program.clone();
            let args = self.command_line(facade_args(
                command,
                &self.ctx,
                params,
                Some(worker_index),
            ));
            let record = record.clone();
            let interval = self.barrier_interval;

            tokio::spawn(async move {
                let stop = record.stop.subscribe();
                let exit = run_worker(program, args, worker_index, &record, interval, stop).await;
                record.counter.deregister();

                let mut progress = record.progress.lock().await;
                match exit {
                    WorkerExit::Finished(output) => {
                        if output.success {
                            progress.succeeded += 1;
                        } else {
                            progress.failed += 1;
                        }
                        progress.outputs.push(output);
                    }
                    WorkerExit::LaunchFailed(message) => {
                        warn!("Worker {} failed to launch: {}", worker_index, message);
                        progress.failed += 1;
                        progress.launch_errors.push(message);
                    }
                }
            });
        }

        Ok(job)
    }

    async fn status(&self, job: &JobId) -> Result<JobStatus> {
        let record = self.record(job).await?;
        let progress = record.progress.lock().await;
        if let Some(message) = progress.launch_errors.first() {
            return Err(SweepError::WorkerLaunchFailure(format!("job {job}: {message}")).into());
        }
        Ok(JobStatus {
            total: record.total,
            running: record.counter.running(),
            succeeded: progress.succeeded,
            failed: progress.failed,
        })
    }

    async fn terminate(&self, job: &JobId) -> Result<()> {
        let record = self.record(job).await?;
        info!("Terminating job {}", job);
        record.stop.send_replace(true);
        Ok(())
    }

    async fn worker_output(&self, job: &JobId) -> Result<Vec<WorkerOutput>> {
        let record = self.record(job).await?;
        let mut outputs = record.progress.lock().await.outputs.clone();
        outputs.sort_by_key(|o| o.worker_index);
        Ok(outputs)
    }

    async fn forget(&self, job: &JobId) -> Result<()> {
        let record = self
            .jobs
            .lock()
            .await
            .remove(job)
            .with_context(|| format!("Unknown job {job}"))?;
        // Workers still running keep their own handle to the record.
        record.stop.send_replace(true);
        debug!("Released job {}", job);
        Ok(())
    }
}

async fn run_worker(
    program: PathBuf,
    args: Vec<String>,
    worker_index: usize,
    record: &JobRecord,
    barrier_interval: Duration,
    mut stop: watch::Receiver<bool>,
) -> WorkerExit {
    record.counter.register();

    tokio::select! {
        arrived = wait_for_start(&record.counter, record.total, barrier_interval) => {
            info!("Worker {} released with {} workers arrived", worker_index, arrived);
        }
        _ = stopped(&mut stop) => {
            return WorkerExit::Finished(WorkerOutput {
                worker_index,
                success: false,
                lines: Vec::new(),
            });
        }
    }

    let mut child = match Command::new(&program)
        .args(&args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            return WorkerExit::LaunchFailed(format!("failed to spawn {program:?}: {e}"));
        }
    };

    let stdout = tokio::spawn(collect_lines(child.stdout.take()));
    let stderr = tokio::spawn(collect_lines(child.stderr.take()));

    let success = tokio::select! {
        status = child.wait() => matches!(status, Ok(s) if s.success()),
        _ = stopped(&mut stop) => {
            if let Err(e) = child.kill().await {
                warn!("Failed to kill worker {}: {}", worker_index, e);
            }
            false
        }
    };

    let mut lines = stdout.await.unwrap_or_default();
    lines.extend(stderr.await.unwrap_or_default());

    WorkerExit::Finished(WorkerOutput {
        worker_index,
        success,
        lines,
    })
}

async fn stopped(stop: &mut watch::Receiver<bool>) {
    let _ = stop.wait_for(|stopped| *stopped).await;
}

async fn collect_lines<R: AsyncRead + Unpin>(reader: Option<R>) -> Vec<String> {
    let Some(reader) = reader else {
        return Vec::new();
    };
    let mut lines = BufReader::new(reader).lines();
    let mut collected = Vec::new();
    while let Ok(Some(line)) = lines.next_line().await {
        collected.push(line);
    }
    collected
}
