//! perf-sweep library
//!
//! Drives benchmark sweeps against a streaming cluster: every combination of
//! the test specification's parameter axes is run in order, burst credits are
//! optionally drained first, and a throughput stop condition cuts a phase
//! short once the cluster saturates.
//!
//! - `sweep_core` - specification, odometer, parameter derivation, stop rule
//! - `sweep_runner` - job facade, metric source, depletion loop, driver
//!
//! # CLI Usage
//!
//! ```bash
//! # Expand a sweep without running anything
//! perf-sweep plan --spec sweep.yaml
//!
//! # Run it
//! perf-sweep run --spec sweep.yaml \
//!   --region eu-west-1 --cluster-id bench \
//!   --worker-program ./facade.sh \
//!   --metrics-endpoint http://localhost:9000 \
//!   --output results.jsonl
//!
//! # Invoke the facade once
//! perf-sweep exec create-topics --params point.json \
//!   --region eu-west-1 --cluster-id bench --worker-program ./facade.sh
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

pub mod config;
pub mod exec;
pub mod plan;

pub use config::duration::parse_duration;
pub use config::SweepConfig;

/// Cluster and worker program options.
#[derive(Parser, Clone, Debug)]
pub struct ClusterOpts {
    /// Region of the cluster under test
    #[arg(long, env = "PERF_SWEEP_REGION")]
    pub region: String,

    /// Identity of the cluster under test
    #[arg(long, env = "PERF_SWEEP_CLUSTER_ID")]
    pub cluster_id: String,

    /// Program invoked with a command selector and its flags
    #[arg(long)]
    pub worker_program: PathBuf,

    /// Argument passed to the worker program before the command selector (repeatable)
    #[arg(long = "worker-arg", value_name = "ARG")]
    pub worker_args: Vec<String>,

    /// Wait between start-barrier polls of a worker
    #[arg(long, default_value = "1s", value_parser = parse_duration)]
    pub barrier_interval: Duration,
}

/// Options of `perf-sweep run`.
#[derive(Parser, Clone, Debug)]
pub struct RunOpts {
    /// Test specification (YAML or JSON)
    #[arg(long)]
    pub spec: PathBuf,

    #[command(flatten)]
    pub cluster: ClusterOpts,

    /// Base URL of the ingress metrics service
    #[arg(long, env = "PERF_SWEEP_METRICS_ENDPOINT")]
    pub metrics_endpoint: String,

    /// Append each point's result to this JSONL file
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Wait between polls of a burst job
    #[arg(long, default_value = "60s", value_parser = parse_duration)]
    pub poll_interval: Duration,

    /// Wait between liveness polls of a performance test
    #[arg(long, default_value = "10s", value_parser = parse_duration)]
    pub job_poll_interval: Duration,

    /// Lookback and aggregation period of ingress queries
    #[arg(long, default_value = "300s", value_parser = parse_duration)]
    pub metric_window: Duration,

    /// Attempts for metric queries and result collection
    #[arg(long, default_value = "5")]
    pub retry_attempts: u32,

    /// Delay before the second attempt; doubles per attempt
    #[arg(long, default_value = "2s", value_parser = parse_duration)]
    pub retry_initial_backoff: Duration,

    /// Test identifier used in topic names (random if unset)
    #[arg(long)]
    pub test_id: Option<u32>,

    /// Keep each point's topics after its run
    #[arg(long)]
    pub keep_topics: bool,
}
