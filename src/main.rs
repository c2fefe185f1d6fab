//! Command-line interface for perf-sweep
//!
//! # Usage Examples
//!
//! ## Plan
//! ```bash
//! # Print every combination with its derived run parameters
//! perf-sweep plan --spec sweep.yaml --format json
//! ```
//!
//! ## Run
//! ```bash
//! PERF_SWEEP_REGION=eu-west-1 PERF_SWEEP_CLUSTER_ID=bench \
//! perf-sweep run --spec sweep.yaml \
//!   --worker-program ./facade.sh \
//!   --metrics-endpoint http://localhost:9000 \
//!   --output results.jsonl
//! ```
//!
//! ## Exec
//! ```bash
//! # Invoke one facade command with parameters from `plan --format json`
//! perf-sweep exec run-performance-test --params point.json \
//!   --region eu-west-1 --cluster-id bench --worker-program ./facade.sh
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use perf_sweep::plan::{render_plan, PlanFormat};
use perf_sweep::{config::FacadeConfig, parse_duration, ClusterOpts, RunOpts, SweepConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use sweep_core::{plan_sweep, parse_worker_output, TestSpecification};
use sweep_runner::{
    format_table, HttpMetricSource, JsonlSink, MemorySink, ResultSink, SweepDriver,
};
use tracing::info;

#[derive(Parser)]
#[command(name = "perf-sweep")]
#[command(about = "Parameter sweeps of streaming-cluster benchmark runs")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Expand a test specification without running anything
    Plan {
        /// Test specification (YAML or JSON)
        #[arg(long)]
        spec: PathBuf,

        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: PlanFormat,

        /// Test identifier used in topic names
        #[arg(long, default_value = "0")]
        test_id: u32,
    },

    /// Run every point of a sweep
    Run(RunOpts),

    /// Invoke the job facade once for a command selector
    Exec {
        /// create-topics, delete-topics, deplete-credits or run-performance-test
        command: String,

        /// Run parameters as JSON
        #[arg(long)]
        params: PathBuf,

        #[command(flatten)]
        cluster: ClusterOpts,

        /// Wait between liveness polls of a submitted job
        #[arg(long, default_value = "5s", value_parser = parse_duration)]
        job_poll_interval: Duration,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // Initialize tracing; stdout is reserved for plan and summary output
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Plan {
            spec,
            format,
            test_id,
        } => {
            let spec = TestSpecification::from_file(&spec)
                .with_context(|| format!("Failed to load test specification from {spec:?}"))?;
            let points = plan_sweep(&spec, test_id)?;
            print!("{}", render_plan(&points, format)?);
        }
        Commands::Run(opts) => {
            let config = SweepConfig::from_opts(&opts);
            run_sweep(config).await?;
        }
        Commands::Exec {
            command,
            params,
            cluster,
            job_poll_interval,
        } => {
            let facade = FacadeConfig::from_opts(&cluster).build();
            let outputs =
                perf_sweep::exec::execute(&facade, &command, &params, job_poll_interval).await?;
            for output in &outputs {
                let result = parse_worker_output(output);
                println!("{}", serde_json::to_string(&result)?);
            }
        }
    }

    Ok(())
}

async fn run_sweep(config: SweepConfig) -> anyhow::Result<()> {
    let spec = TestSpecification::from_file(&config.spec_path).with_context(|| {
        format!(
            "Failed to load test specification from {:?}",
            config.spec_path
        )
    })?;

    let facade = Arc::new(config.facade.build());
    let metrics = Arc::new(
        HttpMetricSource::new(&config.metrics_endpoint, &config.facade.context.cluster_id)
            .context("Failed to create metric source")?,
    );
    let driver = SweepDriver::new(facade, metrics, config.test_id).with_options(config.driver);

    let mut sink: Box<dyn ResultSink> = match &config.output {
        Some(path) => Box::new(JsonlSink::create(path)?),
        None => Box::new(MemorySink::new()),
    };

    info!("Test id: {}", config.test_id);
    let summary = driver.run(&spec, sink.as_mut()).await?;

    println!("{}", format_table(&summary));
    if let Some(path) = &config.output {
        println!("Results written to {path:?}");
    }
    Ok(())
}
