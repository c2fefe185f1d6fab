//! Core sweep logic for perf-sweep.
//!
//! This crate holds everything that decides *what* to run, without doing any
//! I/O against the cluster:
//!
//! - [`TestSpecification`] - declarative parameter axes loaded from YAML/JSON
//! - [`SweepIterator`] - odometer over the axes, with `advance` and `skip`
//! - [`derive_run_parameters`] - worker counts, rates and topic names per point
//! - [`plan_sweep`] - dry-run expansion of every point
//! - [`StopCondition`] - throughput-ratio rule that triggers a skip
//! - [`DepletionController`] - hysteresis state machine for burst credits
//! - [`RunResult`] - parsed and aggregated worker output
//! - [`RetryPolicy`] - backoff with jitter for transient query failures
//!
//! # Architecture
//!
//! ```text
//! sweep-core (this crate)
//!    │
//!    └─── sweep-runner   (facade, metric source, depletion loop, driver)
//!            │
//!            └─── perf-sweep (CLI)
//! ```

pub mod command;
pub mod depletion;
pub mod error;
pub mod iterator;
pub mod params;
pub mod plan;
pub mod results;
pub mod retry;
pub mod spec;
pub mod stop;

pub use command::FacadeCommand;
pub use depletion::{DepletionAction, DepletionController, DepletionState, Observation, Transition};
pub use error::{Result, SweepError};
pub use iterator::{Step, SweepIterator, SweepState};
pub use params::{derive_run_parameters, test_prefix, RunParameters};
pub use plan::{plan_sweep, PlannedPoint};
pub use results::{
    ensure_complete, parse_worker_output, RunResult, WorkerOutput, WorkerResult,
};
pub use retry::RetryPolicy;
pub use spec::{AxisCombination, AxisSpec, AxisValue, DepletionConfiguration, TestSpecification};
pub use stop::{evaluate, Decision, StopCondition};
