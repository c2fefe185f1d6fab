//! Execution side of perf-sweep.
//!
//! This crate talks to the outside world on behalf of [`sweep_core`]:
//!
//! - [`JobFacade`] - creates topics and runs parallel benchmark workers
//! - [`MetricSource`] - reports cluster-wide ingress throughput
//! - [`deplete_credits`] - polling loop around the depletion state machine
//! - [`SweepDriver`] - sequential loop over every sweep point
//!
//! [`LocalProcessFacade`] and [`HttpMetricSource`] are the production
//! implementations; tests substitute in-memory fakes.

pub mod barrier;
pub mod collect;
pub mod depletion;
pub mod driver;
pub mod facade;
pub mod local;
pub mod metrics;
pub mod retry;
pub mod sink;
pub mod summary;

pub use barrier::{wait_for_start, JobCountView, WorkerCounter};
pub use collect::collect_results;
pub use depletion::{deplete_credits, DepletionOptions, DepletionReport};
pub use driver::{DriverOptions, SweepDriver};
pub use facade::{facade_args, forget_job, wait_for_job, FacadeContext, JobFacade, JobId, JobStatus};
pub use local::LocalProcessFacade;
pub use metrics::{HttpMetricSource, IngressSample, MetricSource, MetricWindow};
pub use retry::{is_retryable, retry_async};
pub use sink::{JsonlSink, MemorySink, ResultSink};
pub use summary::{format_table, SkipRecord, SweepSummary};
