//! Worker output parsing and per-run results.
//!
//! Producers print a summary line such as
//!
//! ```text
//! 18000000 records sent, 49998.1 records/sec (48.83 MB/sec), 12.4 ms avg latency, 812.0 ms max latency, 3 ms 50th, 30 ms 95th, 95 ms 99th, 410 ms 99.9th.
//! ```
//!
//! and consumers print `Processed a total of N records, X records/sec`. Only
//! the last summary line of each kind is authoritative for a worker.

use crate::error::{Result, SweepError};
use crate::params::RunParameters;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;
use tracing::warn;

const PRODUCER_PATTERN: &str = concat!(
    r"(\d+)\s+records\s+sent,\s+",
    r"(\d+\.?\d*)\s+records/sec\s+",
    r"\((\d+\.?\d*)\s+MB/sec\),\s+",
    r"(\d+\.?\d*)\s+ms\s+avg\s+latency,\s+",
    r"(\d+\.?\d*)\s+ms\s+max\s+latency",
    r"(?:,\s+(\d+)\s+ms\s+50th,\s+(\d+)\s+ms\s+95th,\s+(\d+)\s+ms\s+99th,\s+(\d+)\s+ms\s+99\.9th)?",
);

const CONSUMER_PATTERN: &str =
    r"Processed\s+a\s+total\s+of\s+(\d+)\s+records,\s+(\d+\.?\d*)\s+records/sec";

const TIMEOUT_PATTERN: &str = concat!(
    r"TimeoutException:\s+Expiring\s+(\d+)\s+record\(s\)\s+for\s+",
    r"(.*?):\s*(\d+)\s+ms\s+has\s+passed\s+since\s+batch\s+creation",
);

fn producer_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(PRODUCER_PATTERN).expect("producer pattern is valid"))
}

fn consumer_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(CONSUMER_PATTERN).expect("consumer pattern is valid"))
}

fn timeout_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(TIMEOUT_PATTERN).expect("timeout pattern is valid"))
}

/// Latency percentiles reported by recent producer versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LatencyPercentiles {
    pub p50_ms: u64,
    pub p95_ms: u64,
    pub p99_ms: u64,
    pub p999_ms: u64,
}

/// Final summary of one producer worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProducerSummary {
    pub records_sent: u64,
    pub records_per_sec: f64,
    pub mb_per_sec: f64,
    pub avg_latency_ms: f64,
    pub max_latency_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentiles: Option<LatencyPercentiles>,
}

/// Final summary of one consumer worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumerSummary {
    pub records: u64,
    pub records_per_sec: f64,
}

/// Parse a producer summary line.
pub fn parse_producer_line(line: &str) -> Option<ProducerSummary> {
    let caps = producer_regex().captures(line)?;
    let num = |i: usize| caps.get(i).map(|m| m.as_str());

    let percentiles = match (num(6), num(7), num(8), num(9)) {
        (Some(p50), Some(p95), Some(p99), Some(p999)) => Some(LatencyPercentiles {
            p50_ms: p50.parse().ok()?,
            p95_ms: p95.parse().ok()?,
            p99_ms: p99.parse().ok()?,
            p999_ms: p999.parse().ok()?,
        }),
        _ => None,
    };

    Some(ProducerSummary {
        records_sent: num(1)?.parse().ok()?,
        records_per_sec: num(2)?.parse().ok()?,
        mb_per_sec: num(3)?.parse().ok()?,
        avg_latency_ms: num(4)?.parse().ok()?,
        max_latency_ms: num(5)?.parse().ok()?,
        percentiles,
    })
}

/// Parse a consumer summary line.
pub fn parse_consumer_line(line: &str) -> Option<ConsumerSummary> {
    let caps = consumer_regex().captures(line)?;
    Some(ConsumerSummary {
        records: caps.get(1)?.as_str().parse().ok()?,
        records_per_sec: caps.get(2)?.as_str().parse().ok()?,
    })
}

/// Number of records expired by a producer batch timeout, if the line reports one.
pub fn parse_timeout_line(line: &str) -> Option<u64> {
    timeout_regex()
        .captures(line)
        .and_then(|caps| caps.get(1)?.as_str().parse().ok())
}

/// Raw output of one worker as returned by the job facade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerOutput {
    pub worker_index: usize,
    pub success: bool,
    pub lines: Vec<String>,
}

/// Parsed outcome of one worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerResult {
    pub worker_index: usize,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub producer: Option<ProducerSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consumer: Option<ConsumerSummary>,
    pub expired_records: u64,
}

impl WorkerResult {
    /// Whether the worker emitted any summary line.
    pub fn has_summary(&self) -> bool {
        self.producer.is_some() || self.consumer.is_some()
    }

    /// A worker is settled once it reported a summary or exited with failure.
    /// A successful worker without a summary has output still in flight.
    pub fn is_settled(&self) -> bool {
        self.has_summary() || !self.success
    }
}

/// Parse a worker's output. The last producer and consumer lines win.
pub fn parse_worker_output(output: &WorkerOutput) -> WorkerResult {
    let mut producer = None;
    let mut consumer = None;
    let mut expired_records = 0;

    for line in &output.lines {
        if let Some(summary) = parse_producer_line(line) {
            producer = Some(summary);
        } else if let Some(summary) = parse_consumer_line(line) {
            consumer = Some(summary);
        } else if let Some(expired) = parse_timeout_line(line) {
            expired_records += expired;
        }
    }

    WorkerResult {
        worker_index: output.worker_index,
        success: output.success,
        producer,
        consumer,
        expired_records,
    }
}

/// Fail with [`SweepError::IncompleteResults`] unless `expected` workers are
/// settled. Failed workers count; they are recorded in the run result.
pub fn ensure_complete(workers: &[WorkerResult], expected: usize) -> Result<()> {
    let found = workers.iter().filter(|w| w.is_settled()).count();
    if found < expected {
        return Err(SweepError::IncompleteResults { expected, found });
    }
    Ok(())
}

/// Result of one finished sweep point.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RunResult {
    pub test_id: u32,
    pub flat_index: usize,
    pub series_index: usize,
    pub topic_name: String,
    /// Axis values of the point, in axis order
    pub combination: Value,
    pub requested_mb_per_sec: f64,
    /// Sum of all producers' measured throughput
    pub sent_mb_per_sec: f64,
    pub records_sent: u64,
    pub records_consumed: u64,
    /// Mean of the producers' average latencies
    pub avg_latency_ms: f64,
    /// Largest max latency of any producer
    pub max_latency_ms: f64,
    /// Per-percentile maximum across producers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentiles: Option<LatencyPercentiles>,
    pub expired_records: u64,
    pub producers_reporting: usize,
    pub consumers_reporting: usize,
    pub workers_succeeded: usize,
    pub workers_failed: usize,
    /// Whether the stop condition fired for this run
    #[serde(default)]
    pub skipped_remaining: bool,
}

impl RunResult {
    /// Aggregate the parsed worker results of a run.
    pub fn from_workers(params: &RunParameters, combination: Value, workers: &[WorkerResult]) -> Self {
        let producers: Vec<&ProducerSummary> =
            workers.iter().filter_map(|w| w.producer.as_ref()).collect();
        let consumers: Vec<&ConsumerSummary> =
            workers.iter().filter_map(|w| w.consumer.as_ref()).collect();

        let avg_latency_ms = if producers.is_empty() {
            0.0
        } else {
            producers.iter().map(|p| p.avg_latency_ms).sum::<f64>() / producers.len() as f64
        };

        let percentiles = producers
            .iter()
            .filter_map(|p| p.percentiles)
            .reduce(|a, b| LatencyPercentiles {
                p50_ms: a.p50_ms.max(b.p50_ms),
                p95_ms: a.p95_ms.max(b.p95_ms),
                p99_ms: a.p99_ms.max(b.p99_ms),
                p999_ms: a.p999_ms.max(b.p999_ms),
            });

        let workers_succeeded = workers.iter().filter(|w| w.success).count();

        RunResult {
            test_id: params.test_id,
            flat_index: params.flat_index,
            series_index: params.series_index,
            topic_name: params.topic_name.clone(),
            combination,
            requested_mb_per_sec: params.cluster_throughput_mb_per_sec,
            sent_mb_per_sec: producers.iter().map(|p| p.mb_per_sec).sum(),
            records_sent: producers.iter().map(|p| p.records_sent).sum(),
            records_consumed: consumers.iter().map(|c| c.records).sum(),
            avg_latency_ms,
            max_latency_ms: producers
                .iter()
                .map(|p| p.max_latency_ms)
                .fold(0.0, f64::max),
            percentiles,
            expired_records: workers.iter().map(|w| w.expired_records).sum(),
            producers_reporting: producers.len(),
            consumers_reporting: consumers.len(),
            workers_succeeded,
            workers_failed: workers.len() - workers_succeeded,
            skipped_remaining: false,
        }
    }

    /// Measured over requested throughput.
    pub fn sent_div_requested_mb_per_sec(&self) -> f64 {
        if self.sent_mb_per_sec == 0.0 {
            warn!("No valid throughput data found in producer results");
            return 0.0;
        }
        let requested = if self.requested_mb_per_sec == 0.0 {
            warn!("Requested throughput is 0, defaulting to 1");
            1.0
        } else {
            self.requested_mb_per_sec
        };
        self.sent_mb_per_sec / requested
    }
}
