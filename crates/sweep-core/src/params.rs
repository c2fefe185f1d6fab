//! Derivation of concrete run parameters from one sweep point.

use crate::error::{Result, SweepError};
use crate::spec::{AxisCombination, DepletionConfiguration};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Record count used when a run is not bounded by throughput.
pub const UNBOUNDED_RECORDS: i64 = 2_147_483_647;

/// Rate value meaning "no throttling".
pub const UNTHROTTLED: i64 = -1;

const BYTES_PER_MB: i64 = 1024 * 1024;

/// Concrete parameters for one benchmark run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunParameters {
    /// Random identifier shared by every run of one sweep
    pub test_id: u32,
    /// Position of the point in full enumeration order
    pub flat_index: usize,
    /// Identifies the runs that differ only in the skip axis
    pub series_index: usize,
    /// Total workers: producers plus consumers
    pub num_jobs: usize,
    pub num_producers: usize,
    pub num_consumer_groups: usize,
    pub consumer_group_size: usize,
    pub cluster_throughput_mb_per_sec: f64,
    /// Bytes per second per producer, or -1 when unthrottled
    pub producer_throughput_byte: i64,
    /// Records per second per producer, or -1 when unthrottled
    pub records_per_sec: i64,
    pub num_records_producer: i64,
    pub num_records_consumer: i64,
    pub record_size_byte: i64,
    pub num_partitions: i64,
    pub replication_factor: i64,
    pub duration_sec: i64,
    pub producer_props: String,
    pub consumer_props: String,
    pub topic_name: String,
    pub depletion_topic_name: String,
}

impl RunParameters {
    /// Number of consumer workers across all groups.
    pub fn consumer_workers(&self) -> usize {
        self.num_consumer_groups * self.consumer_group_size
    }

    /// Derive the burst-job parameters used to deplete credits ahead of this run.
    pub fn for_depletion(&self, config: &DepletionConfiguration) -> RunParameters {
        RunParameters {
            duration_sec: config.timeout_secs() as i64,
            records_per_sec: UNTHROTTLED,
            producer_throughput_byte: UNTHROTTLED,
            num_records_producer: UNBOUNDED_RECORDS,
            num_records_consumer: 0,
            num_jobs: self.num_producers,
            ..self.clone()
        }
    }
}

/// Prefix shared by every topic the sweep creates.
pub fn test_prefix(test_id: u32) -> String {
    format!("test-{test_id}-")
}

/// Replace characters that are not valid in a topic name.
pub fn sanitize_topic_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect()
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Structured values may be wrapped in a one-element list.
fn unwrap_single(value: &Value) -> &Value {
    match value {
        Value::Array(items) if items.len() == 1 => &items[0],
        other => other,
    }
}

fn required<'a>(combination: &'a AxisCombination, name: &str) -> Result<&'a Value> {
    combination
        .get(name)
        .map(unwrap_single)
        .ok_or_else(|| SweepError::Config(format!("missing required parameter '{name}'")))
}

fn as_i64(value: &Value, name: &str) -> Result<i64> {
    value.as_i64().ok_or_else(|| {
        SweepError::Config(format!("parameter '{name}' must be an integer, got {value}"))
    })
}

fn as_count(value: &Value, name: &str) -> Result<usize> {
    value
        .as_u64()
        .map(|v| v as usize)
        .ok_or_else(|| {
            SweepError::Config(format!(
                "parameter '{name}' must be a non-negative integer, got {value}"
            ))
        })
}

fn records_for(bytes_per_sec: i64, duration_sec: i64, record_size_byte: i64) -> Result<i64> {
    bytes_per_sec
        .checked_mul(duration_sec)
        .map(|bytes| bytes / record_size_byte)
        .ok_or_else(|| {
            SweepError::Config(format!(
                "record count overflows for {bytes_per_sec} bytes/sec over {duration_sec} s"
            ))
        })
}

fn field<'a>(record: &'a Value, axis: &str, field: &str) -> Result<&'a Value> {
    record.get(field).ok_or_else(|| {
        SweepError::Config(format!("parameter '{axis}' is missing field '{field}'"))
    })
}

fn string_field(record: &Value, axis: &str, name: &str) -> Result<String> {
    match field(record, axis, name)? {
        Value::String(s) => Ok(s.clone()),
        Value::Null => Ok(String::new()),
        other => Err(SweepError::Config(format!(
            "field '{name}' of '{axis}' must be a string, got {other}"
        ))),
    }
}

/// Derive run parameters for one combination.
pub fn derive_run_parameters(
    combination: &AxisCombination,
    flat_index: usize,
    series_index: usize,
    test_id: u32,
) -> Result<RunParameters> {
    let throughput_value = required(combination, "cluster_throughput_mb_per_sec")?;
    let throughput = throughput_value.as_f64().ok_or_else(|| {
        SweepError::Config(format!(
            "parameter 'cluster_throughput_mb_per_sec' must be a number, got {throughput_value}"
        ))
    })?;

    let num_producers = as_count(required(combination, "num_producers")?, "num_producers")?;
    if num_producers == 0 {
        return Err(SweepError::Config(
            "parameter 'num_producers' must be at least 1".to_string(),
        ));
    }

    let groups = required(combination, "consumer_groups")?;
    let num_consumer_groups = as_count(
        field(groups, "consumer_groups", "num_groups")?,
        "consumer_groups.num_groups",
    )?;
    let consumer_group_size = as_count(
        field(groups, "consumer_groups", "size")?,
        "consumer_groups.size",
    )?;

    let client_props = required(combination, "client_props")?;
    let producer_props = string_field(client_props, "client_props", "producer")?;
    let consumer_props = string_field(client_props, "client_props", "consumer")?;

    let record_size_byte = as_i64(
        required(combination, "record_size_byte")?,
        "record_size_byte",
    )?;
    if record_size_byte <= 0 {
        return Err(SweepError::Config(format!(
            "parameter 'record_size_byte' must be positive, got {record_size_byte}"
        )));
    }
    let num_partitions = as_i64(required(combination, "num_partitions")?, "num_partitions")?;
    let replication_factor = as_i64(
        required(combination, "replication_factor")?,
        "replication_factor",
    )?;
    let duration_sec = as_i64(required(combination, "duration_sec")?, "duration_sec")?;

    let (producer_throughput_byte, records_per_sec, num_records_producer, num_records_consumer) =
        if throughput > 0.0 {
            let cluster_bytes = (throughput * BYTES_PER_MB as f64).floor() as i64;
            let producer_bytes = cluster_bytes / num_producers as i64;
            let consumer_bytes = if consumer_group_size > 0 {
                cluster_bytes / consumer_group_size as i64
            } else {
                0
            };
            (
                producer_bytes,
                (producer_bytes / record_size_byte).max(1),
                records_for(producer_bytes, duration_sec, record_size_byte)?,
                records_for(consumer_bytes, duration_sec, record_size_byte)?,
            )
        } else {
            (UNTHROTTLED, UNTHROTTLED, UNBOUNDED_RECORDS, UNBOUNDED_RECORDS)
        };

    let num_jobs = num_consumer_groups
        .checked_mul(consumer_group_size)
        .and_then(|consumers| consumers.checked_add(num_producers))
        .ok_or_else(|| {
            SweepError::Config(format!(
                "worker count overflows: {num_producers} producers plus {num_consumer_groups} groups of {consumer_group_size}"
            ))
        })?;

    let topic_name = sanitize_topic_name(&format!(
        "{}run-{flat_index}-t{}-p{num_producers}-part{num_partitions}-s{record_size_byte}-r{replication_factor}-d{duration_sec}-cg{num_consumer_groups}-cs{consumer_group_size}",
        test_prefix(test_id),
        format_number(throughput),
    ));
    let depletion_topic_name =
        sanitize_topic_name(&format!("{}run-{flat_index}-depl", test_prefix(test_id)));

    Ok(RunParameters {
        test_id,
        flat_index,
        series_index,
        num_jobs,
        num_producers,
        num_consumer_groups,
        consumer_group_size,
        cluster_throughput_mb_per_sec: throughput,
        producer_throughput_byte,
        records_per_sec,
        num_records_producer,
        num_records_consumer,
        record_size_byte,
        num_partitions,
        replication_factor,
        duration_sec,
        producer_props,
        consumer_props,
        topic_name,
        depletion_topic_name,
    })
}
