//! Full expansion of a sweep without executing anything.

use crate::error::Result;
use crate::iterator::SweepIterator;
use crate::params::{derive_run_parameters, RunParameters};
use crate::spec::TestSpecification;
use serde::Serialize;
use serde_json::Value;

/// One point of the expanded sweep.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedPoint {
    pub flat_index: usize,
    pub series_index: usize,
    pub combination: Value,
    pub params: RunParameters,
}

/// Every point in enumeration order, as if the stop condition never fired.
pub fn plan_sweep(spec: &TestSpecification, test_id: u32) -> Result<Vec<PlannedPoint>> {
    let sweep = SweepIterator::from_spec(spec)?;
    sweep
        .iter()
        .map(|state| {
            let flat_index = sweep.flat_index(&state);
            let series_index = sweep.series_index(&state, spec.skip_axis());
            let combination = spec.decode(&state)?;
            let params = derive_run_parameters(&combination, flat_index, series_index, test_id)?;
            Ok(PlannedPoint {
                flat_index,
                series_index,
                combination: combination.to_json(),
                params,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_follows_enumeration_order() {
        let spec = TestSpecification::from_yaml(
            r#"
parameters:
  cluster_throughput_mb_per_sec: [8, 16]
  consumer_groups: [{ num_groups: 0, size: 0 }, { num_groups: 1, size: 2 }]
  num_producers: [2]
  client_props: [{ producer: "acks=1", consumer: "" }]
  num_partitions: [6]
  record_size_byte: [1024]
  replication_factor: [3]
  duration_sec: [60]
"#,
        )
        .unwrap();

        let plan = plan_sweep(&spec, 11).unwrap();
        let summary: Vec<(usize, usize, f64)> = plan
            .iter()
            .map(|p| {
                (
                    p.flat_index,
                    p.series_index,
                    p.params.cluster_throughput_mb_per_sec,
                )
            })
            .collect();
        assert_eq!(
            summary,
            vec![(0, 0, 8.0), (1, 0, 16.0), (2, 1, 8.0), (3, 1, 16.0)]
        );
        assert_eq!(plan[3].params.num_jobs, 4);
        assert_eq!(plan[0].combination["cluster_throughput_mb_per_sec"], 8);
    }
}
