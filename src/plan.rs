//! Rendering of `perf-sweep plan` output.

use anyhow::Result;
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, Cell, Table};
use sweep_core::PlannedPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PlanFormat {
    Table,
    Json,
}

pub fn render_plan(points: &[PlannedPoint], format: PlanFormat) -> Result<String> {
    match format {
        PlanFormat::Json => Ok(serde_json::to_string_pretty(points)?),
        PlanFormat::Table => Ok(format_plan_table(points)),
    }
}

fn format_plan_table(points: &[PlannedPoint]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        "Point",
        "Phase",
        "MB/s",
        "Workers",
        "Producers",
        "Consumers",
        "Records/sec",
        "Topic",
    ]);

    for point in points {
        let params = &point.params;
        table.add_row(vec![
            Cell::new(point.flat_index),
            Cell::new(point.series_index),
            Cell::new(params.cluster_throughput_mb_per_sec),
            Cell::new(params.num_jobs),
            Cell::new(params.num_producers),
            Cell::new(params.consumer_workers()),
            Cell::new(params.records_per_sec),
            Cell::new(&params.topic_name),
        ]);
    }

    let phases = points.iter().map(|p| p.series_index).max().map_or(0, |m| m + 1);
    format!("{table}\n{} points in {} phases\n", points.len(), phases)
}
