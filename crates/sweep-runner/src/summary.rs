//! End-of-sweep summary.

use chrono::{DateTime, Utc};
use comfy_table::{presets::UTF8_FULL, Cell, Color, Table};
use serde::Serialize;
use sweep_core::RunResult;

/// Where the stop condition cut a phase short.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkipRecord {
    pub flat_index: usize,
    pub series_index: usize,
    pub ratio: f64,
    /// Combinations of the phase that were never run
    pub elided: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepSummary {
    pub test_id: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub total_combinations: usize,
    pub points_run: usize,
    pub points_elided: usize,
    /// Series indices in the order they were entered
    pub phases: Vec<usize>,
    pub depletions: usize,
    pub skipped_at: Vec<SkipRecord>,
    pub results: Vec<RunResult>,
}

impl SweepSummary {
    pub fn new(test_id: u32, total_combinations: usize) -> Self {
        Self {
            test_id,
            started_at: Some(Utc::now()),
            total_combinations,
            ..Self::default()
        }
    }

    pub fn complete(&mut self) {
        self.completed_at = Some(Utc::now());
    }

    pub fn duration_secs(&self) -> Option<f64> {
        let (start, end) = (self.started_at?, self.completed_at?);
        Some((end - start).num_milliseconds() as f64 / 1000.0)
    }

    pub fn record(&mut self, result: RunResult) {
        if self.phases.last() != Some(&result.series_index) {
            self.phases.push(result.series_index);
        }
        self.points_run += 1;
        self.results.push(result);
    }

    pub fn record_skip(&mut self, skip: SkipRecord) {
        self.points_elided += skip.elided;
        self.skipped_at.push(skip);
    }

    /// Combinations neither run nor elided; non-zero only for an aborted sweep.
    pub fn points_remaining(&self) -> usize {
        self.total_combinations
            .saturating_sub(self.points_run + self.points_elided)
    }
}

/// Render the summary as a table, one row per point.
pub fn format_table(summary: &SweepSummary) -> String {
    let mut output = String::new();

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        "Point",
        "Phase",
        "Requested MB/s",
        "Sent MB/s",
        "Ratio",
        "Avg latency ms",
        "Max latency ms",
        "Workers",
        "Status",
    ]);

    for result in &summary.results {
        let status_cell = if result.workers_failed > 0 {
            Cell::new("FAILED").fg(Color::Red)
        } else if result.skipped_remaining {
            Cell::new("SKIP").fg(Color::Yellow)
        } else {
            Cell::new("OK").fg(Color::Green)
        };

        table.add_row(vec![
            Cell::new(result.flat_index),
            Cell::new(result.series_index),
            Cell::new(format!("{:.1}", result.requested_mb_per_sec)),
            Cell::new(format!("{:.2}", result.sent_mb_per_sec)),
            Cell::new(format!("{:.3}", ratio(result))),
            Cell::new(format!("{:.1}", result.avg_latency_ms)),
            Cell::new(format!("{:.1}", result.max_latency_ms)),
            Cell::new(format!(
                "{}/{}",
                result.workers_succeeded,
                result.workers_succeeded + result.workers_failed
            )),
            status_cell,
        ]);
    }

    output.push_str(&table.to_string());
    output.push_str(&format!(
        "\nTest {}: {} of {} points run, {} elided by skip, {} phases\n",
        summary.test_id,
        summary.points_run,
        summary.total_combinations,
        summary.points_elided,
        summary.phases.len()
    ));
    if let Some(secs) = summary.duration_secs() {
        output.push_str(&format!(
            "Duration: {}, {} depletion phases\n",
            format_duration(secs),
            summary.depletions
        ));
    }

    if !summary.skipped_at.is_empty() {
        output.push_str("\nSkipped:\n");
        for skip in &summary.skipped_at {
            output.push_str(&format!(
                "  point {} (phase {}): ratio {:.3}, {} points elided\n",
                skip.flat_index, skip.series_index, skip.ratio, skip.elided
            ));
        }
    }

    output
}

fn format_duration(secs: f64) -> String {
    if secs < 60.0 {
        format!("{secs:.1}s")
    } else if secs < 3600.0 {
        format!("{}m {:.0}s", (secs / 60.0) as u64, secs % 60.0)
    } else {
        format!("{}h {}m", (secs / 3600.0) as u64, ((secs % 3600.0) / 60.0) as u64)
    }
}

fn ratio(result: &RunResult) -> f64 {
    if result.requested_mb_per_sec > 0.0 {
        result.sent_mb_per_sec / result.requested_mb_per_sec
    } else {
        0.0
    }
}
