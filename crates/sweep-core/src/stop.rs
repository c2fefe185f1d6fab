//! Throughput stop condition.
//!
//! Written in the specification as a single-key comparator object:
//!
//! ```yaml
//! skip_remaining_throughput:
//!   less-than: [sent_div_requested_mb_per_sec, 0.995]
//! ```
//!
//! When the condition holds for a finished run, the remaining values of the
//! skip axis are abandoned for the current setting of all other axes.

use crate::error::{Result, SweepError};
use crate::results::RunResult;
use serde_json::Value;
use tracing::info;

/// Comparison operator of a stop condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    LessThan,
    GreaterThan,
}

impl Comparator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Comparator::LessThan => "less-than",
            Comparator::GreaterThan => "greater-than",
        }
    }

    fn apply(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            Comparator::LessThan => lhs < rhs,
            Comparator::GreaterThan => lhs > rhs,
        }
    }
}

impl std::str::FromStr for Comparator {
    type Err = SweepError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "less-than" => Ok(Comparator::LessThan),
            "greater-than" => Ok(Comparator::GreaterThan),
            _ => Err(SweepError::Config(format!(
                "unknown stop condition operator: {s}"
            ))),
        }
    }
}

/// Metric derived from a run result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKey {
    /// Measured producer throughput divided by requested cluster throughput.
    SentDivRequestedMbPerSec,
}

impl MetricKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKey::SentDivRequestedMbPerSec => "sent_div_requested_mb_per_sec",
        }
    }

    fn value(&self, result: &RunResult) -> f64 {
        match self {
            MetricKey::SentDivRequestedMbPerSec => result.sent_div_requested_mb_per_sec(),
        }
    }
}

impl std::str::FromStr for MetricKey {
    type Err = SweepError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sent_div_requested_mb_per_sec" => Ok(MetricKey::SentDivRequestedMbPerSec),
            _ => Err(SweepError::Config(format!(
                "unknown stop condition metric: {s}"
            ))),
        }
    }
}

/// One side of a comparison.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operand {
    Metric(MetricKey),
    Literal(f64),
}

impl Operand {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::String(key) => Ok(Operand::Metric(key.parse()?)),
            Value::Number(n) => n.as_f64().map(Operand::Literal).ok_or_else(|| {
                SweepError::Config(format!("stop condition literal out of range: {n}"))
            }),
            other => Err(SweepError::Config(format!(
                "stop condition operand must be a metric name or a number, got {other}"
            ))),
        }
    }

    fn value(&self, result: &RunResult) -> f64 {
        match self {
            Operand::Metric(key) => key.value(result),
            Operand::Literal(v) => *v,
        }
    }
}

impl std::fmt::Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::Metric(key) => f.write_str(key.as_str()),
            Operand::Literal(v) => write!(f, "{v}"),
        }
    }
}

/// A configured stop condition.
#[derive(Debug, Clone, PartialEq)]
pub struct StopCondition {
    pub comparator: Comparator,
    pub lhs: Operand,
    pub rhs: Operand,
}

impl StopCondition {
    /// `metric < threshold`
    pub fn less_than(metric: MetricKey, threshold: f64) -> Self {
        Self {
            comparator: Comparator::LessThan,
            lhs: Operand::Metric(metric),
            rhs: Operand::Literal(threshold),
        }
    }

    /// Parse `{ "<operator>": [lhs, rhs] }`.
    pub fn from_value(value: &Value) -> Result<Self> {
        let object = value.as_object().ok_or_else(|| {
            SweepError::Config(format!(
                "stop condition must be an object like {{\"less-than\": [metric, threshold]}}, got {value}"
            ))
        })?;

        let mut entries = object.iter();
        let (operator, args) = match (entries.next(), entries.next()) {
            (Some(entry), None) => entry,
            _ => {
                return Err(SweepError::Config(format!(
                    "stop condition must have exactly one operator, got {value}"
                )))
            }
        };

        let comparator: Comparator = operator.parse()?;
        let args = match args.as_array() {
            Some(args) if args.len() == 2 => args,
            _ => {
                return Err(SweepError::Config(format!(
                    "'{operator}' takes exactly two operands, got {args}"
                )))
            }
        };

        Ok(Self {
            comparator,
            lhs: Operand::from_value(&args[0])?,
            rhs: Operand::from_value(&args[1])?,
        })
    }

    /// Whether the condition holds for a finished run.
    pub fn is_met(&self, result: &RunResult) -> bool {
        let lhs = self.lhs.value(result);
        let rhs = self.rhs.value(result);
        let met = self.comparator.apply(lhs, rhs);
        info!(
            "Stop condition {} {} {}: {:.4} vs {:.4} -> {}",
            self.lhs,
            self.comparator.as_str(),
            self.rhs,
            lhs,
            rhs,
            met
        );
        met
    }
}

/// What the sweep iterator should do after a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Advance,
    /// Abandon the remaining values of the skip axis.
    SkipAxis,
}

/// Evaluate the configured condition, if any, against a finished run.
pub fn evaluate(condition: Option<&StopCondition>, result: &RunResult) -> Decision {
    match condition {
        Some(condition) if condition.is_met(result) => Decision::SkipAxis,
        _ => Decision::Advance,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn result_with(requested: f64, sent: f64) -> RunResult {
        RunResult {
            requested_mb_per_sec: requested,
            sent_mb_per_sec: sent,
            ..RunResult::default()
        }
    }

    fn documented_condition() -> StopCondition {
        StopCondition::from_value(&json!({
            "less-than": ["sent_div_requested_mb_per_sec", 0.995]
        }))
        .unwrap()
    }

    #[test]
    fn test_parse_less_than() {
        let condition = documented_condition();
        assert_eq!(
            condition,
            StopCondition::less_than(MetricKey::SentDivRequestedMbPerSec, 0.995)
        );
    }

    #[test]
    fn test_ratio_below_threshold_skips() {
        let condition = documented_condition();
        let result = result_with(156.0, 154.0);
        assert!(condition.is_met(&result));
        assert_eq!(evaluate(Some(&condition), &result), Decision::SkipAxis);
    }

    #[test]
    fn test_ratio_at_or_above_threshold_advances() {
        let condition = documented_condition();
        let result = result_with(156.0, 155.3);
        assert!(!condition.is_met(&result));
        assert_eq!(evaluate(Some(&condition), &result), Decision::Advance);
    }

    #[test]
    fn test_no_condition_always_advances() {
        let result = result_with(156.0, 1.0);
        assert_eq!(evaluate(None, &result), Decision::Advance);
    }

    #[test]
    fn test_greater_than_with_literal_first() {
        let condition = StopCondition::from_value(&json!({
            "greater-than": [0.995, "sent_div_requested_mb_per_sec"]
        }))
        .unwrap();
        assert!(condition.is_met(&result_with(156.0, 154.0)));
        assert!(!condition.is_met(&result_with(156.0, 156.0)));
    }

    #[test]
    fn test_zero_requested_treated_as_one() {
        let condition = documented_condition();
        assert!(!condition.is_met(&result_with(0.0, 1.0)));
    }

    #[test]
    fn test_no_throughput_data_skips() {
        let condition = documented_condition();
        assert!(condition.is_met(&result_with(156.0, 0.0)));
    }

    #[test]
    fn test_invalid_conditions_rejected() {
        let cases = [
            json!("less-than"),
            json!({"equals": ["sent_div_requested_mb_per_sec", 1]}),
            json!({"less-than": ["sent_div_requested_mb_per_sec"]}),
            json!({"less-than": ["p99_latency", 1]}),
            json!({"less-than": ["sent_div_requested_mb_per_sec", true]}),
            json!({"less-than": ["sent_div_requested_mb_per_sec", 1], "greater-than": [1, 2]}),
        ];
        for case in cases {
            assert!(
                StopCondition::from_value(&case).is_err(),
                "expected rejection of {case}"
            );
        }
    }
}
