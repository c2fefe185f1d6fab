//! Declarative test specification and axis combinations.
//!
//! A specification is loaded from YAML or JSON:
//!
//! ```yaml
//! parameters:
//!   cluster_throughput_mb_per_sec: [12, 24, 36]
//!   consumer_groups:
//!     - { num_groups: 0, size: 0 }
//!     - { num_groups: 1, size: 6 }
//!   num_producers: [6]
//!   client_props:
//!     - { producer: "acks=all", consumer: "" }
//!   num_partitions: [36]
//!   record_size_byte: [1024]
//!   replication_factor: [3]
//!   duration_sec: [3600]
//! skip_remaining_throughput:
//!   less-than: [sent_div_requested_mb_per_sec, 0.995]
//! ```
//!
//! Every list under `parameters` is one axis. Declaration order matters: the
//! first axis varies fastest.

use crate::error::{Result, SweepError};
use crate::iterator::SweepState;
use crate::stop::StopCondition;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// A single candidate value of an axis: a scalar or a structured record.
pub type AxisValue = Value;

/// One sweep dimension with its ordered candidate values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisSpec {
    pub name: String,
    pub values: Vec<AxisValue>,
}

impl AxisSpec {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Throughput threshold used by the depletion controller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub mb_per_sec: f64,
}

/// Burst-credit depletion settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepletionConfiguration {
    /// Ingress level that must be exceeded before depletion is armed
    pub upper_threshold: Threshold,
    /// Ingress level below which credits count as depleted
    pub lower_threshold: Threshold,
    /// Run-time budget of the burst job
    pub approximate_timeout_hours: f64,
    /// Deplete before every sweep point rather than once per series
    #[serde(default)]
    pub every_run: bool,
}

impl DepletionConfiguration {
    fn validate(&self) -> Result<()> {
        let upper = self.upper_threshold.mb_per_sec;
        let lower = self.lower_threshold.mb_per_sec;

        if !upper.is_finite() || !lower.is_finite() || upper < 0.0 || lower < 0.0 {
            return Err(SweepError::Config(format!(
                "depletion thresholds must be finite and non-negative (upper={upper}, lower={lower})"
            )));
        }
        if lower >= upper {
            return Err(SweepError::Config(format!(
                "depletion lower threshold ({lower}) must be below upper threshold ({upper})"
            )));
        }
        if !self.approximate_timeout_hours.is_finite() || self.approximate_timeout_hours <= 0.0 {
            return Err(SweepError::Config(format!(
                "approximate_timeout_hours must be positive, got {}",
                self.approximate_timeout_hours
            )));
        }
        Ok(())
    }

    /// Burst job duration in whole seconds.
    pub fn timeout_secs(&self) -> u64 {
        (self.approximate_timeout_hours * 3600.0).ceil() as u64
    }
}

/// Raw document layout, before validation.
#[derive(Debug, Deserialize)]
struct RawSpecification {
    parameters: serde_json::Map<String, Value>,
    #[serde(default)]
    skip_remaining_throughput: Option<Value>,
    #[serde(default)]
    skip_axis: Option<String>,
    #[serde(default)]
    depletion_configuration: Option<DepletionConfiguration>,
}

/// Validated test specification.
#[derive(Debug, Clone)]
pub struct TestSpecification {
    axes: Vec<AxisSpec>,
    stop_condition: Option<StopCondition>,
    depletion: Option<DepletionConfiguration>,
    skip_axis: usize,
}

impl TestSpecification {
    /// Load a specification from a file. `.json` is parsed as JSON, `.yaml`/`.yml`
    /// as YAML; anything else is tried as JSON first.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&content),
            Some("yaml") | Some("yml") => Self::from_yaml(&content),
            _ => Self::from_json(&content).or_else(|_| Self::from_yaml(&content)),
        }
    }

    /// Parse a specification from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let raw: RawSpecification = serde_yaml::from_str(yaml)?;
        Self::from_raw(raw)
    }

    /// Parse a specification from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawSpecification = serde_json::from_str(json)?;
        Self::from_raw(raw)
    }

    /// Build a specification directly from axes.
    pub fn new(
        axes: Vec<AxisSpec>,
        stop_condition: Option<StopCondition>,
        depletion: Option<DepletionConfiguration>,
    ) -> Result<Self> {
        Self::validate_axes(&axes)?;
        if let Some(depletion) = &depletion {
            depletion.validate()?;
        }
        Ok(Self {
            axes,
            stop_condition,
            depletion,
            skip_axis: 0,
        })
    }

    fn from_raw(raw: RawSpecification) -> Result<Self> {
        let mut axes = Vec::with_capacity(raw.parameters.len());
        for (name, value) in raw.parameters {
            match value {
                Value::Array(values) => axes.push(AxisSpec { name, values }),
                other => {
                    return Err(SweepError::Config(format!(
                        "parameter '{name}' must be a list of values, got {other}"
                    )))
                }
            }
        }

        let stop_condition = raw
            .skip_remaining_throughput
            .as_ref()
            .map(StopCondition::from_value)
            .transpose()?;

        let mut spec = Self::new(axes, stop_condition, raw.depletion_configuration)?;
        if let Some(name) = raw.skip_axis {
            spec = spec.with_skip_axis(&name)?;
        }
        Ok(spec)
    }

    fn validate_axes(axes: &[AxisSpec]) -> Result<()> {
        if axes.is_empty() {
            return Err(SweepError::Config(
                "specification declares no parameters".to_string(),
            ));
        }
        for (i, axis) in axes.iter().enumerate() {
            if axis.is_empty() {
                return Err(SweepError::Config(format!(
                    "parameter '{}' has no values",
                    axis.name
                )));
            }
            if axes[..i].iter().any(|a| a.name == axis.name) {
                return Err(SweepError::Config(format!(
                    "parameter '{}' is declared twice",
                    axis.name
                )));
            }
        }
        Ok(())
    }

    /// Select the axis whose remaining values are abandoned when the stop
    /// condition fires.
    pub fn with_skip_axis(mut self, name: &str) -> Result<Self> {
        self.skip_axis = self.axis_index(name).ok_or_else(|| {
            SweepError::Config(format!("skip_axis '{name}' is not a declared parameter"))
        })?;
        Ok(self)
    }

    pub fn axes(&self) -> &[AxisSpec] {
        &self.axes
    }

    pub fn axis(&self, name: &str) -> Option<&AxisSpec> {
        self.axes.iter().find(|a| a.name == name)
    }

    pub fn axis_index(&self, name: &str) -> Option<usize> {
        self.axes.iter().position(|a| a.name == name)
    }

    /// Axis lengths in declaration order.
    pub fn radices(&self) -> Vec<usize> {
        self.axes.iter().map(AxisSpec::len).collect()
    }

    pub fn stop_condition(&self) -> Option<&StopCondition> {
        self.stop_condition.as_ref()
    }

    pub fn depletion(&self) -> Option<&DepletionConfiguration> {
        self.depletion.as_ref()
    }

    /// Index of the axis targeted by `skip`. Defaults to the first-declared axis.
    pub fn skip_axis(&self) -> usize {
        self.skip_axis
    }

    pub fn skip_axis_name(&self) -> &str {
        &self.axes[self.skip_axis].name
    }

    /// Decode a sweep state into one concrete value per axis.
    pub fn decode(&self, state: &SweepState) -> Result<AxisCombination> {
        let digits = state.digits();
        if digits.len() != self.axes.len() {
            return Err(SweepError::Config(format!(
                "sweep state has {} digits but the specification has {} axes",
                digits.len(),
                self.axes.len()
            )));
        }

        let mut entries = Vec::with_capacity(self.axes.len());
        for (axis, &digit) in self.axes.iter().zip(digits) {
            let value = axis.values.get(digit).ok_or_else(|| {
                SweepError::Config(format!(
                    "digit {digit} out of range for parameter '{}' ({} values)",
                    axis.name,
                    axis.len()
                ))
            })?;
            entries.push((axis.name.clone(), value.clone()));
        }
        Ok(AxisCombination { entries })
    }
}

/// One concrete value for every axis, in axis order.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisCombination {
    entries: Vec<(String, AxisValue)>,
}

impl AxisCombination {
    pub fn get(&self, name: &str) -> Option<&AxisValue> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AxisValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render as a JSON object preserving axis order.
    pub fn to_json(&self) -> Value {
        Value::Object(self.entries.iter().cloned().collect())
    }
}

impl std::fmt::Display for AxisCombination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, (name, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}={value}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE_SPEC: &str = r#"
parameters:
  cluster_throughput_mb_per_sec: [12, 24, 36]
  consumer_groups:
    - { num_groups: 0, size: 0 }
    - { num_groups: 1, size: 6 }
  num_producers: [6]
  client_props:
    - { producer: "acks=all", consumer: "" }
  num_partitions: [36]
  record_size_byte: [1024]
  replication_factor: [3]
  duration_sec: [3600]
skip_remaining_throughput:
  less-than: [sent_div_requested_mb_per_sec, 0.995]
depletion_configuration:
  upper_threshold: { mb_per_sec: 185 }
  lower_threshold: { mb_per_sec: 150 }
  approximate_timeout_hours: 1
"#;

    #[test]
    fn test_yaml_preserves_axis_order() {
        let spec = TestSpecification::from_yaml(SAMPLE_SPEC).unwrap();
        let names: Vec<&str> = spec.axes().iter().map(|a| a.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "cluster_throughput_mb_per_sec",
                "consumer_groups",
                "num_producers",
                "client_props",
                "num_partitions",
                "record_size_byte",
                "replication_factor",
                "duration_sec",
            ]
        );
        assert_eq!(spec.radices(), vec![3, 2, 1, 1, 1, 1, 1, 1]);
        assert!(spec.stop_condition().is_some());
        assert_eq!(spec.skip_axis(), 0);
        assert_eq!(spec.skip_axis_name(), "cluster_throughput_mb_per_sec");
    }

    #[test]
    fn test_json_preserves_axis_order() {
        let json = r#"{
            "parameters": {
                "zeta": [1, 2],
                "alpha": ["a"],
                "mid": [true, false, true]
            }
        }"#;
        let spec = TestSpecification::from_json(json).unwrap();
        let names: Vec<&str> = spec.axes().iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
        assert!(spec.stop_condition().is_none());
        assert!(spec.depletion().is_none());
    }

    #[test]
    fn test_depletion_configuration() {
        let spec = TestSpecification::from_yaml(SAMPLE_SPEC).unwrap();
        let depletion = spec.depletion().unwrap();
        assert_eq!(depletion.upper_threshold.mb_per_sec, 185.0);
        assert_eq!(depletion.lower_threshold.mb_per_sec, 150.0);
        assert_eq!(depletion.timeout_secs(), 3600);
        assert!(!depletion.every_run);
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        let yaml = r#"
parameters:
  x: [1]
depletion_configuration:
  upper_threshold: { mb_per_sec: 100 }
  lower_threshold: { mb_per_sec: 150 }
  approximate_timeout_hours: 1
"#;
        let err = TestSpecification::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, SweepError::Config(_)));
    }

    #[test]
    fn test_scalar_parameter_rejected() {
        let err = TestSpecification::from_yaml("parameters:\n  duration_sec: 60\n").unwrap_err();
        assert!(err.to_string().contains("duration_sec"));
    }

    #[test]
    fn test_empty_axis_rejected() {
        let err = TestSpecification::from_yaml("parameters:\n  duration_sec: []\n").unwrap_err();
        assert!(err.to_string().contains("has no values"));
    }

    #[test]
    fn test_no_parameters_rejected() {
        let err = TestSpecification::from_yaml("parameters: {}\n").unwrap_err();
        assert!(matches!(err, SweepError::Config(_)));
    }

    #[test]
    fn test_named_skip_axis() {
        let yaml = "parameters:\n  a: [1, 2]\n  b: [3, 4]\nskip_axis: b\n";
        let spec = TestSpecification::from_yaml(yaml).unwrap();
        assert_eq!(spec.skip_axis(), 1);

        let bad = "parameters:\n  a: [1, 2]\nskip_axis: nope\n";
        assert!(TestSpecification::from_yaml(bad).is_err());
    }

    #[test]
    fn test_decode_combination() {
        let spec = TestSpecification::from_yaml(SAMPLE_SPEC).unwrap();
        let state = SweepState::from_digits(vec![2, 1, 0, 0, 0, 0, 0, 0]);
        let combination = spec.decode(&state).unwrap();

        assert_eq!(combination.len(), 8);
        assert_eq!(
            combination.get("cluster_throughput_mb_per_sec"),
            Some(&serde_json::json!(36))
        );
        assert_eq!(
            combination.get("consumer_groups"),
            Some(&serde_json::json!({"num_groups": 1, "size": 6}))
        );
        assert!(combination.to_string().starts_with("cluster_throughput_mb_per_sec=36, "));
    }

    #[test]
    fn test_decode_rejects_out_of_range_digit() {
        let spec = TestSpecification::from_yaml(SAMPLE_SPEC).unwrap();
        let state = SweepState::from_digits(vec![3, 0, 0, 0, 0, 0, 0, 0]);
        assert!(spec.decode(&state).is_err());

        let short = SweepState::from_digits(vec![0]);
        assert!(spec.decode(&short).is_err());
    }

    #[test]
    fn test_from_file_by_extension() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(SAMPLE_SPEC.as_bytes()).unwrap();

        let spec = TestSpecification::from_file(file.path()).unwrap();
        assert_eq!(spec.axes().len(), 8);
    }
}
