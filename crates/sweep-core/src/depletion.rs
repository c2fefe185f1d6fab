//! Two-threshold hysteresis controller for burst-credit depletion.
//!
//! A burst job drives unthrottled load at the cluster. Credits count as
//! depleted once ingress has first risen above the upper threshold and then
//! fallen below the lower one. The controller is a pure transition function;
//! the polling loop lives in the runner.

use crate::spec::DepletionConfiguration;
use serde::{Deserialize, Serialize};

/// Phase of one depletion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DepletionState {
    Idle,
    /// Burst job running, waiting for ingress to exceed the upper threshold
    Bursting,
    /// Upper threshold crossed, waiting for ingress to drop below the lower threshold
    Depleting,
    Done,
    /// Burst job finished before depletion was observed
    Aborted,
}

impl DepletionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DepletionState::Done | DepletionState::Aborted)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DepletionState::Idle => "idle",
            DepletionState::Bursting => "bursting",
            DepletionState::Depleting => "depleting",
            DepletionState::Done => "done",
            DepletionState::Aborted => "aborted",
        }
    }
}

impl std::fmt::Display for DepletionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One poll of the cluster while the burst job runs.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Observation {
    /// Aggregate ingress throughput, if a sample was available
    pub ingress_mb_per_sec: Option<f64>,
    /// All workers of the burst job reached a terminal state
    pub burst_job_finished: bool,
}

impl Observation {
    pub fn sample(ingress_mb_per_sec: f64) -> Self {
        Self {
            ingress_mb_per_sec: Some(ingress_mb_per_sec),
            burst_job_finished: false,
        }
    }

    pub fn finished() -> Self {
        Self {
            ingress_mb_per_sec: None,
            burst_job_finished: true,
        }
    }
}

/// Side effect requested by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepletionAction {
    None,
    StartBurst,
    StopBurst,
}

/// Next state plus the action the caller must perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub next: DepletionState,
    pub action: DepletionAction,
}

impl Transition {
    fn stay(state: DepletionState) -> Self {
        Self {
            next: state,
            action: DepletionAction::None,
        }
    }
}

/// Hysteresis thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepletionController {
    upper_mb_per_sec: f64,
    lower_mb_per_sec: f64,
}

impl DepletionController {
    /// Thresholds are validated when the specification is loaded.
    pub fn new(config: &DepletionConfiguration) -> Self {
        Self {
            upper_mb_per_sec: config.upper_threshold.mb_per_sec,
            lower_mb_per_sec: config.lower_threshold.mb_per_sec,
        }
    }

    pub fn upper(&self) -> f64 {
        self.upper_mb_per_sec
    }

    pub fn lower(&self) -> f64 {
        self.lower_mb_per_sec
    }

    /// Leave `Idle` by launching the burst job.
    pub fn start(&self, state: DepletionState) -> Transition {
        match state {
            DepletionState::Idle => Transition {
                next: DepletionState::Bursting,
                action: DepletionAction::StartBurst,
            },
            other => Transition::stay(other),
        }
    }

    /// Apply one poll result.
    pub fn step(&self, state: DepletionState, observation: Observation) -> Transition {
        if state.is_terminal() {
            return Transition::stay(state);
        }
        if observation.burst_job_finished {
            return Transition::stay(DepletionState::Aborted);
        }
        let Some(ingress) = observation.ingress_mb_per_sec else {
            return Transition::stay(state);
        };

        match state {
            DepletionState::Bursting if ingress > self.upper_mb_per_sec => {
                Transition::stay(DepletionState::Depleting)
            }
            DepletionState::Depleting if ingress < self.lower_mb_per_sec => Transition {
                next: DepletionState::Done,
                action: DepletionAction::StopBurst,
            },
            other => Transition::stay(other),
        }
    }
}
