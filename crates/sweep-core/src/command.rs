//! Command selectors understood by the job execution facade.

use crate::error::SweepError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FacadeCommand {
    CreateTopics,
    DeleteTopics,
    DepleteCredits,
    RunPerformanceTest,
}

impl FacadeCommand {
    pub const ALL: [FacadeCommand; 4] = [
        FacadeCommand::CreateTopics,
        FacadeCommand::DeleteTopics,
        FacadeCommand::DepleteCredits,
        FacadeCommand::RunPerformanceTest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FacadeCommand::CreateTopics => "create-topics",
            FacadeCommand::DeleteTopics => "delete-topics",
            FacadeCommand::DepleteCredits => "deplete-credits",
            FacadeCommand::RunPerformanceTest => "run-performance-test",
        }
    }
}

impl std::fmt::Display for FacadeCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FacadeCommand {
    type Err = SweepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FacadeCommand::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| SweepError::UnknownCommand(s.to_string()))
    }
}
