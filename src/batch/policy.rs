//! Batch execution policies.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a batch's transactions are issued and awaited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionPolicy {
    /// One at a time; failures are reported and the batch continues.
    #[default]
    Sequential,
    /// All at once; no ordering, no callbacks.
    Parallel,
    /// One at a time; the first failure ends the batch.
    StopOnFailure,
}

impl ExecutionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionPolicy::Sequential => "sequential",
            ExecutionPolicy::Parallel => "parallel",
            ExecutionPolicy::StopOnFailure => "stop-on-failure",
        }
    }
}

impl fmt::Display for ExecutionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sequential" => Ok(ExecutionPolicy::Sequential),
            "parallel" => Ok(ExecutionPolicy::Parallel),
            "stop-on-failure" => Ok(ExecutionPolicy::StopOnFailure),
            other => Err(format!("Unknown execution policy '{}'", other)),
        }
    }
}
