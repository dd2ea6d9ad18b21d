//! The result every solver in the chain reports

use crate::station::{station_channels, Assignment};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::time::Duration;

/// Outcome of a solve attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SatResult {
    Sat,
    Unsat,
    Timeout,
    Crashed,
}

impl SatResult {
    /// SAT and UNSAT settle an instance; TIMEOUT and CRASHED do not
    pub fn is_conclusive(self) -> bool {
        matches!(self, SatResult::Sat | SatResult::Unsat)
    }
}

impl fmt::Display for SatResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SatResult::Sat => "SAT",
            SatResult::Unsat => "UNSAT",
            SatResult::Timeout => "TIMEOUT",
            SatResult::Crashed => "CRASHED",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolverResult {
    pub result: SatResult,
    #[serde(rename = "runtime_seconds", with = "seconds")]
    pub runtime: Duration,
    /// Non-empty only for SAT
    pub assignment: Assignment,
    /// What proved the result when it did not come from search, e.g. a cache entry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub justification: Option<String>,
}

impl SolverResult {
    pub fn new(result: SatResult, runtime: Duration) -> Self {
        Self {
            result,
            runtime,
            assignment: Assignment::new(),
            justification: None,
        }
    }

    pub fn sat(assignment: Assignment, runtime: Duration) -> Self {
        Self {
            result: SatResult::Sat,
            runtime,
            assignment,
            justification: None,
        }
    }

    pub fn unsat(runtime: Duration) -> Self {
        Self::new(SatResult::Unsat, runtime)
    }

    pub fn timeout(runtime: Duration) -> Self {
        Self::new(SatResult::Timeout, runtime)
    }

    pub fn crashed(runtime: Duration) -> Self {
        Self::new(SatResult::Crashed, runtime)
    }

    pub fn with_justification<S: Into<String>>(mut self, justification: S) -> Self {
        self.justification = Some(justification.into());
        self
    }

    /// Charge extra time to this result
    pub fn add_time(mut self, time: Duration) -> Self {
        self.runtime += time;
        self
    }

    pub fn is_conclusive(&self) -> bool {
        self.result.is_conclusive()
    }
}

impl fmt::Display for SolverResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in {:.3}s", self.result, self.runtime.as_secs_f64())?;
        if let Some(justification) = &self.justification {
            write!(f, " ({})", justification)?;
        }
        if self.result == SatResult::Sat {
            let packed = station_channels(&self.assignment).len();
            write!(f, ", {} stations packed", packed)?;
        }
        Ok(())
    }
}

/// Durations as fractional seconds
mod seconds {
    use super::*;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
