//! Job state derived from orchestration counters.

use serde::{Deserialize, Serialize};

/// Pod counters reported on a job's status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCounters {
    /// Pods currently running
    pub active: u32,
    /// Pods that completed successfully
    pub succeeded: u32,
    /// Pods that failed
    pub failed: u32,
}

impl JobCounters {
    /// Counters for a job with one active pod
    #[must_use]
    pub const fn active(n: u32) -> Self {
        Self {
            active: n,
            succeeded: 0,
            failed: 0,
        }
    }

    /// Counters for a job with succeeded pods
    #[must_use]
    pub const fn succeeded(n: u32) -> Self {
        Self {
            active: 0,
            succeeded: n,
            failed: 0,
        }
    }

    /// Counters for a job with failed pods
    #[must_use]
    pub const fn failed(n: u32) -> Self {
        Self {
            active: 0,
            succeeded: 0,
            failed: n,
        }
    }
}

/// Lifecycle state of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobState {
    /// Accepted, no pod running yet
    Pending,
    /// A pod is running
    Running,
    /// Completed successfully (terminal)
    Succeeded,
    /// Failed (terminal)
    Failed,
}

impl JobState {
    /// Derive the state from counters
    ///
    /// Recomputed from scratch on every observation, so duplicate or
    /// reordered events cannot corrupt it.
    #[must_use]
    pub const fn from_counters(counters: &JobCounters) -> Self {
        if counters.succeeded > 0 {
            Self::Succeeded
        } else if counters.failed > 0 {
            Self::Failed
        } else if counters.active > 0 {
            Self::Running
        } else {
            Self::Pending
        }
    }

    /// Check if no further transitions can occur
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl From<JobCounters> for JobState {
    fn from(counters: JobCounters) -> Self {
        Self::from_counters(&counters)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "Pending",
            Self::Running => "Running",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
        };
        f.write_str(s)
    }
}
