//! Time types for rapt.
//!
//! Wall clock time is only used to name jobs and to report durations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Moment a run was submitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubmissionStamp(DateTime<Utc>);

impl SubmissionStamp {
    /// Format used in job names
    pub const SUFFIX_FORMAT: &'static str = "%Y%m%d-%H%M%S";

    /// Current time
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Wrap an explicit time
    #[must_use]
    pub const fn from_datetime(at: DateTime<Utc>) -> Self {
        Self(at)
    }

    /// Get the underlying time
    #[must_use]
    pub const fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// Job name suffix, second resolution
    #[must_use]
    pub fn suffix(&self) -> String {
        self.0.format(Self::SUFFIX_FORMAT).to_string()
    }
}

impl std::fmt::Display for SubmissionStamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d %H:%M:%S"))
    }
}

/// Format an elapsed time the way run listings show it
///
/// `42s`, `3m 7s`, `2h 15m`.
#[must_use]
pub fn format_elapsed(elapsed: chrono::Duration) -> String {
    let total = elapsed.num_seconds().max(0);
    if total < 60 {
        format!("{}s", total)
    } else if total < 3600 {
        format!("{}m {}s", total / 60, total % 60)
    } else {
        format!("{}h {}m", total / 3600, (total % 3600) / 60)
    }
}
