//! Run history for a tool.

use crate::platform::JobRecord;
use crate::state::JobState;
use chrono::{DateTime, Utc};
use rapt_core::{JobName, format_elapsed};
use serde::Serialize;

/// One previous run of a tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Job name
    pub job: JobName,
    /// Current state
    pub state: JobState,
    /// Creation time
    pub created: Option<DateTime<Utc>>,
    /// Completion time
    pub completed: Option<DateTime<Utc>>,
}

impl RunSummary {
    /// Build from a job record
    #[must_use]
    pub fn from_record(record: &JobRecord) -> Self {
        Self {
            job: record.handle.name.clone(),
            state: record.state(),
            created: record.created,
            completed: record.completed,
        }
    }

    /// Wall time from creation to completion, for finished runs
    #[must_use]
    pub fn duration(&self) -> Option<chrono::Duration> {
        match (self.created, self.completed) {
            (Some(created), Some(completed)) => Some(completed - created),
            _ => None,
        }
    }

    /// Duration formatted for display, empty while unfinished
    #[must_use]
    pub fn duration_display(&self) -> String {
        self.duration().map(format_elapsed).unwrap_or_default()
    }
}

/// Summaries sorted newest first
///
/// Runs without a creation time sort last; ties break on job name so the
/// order is stable.
#[must_use]
pub fn summarize(records: &[JobRecord]) -> Vec<RunSummary> {
    let mut runs: Vec<RunSummary> = records.iter().map(RunSummary::from_record).collect();
    runs.sort_by(|a, b| b.created.cmp(&a.created).then_with(|| b.job.cmp(&a.job)));
    runs
}
