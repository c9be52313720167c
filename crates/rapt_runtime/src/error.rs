//! Engine errors.
//!
//! Every variant names the tool or job it concerns, so the terminal message
//! alone is enough to diagnose a failed run.

use rapt_core::{JobName, PlatformError};
use rapt_tool::ToolError;
use std::path::PathBuf;
use std::time::Duration;

/// Result of an engine operation
pub type RunResult<T> = Result<T, RunError>;

/// Engine error
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// Tool resource does not exist
    #[error("tool '{tool}' not found in namespace '{namespace}'")]
    ToolNotFound {
        /// Tool name
        tool: String,
        /// Namespace searched
        namespace: String,
    },

    /// Tool resource is malformed
    #[error(transparent)]
    InvalidTool(#[from] ToolError),

    /// Required argument missing
    #[error("tool '{tool}': required argument '{argument}' not provided")]
    MissingRequiredArgument {
        /// Tool name
        tool: String,
        /// Argument name
        argument: String,
    },

    /// Local file for a mount could not be read
    #[error("failed to read mount {index} source {}: {source}", path.display())]
    MountRead {
        /// Mount index
        index: usize,
        /// Local path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Mount blob could not be created
    #[error("job '{job}': failed to create blob for mount {index}: {source}")]
    MountUpload {
        /// Job name
        job: JobName,
        /// Mount index
        index: usize,
        /// Platform error
        #[source]
        source: PlatformError,
    },

    /// Job creation failed
    #[error("tool '{tool}': failed to submit job '{job}': {source}")]
    Submission {
        /// Tool name
        tool: String,
        /// Job name
        job: JobName,
        /// Platform error
        #[source]
        source: PlatformError,
    },

    /// Deadline expired before a terminal state (the job keeps running)
    #[error("job '{job}' did not finish within {}s (the job keeps running)", after.as_secs())]
    Timeout {
        /// Job name
        job: JobName,
        /// Deadline that expired
        after: Duration,
    },

    /// Event stream failed or ended early; the job's outcome is unknown
    #[error("lost track of job '{job}': {reason}")]
    WatchInterrupted {
        /// Job name
        job: JobName,
        /// What went wrong
        reason: String,
    },

    /// Job reached the Failed state
    #[error("tool '{tool}': job '{job}' failed")]
    JobFailed {
        /// Tool name
        tool: String,
        /// Job name
        job: JobName,
    },

    /// Run was cancelled by the caller
    #[error("observation of job '{job}' cancelled (the job keeps running)")]
    Cancelled {
        /// Job name
        job: JobName,
    },

    /// No readable pod appeared within the poll budget
    #[error("no readable pod for job '{job}' after {attempts} attempts")]
    PodReadinessTimeout {
        /// Job name
        job: JobName,
        /// Polls made
        attempts: u32,
    },

    /// Pod output could not be relayed
    #[error("job '{job}': log stream failed: {reason}")]
    LogStream {
        /// Job name
        job: JobName,
        /// What went wrong
        reason: String,
    },

    /// Any other remote failure
    #[error("{context}: {source}")]
    Platform {
        /// What was being attempted
        context: String,
        /// Platform error
        #[source]
        source: PlatformError,
    },
}

impl RunError {
    /// Wrap a platform error with context
    #[must_use]
    pub fn platform(context: impl Into<String>, source: PlatformError) -> Self {
        Self::Platform {
            context: context.into(),
            source,
        }
    }
}
