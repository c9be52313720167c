//! Orchestration platform seam.
//!
//! Every remote call the engine makes goes through [`Platform`]. A platform
//! value is bound to one namespace when it is constructed.

use crate::assemble::JobSpec;
use crate::state::{JobCounters, JobState};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use rapt_core::{BlobName, JobHandle, JobName, PlatformResult};
use rapt_tool::ToolResource;
use std::pin::Pin;

/// Change events for one job, as counters
pub type JobEvents = BoxStream<'static, PlatformResult<JobCounters>>;

/// Byte stream of a pod's output
pub type LogReader = Pin<Box<dyn futures::io::AsyncRead + Send>>;

/// Content for one mount blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobSpec {
    /// Blob name
    pub name: BlobName,
    /// Job the blob is created for
    pub job: JobName,
    /// File content
    pub content: Vec<u8>,
}

/// A rapt-managed blob found in the namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobRecord {
    /// Blob name
    pub name: BlobName,
    /// Value of the job label, if present
    pub job: Option<JobName>,
    /// Creation timestamp
    pub created: Option<DateTime<Utc>>,
}

/// A job as reported by the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRecord {
    /// Job handle
    pub handle: JobHandle,
    /// Server-assigned UID
    pub uid: Option<String>,
    /// Tool label
    pub tool: Option<String>,
    /// Pod counters
    pub counters: JobCounters,
    /// Creation time
    pub created: Option<DateTime<Utc>>,
    /// Completion time
    pub completed: Option<DateTime<Utc>>,
}

impl JobRecord {
    /// Current state
    #[must_use]
    pub fn state(&self) -> JobState {
        JobState::from_counters(&self.counters)
    }
}

/// Pod phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PodPhase {
    /// Scheduled or pulling images
    Pending,
    /// Containers running
    Running,
    /// All containers exited zero
    Succeeded,
    /// A container exited non-zero
    Failed,
    /// Node lost contact
    Unknown,
}

impl PodPhase {
    /// Parse the phase string reported by the API server
    #[must_use]
    pub fn parse(phase: &str) -> Self {
        match phase {
            "Pending" => Self::Pending,
            "Running" => Self::Running,
            "Succeeded" => Self::Succeeded,
            "Failed" => Self::Failed,
            _ => Self::Unknown,
        }
    }

    /// Check if the pod's output can be read
    #[must_use]
    pub const fn is_readable(&self) -> bool {
        matches!(self, Self::Running | Self::Succeeded | Self::Failed)
    }
}

/// Pod backing a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodInfo {
    /// Pod name
    pub name: String,
    /// Current phase
    pub phase: PodPhase,
}

/// Options for reading pod output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogOptions {
    /// Keep the stream open while the container runs
    pub follow: bool,
    /// Only the last N lines
    pub tail_lines: Option<i64>,
}

impl LogOptions {
    /// Follow mode, full output
    #[must_use]
    pub const fn follow() -> Self {
        Self {
            follow: true,
            tail_lines: None,
        }
    }
}

/// Remote operations the engine needs
#[async_trait]
pub trait Platform: Send + Sync {
    /// Namespace this platform operates in
    fn namespace(&self) -> &str;

    /// Read one tool resource by name
    async fn fetch_tool(&self, name: &str) -> PlatformResult<ToolResource>;

    /// List tool resources
    async fn list_tools(&self) -> PlatformResult<Vec<ToolResource>>;

    /// Create a mount blob
    async fn create_blob(&self, blob: &BlobSpec) -> PlatformResult<()>;

    /// Delete a mount blob
    async fn delete_blob(&self, name: &BlobName) -> PlatformResult<()>;

    /// List every rapt-managed blob
    async fn list_blobs(&self) -> PlatformResult<Vec<BlobRecord>>;

    /// Make blobs owned by a job so they are collected with it
    async fn adopt_blobs(&self, owner: &JobRecord, blobs: &[BlobName]) -> PlatformResult<()>;

    /// Create a job
    async fn create_job(&self, spec: &JobSpec) -> PlatformResult<JobRecord>;

    /// Read one job
    async fn get_job(&self, name: &JobName) -> PlatformResult<JobRecord>;

    /// List jobs started for a tool
    async fn list_jobs(&self, tool: &str) -> PlatformResult<Vec<JobRecord>>;

    /// Subscribe to change events for one job
    async fn watch_job(&self, name: &JobName) -> PlatformResult<JobEvents>;

    /// First pod backing a job, if one exists yet
    async fn find_pod(&self, job: &JobName) -> PlatformResult<Option<PodInfo>>;

    /// Open a pod's output stream
    async fn pod_logs(&self, pod: &str, options: &LogOptions) -> PlatformResult<LogReader>;
}
