//! Identifiers for rapt objects.
//!
//! Job and blob names are derived, never random: the same tool submitted at
//! the same second yields the same name, and the API server rejects the
//! duplicate instead of rapt silently running it twice.

use crate::time::SubmissionStamp;
use serde::{Deserialize, Serialize};

/// Job name - `<tool>-<YYYYMMDD-HHMMSS>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobName(String);

impl JobName {
    /// Derive the job name for a tool submitted at `stamp`
    #[must_use]
    pub fn derive(tool: &str, stamp: &SubmissionStamp) -> Self {
        Self(format!("{}-{}", tool, stamp.suffix()))
    }

    /// Wrap an existing job name (e.g. one typed by the user)
    #[must_use]
    pub fn from_raw(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get as string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle to a submitted job
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobHandle {
    /// Job name
    pub name: JobName,
    /// Namespace the job lives in
    pub namespace: String,
}

impl JobHandle {
    /// Create a new handle
    #[must_use]
    pub fn new(name: JobName, namespace: impl Into<String>) -> Self {
        Self {
            name,
            namespace: namespace.into(),
        }
    }
}

impl std::fmt::Display for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Name of the ConfigMap holding one mounted file
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobName(String);

impl BlobName {
    /// Blob name for mount `index` of `job` - `<job>-mount-<index>`
    #[must_use]
    pub fn for_mount(job: &JobName, index: usize) -> Self {
        Self(format!("{}-mount-{}", job, index))
    }

    /// Wrap an existing blob name
    #[must_use]
    pub fn from_raw(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get as string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BlobName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pod volume name for mount `index`
#[must_use]
pub fn volume_name(index: usize) -> String {
    format!("mount-{}", index)
}
