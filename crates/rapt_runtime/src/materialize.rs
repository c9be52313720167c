//! Mount materialization.
//!
//! Each local file becomes one blob named `<job>-mount-<index>`. Blobs are
//! created in order and the first failure stops the pass; blobs already
//! created are tracked in a [`BlobLedger`] so the caller can roll them back.

use crate::error::{RunError, RunResult};
use crate::platform::{BlobSpec, Platform};
use rapt_core::{BlobName, JobName, volume_name};
use std::path::PathBuf;
use tracing::{debug, warn};

/// A local file to expose inside the container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountSpec {
    /// Local file
    pub source: PathBuf,
    /// Absolute path inside the container
    pub target: String,
}

/// Error parsing a `local:container` mount argument
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MountSpecError {
    /// No `:` separator
    #[error("invalid mount '{0}' (expected local:container)")]
    MissingSeparator(String),
    /// One side is empty
    #[error("invalid mount '{0}' (local and container paths must be non-empty)")]
    EmptyPath(String),
    /// Container path is relative
    #[error("invalid mount '{0}' (container path must be absolute)")]
    RelativeTarget(String),
}

impl MountSpec {
    /// Create a mount spec
    #[must_use]
    pub fn new(source: impl Into<PathBuf>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }

    /// Parse `local:container`
    ///
    /// The split is on the last `:`, so local paths may contain colons.
    ///
    /// # Errors
    ///
    /// Returns [`MountSpecError`] if either side is missing or the container
    /// path is not absolute
    pub fn parse(raw: &str) -> Result<Self, MountSpecError> {
        let (source, target) = raw
            .rsplit_once(':')
            .ok_or_else(|| MountSpecError::MissingSeparator(raw.to_string()))?;
        if source.is_empty() || target.is_empty() {
            return Err(MountSpecError::EmptyPath(raw.to_string()));
        }
        if !target.starts_with('/') {
            return Err(MountSpecError::RelativeTarget(raw.to_string()));
        }
        Ok(Self::new(source, target))
    }
}

impl std::str::FromStr for MountSpec {
    type Err = MountSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A created blob and where it goes in the container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountBinding {
    /// Position in the caller's mount list
    pub index: usize,
    /// Pod volume name
    pub volume: String,
    /// Blob holding the file
    pub blob: BlobName,
    /// Container path
    pub target: String,
}

/// Blobs created for a run that has not produced a job yet
#[derive(Debug, Default)]
pub struct BlobLedger {
    created: Vec<BlobName>,
}

impl BlobLedger {
    /// Create an empty ledger
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a created blob
    pub fn record(&mut self, name: BlobName) {
        self.created.push(name);
    }

    /// Blobs recorded so far, in creation order
    #[must_use]
    pub fn blobs(&self) -> &[BlobName] {
        &self.created
    }

    /// Check if nothing was created
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.created.is_empty()
    }

    /// Delete every recorded blob, newest first
    ///
    /// Best effort: failures are logged and the sweep continues.
    pub async fn rollback(self, platform: &dyn Platform) {
        for name in self.created.into_iter().rev() {
            match platform.delete_blob(&name).await {
                Ok(()) => debug!(blob = %name, "Rolled back mount blob"),
                Err(err) if err.is_not_found() => {}
                Err(err) => warn!(blob = %name, error = %err, "Failed to roll back mount blob"),
            }
        }
    }
}

/// Upload each mount as a blob
///
/// Every created blob is recorded in `ledger` before the next file is read.
///
/// # Errors
///
/// Returns [`RunError::MountRead`] if a file cannot be read, or
/// [`RunError::MountUpload`] if the platform refuses a blob. Blobs for later
/// indices are never created.
pub async fn materialize_mounts(
    platform: &dyn Platform,
    job: &JobName,
    mounts: &[MountSpec],
    ledger: &mut BlobLedger,
) -> RunResult<Vec<MountBinding>> {
    let mut bindings = Vec::with_capacity(mounts.len());
    for (index, mount) in mounts.iter().enumerate() {
        let content = tokio::fs::read(&mount.source)
            .await
            .map_err(|source| RunError::MountRead {
                index,
                path: mount.source.clone(),
                source,
            })?;

        let name = BlobName::for_mount(job, index);
        let spec = BlobSpec {
            name: name.clone(),
            job: job.clone(),
            content,
        };
        platform
            .create_blob(&spec)
            .await
            .map_err(|source| RunError::MountUpload {
                job: job.clone(),
                index,
                source,
            })?;
        debug!(blob = %name, bytes = spec.content.len(), target = %mount.target, "Created mount blob");
        ledger.record(name.clone());

        bindings.push(MountBinding {
            index,
            volume: volume_name(index),
            blob: name,
            target: mount.target.clone(),
        });
    }
    Ok(bindings)
}
