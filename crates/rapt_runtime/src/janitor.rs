//! Orphaned blob sweep.
//!
//! A blob is orphaned when its job label names a job that no longer exists.
//! Blobs adopted by a job are normally collected with it; the sweep catches
//! the ones left behind by interrupted runs. Blobs younger than the minimum
//! age are left alone: a run between upload and job creation looks exactly
//! like an orphan.

use crate::platform::{BlobRecord, Platform};
use chrono::{DateTime, Utc};
use rapt_core::{BlobName, PlatformResult};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Outcome of a sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Managed blobs inspected
    pub inspected: usize,
    /// Blobs skipped because they are younger than the minimum age
    pub recent: usize,
    /// Blobs deleted
    pub deleted: Vec<BlobName>,
    /// Blobs that could not be deleted, with the reason
    pub failed: Vec<(BlobName, String)>,
}

/// Delete managed blobs whose job is gone
///
/// Only blobs created at least `min_age` ago are considered; a blob without a
/// creation timestamp is never deleted. With `dry_run` nothing is deleted;
/// `deleted` lists what would be.
///
/// # Errors
///
/// Returns the platform error if listing blobs or reading a job fails.
/// Individual delete failures are collected in the report.
pub async fn sweep_orphans(
    platform: &dyn Platform,
    min_age: Duration,
    dry_run: bool,
) -> PlatformResult<SweepReport> {
    let cutoff = chrono::Duration::from_std(min_age)
        .ok()
        .and_then(|age| Utc::now().checked_sub_signed(age));
    let blobs = platform.list_blobs().await?;
    let mut report = SweepReport {
        inspected: blobs.len(),
        ..SweepReport::default()
    };
    let mut job_exists = HashMap::new();

    for blob in blobs {
        if !old_enough(&blob, cutoff) {
            debug!(blob = %blob.name, created = ?blob.created, "Blob too recent, skipping");
            report.recent += 1;
            continue;
        }
        let Some(job) = blob.job else {
            debug!(blob = %blob.name, "Blob has no job label, skipping");
            continue;
        };
        let exists = match job_exists.get(&job) {
            Some(exists) => *exists,
            None => {
                let exists = match platform.get_job(&job).await {
                    Ok(_) => true,
                    Err(err) if err.is_not_found() => false,
                    Err(err) => return Err(err),
                };
                job_exists.insert(job.clone(), exists);
                exists
            }
        };
        if exists {
            continue;
        }

        if dry_run {
            report.deleted.push(blob.name);
            continue;
        }
        match platform.delete_blob(&blob.name).await {
            Ok(()) => {
                info!(blob = %blob.name, job = %job, "Deleted orphaned blob");
                report.deleted.push(blob.name);
            }
            Err(err) => {
                warn!(blob = %blob.name, error = %err, "Failed to delete orphaned blob");
                report.failed.push((blob.name, err.to_string()));
            }
        }
    }
    Ok(report)
}

fn old_enough(blob: &BlobRecord, cutoff: Option<DateTime<Utc>>) -> bool {
    matches!((blob.created, cutoff), (Some(created), Some(cutoff)) if created <= cutoff)
}
