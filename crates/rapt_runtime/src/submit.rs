//! Job submission.

use crate::assemble::JobSpec;
use crate::error::{RunError, RunResult};
use crate::platform::{JobRecord, Platform};
use tracing::{debug, info};

/// Create the job on the platform
///
/// Never retried: a second attempt with the same name would collide.
///
/// # Errors
///
/// Returns [`RunError::Submission`] wrapping the platform's cause
pub async fn submit_job(platform: &dyn Platform, spec: &JobSpec) -> RunResult<JobRecord> {
    debug!(job = %spec.name, image = %spec.image, args = ?spec.args, "Submitting job");
    let record = platform
        .create_job(spec)
        .await
        .map_err(|source| RunError::Submission {
            tool: spec.tool.clone(),
            job: spec.name.clone(),
            source,
        })?;
    info!(job = %record.handle, state = %record.state(), "Job created");
    Ok(record)
}
