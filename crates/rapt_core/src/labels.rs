//! Label keys and selectors shared by jobs, blobs and pods.

use crate::id::JobName;

/// Label marking objects created by rapt
pub const MANAGED_BY: &str = "rapt.dev/managed-by";

/// Value of [`MANAGED_BY`]
pub const MANAGER: &str = "rapt";

/// Label naming the tool a job runs
pub const TOOL: &str = "rapt.dev/tool";

/// Label naming the job a blob belongs to
pub const JOB: &str = "rapt.dev/job";

/// Label the job controller puts on pods it creates
pub const JOB_NAME: &str = "job-name";

/// Selector for pods backing a job
#[must_use]
pub fn pods_of(job: &JobName) -> String {
    format!("{}={}", JOB_NAME, job)
}

/// Selector for jobs running a tool
#[must_use]
pub fn runs_of(tool: &str) -> String {
    format!("{}={}", TOOL, tool)
}

/// Selector for every rapt-managed object
#[must_use]
pub fn managed() -> String {
    format!("{}={}", MANAGED_BY, MANAGER)
}

/// Field selector matching one object by name
#[must_use]
pub fn named(name: &str) -> String {
    format!("metadata.name={}", name)
}
