//! Job assembly.
//!
//! Pure: a tool definition plus the bound inputs of one run become a
//! [`JobSpec`]. The spec is built once and never changed after submission.

use crate::materialize::MountBinding;
use indexmap::IndexMap;
use rapt_core::{JobName, labels};
use rapt_tool::ToolDefinition;
use std::collections::BTreeMap;

/// Name of the single container in every job
pub const CONTAINER_NAME: &str = "tool";

/// Fully resolved job, ready for submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    /// Job name
    pub name: JobName,
    /// Namespace
    pub namespace: String,
    /// Tool the job runs
    pub tool: String,
    /// Container image
    pub image: String,
    /// Container command (`None` = image entrypoint)
    pub command: Option<Vec<String>>,
    /// Positional container args
    pub args: Vec<String>,
    /// Resolved environment
    pub env: IndexMap<String, String>,
    /// Mounted files
    pub mounts: Vec<MountBinding>,
    /// Job labels
    pub labels: BTreeMap<String, String>,
    /// Seconds the finished job is kept
    pub ttl_seconds: i32,
}

/// Inputs of one run after binding and materialization
#[derive(Debug, Clone, Default)]
pub struct AssemblyInput {
    /// Bound positional args
    pub args: Vec<String>,
    /// Caller environment overrides
    pub env: IndexMap<String, String>,
    /// Materialized mounts
    pub mounts: Vec<MountBinding>,
    /// Seconds the finished job is kept
    pub ttl_seconds: i32,
}

/// Build the job for one run
///
/// Base environment first, caller overrides replace values of the same name
/// in place and new names are appended.
#[must_use]
pub fn assemble_job(tool: &ToolDefinition, name: JobName, input: AssemblyInput) -> JobSpec {
    let mut env = tool.env.clone();
    for (key, value) in input.env {
        env.insert(key, value);
    }

    let mut job_labels = BTreeMap::new();
    job_labels.insert(labels::TOOL.to_string(), tool.name.clone());
    job_labels.insert(labels::MANAGED_BY.to_string(), labels::MANAGER.to_string());

    JobSpec {
        name,
        namespace: tool.namespace.clone(),
        tool: tool.name.clone(),
        image: tool.image.clone(),
        command: tool.command.clone(),
        args: input.args,
        env,
        mounts: input.mounts,
        labels: job_labels,
        ttl_seconds: input.ttl_seconds,
    }
}
