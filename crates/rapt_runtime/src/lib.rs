//! rapt Runtime
//!
//! Tool execution engine: binds arguments, materializes mounts, assembles
//! and submits jobs, then watches their lifecycle while relaying output.
//! All remote calls go through the [`Platform`] trait.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod assemble;
pub mod engine;
pub mod error;
pub mod history;
pub mod janitor;
pub mod logs;
pub mod materialize;
pub mod platform;
pub mod state;
pub mod submit;
pub mod watch;

#[cfg(test)]
pub(crate) mod testing;

pub use assemble::{AssemblyInput, CONTAINER_NAME, JobSpec, assemble_job};
pub use engine::{RunObserver, RunOutcome, RunRequest, SilentObserver, ToolRunner};
pub use error::{RunError, RunResult};
pub use history::{RunSummary, summarize};
pub use janitor::{SweepReport, sweep_orphans};
pub use logs::{LogSink, LogStreamer, StreamError};
pub use materialize::{BlobLedger, MountBinding, MountSpec, MountSpecError, materialize_mounts};
pub use platform::{
    BlobRecord, BlobSpec, JobEvents, JobRecord, LogOptions, LogReader, Platform, PodInfo, PodPhase,
};
pub use state::{JobCounters, JobState};
pub use submit::submit_job;
pub use watch::{LifecycleWatcher, WatchError};
