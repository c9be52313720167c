//! rapt Core Types
//!
//! This crate contains pure types and logic with no I/O.
//! Names, handles and configuration shared by every other rapt crate.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod id;
pub mod labels;
pub mod time;

// Re-exports
pub use config::EngineConfig;
pub use error::{PlatformError, PlatformResult};
pub use id::{BlobName, JobHandle, JobName, volume_name};
pub use time::{SubmissionStamp, format_elapsed};
