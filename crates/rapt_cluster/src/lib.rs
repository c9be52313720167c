//! rapt Cluster
//!
//! Kubernetes implementation of the runtime's platform seam: tool custom
//! resources, Jobs, ConfigMap mount blobs, resumable watches and pod logs.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod convert;
pub mod platform;
pub mod watch;

pub use convert::{CONTENT_KEY, job_manifest, platform_error};
pub use platform::KubePlatform;
pub use watch::{WATCH_TIMEOUT_SECS, job_events};
