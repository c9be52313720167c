//! Log streaming.
//!
//! Finds the pod backing a job, waits until its output is readable and
//! relays the bytes to a sink. Both steps stop promptly when the token is
//! cancelled.

use crate::platform::{LogOptions, Platform, PodInfo};
use futures::AsyncReadExt;
use rapt_core::{JobName, PlatformError};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Relay buffer size
const CHUNK_SIZE: usize = 8 * 1024;

/// Destination for relayed output
pub type LogSink = Box<dyn AsyncWrite + Send + Unpin>;

/// Log streaming failure
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// No readable pod within the poll budget
    #[error("no readable pod after {attempts} attempts")]
    PodReadinessTimeout {
        /// Polls made
        attempts: u32,
    },
    /// Pod lookup or log request failed
    #[error(transparent)]
    Platform(#[from] PlatformError),
    /// Reading the stream or writing the sink failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Token cancelled while waiting for the pod
    #[error("cancelled")]
    Cancelled,
}

/// Locates a job's pod and relays its output
#[derive(Clone)]
pub struct LogStreamer {
    platform: Arc<dyn Platform>,
    interval: Duration,
    max_attempts: u32,
}

impl LogStreamer {
    /// Create a streamer polling every `interval`, at most `max_attempts` times
    #[must_use]
    pub fn new(platform: Arc<dyn Platform>, interval: Duration, max_attempts: u32) -> Self {
        Self {
            platform,
            interval,
            max_attempts,
        }
    }

    /// Poll until the job's first pod has left Pending
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::PodReadinessTimeout`] when the budget runs out,
    /// [`StreamError::Platform`] if a lookup fails, or
    /// [`StreamError::Cancelled`]
    pub async fn wait_for_pod(
        &self,
        job: &JobName,
        cancel: &CancellationToken,
    ) -> Result<PodInfo, StreamError> {
        for attempt in 1..=self.max_attempts {
            if cancel.is_cancelled() {
                return Err(StreamError::Cancelled);
            }
            match self.platform.find_pod(job).await? {
                Some(pod) if pod.phase.is_readable() => {
                    debug!(job = %job, pod = %pod.name, phase = ?pod.phase, attempt, "Pod readable");
                    return Ok(pod);
                }
                Some(pod) => debug!(job = %job, pod = %pod.name, attempt, "Pod not readable yet"),
                None => debug!(job = %job, attempt, "No pod yet"),
            }
            if attempt < self.max_attempts {
                tokio::select! {
                    () = cancel.cancelled() => return Err(StreamError::Cancelled),
                    () = tokio::time::sleep(self.interval) => {}
                }
            }
        }
        Err(StreamError::PodReadinessTimeout {
            attempts: self.max_attempts,
        })
    }

    /// Copy a pod's output into `sink` until end of stream or cancellation
    ///
    /// Each chunk is flushed as soon as it is written. Returns the number of
    /// bytes relayed.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError`] if the stream cannot be opened or an I/O
    /// error occurs
    pub async fn relay<W>(
        &self,
        pod: &str,
        options: &LogOptions,
        sink: &mut W,
        cancel: &CancellationToken,
    ) -> Result<u64, StreamError>
    where
        W: AsyncWrite + Unpin + Send + ?Sized,
    {
        let mut reader = self.platform.pod_logs(pod, options).await?;
        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut total = 0u64;
        loop {
            let n = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    debug!(pod, bytes = total, "Log relay cancelled");
                    break;
                }
                read = reader.read(&mut buf) => read?,
            };
            if n == 0 {
                debug!(pod, bytes = total, "Log stream ended");
                break;
            }
            sink.write_all(&buf[..n]).await?;
            sink.flush().await?;
            total += n as u64;
        }
        Ok(total)
    }
}
