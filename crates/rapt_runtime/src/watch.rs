//! Lifecycle watching.
//!
//! Consumes the change events of one job until it reaches a terminal state,
//! the deadline expires, the stream breaks or the caller cancels. The remote
//! job is never touched.

use crate::platform::JobEvents;
use crate::state::JobState;
use futures::StreamExt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Why a watch ended without a terminal state
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WatchError {
    /// Deadline expired
    #[error("no terminal state within {}s", .0.as_secs())]
    Timeout(Duration),
    /// Stream failed or closed early
    #[error("{0}")]
    Interrupted(String),
    /// Caller cancelled
    #[error("cancelled")]
    Cancelled,
}

/// Watches one job's event stream
#[derive(Debug, Clone, Copy, Default)]
pub struct LifecycleWatcher {
    deadline: Option<Duration>,
}

impl LifecycleWatcher {
    /// Create a watcher (`None` = wait forever)
    #[must_use]
    pub const fn new(deadline: Option<Duration>) -> Self {
        Self { deadline }
    }

    /// Deadline applied to the whole wait
    #[must_use]
    pub const fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    /// Wait for a terminal state
    ///
    /// `on_transition` is called once per distinct state observed.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError`] when the wait ends without a terminal state
    pub async fn watch<F>(
        &self,
        events: JobEvents,
        cancel: &CancellationToken,
        on_transition: F,
    ) -> Result<JobState, WatchError>
    where
        F: FnMut(JobState) + Send,
    {
        let observe = observe(events, on_transition);
        tokio::pin!(observe);

        let deadline = async {
            match self.deadline {
                Some(after) => tokio::time::sleep(after).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(WatchError::Cancelled),
            result = &mut observe => result,
            () = deadline => Err(WatchError::Timeout(self.deadline.unwrap_or_default())),
        }
    }
}

async fn observe<F>(mut events: JobEvents, mut on_transition: F) -> Result<JobState, WatchError>
where
    F: FnMut(JobState) + Send,
{
    let mut last = None;
    while let Some(event) = events.next().await {
        let counters = event.map_err(|err| WatchError::Interrupted(err.to_string()))?;
        let state = JobState::from(counters);
        debug!(?counters, %state, "Job event");
        if last != Some(state) {
            info!(%state, "Job state changed");
            on_transition(state);
            last = Some(state);
        }
        if state.is_terminal() {
            return Ok(state);
        }
    }
    Err(WatchError::Interrupted(
        "event stream closed before a terminal state".to_string(),
    ))
}
