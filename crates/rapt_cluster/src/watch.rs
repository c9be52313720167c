//! Resumable job watch.
//!
//! The API server closes a watch after its timeout even when nothing went
//! wrong. The stream built here reopens it from the last seen resource
//! version, so callers only see a closed stream when the watch really ended.

use crate::convert::{job_counters, platform_error};
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use k8s_openapi::api::batch::v1::Job;
use kube::api::{Api, WatchEvent, WatchParams};
use rapt_core::{JobName, PlatformError, PlatformResult, labels};
use rapt_runtime::{JobCounters, JobEvents};
use tracing::debug;

/// Server-side watch timeout in seconds (the API server caps it below 300)
pub const WATCH_TIMEOUT_SECS: u32 = 290;

struct WatchState {
    api: Api<Job>,
    job: JobName,
    params: WatchParams,
    version: String,
    inner: Option<BoxStream<'static, kube::Result<WatchEvent<Job>>>>,
    done: bool,
}

impl WatchState {
    fn fail(mut self, err: PlatformError) -> Option<(PlatformResult<JobCounters>, Self)> {
        self.done = true;
        self.inner = None;
        Some((Err(err), self))
    }
}

/// Counters of one job, resuming across server-side timeouts
#[must_use]
pub fn job_events(api: Api<Job>, job: &JobName) -> JobEvents {
    let state = WatchState {
        api,
        params: WatchParams::default()
            .fields(&labels::named(job.as_str()))
            .timeout(WATCH_TIMEOUT_SECS),
        job: job.clone(),
        version: "0".to_string(),
        inner: None,
        done: false,
    };
    stream::unfold(state, |mut st| async move {
        if st.done {
            return None;
        }
        loop {
            if st.inner.is_none() {
                match st.api.watch(&st.params, &st.version).await {
                    Ok(events) => {
                        debug!(job = %st.job, version = %st.version, "Watch opened");
                        st.inner = Some(events.boxed());
                    }
                    Err(err) => {
                        let err = platform_error("Job", st.job.as_str(), err);
                        return st.fail(err);
                    }
                }
            }
            let next = match st.inner.as_mut() {
                Some(inner) => inner.next().await,
                None => None,
            };
            match next {
                Some(Ok(WatchEvent::Added(job) | WatchEvent::Modified(job))) => {
                    if let Some(version) = job.metadata.resource_version.clone() {
                        st.version = version;
                    }
                    return Some((Ok(job_counters(&job)), st));
                }
                Some(Ok(WatchEvent::Deleted(_))) => {
                    let err = PlatformError::Watch(format!("job '{}' was deleted", st.job));
                    return st.fail(err);
                }
                Some(Ok(WatchEvent::Bookmark(bookmark))) => {
                    st.version = bookmark.metadata.resource_version;
                }
                Some(Ok(WatchEvent::Error(resp))) => {
                    let err = PlatformError::Watch(format!("{} ({})", resp.message, resp.code));
                    return st.fail(err);
                }
                Some(Err(err)) => {
                    let err = PlatformError::Watch(err.to_string());
                    return st.fail(err);
                }
                None => {
                    debug!(job = %st.job, version = %st.version, "Watch closed by server, resuming");
                    st.inner = None;
                }
            }
        }
    })
    .boxed()
}
