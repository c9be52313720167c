//! Tool execution engine.
//!
//! A run goes through binding, mount materialization, assembly and
//! submission in order. When the caller waits, lifecycle watching and log
//! streaming then run concurrently under one cancellation token; neither
//! outlives [`ToolRunner::run`].

use crate::assemble::{AssemblyInput, assemble_job};
use crate::error::{RunError, RunResult};
use crate::history::{RunSummary, summarize};
use crate::janitor::{SweepReport, sweep_orphans};
use crate::logs::{LogSink, LogStreamer, StreamError};
use crate::materialize::{BlobLedger, MountSpec, materialize_mounts};
use crate::platform::{JobRecord, LogOptions, Platform, PodInfo};
use crate::state::JobState;
use crate::submit::submit_job;
use crate::watch::{LifecycleWatcher, WatchError};
use indexmap::IndexMap;
use rapt_core::{EngineConfig, JobHandle, JobName, SubmissionStamp};
use rapt_tool::{BindError, ToolDefinition, bind_arguments, undeclared};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::AsyncWrite;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// One invocation of a tool
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    /// Tool name
    pub tool: String,
    /// Caller arguments by name
    pub args: HashMap<String, String>,
    /// Environment overrides
    pub env: IndexMap<String, String>,
    /// Files to mount, in index order
    pub mounts: Vec<MountSpec>,
    /// Wait for a terminal state
    pub wait: bool,
    /// Relay pod output while waiting (implies `wait`)
    pub follow: bool,
    /// Submission time (`None` = now)
    pub stamp: Option<SubmissionStamp>,
}

impl RunRequest {
    /// Create a request for a tool
    #[must_use]
    pub fn new(tool: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            ..Self::default()
        }
    }

    /// Add an argument
    #[must_use]
    pub fn with_arg(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.insert(name.into(), value.into());
        self
    }

    /// Add an environment override
    #[must_use]
    pub fn with_env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(name.into(), value.into());
        self
    }

    /// Add a mount
    #[must_use]
    pub fn with_mount(mut self, mount: MountSpec) -> Self {
        self.mounts.push(mount);
        self
    }

    /// Wait for completion
    #[must_use]
    pub fn with_wait(mut self, wait: bool) -> Self {
        self.wait = wait;
        self
    }

    /// Follow output
    #[must_use]
    pub fn with_follow(mut self, follow: bool) -> Self {
        self.follow = follow;
        self
    }

    /// Pin the submission time
    #[must_use]
    pub fn with_stamp(mut self, stamp: SubmissionStamp) -> Self {
        self.stamp = Some(stamp);
        self
    }

    /// Check if the run waits for a terminal state
    #[must_use]
    pub fn waits(&self) -> bool {
        self.wait || self.follow
    }
}

/// Progress callbacks for a run
///
/// Called from the engine task and the log task, never concurrently for the
/// same callback kind.
pub trait RunObserver: Send + Sync {
    /// Job was created
    fn on_submitted(&self, _handle: &JobHandle) {}

    /// Job entered a new state
    fn on_state(&self, _handle: &JobHandle, _state: JobState) {}

    /// Pod output is about to be relayed
    fn on_pod_ready(&self, _pod: &PodInfo) {}

    /// Output could not be relayed; the run continues
    fn on_log_unavailable(&self, _reason: &str) {}
}

/// Observer that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentObserver;

impl RunObserver for SilentObserver {}

/// Result of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    /// Submitted job
    pub handle: JobHandle,
    /// Last observed state (terminal when the run waited)
    pub state: JobState,
}

/// Executes tools against a platform
pub struct ToolRunner {
    platform: Arc<dyn Platform>,
    config: EngineConfig,
    cancel: CancellationToken,
}

impl ToolRunner {
    /// Create a runner
    #[must_use]
    pub fn new(platform: Arc<dyn Platform>, config: EngineConfig) -> Self {
        Self {
            platform,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Use an external cancellation token (e.g. tied to Ctrl+C)
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token cancelling everything this runner does
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Engine configuration
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Namespace the platform works in
    #[must_use]
    pub fn namespace(&self) -> &str {
        self.platform.namespace()
    }

    /// Fetch and decode a tool
    ///
    /// # Errors
    ///
    /// Returns [`RunError::ToolNotFound`], [`RunError::InvalidTool`] or
    /// [`RunError::Platform`]
    pub async fn describe(&self, tool: &str) -> RunResult<ToolDefinition> {
        let resource = self.platform.fetch_tool(tool).await.map_err(|err| {
            if err.is_not_found() {
                RunError::ToolNotFound {
                    tool: tool.to_string(),
                    namespace: self.platform.namespace().to_string(),
                }
            } else {
                RunError::platform(format!("failed to fetch tool '{}'", tool), err)
            }
        })?;
        Ok(resource.decode()?)
    }

    /// Decoded tools in the namespace, sorted by name
    ///
    /// Malformed tools are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Platform`] if listing fails
    pub async fn list_tools(&self) -> RunResult<Vec<ToolDefinition>> {
        let resources = self
            .platform
            .list_tools()
            .await
            .map_err(|err| RunError::platform("failed to list tools", err))?;
        let mut tools: Vec<ToolDefinition> = resources
            .iter()
            .filter_map(|r| match r.decode() {
                Ok(tool) => Some(tool),
                Err(err) => {
                    warn!(tool = %r.name, error = %err, "Skipping malformed tool");
                    None
                }
            })
            .collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tools)
    }

    /// Run a tool
    ///
    /// Without `wait`/`follow` this returns as soon as the job exists.
    /// Otherwise it returns once the job is terminal, and pod output is
    /// relayed to `sink` when following.
    ///
    /// # Errors
    ///
    /// Returns [`RunError`] naming the tool or job and the cause. A job that
    /// ends Failed yields [`RunError::JobFailed`].
    pub async fn run(
        &self,
        request: RunRequest,
        observer: Arc<dyn RunObserver>,
        sink: LogSink,
    ) -> RunResult<RunOutcome> {
        let tool = self.describe(&request.tool).await?;

        for name in undeclared(&tool.arguments, &request.args) {
            warn!(tool = %tool.name, argument = name, "Ignoring undeclared argument");
        }
        let args = bind_arguments(&tool.arguments, &request.args).map_err(|err| match err {
            BindError::MissingRequiredArgument(argument) => RunError::MissingRequiredArgument {
                tool: tool.name.clone(),
                argument,
            },
        })?;

        let stamp = request.stamp.unwrap_or_else(SubmissionStamp::now);
        let job = JobName::derive(&tool.name, &stamp);
        debug!(tool = %tool.name, job = %job, args = ?args, "Arguments bound");

        let mut ledger = BlobLedger::new();
        let mounts =
            match materialize_mounts(self.platform.as_ref(), &job, &request.mounts, &mut ledger).await
            {
                Ok(mounts) => mounts,
                Err(err) => {
                    ledger.rollback(self.platform.as_ref()).await;
                    return Err(err);
                }
            };

        let spec = assemble_job(
            &tool,
            job,
            AssemblyInput {
                args,
                env: request.env.clone(),
                mounts,
                ttl_seconds: self.config.job_ttl_seconds,
            },
        );

        let record = match submit_job(self.platform.as_ref(), &spec).await {
            Ok(record) => record,
            Err(err) => {
                ledger.rollback(self.platform.as_ref()).await;
                return Err(err);
            }
        };

        if !ledger.is_empty() {
            if let Err(err) = self.platform.adopt_blobs(&record, ledger.blobs()).await {
                warn!(job = %record.handle, error = %err, "Failed to attach mount blobs to job; `rapt gc` will remove them");
            }
        }

        observer.on_submitted(&record.handle);

        if !request.waits() {
            return Ok(RunOutcome {
                state: record.state(),
                handle: record.handle,
            });
        }

        let state = self
            .observe(&record.handle, request.follow, observer, sink)
            .await?;
        match state {
            JobState::Failed => Err(RunError::JobFailed {
                tool: tool.name,
                job: record.handle.name,
            }),
            state => Ok(RunOutcome {
                handle: record.handle,
                state,
            }),
        }
    }

    async fn observe(
        &self,
        handle: &JobHandle,
        follow: bool,
        observer: Arc<dyn RunObserver>,
        sink: LogSink,
    ) -> RunResult<JobState> {
        let job = &handle.name;
        let token = self.cancel.child_token();

        let events = self
            .platform
            .watch_job(job)
            .await
            .map_err(|err| RunError::WatchInterrupted {
                job: job.clone(),
                reason: err.to_string(),
            })?;

        let log_task = follow.then(|| self.spawn_log_relay(job.clone(), observer.clone(), sink, token.clone()));

        let watcher = LifecycleWatcher::new(self.config.deadline());
        let result = watcher
            .watch(events, &token, |state| observer.on_state(handle, state))
            .await;

        if let Some(mut task) = log_task {
            if result.is_ok() {
                match tokio::time::timeout(self.config.log_drain_grace, &mut task).await {
                    Ok(joined) => report_log_task(joined, observer.as_ref()),
                    Err(_) => {
                        debug!(job = %job, "Log drain grace expired");
                        token.cancel();
                        report_log_task(task.await, observer.as_ref());
                    }
                }
            } else {
                token.cancel();
                report_log_task(task.await, observer.as_ref());
            }
        }
        token.cancel();

        result.map_err(|err| match err {
            WatchError::Timeout(after) => RunError::Timeout {
                job: job.clone(),
                after,
            },
            WatchError::Interrupted(reason) => RunError::WatchInterrupted {
                job: job.clone(),
                reason,
            },
            WatchError::Cancelled => RunError::Cancelled { job: job.clone() },
        })
    }

    fn spawn_log_relay(
        &self,
        job: JobName,
        observer: Arc<dyn RunObserver>,
        mut sink: LogSink,
        token: CancellationToken,
    ) -> JoinHandle<()> {
        let streamer = LogStreamer::new(
            self.platform.clone(),
            self.config.poll_interval,
            self.config.pod_max_attempts,
        );
        tokio::spawn(async move {
            let pod = match streamer.wait_for_pod(&job, &token).await {
                Ok(pod) => pod,
                Err(StreamError::Cancelled) => return,
                Err(err) => {
                    warn!(job = %job, error = %err, "Log streaming unavailable");
                    observer.on_log_unavailable(&err.to_string());
                    return;
                }
            };
            observer.on_pod_ready(&pod);
            match streamer
                .relay(&pod.name, &LogOptions::follow(), &mut sink, &token)
                .await
            {
                Ok(bytes) => debug!(job = %job, pod = %pod.name, bytes, "Log relay finished"),
                Err(err) => {
                    warn!(job = %job, pod = %pod.name, error = %err, "Log relay failed");
                    observer.on_log_unavailable(&err.to_string());
                }
            }
        })
    }

    /// Previous runs of a tool, newest first
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Platform`] if listing fails
    pub async fn runs(&self, tool: &str) -> RunResult<Vec<RunSummary>> {
        let records = self
            .platform
            .list_jobs(tool)
            .await
            .map_err(|err| RunError::platform(format!("failed to list runs of '{}'", tool), err))?;
        Ok(summarize(&records))
    }

    /// Read one job
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Platform`] if the job cannot be read
    pub async fn inspect_job(&self, job: &JobName) -> RunResult<JobRecord> {
        self.platform
            .get_job(job)
            .await
            .map_err(|err| RunError::platform(format!("failed to read job '{}'", job), err))
    }

    /// Relay the output of an existing job
    ///
    /// Waits up to `logs_max_attempts` polls for the pod, then calls
    /// `on_ready` before the first byte is written. Returns the bytes relayed.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::PodReadinessTimeout`] if the pod never becomes
    /// readable, or another [`RunError`] if the job or stream cannot be read
    pub async fn job_logs<W, F>(
        &self,
        tool: &str,
        job: &JobName,
        options: LogOptions,
        sink: &mut W,
        on_ready: F,
    ) -> RunResult<u64>
    where
        W: AsyncWrite + Unpin + Send + ?Sized,
        F: FnOnce(&JobRecord, &PodInfo),
    {
        let record = self.inspect_job(job).await?;
        if record.tool.as_deref().is_some_and(|t| t != tool) {
            warn!(job = %job, tool, owner = ?record.tool, "Job was not started for this tool");
        }

        let streamer = LogStreamer::new(
            self.platform.clone(),
            self.config.poll_interval,
            self.config.logs_max_attempts,
        );
        let pod = streamer
            .wait_for_pod(job, &self.cancel)
            .await
            .map_err(|err| self.stream_error(job, err))?;
        on_ready(&record, &pod);
        info!(job = %job, pod = %pod.name, follow = options.follow, "Relaying logs");
        streamer
            .relay(&pod.name, &options, sink, &self.cancel)
            .await
            .map_err(|err| self.stream_error(job, err))
    }

    fn stream_error(&self, job: &JobName, err: StreamError) -> RunError {
        match err {
            StreamError::PodReadinessTimeout { attempts } => RunError::PodReadinessTimeout {
                job: job.clone(),
                attempts,
            },
            StreamError::Cancelled => RunError::Cancelled { job: job.clone() },
            StreamError::Platform(source) => {
                RunError::platform(format!("failed to read output of job '{}'", job), source)
            }
            StreamError::Io(io) => RunError::LogStream {
                job: job.clone(),
                reason: io.to_string(),
            },
        }
    }

    /// Delete orphaned mount blobs older than `gc_min_age`
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Platform`] if blobs or jobs cannot be listed
    pub async fn gc(&self, dry_run: bool) -> RunResult<SweepReport> {
        sweep_orphans(self.platform.as_ref(), self.config.gc_min_age, dry_run)
            .await
            .map_err(|err| RunError::platform("failed to sweep mount blobs", err))
    }
}

fn report_log_task(joined: Result<(), JoinError>, observer: &dyn RunObserver) {
    if let Err(err) = joined {
        warn!(error = %err, "Log task ended abnormally");
        observer.on_log_unavailable(&err.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::PodPhase;
    use crate::state::JobCounters;
    use crate::testing::{FakePlatform, SharedBuffer};
    use chrono::{TimeZone, Utc};
    use rapt_core::BlobName;
    use rapt_tool::ArgumentSpec;
    use std::io::Write;
    use std::sync::Mutex;
    use std::time::Duration;

    fn echo() -> ToolDefinition {
        ToolDefinition::new("echo", "default", "busybox")
            .with_command(["echo"])
            .with_argument(ArgumentSpec::optional("msg").with_default("hi"))
    }

    fn need_arg() -> ToolDefinition {
        ToolDefinition::new("need-arg", "default", "busybox")
            .with_argument(ArgumentSpec::required("target"))
    }

    fn stamp(second: u32) -> SubmissionStamp {
        SubmissionStamp::from_datetime(Utc.with_ymd_and_hms(2025, 1, 15, 14, 30, second).unwrap())
    }

    fn runner(platform: &Arc<FakePlatform>) -> ToolRunner {
        let config = EngineConfig::new()
            .with_timeout_secs(30)
            .with_poll_interval(Duration::from_millis(100))
            .with_log_drain_grace(Duration::from_secs(1));
        ToolRunner::new(platform.clone(), config)
    }

    fn sink() -> LogSink {
        Box::new(SharedBuffer::new())
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    impl RunObserver for Recorder {
        fn on_submitted(&self, handle: &JobHandle) {
            self.events.lock().unwrap().push(format!("submitted {}", handle.name));
        }

        fn on_state(&self, _handle: &JobHandle, state: JobState) {
            self.events.lock().unwrap().push(format!("state {}", state));
        }

        fn on_pod_ready(&self, pod: &PodInfo) {
            self.events.lock().unwrap().push(format!("pod {}", pod.name));
        }

        fn on_log_unavailable(&self, _reason: &str) {
            self.events.lock().unwrap().push("logs unavailable".to_string());
        }
    }

    #[tokio::test]
    async fn test_echo_uses_default() {
        let platform = Arc::new(FakePlatform::new().with_tool(&echo()));
        let outcome = runner(&platform)
            .run(
                RunRequest::new("echo").with_stamp(stamp(22)),
                Arc::new(SilentObserver),
                sink(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.handle.name.as_str(), "echo-20250115-143022");
        assert_eq!(outcome.state, JobState::Pending);
        let jobs = platform.created_jobs();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].args, vec!["hi"]);
        assert_eq!(jobs[0].command, Some(vec!["echo".to_string()]));
    }

    #[tokio::test]
    async fn test_echo_caller_value() {
        let platform = Arc::new(FakePlatform::new().with_tool(&echo()));
        runner(&platform)
            .run(
                RunRequest::new("echo").with_arg("msg", "bye"),
                Arc::new(SilentObserver),
                sink(),
            )
            .await
            .unwrap();
        assert_eq!(platform.created_jobs()[0].args, vec!["bye"]);
    }

    #[tokio::test]
    async fn test_undeclared_argument_ignored() {
        let platform = Arc::new(FakePlatform::new().with_tool(&echo()));
        runner(&platform)
            .run(
                RunRequest::new("echo").with_arg("nope", "x"),
                Arc::new(SilentObserver),
                sink(),
            )
            .await
            .unwrap();
        assert_eq!(platform.created_jobs()[0].args, vec!["hi"]);
    }

    #[tokio::test]
    async fn test_missing_required_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.txt");
        std::fs::write(&path, "data").unwrap();
        let platform = Arc::new(FakePlatform::new().with_tool(&need_arg()));

        let err = runner(&platform)
            .run(
                RunRequest::new("need-arg").with_mount(MountSpec::new(&path, "/in")),
                Arc::new(SilentObserver),
                sink(),
            )
            .await
            .unwrap_err();

        match err {
            RunError::MissingRequiredArgument { tool, argument } => {
                assert_eq!(tool, "need-arg");
                assert_eq!(argument, "target");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(platform.created_jobs().is_empty());
        assert!(platform.created_blobs().is_empty());
    }

    #[tokio::test]
    async fn test_tool_not_found() {
        let platform = Arc::new(FakePlatform::new());
        let err = runner(&platform)
            .run(RunRequest::new("ghost"), Arc::new(SilentObserver), sink())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RunError::ToolNotFound { ref tool, ref namespace } if tool == "ghost" && namespace == "default"
        ));
    }

    #[tokio::test]
    async fn test_invalid_tool() {
        let platform = Arc::new(FakePlatform::new().with_raw_tool(rapt_tool::ToolResource {
            name: "broken".to_string(),
            namespace: "default".to_string(),
            created: None,
            data: serde_json::json!({ "spec": { "arguments": [] } }),
        }));
        let err = runner(&platform)
            .run(RunRequest::new("broken"), Arc::new(SilentObserver), sink())
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::InvalidTool(_)));
        assert!(platform.created_jobs().is_empty());
    }

    #[tokio::test]
    async fn test_mount_failure_rolls_back_blobs() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.txt");
        std::fs::write(&good, "ok").unwrap();
        let platform = Arc::new(FakePlatform::new().with_tool(&echo()));

        let err = runner(&platform)
            .run(
                RunRequest::new("echo")
                    .with_stamp(stamp(1))
                    .with_mount(MountSpec::new(&good, "/a"))
                    .with_mount(MountSpec::new(dir.path().join("missing.txt"), "/b")),
                Arc::new(SilentObserver),
                sink(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, RunError::MountRead { index: 1, .. }));
        let job = JobName::derive("echo", &stamp(1));
        assert_eq!(platform.created_blobs(), vec![BlobName::for_mount(&job, 0)]);
        assert_eq!(platform.deleted_blobs(), vec![BlobName::for_mount(&job, 0)]);
        assert!(platform.live_blobs().is_empty());
        assert!(platform.created_jobs().is_empty());
    }

    #[tokio::test]
    async fn test_submission_failure_rolls_back_blobs() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"payload").unwrap();
        let platform = Arc::new(
            FakePlatform::new()
                .with_tool(&echo())
                .fail_create_job(rapt_core::PlatformError::Transport("refused".to_string())),
        );

        let err = runner(&platform)
            .run(
                RunRequest::new("echo").with_mount(MountSpec::new(file.path(), "/in")),
                Arc::new(SilentObserver),
                sink(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, RunError::Submission { .. }));
        assert_eq!(platform.created_blobs().len(), 1);
        assert!(platform.live_blobs().is_empty());
    }

    #[tokio::test]
    async fn test_mounts_adopted_after_submission() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"payload").unwrap();
        let platform = Arc::new(FakePlatform::new().with_tool(&echo()));

        let outcome = runner(&platform)
            .run(
                RunRequest::new("echo").with_mount(MountSpec::new(file.path(), "/in/data")),
                Arc::new(SilentObserver),
                sink(),
            )
            .await
            .unwrap();

        let blob = BlobName::for_mount(&outcome.handle.name, 0);
        assert_eq!(platform.adopted_blobs(), vec![blob.clone()]);
        let job = &platform.created_jobs()[0];
        assert_eq!(job.mounts.len(), 1);
        assert_eq!(job.mounts[0].blob, blob);
        assert_eq!(job.mounts[0].target, "/in/data");
    }

    #[tokio::test]
    async fn test_adopt_failure_is_not_fatal() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"payload").unwrap();
        let platform = Arc::new(FakePlatform::new().with_tool(&echo()).fail_adopt());

        let outcome = runner(&platform)
            .run(
                RunRequest::new("echo").with_mount(MountSpec::new(file.path(), "/in")),
                Arc::new(SilentObserver),
                sink(),
            )
            .await;
        assert!(outcome.is_ok());
        assert_eq!(platform.live_blobs().len(), 1);
    }

    #[tokio::test]
    async fn test_distinct_stamps_distinct_jobs() {
        let platform = Arc::new(FakePlatform::new().with_tool(&echo()));
        let runner = runner(&platform);
        let a = runner
            .run(RunRequest::new("echo").with_stamp(stamp(1)), Arc::new(SilentObserver), sink())
            .await
            .unwrap();
        let b = runner
            .run(RunRequest::new("echo").with_stamp(stamp(2)), Arc::new(SilentObserver), sink())
            .await
            .unwrap();
        assert_ne!(a.handle.name, b.handle.name);
        assert_eq!(platform.created_jobs().len(), 2);
    }

    #[tokio::test]
    async fn test_same_stamp_collides() {
        let platform = Arc::new(FakePlatform::new().with_tool(&echo()));
        let runner = runner(&platform);
        runner
            .run(RunRequest::new("echo").with_stamp(stamp(1)), Arc::new(SilentObserver), sink())
            .await
            .unwrap();
        let err = runner
            .run(RunRequest::new("echo").with_stamp(stamp(1)), Arc::new(SilentObserver), sink())
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::Submission { .. }));
    }

    #[tokio::test]
    async fn test_wait_until_succeeded() {
        let platform = Arc::new(
            FakePlatform::new()
                .with_tool(&echo())
                .with_events(vec![Ok(JobCounters::active(1)), Ok(JobCounters::succeeded(1))]),
        );
        let recorder = Arc::new(Recorder::default());

        let outcome = runner(&platform)
            .run(
                RunRequest::new("echo").with_stamp(stamp(5)).with_wait(true),
                recorder.clone(),
                sink(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.state, JobState::Succeeded);
        assert_eq!(
            recorder.events(),
            vec![
                "submitted echo-20250115-143005",
                "state Running",
                "state Succeeded"
            ]
        );
    }

    #[tokio::test]
    async fn test_wait_failed_is_error() {
        let platform = Arc::new(
            FakePlatform::new()
                .with_tool(&echo())
                .with_events(vec![Ok(JobCounters::active(1)), Ok(JobCounters::failed(1))]),
        );
        let err = runner(&platform)
            .run(
                RunRequest::new("echo").with_wait(true),
                Arc::new(SilentObserver),
                sink(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::JobFailed { ref tool, .. } if tool == "echo"));
    }

    #[tokio::test]
    async fn test_closed_watch_is_interrupted() {
        let platform = Arc::new(
            FakePlatform::new()
                .with_tool(&echo())
                .with_events(vec![Ok(JobCounters::active(1))]),
        );
        let err = runner(&platform)
            .run(
                RunRequest::new("echo").with_wait(true),
                Arc::new(SilentObserver),
                sink(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::WatchInterrupted { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_silence_times_out_and_stops_logs() {
        let platform = Arc::new(
            FakePlatform::new()
                .with_tool(&echo())
                .with_events(vec![Ok(JobCounters::active(1))])
                .hold_open()
                .with_pods(vec![Some(PodInfo {
                    name: "echo-pod".to_string(),
                    phase: PodPhase::Running,
                })])
                .with_endless_logs(),
        );
        let runner = runner(&platform);
        let token = runner.cancellation_token();

        let err = runner
            .run(
                RunRequest::new("echo").with_follow(true),
                Arc::new(SilentObserver),
                sink(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, RunError::Timeout { after, .. } if after == Duration::from_secs(30)));
        assert!(!token.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_follow_relays_output() {
        let platform = Arc::new(
            FakePlatform::new()
                .with_tool(&echo())
                .with_events(vec![Ok(JobCounters::active(1))])
                .hold_open()
                .with_pods(vec![Some(PodInfo {
                    name: "echo-pod".to_string(),
                    phase: PodPhase::Running,
                })])
                .with_log_output(b"hi\n"),
        );
        let buffer = SharedBuffer::new();
        let recorder = Arc::new(Recorder::default());

        let err = runner(&platform)
            .run(
                RunRequest::new("echo").with_follow(true),
                recorder.clone(),
                Box::new(buffer.clone()),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, RunError::Timeout { .. }));
        assert_eq!(buffer.contents(), b"hi\n");
        assert!(recorder.events().contains(&"pod echo-pod".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_state_drains_logs() {
        let platform = Arc::new(
            FakePlatform::new()
                .with_tool(&echo())
                .with_events(vec![Ok(JobCounters::active(1)), Ok(JobCounters::succeeded(1))])
                .with_pods(vec![Some(PodInfo {
                    name: "echo-pod".to_string(),
                    phase: PodPhase::Succeeded,
                })])
                .with_log_output(b"done\n"),
        );
        let buffer = SharedBuffer::new();

        let outcome = runner(&platform)
            .run(
                RunRequest::new("echo").with_follow(true),
                Arc::new(SilentObserver),
                Box::new(buffer.clone()),
            )
            .await
            .unwrap();

        assert_eq!(outcome.state, JobState::Succeeded);
        assert_eq!(buffer.contents(), b"done\n");
    }

    struct PanickingSink;

    impl AsyncWrite for PanickingSink {
        fn poll_write(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            _buf: &[u8],
        ) -> std::task::Poll<std::io::Result<usize>> {
            panic!("sink exploded");
        }

        fn poll_flush(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }

        fn poll_shutdown(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_crashed_log_task_within_grace_is_reported() {
        let platform = Arc::new(
            FakePlatform::new()
                .with_tool(&echo())
                .with_events(vec![Ok(JobCounters::active(1)), Ok(JobCounters::succeeded(1))])
                .with_pods(vec![Some(PodInfo {
                    name: "echo-pod".to_string(),
                    phase: PodPhase::Succeeded,
                })])
                .with_log_output(b"done\n"),
        );
        let recorder = Arc::new(Recorder::default());

        let outcome = runner(&platform)
            .run(
                RunRequest::new("echo").with_follow(true),
                recorder.clone(),
                Box::new(PanickingSink),
            )
            .await
            .unwrap();

        assert_eq!(outcome.state, JobState::Succeeded);
        assert!(recorder.events().contains(&"logs unavailable".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pod_readiness_timeout_is_not_fatal() {
        let platform = Arc::new(
            FakePlatform::new()
                .with_tool(&echo())
                .with_events(vec![Ok(JobCounters::default())])
                .hold_open(),
        );
        let recorder = Arc::new(Recorder::default());
        let config = EngineConfig::new()
            .with_timeout_secs(60)
            .with_pod_max_attempts(3)
            .with_poll_interval(Duration::from_secs(1));
        let runner = ToolRunner::new(platform.clone(), config);

        let err = runner
            .run(RunRequest::new("echo").with_follow(true), recorder.clone(), sink())
            .await
            .unwrap_err();

        assert!(matches!(err, RunError::Timeout { .. }));
        assert!(recorder.events().contains(&"logs unavailable".to_string()));
        assert_eq!(platform.pod_lookups(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_external_cancel() {
        let platform = Arc::new(
            FakePlatform::new()
                .with_tool(&echo())
                .with_events(vec![Ok(JobCounters::active(1))])
                .hold_open(),
        );
        let token = CancellationToken::new();
        let runner = runner(&platform).with_cancellation(token.clone());
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            token.cancel();
        });

        let err = runner
            .run(RunRequest::new("echo").with_wait(true), Arc::new(SilentObserver), sink())
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::Cancelled { .. }));
    }

    #[tokio::test]
    async fn test_runs_newest_first() {
        let platform = Arc::new(FakePlatform::new().with_tool(&echo()));
        let runner = runner(&platform);
        for second in [3, 1, 2] {
            runner
                .run(
                    RunRequest::new("echo").with_stamp(stamp(second)),
                    Arc::new(SilentObserver),
                    sink(),
                )
                .await
                .unwrap();
        }
        let runs = runner.runs("echo").await.unwrap();
        assert_eq!(runs.len(), 3);
        assert!(runner.runs("other").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_job_logs_header_then_bytes() {
        let job = JobName::from_raw("echo-1");
        let platform = Arc::new(
            FakePlatform::new()
                .with_job(&job)
                .with_pods(vec![Some(PodInfo {
                    name: "echo-1-pod".to_string(),
                    phase: PodPhase::Succeeded,
                })])
                .with_log_output(b"line\n"),
        );
        let mut buffer = SharedBuffer::new();
        let mut header = None;

        let bytes = runner(&platform)
            .job_logs("echo", &job, LogOptions::default(), &mut buffer, |record, pod| {
                header = Some((record.handle.name.to_string(), pod.name.clone()));
            })
            .await
            .unwrap();

        assert_eq!(bytes, 5);
        assert_eq!(header, Some(("echo-1".to_string(), "echo-1-pod".to_string())));
        assert_eq!(buffer.contents(), b"line\n");
    }

    #[tokio::test(start_paused = true)]
    async fn test_job_logs_readiness_timeout_is_error() {
        let job = JobName::from_raw("echo-1");
        let platform = Arc::new(FakePlatform::new().with_job(&job));
        let config = EngineConfig::new().with_logs_max_attempts(4);
        let runner = ToolRunner::new(platform, config);
        let mut buffer = SharedBuffer::new();

        let err = runner
            .job_logs("echo", &job, LogOptions::default(), &mut buffer, |_, _| {})
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::PodReadinessTimeout { attempts: 4, .. }));
    }

    #[tokio::test]
    async fn test_list_tools_skips_malformed() {
        let platform = Arc::new(
            FakePlatform::new()
                .with_tool(&need_arg())
                .with_tool(&echo())
                .with_raw_tool(rapt_tool::ToolResource {
                    name: "broken".to_string(),
                    namespace: "default".to_string(),
                    created: None,
                    data: serde_json::json!({}),
                }),
        );
        let tools = runner(&platform).list_tools().await.unwrap();
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["echo", "need-arg"]);
    }
}
