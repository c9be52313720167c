//! In-memory platform for engine tests.

use crate::assemble::JobSpec;
use crate::platform::{
    BlobRecord, BlobSpec, JobEvents, JobRecord, LogOptions, LogReader, Platform, PodInfo,
};
use crate::state::JobCounters;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::{StreamExt, TryStreamExt, stream};
use rapt_core::{BlobName, JobHandle, JobName, PlatformError, PlatformResult};
use rapt_tool::{ToolDefinition, ToolResource};
use serde_json::json;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

struct StoredBlob {
    job: Option<JobName>,
    content: Vec<u8>,
    created: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct State {
    tools: BTreeMap<String, ToolResource>,
    jobs: BTreeMap<JobName, JobRecord>,
    blobs: BTreeMap<BlobName, StoredBlob>,
    blob_creates: Vec<BlobName>,
    blob_deletes: Vec<BlobName>,
    adopted: Vec<BlobName>,
    created_jobs: Vec<JobSpec>,
    events: Option<Vec<PlatformResult<JobCounters>>>,
    hold_open: bool,
    pods: VecDeque<Option<PodInfo>>,
    pod_lookups: usize,
    log_output: Option<Vec<u8>>,
    endless_logs: bool,
    fail_blob_at: Option<usize>,
    fail_create_job: Option<PlatformError>,
    fail_adopt: bool,
}

/// Resource form of a tool, as the cluster would return it
pub fn tool_resource(tool: &ToolDefinition) -> ToolResource {
    let env: Vec<_> = tool
        .env
        .iter()
        .map(|(name, value)| json!({ "name": name, "value": value }))
        .collect();
    let arguments: Vec<_> = tool
        .arguments
        .iter()
        .map(|a| {
            json!({
                "name": a.name,
                "description": a.description,
                "required": a.required,
                "default": a.default,
            })
        })
        .collect();
    ToolResource {
        name: tool.name.clone(),
        namespace: tool.namespace.clone(),
        created: tool.created,
        data: json!({
            "spec": {
                "help": tool.help,
                "jobTemplate": {
                    "image": tool.image,
                    "command": tool.command,
                    "env": env,
                },
                "arguments": arguments,
            }
        }),
    }
}

/// Scriptable [`Platform`] that records every call
#[derive(Default)]
pub struct FakePlatform {
    state: Mutex<State>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    fn with(self, f: impl FnOnce(&mut State)) -> Self {
        f(&mut self.state.lock().unwrap());
        self
    }

    pub fn with_tool(self, tool: &ToolDefinition) -> Self {
        let resource = tool_resource(tool);
        self.with(|s| {
            s.tools.insert(tool.name.clone(), resource);
        })
    }

    pub fn with_raw_tool(self, resource: ToolResource) -> Self {
        self.with(|s| {
            s.tools.insert(resource.name.clone(), resource);
        })
    }

    pub fn with_job(self, name: &JobName) -> Self {
        let record = JobRecord {
            handle: JobHandle::new(name.clone(), "default"),
            uid: Some(format!("uid-{}", name)),
            tool: None,
            counters: JobCounters::default(),
            created: None,
            completed: None,
        };
        self.with_job_record(record)
    }

    pub fn with_job_record(self, record: JobRecord) -> Self {
        self.with(|s| {
            s.jobs.insert(record.handle.name.clone(), record);
        })
    }

    /// Blob created an hour ago
    pub fn with_blob(self, name: BlobName, job: Option<&JobName>) -> Self {
        self.with_blob_created(name, job, Some(Utc::now() - chrono::Duration::hours(1)))
    }

    pub fn with_blob_created(
        self,
        name: BlobName,
        job: Option<&JobName>,
        created: Option<DateTime<Utc>>,
    ) -> Self {
        let blob = StoredBlob {
            job: job.cloned(),
            content: Vec::new(),
            created,
        };
        self.with(|s| {
            s.blobs.insert(name, blob);
        })
    }

    /// Events delivered by the next watch, after which the stream closes
    pub fn with_events(self, events: Vec<PlatformResult<JobCounters>>) -> Self {
        self.with(|s| s.events = Some(events))
    }

    /// Keep the watch stream open after the scripted events
    pub fn hold_open(self) -> Self {
        self.with(|s| s.hold_open = true)
    }

    /// Pod lookups return these in order, then repeat the last one
    pub fn with_pods(self, pods: Vec<Option<PodInfo>>) -> Self {
        self.with(|s| s.pods = pods.into())
    }

    pub fn with_log_output(self, bytes: &[u8]) -> Self {
        let bytes = bytes.to_vec();
        self.with(|s| s.log_output = Some(bytes))
    }

    /// Log streams never end
    pub fn with_endless_logs(self) -> Self {
        self.with(|s| s.endless_logs = true)
    }

    /// Fail the blob creation at this zero-based call index
    pub fn fail_blob_at(self, index: usize) -> Self {
        self.with(|s| s.fail_blob_at = Some(index))
    }

    pub fn fail_create_job(self, err: PlatformError) -> Self {
        self.with(|s| s.fail_create_job = Some(err))
    }

    pub fn fail_adopt(self) -> Self {
        self.with(|s| s.fail_adopt = true)
    }

    pub fn blob_content(&self, name: &BlobName) -> Option<Vec<u8>> {
        self.state.lock().unwrap().blobs.get(name).map(|b| b.content.clone())
    }

    /// Every successful blob creation, in call order
    pub fn created_blobs(&self) -> Vec<BlobName> {
        self.state.lock().unwrap().blob_creates.clone()
    }

    pub fn deleted_blobs(&self) -> Vec<BlobName> {
        self.state.lock().unwrap().blob_deletes.clone()
    }

    pub fn live_blobs(&self) -> Vec<BlobName> {
        self.state.lock().unwrap().blobs.keys().cloned().collect()
    }

    pub fn adopted_blobs(&self) -> Vec<BlobName> {
        self.state.lock().unwrap().adopted.clone()
    }

    pub fn created_jobs(&self) -> Vec<JobSpec> {
        self.state.lock().unwrap().created_jobs.clone()
    }

    pub fn pod_lookups(&self) -> usize {
        self.state.lock().unwrap().pod_lookups
    }
}

#[async_trait]
impl Platform for FakePlatform {
    fn namespace(&self) -> &str {
        "default"
    }

    async fn fetch_tool(&self, name: &str) -> PlatformResult<ToolResource> {
        self.state
            .lock()
            .unwrap()
            .tools
            .get(name)
            .cloned()
            .ok_or_else(|| PlatformError::not_found("Tool", name))
    }

    async fn list_tools(&self) -> PlatformResult<Vec<ToolResource>> {
        Ok(self.state.lock().unwrap().tools.values().cloned().collect())
    }

    async fn create_blob(&self, blob: &BlobSpec) -> PlatformResult<()> {
        let mut s = self.state.lock().unwrap();
        let call = s.blob_creates.len();
        if s.fail_blob_at == Some(call) {
            return Err(PlatformError::Rejected {
                code: 422,
                reason: "blob rejected".to_string(),
            });
        }
        if s.blobs.contains_key(&blob.name) {
            return Err(PlatformError::AlreadyExists {
                kind: "ConfigMap".to_string(),
                name: blob.name.to_string(),
            });
        }
        s.blobs.insert(
            blob.name.clone(),
            StoredBlob {
                job: Some(blob.job.clone()),
                content: blob.content.clone(),
                created: Some(Utc::now()),
            },
        );
        s.blob_creates.push(blob.name.clone());
        Ok(())
    }

    async fn delete_blob(&self, name: &BlobName) -> PlatformResult<()> {
        let mut s = self.state.lock().unwrap();
        if s.blobs.remove(name).is_none() {
            return Err(PlatformError::not_found("ConfigMap", name.as_str()));
        }
        s.blob_deletes.push(name.clone());
        Ok(())
    }

    async fn list_blobs(&self) -> PlatformResult<Vec<BlobRecord>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .blobs
            .iter()
            .map(|(name, blob)| BlobRecord {
                name: name.clone(),
                job: blob.job.clone(),
                created: blob.created,
            })
            .collect())
    }

    async fn adopt_blobs(&self, _owner: &JobRecord, blobs: &[BlobName]) -> PlatformResult<()> {
        let mut s = self.state.lock().unwrap();
        if s.fail_adopt {
            return Err(PlatformError::Transport("connection reset".to_string()));
        }
        s.adopted.extend(blobs.iter().cloned());
        Ok(())
    }

    async fn create_job(&self, spec: &JobSpec) -> PlatformResult<JobRecord> {
        let mut s = self.state.lock().unwrap();
        if let Some(err) = s.fail_create_job.clone() {
            return Err(err);
        }
        if s.jobs.contains_key(&spec.name) {
            return Err(PlatformError::AlreadyExists {
                kind: "Job".to_string(),
                name: spec.name.to_string(),
            });
        }
        let record = JobRecord {
            handle: JobHandle::new(spec.name.clone(), spec.namespace.clone()),
            uid: Some(format!("uid-{}", spec.name)),
            tool: Some(spec.tool.clone()),
            counters: JobCounters::default(),
            created: None,
            completed: None,
        };
        s.jobs.insert(spec.name.clone(), record.clone());
        s.created_jobs.push(spec.clone());
        Ok(record)
    }

    async fn get_job(&self, name: &JobName) -> PlatformResult<JobRecord> {
        self.state
            .lock()
            .unwrap()
            .jobs
            .get(name)
            .cloned()
            .ok_or_else(|| PlatformError::not_found("Job", name.as_str()))
    }

    async fn list_jobs(&self, tool: &str) -> PlatformResult<Vec<JobRecord>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .jobs
            .values()
            .filter(|r| r.tool.as_deref() == Some(tool))
            .cloned()
            .collect())
    }

    async fn watch_job(&self, _name: &JobName) -> PlatformResult<JobEvents> {
        let mut s = self.state.lock().unwrap();
        let events = s.events.take().unwrap_or_default();
        let scripted = stream::iter(events);
        if s.hold_open {
            Ok(scripted.chain(stream::pending()).boxed())
        } else {
            Ok(scripted.boxed())
        }
    }

    async fn find_pod(&self, _job: &JobName) -> PlatformResult<Option<PodInfo>> {
        let mut s = self.state.lock().unwrap();
        s.pod_lookups += 1;
        let pod = if s.pods.len() > 1 {
            s.pods.pop_front().flatten()
        } else {
            s.pods.front().cloned().flatten()
        };
        Ok(pod)
    }

    async fn pod_logs(&self, _pod: &str, _options: &LogOptions) -> PlatformResult<LogReader> {
        let s = self.state.lock().unwrap();
        let head = s.log_output.clone().unwrap_or_default();
        let reader: LogReader = if s.endless_logs {
            Box::pin(
                stream::iter(vec![Ok::<_, std::io::Error>(head)])
                    .chain(stream::pending())
                    .into_async_read(),
            )
        } else {
            Box::pin(futures::io::Cursor::new(head))
        };
        Ok(reader)
    }
}

/// Cloneable in-memory sink
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Vec<u8> {
        self.inner.lock().unwrap().clone()
    }
}

impl tokio::io::AsyncWrite for SharedBuffer {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        self.inner.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
