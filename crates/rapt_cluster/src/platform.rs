//! Kubernetes implementation of the platform seam.

use crate::convert::{
    blob_manifest, blob_record, job_manifest, job_record, owner_reference, platform_error,
    pod_info, tool_resource,
};
use crate::watch::job_events;
use async_trait::async_trait;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{ConfigMap, Pod};
use kube::api::{
    Api, ApiResource, DeleteParams, DynamicObject, GroupVersionKind, ListParams, LogParams, Patch,
    PatchParams, PostParams,
};
use kube::Client;
use rapt_core::{BlobName, JobName, PlatformError, PlatformResult, labels};
use rapt_runtime::{
    BlobRecord, BlobSpec, JobEvents, JobRecord, JobSpec, LogOptions, LogReader, Platform, PodInfo,
};
use rapt_tool::ToolResource;
use rapt_tool::resource::{GROUP, KIND, PLURAL, VERSION};
use serde_json::json;
use tracing::debug;

/// Platform backed by a Kubernetes API server
#[derive(Clone)]
pub struct KubePlatform {
    client: Client,
    namespace: String,
    tools: ApiResource,
}

impl KubePlatform {
    /// Connect using the local kubeconfig or in-cluster configuration
    ///
    /// `None` uses the namespace of the current context.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::Transport`] if no configuration can be loaded
    pub async fn connect(namespace: Option<String>) -> PlatformResult<Self> {
        let client = Client::try_default()
            .await
            .map_err(|err| PlatformError::Transport(err.to_string()))?;
        let namespace = namespace.unwrap_or_else(|| client.default_namespace().to_string());
        Ok(Self::new(client, namespace))
    }

    /// Wrap an existing client
    #[must_use]
    pub fn new(client: Client, namespace: impl Into<String>) -> Self {
        let gvk = GroupVersionKind::gvk(GROUP, VERSION, KIND);
        Self {
            client,
            namespace: namespace.into(),
            tools: ApiResource::from_gvk_with_plural(&gvk, PLURAL),
        }
    }

    fn tool_api(&self) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), &self.namespace, &self.tools)
    }

    fn jobs(&self) -> Api<Job> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    fn config_maps(&self) -> Api<ConfigMap> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    fn pods(&self) -> Api<Pod> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }
}

#[async_trait]
impl Platform for KubePlatform {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn fetch_tool(&self, name: &str) -> PlatformResult<ToolResource> {
        debug!(tool = name, namespace = %self.namespace, "Fetching tool");
        let object = self
            .tool_api()
            .get(name)
            .await
            .map_err(|err| platform_error(KIND, name, err))?;
        Ok(tool_resource(object, &self.namespace))
    }

    async fn list_tools(&self) -> PlatformResult<Vec<ToolResource>> {
        let list = self
            .tool_api()
            .list(&ListParams::default())
            .await
            .map_err(|err| platform_error(KIND, PLURAL, err))?;
        Ok(list
            .items
            .into_iter()
            .map(|object| tool_resource(object, &self.namespace))
            .collect())
    }

    async fn create_blob(&self, blob: &BlobSpec) -> PlatformResult<()> {
        let manifest = blob_manifest(blob, &self.namespace);
        self.config_maps()
            .create(&PostParams::default(), &manifest)
            .await
            .map_err(|err| platform_error("ConfigMap", blob.name.as_str(), err))?;
        Ok(())
    }

    async fn delete_blob(&self, name: &BlobName) -> PlatformResult<()> {
        self.config_maps()
            .delete(name.as_str(), &DeleteParams::default())
            .await
            .map_err(|err| platform_error("ConfigMap", name.as_str(), err))?;
        Ok(())
    }

    async fn list_blobs(&self) -> PlatformResult<Vec<BlobRecord>> {
        let params = ListParams::default().labels(&format!(
            "{},{}",
            labels::managed(),
            labels::JOB
        ));
        let list = self
            .config_maps()
            .list(&params)
            .await
            .map_err(|err| platform_error("ConfigMap", "*", err))?;
        Ok(list.items.iter().filter_map(blob_record).collect())
    }

    async fn adopt_blobs(&self, owner: &JobRecord, blobs: &[BlobName]) -> PlatformResult<()> {
        let reference = owner_reference(owner)?;
        let patch = Patch::Merge(json!({ "metadata": { "ownerReferences": [reference] } }));
        let api = self.config_maps();
        for name in blobs {
            api.patch(name.as_str(), &PatchParams::default(), &patch)
                .await
                .map_err(|err| platform_error("ConfigMap", name.as_str(), err))?;
            debug!(blob = %name, job = %owner.handle.name, "Blob adopted");
        }
        Ok(())
    }

    async fn create_job(&self, spec: &JobSpec) -> PlatformResult<JobRecord> {
        let manifest = job_manifest(spec)?;
        let created = self
            .jobs()
            .create(&PostParams::default(), &manifest)
            .await
            .map_err(|err| platform_error("Job", spec.name.as_str(), err))?;
        job_record(&created, &self.namespace)
    }

    async fn get_job(&self, name: &JobName) -> PlatformResult<JobRecord> {
        let job = self
            .jobs()
            .get(name.as_str())
            .await
            .map_err(|err| platform_error("Job", name.as_str(), err))?;
        job_record(&job, &self.namespace)
    }

    async fn list_jobs(&self, tool: &str) -> PlatformResult<Vec<JobRecord>> {
        let params = ListParams::default().labels(&labels::runs_of(tool));
        let list = self
            .jobs()
            .list(&params)
            .await
            .map_err(|err| platform_error("Job", tool, err))?;
        list.items
            .iter()
            .map(|job| job_record(job, &self.namespace))
            .collect()
    }

    async fn watch_job(&self, name: &JobName) -> PlatformResult<JobEvents> {
        Ok(job_events(self.jobs(), name))
    }

    async fn find_pod(&self, job: &JobName) -> PlatformResult<Option<PodInfo>> {
        let params = ListParams::default().labels(&labels::pods_of(job));
        let list = self
            .pods()
            .list(&params)
            .await
            .map_err(|err| platform_error("Pod", job.as_str(), err))?;
        Ok(list.items.iter().find_map(pod_info))
    }

    async fn pod_logs(&self, pod: &str, options: &LogOptions) -> PlatformResult<LogReader> {
        let params = LogParams {
            follow: options.follow,
            tail_lines: options.tail_lines,
            ..LogParams::default()
        };
        let stream = self
            .pods()
            .log_stream(pod, &params)
            .await
            .map_err(|err| platform_error("Pod", pod, err))?;
        Ok(Box::pin(stream))
    }
}
