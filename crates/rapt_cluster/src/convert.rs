//! Conversions between rapt values and Kubernetes objects.
//!
//! Pure functions only; everything here is unit tested without a cluster.

use k8s_openapi::ByteString;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{ConfigMap, Pod};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::api::DynamicObject;
use rapt_core::{BlobName, JobHandle, JobName, PlatformError, labels};
use rapt_runtime::{
    BlobRecord, BlobSpec, CONTAINER_NAME, JobCounters, JobRecord, JobSpec, PodInfo, PodPhase,
};
use rapt_tool::ToolResource;
use serde_json::json;
use std::collections::BTreeMap;

/// Key under which a blob holds its file
pub const CONTENT_KEY: &str = "content";

/// Map a client error onto the platform taxonomy
#[must_use]
pub fn platform_error(kind: &str, name: &str, err: kube::Error) -> PlatformError {
    match err {
        kube::Error::Api(resp) if resp.code == 404 => PlatformError::not_found(kind, name),
        kube::Error::Api(resp) if resp.code == 409 => PlatformError::AlreadyExists {
            kind: kind.to_string(),
            name: name.to_string(),
        },
        kube::Error::Api(resp) => PlatformError::Rejected {
            code: resp.code,
            reason: resp.message,
        },
        kube::Error::SerdeError(err) => PlatformError::Decode(err.to_string()),
        other => PlatformError::Transport(other.to_string()),
    }
}

/// Build the Kubernetes Job for a spec
///
/// # Errors
///
/// Returns [`PlatformError::Decode`] if the generated manifest does not
/// deserialize into a Job
pub fn job_manifest(spec: &JobSpec) -> Result<Job, PlatformError> {
    let env: Vec<_> = spec
        .env
        .iter()
        .map(|(name, value)| json!({ "name": name, "value": value }))
        .collect();
    let volume_mounts: Vec<_> = spec
        .mounts
        .iter()
        .map(|m| json!({ "name": m.volume, "mountPath": m.target, "subPath": CONTENT_KEY }))
        .collect();
    let volumes: Vec<_> = spec
        .mounts
        .iter()
        .map(|m| json!({ "name": m.volume, "configMap": { "name": m.blob.as_str() } }))
        .collect();

    let mut container = json!({
        "name": CONTAINER_NAME,
        "image": spec.image,
        "args": spec.args,
        "env": env,
        "volumeMounts": volume_mounts,
    });
    if let Some(command) = &spec.command {
        container["command"] = json!(command);
    }

    let manifest = json!({
        "apiVersion": "batch/v1",
        "kind": "Job",
        "metadata": {
            "name": spec.name.as_str(),
            "namespace": spec.namespace,
            "labels": spec.labels,
        },
        "spec": {
            "ttlSecondsAfterFinished": spec.ttl_seconds,
            "template": {
                "metadata": { "labels": spec.labels },
                "spec": {
                    "restartPolicy": "Never",
                    "containers": [container],
                    "volumes": volumes,
                }
            }
        }
    });
    Ok(serde_json::from_value(manifest)?)
}

/// Build the ConfigMap for a mount blob
///
/// UTF-8 content goes under `data`, anything else under `binaryData`.
#[must_use]
pub fn blob_manifest(blob: &BlobSpec, namespace: &str) -> ConfigMap {
    let mut blob_labels = BTreeMap::new();
    blob_labels.insert(labels::MANAGED_BY.to_string(), labels::MANAGER.to_string());
    blob_labels.insert(labels::JOB.to_string(), blob.job.to_string());

    let metadata = ObjectMeta {
        name: Some(blob.name.to_string()),
        namespace: Some(namespace.to_string()),
        labels: Some(blob_labels),
        ..ObjectMeta::default()
    };

    match std::str::from_utf8(&blob.content) {
        Ok(text) => ConfigMap {
            metadata,
            data: Some(BTreeMap::from([(CONTENT_KEY.to_string(), text.to_string())])),
            ..ConfigMap::default()
        },
        Err(_) => ConfigMap {
            metadata,
            binary_data: Some(BTreeMap::from([(
                CONTENT_KEY.to_string(),
                ByteString(blob.content.clone()),
            )])),
            ..ConfigMap::default()
        },
    }
}

/// Read a managed ConfigMap back as a blob record
#[must_use]
pub fn blob_record(config_map: &ConfigMap) -> Option<BlobRecord> {
    let name = config_map.metadata.name.clone()?;
    let job = config_map
        .metadata
        .labels
        .as_ref()
        .and_then(|l| l.get(labels::JOB))
        .map(|j| JobName::from_raw(j.clone()));
    Some(BlobRecord {
        name: BlobName::from_raw(name),
        job,
        created: config_map.metadata.creation_timestamp.as_ref().map(|t| t.0),
    })
}

/// Pod counters of a Job
#[must_use]
pub fn job_counters(job: &Job) -> JobCounters {
    let count = |v: Option<i32>| u32::try_from(v.unwrap_or(0)).unwrap_or(0);
    job.status
        .as_ref()
        .map(|s| JobCounters {
            active: count(s.active),
            succeeded: count(s.succeeded),
            failed: count(s.failed),
        })
        .unwrap_or_default()
}

/// Read a Job as a record
///
/// # Errors
///
/// Returns [`PlatformError::Decode`] if the Job has no name
pub fn job_record(job: &Job, namespace: &str) -> Result<JobRecord, PlatformError> {
    let name = job
        .metadata
        .name
        .clone()
        .ok_or_else(|| PlatformError::Decode("job without a name".to_string()))?;
    let namespace = job
        .metadata
        .namespace
        .clone()
        .unwrap_or_else(|| namespace.to_string());
    Ok(JobRecord {
        handle: JobHandle::new(JobName::from_raw(name), namespace),
        uid: job.metadata.uid.clone(),
        tool: job
            .metadata
            .labels
            .as_ref()
            .and_then(|l| l.get(labels::TOOL))
            .cloned(),
        counters: job_counters(job),
        created: job.metadata.creation_timestamp.as_ref().map(|t| t.0),
        completed: job
            .status
            .as_ref()
            .and_then(|s| s.completion_time.as_ref())
            .map(|t| t.0),
    })
}

/// Owner reference pointing at a Job
///
/// # Errors
///
/// Returns [`PlatformError::Decode`] if the record has no UID
pub fn owner_reference(owner: &JobRecord) -> Result<OwnerReference, PlatformError> {
    let uid = owner.uid.clone().ok_or_else(|| {
        PlatformError::Decode(format!("job '{}' has no uid", owner.handle.name))
    })?;
    Ok(OwnerReference {
        api_version: "batch/v1".to_string(),
        kind: "Job".to_string(),
        name: owner.handle.name.to_string(),
        uid,
        controller: Some(false),
        block_owner_deletion: Some(false),
    })
}

/// Name and phase of a pod
#[must_use]
pub fn pod_info(pod: &Pod) -> Option<PodInfo> {
    let name = pod.metadata.name.clone()?;
    let phase = pod
        .status
        .as_ref()
        .and_then(|s| s.phase.as_deref())
        .map_or(PodPhase::Pending, PodPhase::parse);
    Some(PodInfo { name, phase })
}

/// Untyped tool object as a resource
#[must_use]
pub fn tool_resource(object: DynamicObject, namespace: &str) -> ToolResource {
    ToolResource {
        name: object.metadata.name.unwrap_or_default(),
        namespace: object
            .metadata
            .namespace
            .unwrap_or_else(|| namespace.to_string()),
        created: object.metadata.creation_timestamp.map(|t| t.0),
        data: object.data,
    }
}
