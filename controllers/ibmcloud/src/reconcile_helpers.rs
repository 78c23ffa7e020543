//! Helper functions for common reconciliation patterns
//!
//! Finalizer bookkeeping, pause detection, CAPI ownership lookups, provider
//! IDs and status patch construction shared by every reconciler.

use crate::error::ControllerError;
use crds::{Cluster, BOOTSTRAP_DATA_KEY, CLUSTER_NAME_LABEL, PAUSED_ANNOTATION};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Resource;
use kube_runtime::controller::Action;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::time::Duration;

/// Finalizer on IBMVPCCluster objects
pub const VPC_CLUSTER_FINALIZER: &str = "ibmvpccluster.infrastructure.cluster.x-k8s.io";
/// Finalizer on IBMVPCMachine objects
pub const VPC_MACHINE_FINALIZER: &str = "ibmvpcmachine.infrastructure.cluster.x-k8s.io";
/// Finalizer on IBMPowerVSCluster objects
pub const POWERVS_CLUSTER_FINALIZER: &str = "ibmpowervscluster.infrastructure.cluster.x-k8s.io";
/// Finalizer on IBMPowerVSMachine objects
pub const POWERVS_MACHINE_FINALIZER: &str = "ibmpowervsmachine.infrastructure.cluster.x-k8s.io";
/// Finalizer on IBMPowerVSImage objects
pub const POWERVS_IMAGE_FINALIZER: &str = "ibmpowervsimage.infrastructure.cluster.x-k8s.io";

/// A cloud resource exists but is not usable yet
pub const REQUEUE_NOT_READY: Duration = Duration::from_secs(60);
/// VPC instances still exist while the cluster is being torn down
pub const REQUEUE_INSTANCES_REMAINING: Duration = Duration::from_secs(15);
/// PowerVS instance is still building
pub const REQUEUE_INSTANCE_BUILD: Duration = Duration::from_secs(120);
/// COS image import in progress
pub const REQUEUE_IMAGE_IMPORT: Duration = Duration::from_secs(60);

/// Result of one reconciliation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Desired state reached
    Done,
    /// Come back after the given delay
    RequeueAfter(Duration),
}

impl ReconcileOutcome {
    /// Combine two outcomes, keeping the earliest requeue
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        match (self, other) {
            (Self::Done, other) => other,
            (this, Self::Done) => this,
            (Self::RequeueAfter(a), Self::RequeueAfter(b)) => Self::RequeueAfter(a.min(b)),
        }
    }

    /// Whether a requeue was requested
    pub fn is_requeue(self) -> bool {
        matches!(self, Self::RequeueAfter(_))
    }

    /// Convert to a controller action; finished objects are still resynced
    /// every `sync_period` to catch drift in IBM Cloud.
    pub fn into_action(self, sync_period: Duration) -> Action {
        match self {
            Self::Done => Action::requeue(sync_period),
            Self::RequeueAfter(delay) => Action::requeue(delay),
        }
    }
}

/// `Kind/namespace/name` key used for backoff and log lines
pub fn resource_key<K>(obj: &K) -> String
where
    K: Resource<DynamicType = ()>,
{
    format!(
        "{}/{}/{}",
        K::kind(&()),
        obj.meta().namespace.as_deref().unwrap_or_default(),
        obj.meta().name.as_deref().unwrap_or_default()
    )
}

/// Reconciliation is paused on the CAPI cluster or on the object itself
pub fn is_paused(cluster: Option<&Cluster>, meta: &ObjectMeta) -> bool {
    let cluster_paused = cluster.is_some_and(|c| c.spec.paused);
    let annotated = meta
        .annotations
        .as_ref()
        .is_some_and(|a| a.contains_key(PAUSED_ANNOTATION));
    cluster_paused || annotated
}

/// Whether `finalizer` is present
pub fn has_finalizer(meta: &ObjectMeta, finalizer: &str) -> bool {
    meta.finalizers
        .as_ref()
        .is_some_and(|f| f.iter().any(|name| name == finalizer))
}

/// Finalizer list with `finalizer` appended (if missing)
pub fn finalizers_with(meta: &ObjectMeta, finalizer: &str) -> Vec<String> {
    let mut finalizers = meta.finalizers.clone().unwrap_or_default();
    if !finalizers.iter().any(|f| f == finalizer) {
        finalizers.push(finalizer.to_string());
    }
    finalizers
}

/// Finalizer list with `finalizer` removed
pub fn finalizers_without(meta: &ObjectMeta, finalizer: &str) -> Vec<String> {
    meta.finalizers
        .clone()
        .unwrap_or_default()
        .into_iter()
        .filter(|f| f != finalizer)
        .collect()
}

/// Merge patch replacing the finalizer list
pub fn finalizer_patch(finalizers: Vec<String>) -> Value {
    json!({ "metadata": { "finalizers": finalizers } })
}

/// Value of the `cluster.x-k8s.io/cluster-name` label
pub fn cluster_name_label(meta: &ObjectMeta) -> Option<&str> {
    meta.labels
        .as_ref()
        .and_then(|l| l.get(CLUSTER_NAME_LABEL))
        .map(String::as_str)
        .filter(|name| !name.is_empty())
}

/// Name of the CAPI Machine owning an infrastructure machine
pub fn owner_machine_name(meta: &ObjectMeta) -> Option<String> {
    meta.owner_references.as_ref()?.iter().find_map(|owner| {
        (owner.kind == "Machine" && owner.api_version.starts_with("cluster.x-k8s.io/"))
            .then(|| owner.name.clone())
    })
}

/// Provider ID of a VPC machine
pub fn vpc_provider_id(cluster_name: &str, machine_name: &str) -> String {
    format!("ibmvpc://{}/{}", cluster_name, machine_name)
}

/// Provider ID of a PowerVS machine
pub fn powervs_provider_id(region: &str, zone: &str, service_instance_id: &str, instance_id: &str) -> String {
    format!("ibmpowervs://{}/{}/{}/{}", region, zone, service_instance_id, instance_id)
}

/// User data carried by a bootstrap data secret
pub fn decode_bootstrap_data(secret: &Secret) -> Result<String, ControllerError> {
    let name = secret.metadata.name.as_deref().unwrap_or_default();
    let bytes = secret
        .data
        .as_ref()
        .and_then(|d| d.get(BOOTSTRAP_DATA_KEY))
        .ok_or_else(|| {
            ControllerError::BootstrapData(format!("secret {} has no '{}' key", name, BOOTSTRAP_DATA_KEY))
        })?;
    String::from_utf8(bytes.0.clone())
        .map_err(|e| ControllerError::BootstrapData(format!("secret {} is not valid UTF-8: {}", name, e)))
}

/// Merge patch for the status subresource.
///
/// Fields present in `previous` but dropped from `current` are sent as
/// `null` so the API server clears them; a plain merge patch would leave
/// them behind.
pub fn status_patch<T: Serialize>(previous: Option<&T>, current: &T) -> Result<Value, ControllerError> {
    let mut status = match serde_json::to_value(current)? {
        Value::Object(map) => map,
        other => return Ok(json!({ "status": other })),
    };

    if let Some(previous) = previous {
        if let Value::Object(old) = serde_json::to_value(previous)? {
            clear_removed_fields(&old, &mut status);
        }
    }

    Ok(json!({ "status": status }))
}

fn clear_removed_fields(old: &Map<String, Value>, new: &mut Map<String, Value>) {
    for (key, old_value) in old {
        match new.get_mut(key) {
            None => {
                new.insert(key.clone(), Value::Null);
            }
            Some(Value::Object(new_child)) => {
                if let Value::Object(old_child) = old_value {
                    clear_removed_fields(old_child, new_child);
                }
            }
            Some(_) => {}
        }
    }
}
