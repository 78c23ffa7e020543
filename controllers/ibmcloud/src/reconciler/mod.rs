//! Reconciliation logic for the IBM Cloud infrastructure CRDs.
//!
//! This module is organized by IBM Cloud platform:
//! - `vpc`: IBMVPCCluster and IBMVPCMachine
//! - `powervs`: IBMPowerVSCluster, IBMPowerVSMachine and IBMPowerVSImage
//!
//! The per-kind reconcilers resolve the owning CAPI objects, manage the
//! finalizer, run the matching scope and write the scope's status back.

pub mod powervs;
pub mod vpc;


use crate::backoff::BackoffRegistry;
use crate::error::ControllerError;
use crate::metrics::Metrics;
use crate::reconcile_helpers::{
    decode_bootstrap_data, finalizer_patch, finalizers_with, finalizers_without, has_finalizer, owner_machine_name,
    status_patch,
};
use crds::{Cluster, Machine};
use ibmcloud_client::ClientProvider;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Reconciles IBM Cloud infrastructure resources.
pub struct Reconciler {
    pub(crate) provider: Box<dyn ClientProvider>,
    pub(crate) client: Client,
    pub(crate) metrics: Arc<Metrics>,
    /// Error count tracking per resource (Kind/namespace/name)
    pub(crate) backoff: BackoffRegistry,
    /// Resync interval for objects that reached their desired state
    pub(crate) sync_period: Duration,
}

impl Reconciler {
    /// Reconciler resyncing settled objects every `sync_period`
    pub fn new(
        provider: Box<dyn ClientProvider>,
        client: Client,
        metrics: Arc<Metrics>,
        sync_period: Duration,
    ) -> Self {
        Self {
            provider,
            client,
            metrics,
            backoff: BackoffRegistry::new(),
            sync_period,
        }
    }

    pub(crate) fn api<K>(&self, namespace: &str) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
    {
        Api::namespaced(self.client.clone(), namespace)
    }

    /// The CAPI Cluster, if it exists
    pub(crate) async fn get_cluster(&self, namespace: &str, name: &str) -> Result<Option<Cluster>, ControllerError> {
        Ok(self.api::<Cluster>(namespace).get_opt(name).await?)
    }

    /// The CAPI Machine owning an infrastructure machine, if set and present
    pub(crate) async fn get_owner_machine(
        &self,
        namespace: &str,
        meta: &ObjectMeta,
    ) -> Result<Option<Machine>, ControllerError> {
        let Some(name) = owner_machine_name(meta) else {
            return Ok(None);
        };
        Ok(self.api::<Machine>(namespace).get_opt(&name).await?)
    }

    /// Bootstrap user data for `machine`, or `None` until the bootstrap
    /// provider has written its secret
    pub(crate) async fn bootstrap_data(
        &self,
        namespace: &str,
        machine: &Machine,
    ) -> Result<Option<String>, ControllerError> {
        let Some(secret_name) = machine.spec.bootstrap.data_secret_name.as_deref() else {
            return Ok(None);
        };
        match self.api::<Secret>(namespace).get_opt(secret_name).await? {
            Some(secret) => decode_bootstrap_data(&secret).map(Some),
            None => {
                debug!("Bootstrap data secret {}/{} not found yet", namespace, secret_name);
                Ok(None)
            }
        }
    }

    pub(crate) async fn add_finalizer<K>(
        &self,
        api: &Api<K>,
        meta: &ObjectMeta,
        finalizer: &str,
    ) -> Result<(), ControllerError>
    where
        K: Clone + DeserializeOwned + Debug,
    {
        if has_finalizer(meta, finalizer) {
            return Ok(());
        }
        let name = meta.name.as_deref().unwrap_or_default();
        let patch = finalizer_patch(finalizers_with(meta, finalizer));
        api.patch(name, &PatchParams::default(), &Patch::Merge(&patch)).await?;
        debug!("Added finalizer {} to {}", finalizer, name);
        Ok(())
    }

    pub(crate) async fn remove_finalizer<K>(
        &self,
        api: &Api<K>,
        meta: &ObjectMeta,
        finalizer: &str,
    ) -> Result<(), ControllerError>
    where
        K: Clone + DeserializeOwned + Debug,
    {
        if !has_finalizer(meta, finalizer) {
            return Ok(());
        }
        let name = meta.name.as_deref().unwrap_or_default();
        let patch = finalizer_patch(finalizers_without(meta, finalizer));
        api.patch(name, &PatchParams::default(), &Patch::Merge(&patch)).await?;
        info!("Removed finalizer {} from {}", finalizer, name);
        Ok(())
    }

    /// Write `current` to the status subresource unless nothing changed
    pub(crate) async fn patch_status<K, S>(
        &self,
        api: &Api<K>,
        name: &str,
        previous: Option<&S>,
        current: &S,
    ) -> Result<(), ControllerError>
    where
        K: Clone + DeserializeOwned + Debug,
        S: Serialize + PartialEq,
    {
        if previous == Some(current) {
            return Ok(());
        }
        let patch = status_patch(previous, current)?;
        api.patch_status(name, &PatchParams::default(), &Patch::Merge(&patch)).await?;
        debug!("Patched status of {}", name);
        Ok(())
    }

    /// Merge-patch the object's spec
    pub(crate) async fn patch_spec<K>(&self, api: &Api<K>, name: &str, spec: Value) -> Result<(), ControllerError>
    where
        K: Clone + DeserializeOwned + Debug,
    {
        let patch = serde_json::json!({ "spec": spec });
        api.patch(name, &PatchParams::default(), &Patch::Merge(&patch)).await?;
        Ok(())
    }
}

/// Name and namespace of a namespaced object
pub(crate) fn object_identity(meta: &ObjectMeta, kind: &str) -> Result<(String, String), ControllerError> {
    let name = meta
        .name
        .clone()
        .ok_or_else(|| ControllerError::Watch(format!("{} without a name", kind)))?;
    let namespace = meta.namespace.clone().unwrap_or_else(|| "default".to_string());
    Ok((name, namespace))
}
