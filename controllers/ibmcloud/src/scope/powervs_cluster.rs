//! PowerVS cluster scope
//!
//! A PowerVS cluster only needs its workspace network resolved. The network
//! and workspace are owned by the user, so deletion releases nothing.

use crate::error::ControllerError;
use crate::reconcile_helpers::ReconcileOutcome;
use crate::scope::resolve_network;
use crds::{
    mark_false, mark_true, ConditionSeverity, IBMPowerVSClusterSpec, IBMPowerVSClusterStatus,
    NETWORK_PROVISION_FAILED_REASON, READY_CONDITION,
};
use ibmcloud_client::PowerVsClientTrait;
use std::sync::Arc;
use tracing::info;

/// Scope for one IBMPowerVSCluster reconciliation
pub struct PowerVsClusterScope {
    client: Arc<dyn PowerVsClientTrait>,
    pub spec: IBMPowerVSClusterSpec,
    pub status: IBMPowerVSClusterStatus,
}

impl PowerVsClusterScope {
    /// Scope for the cluster's workspace
    pub fn new(
        client: Arc<dyn PowerVsClientTrait>,
        spec: IBMPowerVSClusterSpec,
        status: Option<IBMPowerVSClusterStatus>,
    ) -> Self {
        Self {
            client,
            spec,
            status: status.unwrap_or_default(),
        }
    }

    /// Resolve the cluster network and mark the cluster ready
    pub async fn ensure_network(&mut self) -> Result<ReconcileOutcome, ControllerError> {
        match resolve_network(self.client.as_ref(), &self.spec.network).await {
            Ok(network_id) => {
                if self.status.network_id.as_deref() != Some(network_id.as_str()) {
                    info!(
                        "Cluster network resolved to {} in workspace {}",
                        network_id,
                        self.client.service_instance_id()
                    );
                }
                self.status.network_id = Some(network_id);
                self.status.ready = true;
                mark_true(&mut self.status.conditions, READY_CONDITION);
                Ok(ReconcileOutcome::Done)
            }
            Err(e) => {
                self.status.ready = false;
                mark_false(
                    &mut self.status.conditions,
                    READY_CONDITION,
                    NETWORK_PROVISION_FAILED_REASON,
                    ConditionSeverity::Error,
                    e.to_string(),
                );
                Err(e)
            }
        }
    }

    /// Nothing to release in IBM Cloud
    pub fn delete(&mut self) -> ReconcileOutcome {
        self.status.ready = false;
        ReconcileOutcome::Done
    }
}
