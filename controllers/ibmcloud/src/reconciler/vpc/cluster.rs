//! IBMVPCCluster reconciler

use super::super::{object_identity, Reconciler};
use crate::error::ControllerError;
use crate::reconcile_helpers::{
    cluster_name_label, has_finalizer, is_paused, ReconcileOutcome, REQUEUE_NOT_READY, VPC_CLUSTER_FINALIZER,
};
use crate::scope::VpcClusterScope;
use crds::{mark_false, APIEndpoint, ConditionSeverity, IBMVPCCluster, DELETING_REASON, READY_CONDITION};
use kube::Api;
use tracing::{debug, info, warn};

/// Endpoint to write to the spec, when the scope found one and the spec has none yet
pub(crate) fn endpoint_to_publish(current: &APIEndpoint, discovered: Option<APIEndpoint>) -> Option<APIEndpoint> {
    if current.is_valid() {
        return None;
    }
    discovered.filter(APIEndpoint::is_valid)
}

impl Reconciler {
    /// Provision VPC networking and the control plane endpoint
    pub async fn reconcile_vpc_cluster(&self, vpc_cluster: &IBMVPCCluster) -> Result<ReconcileOutcome, ControllerError> {
        let (name, namespace) = object_identity(&vpc_cluster.metadata, "IBMVPCCluster")?;
        let api: Api<IBMVPCCluster> = self.api(&namespace);
        let deleting = vpc_cluster.metadata.deletion_timestamp.is_some();

        let cluster_name = cluster_name_label(&vpc_cluster.metadata).map(str::to_string);
        let cluster = match cluster_name.as_deref() {
            Some(cluster_name) => self.get_cluster(&namespace, cluster_name).await?,
            None => None,
        };

        if cluster.is_none() && !deleting {
            info!(
                "IBMVPCCluster {}/{} has no CAPI Cluster yet, waiting for the owner",
                namespace, name
            );
            return Ok(ReconcileOutcome::RequeueAfter(REQUEUE_NOT_READY));
        }
        if is_paused(cluster.as_ref(), &vpc_cluster.metadata) {
            info!("IBMVPCCluster {}/{} is paused, skipping", namespace, name);
            return Ok(ReconcileOutcome::Done);
        }

        let client = self.provider.vpc(&vpc_cluster.spec.region).await?;
        let mut scope = VpcClusterScope::new(
            client,
            cluster_name.unwrap_or_else(|| name.clone()),
            vpc_cluster.spec.clone(),
            vpc_cluster.status.clone(),
        );

        if deleting {
            if !has_finalizer(&vpc_cluster.metadata, VPC_CLUSTER_FINALIZER) {
                return Ok(ReconcileOutcome::Done);
            }
            info!("Deleting IBMVPCCluster {}/{}", namespace, name);
            scope.status.ready = false;
            mark_false(
                &mut scope.status.conditions,
                READY_CONDITION,
                DELETING_REASON,
                ConditionSeverity::Info,
                "cluster infrastructure is being deleted",
            );
            let result = scope.delete().await;
            self.patch_status(&api, &name, vpc_cluster.status.as_ref(), &scope.status).await?;
            let outcome = result?;
            if outcome == ReconcileOutcome::Done {
                self.remove_finalizer(&api, &vpc_cluster.metadata, VPC_CLUSTER_FINALIZER).await?;
                info!("IBMVPCCluster {}/{} infrastructure deleted", namespace, name);
            }
            return Ok(outcome);
        }

        self.add_finalizer(&api, &vpc_cluster.metadata, VPC_CLUSTER_FINALIZER).await?;

        let result = scope.provision().await;
        let discovered = scope.control_plane_endpoint();
        if let Some(endpoint) = endpoint_to_publish(&vpc_cluster.spec.control_plane_endpoint, discovered) {
            info!(
                "Publishing control plane endpoint {}:{} for IBMVPCCluster {}/{}",
                endpoint.host, endpoint.port, namespace, name
            );
            self.patch_spec(&api, &name, serde_json::json!({ "controlPlaneEndpoint": endpoint })).await?;
        }
        self.patch_status(&api, &name, vpc_cluster.status.as_ref(), &scope.status).await?;

        match &result {
            Ok(ReconcileOutcome::Done) => debug!("IBMVPCCluster {}/{} is ready", namespace, name),
            Ok(ReconcileOutcome::RequeueAfter(delay)) => {
                debug!("IBMVPCCluster {}/{} not ready, requeue in {:?}", namespace, name, delay);
            }
            Err(e) => warn!("IBMVPCCluster {}/{} provisioning failed: {}", namespace, name, e),
        }
        result
    }
}
