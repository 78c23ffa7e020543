//! IBMPowerVSCluster reconciler

use super::super::{object_identity, Reconciler};
use crate::error::ControllerError;
use crate::reconcile_helpers::{
    cluster_name_label, has_finalizer, is_paused, ReconcileOutcome, POWERVS_CLUSTER_FINALIZER, REQUEUE_NOT_READY,
};
use crate::scope::PowerVsClusterScope;
use crds::IBMPowerVSCluster;
use kube::Api;
use tracing::{info, warn};

impl Reconciler {
    /// Resolve the cluster network, or tear down on deletion
    pub async fn reconcile_powervs_cluster(
        &self,
        powervs_cluster: &IBMPowerVSCluster,
    ) -> Result<ReconcileOutcome, ControllerError> {
        let (name, namespace) = object_identity(&powervs_cluster.metadata, "IBMPowerVSCluster")?;
        let api: Api<IBMPowerVSCluster> = self.api(&namespace);
        let deleting = powervs_cluster.metadata.deletion_timestamp.is_some();

        let cluster = match cluster_name_label(&powervs_cluster.metadata) {
            Some(cluster_name) => self.get_cluster(&namespace, cluster_name).await?,
            None => None,
        };
        if cluster.is_none() && !deleting {
            info!(
                "IBMPowerVSCluster {}/{} has no CAPI Cluster yet, waiting for the owner",
                namespace, name
            );
            return Ok(ReconcileOutcome::RequeueAfter(REQUEUE_NOT_READY));
        }
        if is_paused(cluster.as_ref(), &powervs_cluster.metadata) {
            info!("IBMPowerVSCluster {}/{} is paused, skipping", namespace, name);
            return Ok(ReconcileOutcome::Done);
        }

        let client = self.provider.power_vs(&powervs_cluster.spec.service_instance_id).await?;
        let mut scope =
            PowerVsClusterScope::new(client, powervs_cluster.spec.clone(), powervs_cluster.status.clone());

        if deleting {
            if !has_finalizer(&powervs_cluster.metadata, POWERVS_CLUSTER_FINALIZER) {
                return Ok(ReconcileOutcome::Done);
            }
            // The workspace and network are user supplied; nothing to release
            let outcome = scope.delete();
            self.patch_status(&api, &name, powervs_cluster.status.as_ref(), &scope.status).await?;
            self.remove_finalizer(&api, &powervs_cluster.metadata, POWERVS_CLUSTER_FINALIZER).await?;
            info!("IBMPowerVSCluster {}/{} deleted", namespace, name);
            return Ok(outcome);
        }

        self.add_finalizer(&api, &powervs_cluster.metadata, POWERVS_CLUSTER_FINALIZER).await?;

        let result = scope.ensure_network().await;
        self.patch_status(&api, &name, powervs_cluster.status.as_ref(), &scope.status).await?;
        if let Err(e) = &result {
            warn!("IBMPowerVSCluster {}/{} network resolution failed: {}", namespace, name, e);
        }
        result
    }
}
