//! IBMPowerVSImage reconciler

use super::super::{object_identity, Reconciler};
use crate::error::ControllerError;
use crate::reconcile_helpers::{has_finalizer, is_paused, ReconcileOutcome, POWERVS_IMAGE_FINALIZER, REQUEUE_NOT_READY};
use crate::scope::PowerVsImageScope;
use crds::{mark_false, ConditionSeverity, IBMPowerVSImage, IMAGE_READY_CONDITION, IMAGE_RECONCILIATION_FAILED_REASON};
use kube::Api;
use tracing::{info, warn};

impl Reconciler {
    /// Import the boot image, or delete it according to its delete policy
    pub async fn reconcile_powervs_image(&self, image: &IBMPowerVSImage) -> Result<ReconcileOutcome, ControllerError> {
        let (name, namespace) = object_identity(&image.metadata, "IBMPowerVSImage")?;
        let api: Api<IBMPowerVSImage> = self.api(&namespace);
        let deleting = image.metadata.deletion_timestamp.is_some();

        let cluster = if image.spec.cluster_name.is_empty() {
            None
        } else {
            self.get_cluster(&namespace, &image.spec.cluster_name).await?
        };
        if cluster.is_none() && !deleting {
            info!(
                "IBMPowerVSImage {}/{} waiting for CAPI Cluster {}",
                namespace, name, image.spec.cluster_name
            );
            return Ok(ReconcileOutcome::RequeueAfter(REQUEUE_NOT_READY));
        }
        if is_paused(cluster.as_ref(), &image.metadata) {
            info!("IBMPowerVSImage {}/{} is paused, skipping", namespace, name);
            return Ok(ReconcileOutcome::Done);
        }

        let client = self.provider.power_vs(&image.spec.service_instance_id).await?;
        let mut scope = PowerVsImageScope::new(client, name.clone(), image.spec.clone(), image.status.clone());

        if deleting {
            if !has_finalizer(&image.metadata, POWERVS_IMAGE_FINALIZER) {
                return Ok(ReconcileOutcome::Done);
            }
            info!("Deleting IBMPowerVSImage {}/{}", namespace, name);
            let result = scope.delete().await;
            self.patch_status(&api, &name, image.status.as_ref(), &scope.status).await?;
            let outcome = result?;
            if outcome == ReconcileOutcome::Done {
                self.remove_finalizer(&api, &image.metadata, POWERVS_IMAGE_FINALIZER).await?;
            }
            return Ok(outcome);
        }

        self.add_finalizer(&api, &image.metadata, POWERVS_IMAGE_FINALIZER).await?;

        let result = scope.reconcile().await;
        if let Err(e) = &result {
            warn!("IBMPowerVSImage {}/{} reconciliation failed: {}", namespace, name, e);
            if !matches!(e, ControllerError::Provision(_)) {
                scope.status.ready = false;
                mark_false(
                    &mut scope.status.conditions,
                    IMAGE_READY_CONDITION,
                    IMAGE_RECONCILIATION_FAILED_REASON,
                    ConditionSeverity::Error,
                    e.to_string(),
                );
            }
        }
        self.patch_status(&api, &name, image.status.as_ref(), &scope.status).await?;
        result
    }
}
