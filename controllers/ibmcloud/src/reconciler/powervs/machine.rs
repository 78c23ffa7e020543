//! IBMPowerVSMachine reconciler

use super::super::{object_identity, Reconciler};
use crate::error::ControllerError;
use crate::reconcile_helpers::{
    cluster_name_label, has_finalizer, is_paused, ReconcileOutcome, POWERVS_MACHINE_FINALIZER, REQUEUE_NOT_READY,
};
use crate::scope::PowerVsMachineScope;
use crds::{
    mark_false, ConditionSeverity, IBMPowerVSImage, IBMPowerVSImageStatus, IBMPowerVSMachine,
    INSTANCE_READY_CONDITION, WAITING_FOR_BOOTSTRAP_DATA_REASON, WAITING_FOR_CLUSTER_INFRASTRUCTURE_REASON,
};
use kube::Api;
use tracing::{debug, info, warn};

impl Reconciler {
    /// Create the PVM instance once infrastructure and bootstrap data are ready
    pub async fn reconcile_powervs_machine(
        &self,
        powervs_machine: &IBMPowerVSMachine,
    ) -> Result<ReconcileOutcome, ControllerError> {
        let (name, namespace) = object_identity(&powervs_machine.metadata, "IBMPowerVSMachine")?;
        let api: Api<IBMPowerVSMachine> = self.api(&namespace);
        let deleting = powervs_machine.metadata.deletion_timestamp.is_some();

        let machine = self.get_owner_machine(&namespace, &powervs_machine.metadata).await?;
        if machine.is_none() && !deleting {
            info!("IBMPowerVSMachine {}/{} has no owning Machine yet", namespace, name);
            return Ok(ReconcileOutcome::RequeueAfter(REQUEUE_NOT_READY));
        }

        let cluster_name = cluster_name_label(&powervs_machine.metadata)
            .map(str::to_string)
            .or_else(|| machine.as_ref().map(|m| m.spec.cluster_name.clone()));
        let cluster = match cluster_name.as_deref() {
            Some(cluster_name) => self.get_cluster(&namespace, cluster_name).await?,
            None => None,
        };
        if cluster.is_none() && !deleting {
            info!("IBMPowerVSMachine {}/{} has no CAPI Cluster yet", namespace, name);
            return Ok(ReconcileOutcome::RequeueAfter(REQUEUE_NOT_READY));
        }
        if is_paused(cluster.as_ref(), &powervs_machine.metadata) {
            info!("IBMPowerVSMachine {}/{} is paused, skipping", namespace, name);
            return Ok(ReconcileOutcome::Done);
        }

        let client = self.provider.power_vs(&powervs_machine.spec.service_instance_id).await?;
        let mut scope = PowerVsMachineScope::new(
            client,
            cluster_name.unwrap_or_default(),
            name.clone(),
            powervs_machine.spec.clone(),
            powervs_machine.status.clone(),
        );

        if deleting {
            if !has_finalizer(&powervs_machine.metadata, POWERVS_MACHINE_FINALIZER) {
                return Ok(ReconcileOutcome::Done);
            }
            info!("Deleting IBMPowerVSMachine {}/{}", namespace, name);
            let result = scope.delete().await;
            self.patch_status(&api, &name, powervs_machine.status.as_ref(), &scope.status).await?;
            let outcome = result?;
            if outcome == ReconcileOutcome::Done {
                self.remove_finalizer(&api, &powervs_machine.metadata, POWERVS_MACHINE_FINALIZER).await?;
            }
            return Ok(outcome);
        }

        self.add_finalizer(&api, &powervs_machine.metadata, POWERVS_MACHINE_FINALIZER).await?;

        let infrastructure_ready = cluster.as_ref().is_some_and(|c| {
            c.status.as_ref().is_some_and(|s| s.infrastructure_ready)
        });
        if !infrastructure_ready {
            debug!("IBMPowerVSMachine {}/{} waiting for cluster infrastructure", namespace, name);
            scope.status.ready = false;
            mark_false(
                &mut scope.status.conditions,
                INSTANCE_READY_CONDITION,
                WAITING_FOR_CLUSTER_INFRASTRUCTURE_REASON,
                ConditionSeverity::Info,
                "",
            );
            self.patch_status(&api, &name, powervs_machine.status.as_ref(), &scope.status).await?;
            return Ok(ReconcileOutcome::RequeueAfter(REQUEUE_NOT_READY));
        }

        let bootstrap_data = match machine.as_ref() {
            Some(machine) => self.bootstrap_data(&namespace, machine).await?,
            None => None,
        };
        let Some(bootstrap_data) = bootstrap_data else {
            debug!("IBMPowerVSMachine {}/{} waiting for bootstrap data", namespace, name);
            scope.status.ready = false;
            mark_false(
                &mut scope.status.conditions,
                INSTANCE_READY_CONDITION,
                WAITING_FOR_BOOTSTRAP_DATA_REASON,
                ConditionSeverity::Info,
                "",
            );
            self.patch_status(&api, &name, powervs_machine.status.as_ref(), &scope.status).await?;
            return Ok(ReconcileOutcome::RequeueAfter(REQUEUE_NOT_READY));
        };

        let image_status = self.image_status(&namespace, powervs_machine).await?;
        let mut scope = scope.with_bootstrap_data(Some(bootstrap_data));
        let result = scope.reconcile(image_status.as_ref()).await;

        if let Some(provider_id) = scope.provider_id() {
            if powervs_machine.spec.provider_id.as_deref() != Some(provider_id.as_str()) {
                info!("Setting providerID {} on IBMPowerVSMachine {}/{}", provider_id, namespace, name);
                self.patch_spec(&api, &name, serde_json::json!({ "providerID": provider_id })).await?;
            }
        }
        self.patch_status(&api, &name, powervs_machine.status.as_ref(), &scope.status).await?;

        if let Err(e) = &result {
            warn!("IBMPowerVSMachine {}/{} reconciliation failed: {}", namespace, name, e);
        }
        result
    }

    /// Status of the IBMPowerVSImage named by `spec.imageRef`
    async fn image_status(
        &self,
        namespace: &str,
        powervs_machine: &IBMPowerVSMachine,
    ) -> Result<Option<IBMPowerVSImageStatus>, ControllerError> {
        let Some(image_ref) = powervs_machine.spec.image_ref.as_ref() else {
            return Ok(None);
        };
        let image_namespace = image_ref.namespace_or(namespace);
        let image = self
            .api::<IBMPowerVSImage>(image_namespace)
            .get_opt(&image_ref.name)
            .await?;
        if image.is_none() {
            debug!("IBMPowerVSImage {}/{} does not exist yet", image_namespace, image_ref.name);
        }
        Ok(image.and_then(|i| i.status))
    }
}
