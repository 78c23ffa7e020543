//! IBMVPCMachine reconciler

use super::super::{object_identity, Reconciler};
use crate::error::ControllerError;
use crate::reconcile_helpers::{
    cluster_name_label, has_finalizer, is_paused, ReconcileOutcome, REQUEUE_NOT_READY, VPC_MACHINE_FINALIZER,
};
use crate::scope::VpcMachineScope;
use crds::{
    mark_false, ConditionSeverity, IBMVPCCluster, IBMVPCMachine, CONTROL_PLANE_LABEL, INSTANCE_READY_CONDITION,
    WAITING_FOR_BOOTSTRAP_DATA_REASON, WAITING_FOR_CLUSTER_INFRASTRUCTURE_REASON,
};
use kube::Api;
use tracing::{debug, info, warn};

/// Region of a VPC zone: `us-south-1` is in `us-south`
pub(crate) fn vpc_region_for_zone(zone: &str) -> &str {
    match zone.rsplit_once('-') {
        Some((region, suffix)) if !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit()) => region,
        _ => zone,
    }
}

impl Reconciler {
    /// Create the VPC instance once infrastructure and bootstrap data are ready
    pub async fn reconcile_vpc_machine(&self, vpc_machine: &IBMVPCMachine) -> Result<ReconcileOutcome, ControllerError> {
        let (name, namespace) = object_identity(&vpc_machine.metadata, "IBMVPCMachine")?;
        let api: Api<IBMVPCMachine> = self.api(&namespace);
        let deleting = vpc_machine.metadata.deletion_timestamp.is_some();

        let machine = self.get_owner_machine(&namespace, &vpc_machine.metadata).await?;
        if machine.is_none() && !deleting {
            info!("IBMVPCMachine {}/{} has no owning Machine yet", namespace, name);
            return Ok(ReconcileOutcome::RequeueAfter(REQUEUE_NOT_READY));
        }

        let cluster_name = cluster_name_label(&vpc_machine.metadata)
            .map(str::to_string)
            .or_else(|| machine.as_ref().map(|m| m.spec.cluster_name.clone()));
        let cluster = match cluster_name.as_deref() {
            Some(cluster_name) => self.get_cluster(&namespace, cluster_name).await?,
            None => None,
        };
        if cluster.is_none() && !deleting {
            info!("IBMVPCMachine {}/{} has no CAPI Cluster yet", namespace, name);
            return Ok(ReconcileOutcome::RequeueAfter(REQUEUE_NOT_READY));
        }
        if is_paused(cluster.as_ref(), &vpc_machine.metadata) {
            info!("IBMVPCMachine {}/{} is paused, skipping", namespace, name);
            return Ok(ReconcileOutcome::Done);
        }

        let infra_name = cluster
            .as_ref()
            .and_then(|c| c.infrastructure_name("IBMVPCCluster"))
            .or_else(|| cluster_name.clone());
        let vpc_cluster = match infra_name.as_deref() {
            Some(infra_name) => self.api::<IBMVPCCluster>(&namespace).get_opt(infra_name).await?,
            None => None,
        };

        let region = vpc_cluster
            .as_ref()
            .map(|c| c.spec.region.clone())
            .unwrap_or_else(|| vpc_region_for_zone(&vpc_machine.spec.zone).to_string());
        let client = self.provider.vpc(&region).await?;

        let is_control_plane = match machine.as_ref() {
            Some(machine) => machine.is_control_plane(),
            None => vpc_machine
                .metadata
                .labels
                .as_ref()
                .is_some_and(|l| l.contains_key(CONTROL_PLANE_LABEL)),
        };
        let (cluster_status, resource_group) = vpc_cluster
            .as_ref()
            .map(|c| (c.status.clone().unwrap_or_default(), c.spec.resource_group.clone()))
            .unwrap_or_default();
        let mut scope = VpcMachineScope::new(
            client,
            cluster_name.clone().unwrap_or_default(),
            name.clone(),
            vpc_machine.spec.clone(),
            vpc_machine.status.clone(),
        )
        .with_cluster(cluster_status, resource_group)
        .control_plane(is_control_plane);

        if deleting {
            if !has_finalizer(&vpc_machine.metadata, VPC_MACHINE_FINALIZER) {
                return Ok(ReconcileOutcome::Done);
            }
            info!("Deleting IBMVPCMachine {}/{}", namespace, name);
            let result = scope.delete().await;
            self.patch_status(&api, &name, vpc_machine.status.as_ref(), &scope.status).await?;
            let outcome = result?;
            if outcome == ReconcileOutcome::Done {
                self.remove_finalizer(&api, &vpc_machine.metadata, VPC_MACHINE_FINALIZER).await?;
            }
            return Ok(outcome);
        }

        self.add_finalizer(&api, &vpc_machine.metadata, VPC_MACHINE_FINALIZER).await?;

        let infrastructure_ready = cluster.as_ref().is_some_and(|c| {
            c.status.as_ref().is_some_and(|s| s.infrastructure_ready)
        });
        if !infrastructure_ready || vpc_cluster.is_none() {
            debug!("IBMVPCMachine {}/{} waiting for cluster infrastructure", namespace, name);
            scope.status.ready = false;
            mark_false(
                &mut scope.status.conditions,
                INSTANCE_READY_CONDITION,
                WAITING_FOR_CLUSTER_INFRASTRUCTURE_REASON,
                ConditionSeverity::Info,
                "",
            );
            self.patch_status(&api, &name, vpc_machine.status.as_ref(), &scope.status).await?;
            return Ok(ReconcileOutcome::RequeueAfter(REQUEUE_NOT_READY));
        }

        let bootstrap_data = match machine.as_ref() {
            Some(machine) => self.bootstrap_data(&namespace, machine).await?,
            None => None,
        };
        let Some(bootstrap_data) = bootstrap_data else {
            debug!("IBMVPCMachine {}/{} waiting for bootstrap data", namespace, name);
            scope.status.ready = false;
            mark_false(
                &mut scope.status.conditions,
                INSTANCE_READY_CONDITION,
                WAITING_FOR_BOOTSTRAP_DATA_REASON,
                ConditionSeverity::Info,
                "",
            );
            self.patch_status(&api, &name, vpc_machine.status.as_ref(), &scope.status).await?;
            return Ok(ReconcileOutcome::RequeueAfter(REQUEUE_NOT_READY));
        };

        let mut scope = scope.with_bootstrap_data(Some(bootstrap_data));
        let result = scope.reconcile().await;

        if scope.status.instance_id.is_some() {
            let provider_id = scope.provider_id();
            if vpc_machine.spec.provider_id.as_deref() != Some(provider_id.as_str()) {
                info!("Setting providerID {} on IBMVPCMachine {}/{}", provider_id, namespace, name);
                self.patch_spec(&api, &name, serde_json::json!({ "providerID": provider_id })).await?;
            }
        }
        self.patch_status(&api, &name, vpc_machine.status.as_ref(), &scope.status).await?;

        if let Err(e) = &result {
            warn!("IBMVPCMachine {}/{} reconciliation failed: {}", namespace, name, e);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vpc_region_for_zone() {
        assert_eq!(vpc_region_for_zone("us-south-1"), "us-south");
        assert_eq!(vpc_region_for_zone("eu-de-3"), "eu-de");
        assert_eq!(vpc_region_for_zone("jp-tok"), "jp-tok");
        assert_eq!(vpc_region_for_zone(""), "");
    }
}
