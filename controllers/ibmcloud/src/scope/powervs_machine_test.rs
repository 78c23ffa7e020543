//! Unit tests for the PowerVS machine scope

#[cfg(test)]
mod tests {
    use crate::error::ControllerError;
    use crate::reconcile_helpers::{ReconcileOutcome, REQUEUE_INSTANCE_BUILD, REQUEUE_NOT_READY};
    use crate::scope::PowerVsMachineScope;
    use crate::test_utils::*;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use crds::*;
    use ibmcloud_client::{Image, MockPowerVsClient, Network};
    use std::sync::Arc;

    fn workspace() -> MockPowerVsClient {
        let client = MockPowerVsClient::new(TEST_WORKSPACE, TEST_POWERVS_ZONE, TEST_REGION);
        client.add_network(Network {
            network_id: "net-1".to_string(),
            name: "capi-net".to_string(),
            ..Default::default()
        });
        client.add_image(Image {
            image_id: "img-rhcos".to_string(),
            name: "rhcos-414".to_string(),
            state: Some("active".to_string()),
            storage_type: Some("tier1".to_string()),
        });
        client
    }

    fn machine_scope(client: &MockPowerVsClient, spec: IBMPowerVSMachineSpec) -> PowerVsMachineScope {
        PowerVsMachineScope::new(Arc::new(client.clone()), "capi", "capi-pvs-cp-0", spec, None)
            .with_bootstrap_data(Some("#cloud-config\n".to_string()))
    }

    fn image_ref_spec() -> IBMPowerVSMachineSpec {
        IBMPowerVSMachineSpec {
            image: None,
            image_ref: Some(ObjectReference::infrastructure("IBMPowerVSImage", "capi-rhcos")),
            ..powervs_machine_spec()
        }
    }

    #[tokio::test]
    async fn test_reconcile_creates_instance_in_build() {
        let client = workspace();
        let mut scope = machine_scope(&client, powervs_machine_spec());

        let outcome = scope.reconcile(None).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::RequeueAfter(REQUEUE_INSTANCE_BUILD));
        assert!(!scope.status.ready);
        assert_eq!(scope.status.instance_state.as_deref(), Some("BUILD"));
        let condition = get_condition(&scope.status.conditions, INSTANCE_READY_CONDITION).unwrap();
        assert_eq!(condition.reason.as_deref(), Some(INSTANCE_NOT_READY_REASON));

        let request = &client.instance_requests()[0];
        assert_eq!(request.server_name, "capi-pvs-cp-0");
        assert_eq!(request.image_id, "img-rhcos");
        assert_eq!(request.proc_type, "shared");
        assert_eq!(request.processors, 0.25);
        assert_eq!(request.memory, 4.0);
        assert_eq!(request.sys_type, "s922");
        assert_eq!(request.key_pair_name.as_deref(), Some("capi-key"));
        assert_eq!(request.networks[0].network_id, "net-1");
        assert_eq!(request.user_data.as_deref(), Some(STANDARD.encode("#cloud-config\n").as_str()));
    }

    #[tokio::test]
    async fn test_active_instance_reports_addresses_and_provider_id() {
        let client = workspace();
        let mut scope = machine_scope(&client, powervs_machine_spec());
        scope.reconcile(None).await.unwrap();
        let id = scope.status.instance_id.clone().unwrap();

        client.set_instance_status(&id, "ACTIVE");
        assert_eq!(scope.reconcile(None).await.unwrap(), ReconcileOutcome::Done);
        assert!(scope.status.ready);
        assert!(is_true(&scope.status.conditions, READY_CONDITION));
        assert_eq!(scope.status.addresses, vec![MachineAddress::internal_ip("192.168.0.10")]);
        assert_eq!(scope.status.region.as_deref(), Some(TEST_REGION));
        assert_eq!(scope.status.zone.as_deref(), Some(TEST_POWERVS_ZONE));
        assert_eq!(
            scope.provider_id(),
            Some(format!("ibmpowervs://{}/{}/{}/{}", TEST_REGION, TEST_POWERVS_ZONE, TEST_WORKSPACE, id))
        );
        assert_eq!(client.instances().len(), 1);
    }

    #[tokio::test]
    async fn test_lost_status_adopts_instance_by_name() {
        let client = workspace();
        let mut first = machine_scope(&client, powervs_machine_spec());
        first.reconcile(None).await.unwrap();

        let mut second = machine_scope(&client, powervs_machine_spec());
        second.reconcile(None).await.unwrap();
        assert_eq!(client.instances().len(), 1);
        assert_eq!(second.status.instance_id, first.status.instance_id);
    }

    #[tokio::test]
    async fn test_error_state_surfaces_fault() {
        let client = workspace();
        let mut scope = machine_scope(&client, powervs_machine_spec());
        scope.reconcile(None).await.unwrap();
        let id = scope.status.instance_id.clone().unwrap();

        client.set_instance_status(&id, "ERROR");
        client.set_instance_fault(&id, "insufficient capacity on host");
        assert_eq!(scope.reconcile(None).await.unwrap(), ReconcileOutcome::Done);

        let condition = get_condition(&scope.status.conditions, INSTANCE_READY_CONDITION).unwrap();
        assert_eq!(condition.reason.as_deref(), Some(INSTANCE_ERRORED_REASON));
        assert_eq!(condition.message.as_deref(), Some("insufficient capacity on host"));
        assert_eq!(scope.status.fault.as_deref(), Some("insufficient capacity on host"));
    }

    #[tokio::test]
    async fn test_shutoff_and_unknown_states() {
        let client = workspace();
        let mut scope = machine_scope(&client, powervs_machine_spec());
        scope.reconcile(None).await.unwrap();
        let id = scope.status.instance_id.clone().unwrap();

        client.set_instance_status(&id, "SHUTOFF");
        assert_eq!(scope.reconcile(None).await.unwrap(), ReconcileOutcome::Done);
        let condition = get_condition(&scope.status.conditions, INSTANCE_READY_CONDITION).unwrap();
        assert_eq!(condition.reason.as_deref(), Some(INSTANCE_STOPPED_REASON));

        client.set_instance_status(&id, "MIGRATING");
        assert_eq!(
            scope.reconcile(None).await.unwrap(),
            ReconcileOutcome::RequeueAfter(REQUEUE_NOT_READY)
        );
        let condition = get_condition(&scope.status.conditions, INSTANCE_READY_CONDITION).unwrap();
        assert_eq!(condition.reason.as_deref(), Some(INSTANCE_STATE_UNKNOWN_REASON));
    }

    #[tokio::test]
    async fn test_image_ref_waits_for_image() {
        let client = workspace();
        let mut scope = machine_scope(&client, image_ref_spec());

        let importing = IBMPowerVSImageStatus {
            ready: false,
            job_id: Some("job-1".to_string()),
            ..Default::default()
        };
        let outcome = scope.reconcile(Some(&importing)).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::RequeueAfter(REQUEUE_NOT_READY));
        assert!(client.instances().is_empty());
        let condition = get_condition(&scope.status.conditions, INSTANCE_READY_CONDITION).unwrap();
        assert_eq!(condition.reason.as_deref(), Some(WAITING_FOR_IBM_POWERVS_IMAGE_REASON));

        let ready = IBMPowerVSImageStatus {
            ready: true,
            image_id: Some("img-imported".to_string()),
            ..Default::default()
        };
        scope.reconcile(Some(&ready)).await.unwrap();
        assert_eq!(client.instance_requests()[0].image_id, "img-imported");
    }

    #[tokio::test]
    async fn test_missing_image_is_provision_failure() {
        let client = workspace();
        let spec = IBMPowerVSMachineSpec {
            image: Some(IBMCloudResourceReference::by_id("img-missing")),
            ..powervs_machine_spec()
        };
        let mut scope = machine_scope(&client, spec);

        assert!(matches!(scope.reconcile(None).await, Err(ControllerError::Provision(_))));
        let condition = get_condition(&scope.status.conditions, INSTANCE_READY_CONDITION).unwrap();
        assert_eq!(condition.reason.as_deref(), Some(INSTANCE_PROVISION_FAILED_REASON));
    }

    #[tokio::test]
    async fn test_invalid_spec_never_reaches_the_cloud() {
        let client = workspace();
        let spec = IBMPowerVSMachineSpec {
            processor_type: PowerVSProcessorType::Dedicated,
            processors: "0.5".to_string(),
            ..powervs_machine_spec()
        };
        let mut scope = machine_scope(&client, spec);

        assert!(matches!(scope.reconcile(None).await, Err(ControllerError::Spec(_))));
        assert!(client.instance_requests().is_empty());
    }

    #[tokio::test]
    async fn test_delete_by_id_and_by_name() {
        let client = workspace();
        let mut scope = machine_scope(&client, powervs_machine_spec());
        scope.reconcile(None).await.unwrap();
        let id = scope.status.instance_id.clone().unwrap();

        let mut orphaned = machine_scope(&client, powervs_machine_spec());
        assert_eq!(orphaned.delete().await.unwrap(), ReconcileOutcome::Done);
        assert_eq!(client.deleted(), vec![format!("pvm_instance:{}", id)]);

        // Already gone: deleting by ID is still fine
        assert_eq!(scope.delete().await.unwrap(), ReconcileOutcome::Done);
        assert!(scope.status.instance_id.is_none());
        assert_eq!(client.deleted().len(), 1);
    }
}
