//! Unit tests for reconcile_helpers module

#[cfg(test)]
mod tests {
    use crate::error::ControllerError;
    use crate::reconcile_helpers::*;
    use crate::test_utils::*;
    use crds::*;
    use k8s_openapi::api::core::v1::Secret;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
    use k8s_openapi::ByteString;
    use kube_runtime::controller::Action;
    use std::collections::BTreeMap;
    use std::time::Duration;

    #[test]
    fn test_merge_keeps_earliest_requeue() {
        let short = ReconcileOutcome::RequeueAfter(Duration::from_secs(15));
        let long = ReconcileOutcome::RequeueAfter(Duration::from_secs(60));

        assert_eq!(ReconcileOutcome::Done.merge(ReconcileOutcome::Done), ReconcileOutcome::Done);
        assert_eq!(ReconcileOutcome::Done.merge(long), long);
        assert_eq!(long.merge(ReconcileOutcome::Done), long);
        assert_eq!(long.merge(short), short);
        assert_eq!(short.merge(long), short);
        assert!(short.is_requeue());
        assert!(!ReconcileOutcome::Done.is_requeue());
    }

    #[test]
    fn test_resource_key() {
        let cluster = vpc_cluster("capi", "default");
        assert_eq!(resource_key(&cluster), "IBMVPCCluster/default/capi");
    }

    #[test]
    fn test_paused_by_cluster_or_annotation() {
        let mut meta = ObjectMeta::default();
        let mut cluster = capi_cluster("capi", "default", true);

        assert!(!is_paused(None, &meta));
        assert!(!is_paused(Some(&cluster), &meta));

        cluster.spec.paused = true;
        assert!(is_paused(Some(&cluster), &meta));

        meta.annotations = Some(BTreeMap::from([(PAUSED_ANNOTATION.to_string(), String::new())]));
        assert!(is_paused(None, &meta));
    }

    #[test]
    fn test_finalizer_helpers() {
        let mut meta = ObjectMeta {
            finalizers: Some(vec!["other.io/finalizer".to_string()]),
            ..Default::default()
        };
        assert!(!has_finalizer(&meta, VPC_CLUSTER_FINALIZER));

        let with = finalizers_with(&meta, VPC_CLUSTER_FINALIZER);
        assert_eq!(with, vec!["other.io/finalizer".to_string(), VPC_CLUSTER_FINALIZER.to_string()]);

        meta.finalizers = Some(with.clone());
        assert!(has_finalizer(&meta, VPC_CLUSTER_FINALIZER));
        assert_eq!(finalizers_with(&meta, VPC_CLUSTER_FINALIZER), with, "adding twice is a no-op");
        assert_eq!(finalizers_without(&meta, VPC_CLUSTER_FINALIZER), vec!["other.io/finalizer".to_string()]);

        assert_eq!(
            finalizer_patch(vec![]),
            serde_json::json!({ "metadata": { "finalizers": [] } })
        );
    }

    #[test]
    fn test_cluster_name_label() {
        let machine = vpc_machine("capi-control-plane-0", "default", "capi");
        assert_eq!(cluster_name_label(&machine.metadata), Some("capi"));
        assert_eq!(cluster_name_label(&ObjectMeta::default()), None);
    }

    #[test]
    fn test_owner_machine_name_ignores_other_owners() {
        let meta = ObjectMeta {
            owner_references: Some(vec![
                OwnerReference {
                    api_version: "infrastructure.cluster.x-k8s.io/v1beta1".to_string(),
                    kind: "Machine".to_string(),
                    name: "not-capi".to_string(),
                    uid: "1".to_string(),
                    ..Default::default()
                },
                OwnerReference {
                    api_version: "cluster.x-k8s.io/v1beta1".to_string(),
                    kind: "Machine".to_string(),
                    name: "capi-md-0-abcde".to_string(),
                    uid: "2".to_string(),
                    ..Default::default()
                },
            ]),
            ..Default::default()
        };
        assert_eq!(owner_machine_name(&meta).as_deref(), Some("capi-md-0-abcde"));
        assert_eq!(owner_machine_name(&ObjectMeta::default()), None);
    }

    #[test]
    fn test_provider_ids() {
        assert_eq!(vpc_provider_id("capi", "capi-cp-0"), "ibmvpc://capi/capi-cp-0");
        assert_eq!(
            powervs_provider_id("us-south", "dal12", "svc-guid", "pvm-1"),
            "ibmpowervs://us-south/dal12/svc-guid/pvm-1"
        );
    }

    #[test]
    fn test_decode_bootstrap_data() {
        let secret = bootstrap_secret("capi-cp-0", "default", "#cloud-config\n");
        assert_eq!(decode_bootstrap_data(&secret).unwrap(), "#cloud-config\n");

        let empty = Secret {
            metadata: ObjectMeta { name: Some("empty".to_string()), ..Default::default() },
            ..Default::default()
        };
        assert!(matches!(decode_bootstrap_data(&empty), Err(ControllerError::BootstrapData(_))));

        let binary = Secret {
            data: Some(BTreeMap::from([(BOOTSTRAP_DATA_KEY.to_string(), ByteString(vec![0xff, 0xfe]))])),
            ..Default::default()
        };
        assert!(matches!(decode_bootstrap_data(&binary), Err(ControllerError::BootstrapData(_))));
    }

    #[test]
    fn test_status_patch_clears_removed_fields() {
        let previous = IBMVPCClusterStatus {
            vpc: Some(VPC { id: "r006-vpc".to_string(), name: "capi-vpc".to_string() }),
            vpc_endpoint: VPCEndpoint {
                address: Some("169.48.0.10".to_string()),
                floating_ip_id: Some("r006-fip".to_string()),
                load_balancer_id: None,
            },
            ..Default::default()
        };
        let current = IBMVPCClusterStatus {
            vpc_endpoint: VPCEndpoint {
                address: Some("169.48.0.10".to_string()),
                floating_ip_id: None,
                load_balancer_id: None,
            },
            ..Default::default()
        };

        let patch = status_patch(Some(&previous), &current).unwrap();
        let status = &patch["status"];
        assert!(status["vpc"].is_null());
        assert!(status.as_object().unwrap().contains_key("vpc"));
        assert_eq!(status["vpcEndpoint"]["address"], "169.48.0.10");
        assert!(status["vpcEndpoint"].as_object().unwrap().contains_key("floatingIPID"));
        assert_eq!(status["ready"], false);
    }

    #[test]
    fn test_status_patch_without_previous() {
        let status = IBMPowerVSClusterStatus {
            ready: true,
            network_id: Some("net-1".to_string()),
            conditions: vec![],
        };
        let patch = status_patch(None, &status).unwrap();
        assert_eq!(patch["status"]["ready"], true);
        assert_eq!(patch["status"]["networkID"], "net-1");
    }

    #[test]
    fn test_into_action_resyncs_finished_objects() {
        let sync = Duration::from_secs(600);
        assert_eq!(ReconcileOutcome::Done.into_action(sync), Action::requeue(sync));
        assert_eq!(
            ReconcileOutcome::RequeueAfter(REQUEUE_NOT_READY).into_action(sync),
            Action::requeue(Duration::from_secs(60))
        );
    }
}
