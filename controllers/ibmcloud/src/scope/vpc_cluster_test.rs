//! Unit tests for the VPC cluster scope

#[cfg(test)]
mod tests {
    use crate::error::ControllerError;
    use crate::reconcile_helpers::{ReconcileOutcome, REQUEUE_INSTANCES_REMAINING, REQUEUE_NOT_READY};
    use crate::scope::VpcClusterScope;
    use crate::test_utils::*;
    use crds::*;
    use ibmcloud_client::{
        Instance, LoadBalancer, MockVpcClient, ResourceReference, Vpc, VpcClientTrait,
    };
    use std::sync::Arc;

    fn scope(client: &MockVpcClient, spec: IBMVPCClusterSpec) -> VpcClusterScope {
        VpcClusterScope::new(Arc::new(client.clone()), "capi", spec, None)
    }

    fn load_balanced_spec(additional_ports: &[i64]) -> IBMVPCClusterSpec {
        IBMVPCClusterSpec {
            control_plane_load_balancer: Some(VPCLoadBalancerSpec {
                name: None,
                public: true,
                additional_listeners: additional_ports
                    .iter()
                    .map(|port| AdditionalListenerSpec { port: *port })
                    .collect(),
            }),
            ..vpc_cluster_spec()
        }
    }

    #[tokio::test]
    async fn test_provision_with_floating_ip() {
        let client = MockVpcClient::new(TEST_REGION);
        let mut scope = scope(&client, vpc_cluster_spec());

        let outcome = scope.provision().await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Done);
        assert!(scope.status.ready);
        assert!(is_true(&scope.status.conditions, READY_CONDITION));
        assert!(is_true(&scope.status.conditions, VPC_READY_CONDITION));
        assert!(is_true(&scope.status.conditions, SUBNET_READY_CONDITION));

        let vpcs = client.vpcs();
        assert_eq!(vpcs.len(), 1);
        assert_eq!(vpcs[0].name, "capi-vpc");
        assert_eq!(scope.status.vpc_id(), Some(vpcs[0].id.as_str()));

        let subnet = scope.status.subnet.clone().unwrap();
        assert_eq!(subnet.name.as_deref(), Some("capi-subnet"));
        assert_eq!(subnet.ipv4_cidr_block.as_deref(), Some("10.240.0.0/18"));
        assert_eq!(subnet.zone.as_deref(), Some(TEST_ZONE));

        assert_eq!(scope.status.public_gateway.as_ref().unwrap().name, "capi-pgw");
        let attached = client.get_subnet_public_gateway(subnet.id.as_deref().unwrap()).await.unwrap();
        assert_eq!(attached.unwrap().name, "capi-pgw");

        assert_eq!(scope.status.vpc_endpoint.address.as_deref(), Some("169.48.0.10"));
        assert!(scope.status.vpc_endpoint.floating_ip_id.is_some());
        assert_eq!(
            scope.control_plane_endpoint(),
            Some(APIEndpoint { host: "169.48.0.10".to_string(), port: DEFAULT_API_SERVER_PORT })
        );
    }

    #[tokio::test]
    async fn test_provision_opens_api_server_ssh_and_icmp() {
        let client = MockVpcClient::new(TEST_REGION);
        let mut scope = scope(&client, vpc_cluster_spec());
        scope.provision().await.unwrap();

        let sg = client.vpcs()[0].default_security_group.clone().unwrap();
        let rules = client.security_group_rules(&sg.id);
        assert_eq!(rules.len(), 3);
        assert!(rules.iter().any(|r| r.protocol == "tcp" && r.port_min == Some(6443)));
        assert!(rules.iter().any(|r| r.protocol == "tcp" && r.port_min == Some(22)));
        assert!(rules.iter().any(|r| r.protocol == "icmp"));
    }

    #[tokio::test]
    async fn test_provision_is_idempotent() {
        let client = MockVpcClient::new(TEST_REGION);
        let mut first = scope(&client, vpc_cluster_spec());
        first.provision().await.unwrap();

        let mut second = VpcClusterScope::new(
            Arc::new(client.clone()),
            "capi",
            vpc_cluster_spec(),
            Some(first.status.clone()),
        );
        second.provision().await.unwrap();

        assert_eq!(client.vpcs().len(), 1);
        assert_eq!(client.subnets().len(), 1);
        assert_eq!(client.public_gateways().len(), 1);
        assert_eq!(client.floating_ips().len(), 1);
        assert_eq!(second.status.vpc, first.status.vpc);
        assert_eq!(second.status.vpc_endpoint, first.status.vpc_endpoint);
    }

    #[tokio::test]
    async fn test_lost_status_adopts_existing_resources() {
        let client = MockVpcClient::new(TEST_REGION);
        let mut first = scope(&client, vpc_cluster_spec());
        first.provision().await.unwrap();

        // Status wiped (e.g. restored from backup without status)
        let mut second = scope(&client, vpc_cluster_spec());
        second.provision().await.unwrap();

        assert_eq!(client.vpcs().len(), 1);
        assert_eq!(client.subnets().len(), 1);
        assert_eq!(client.public_gateways().len(), 1);
        assert_eq!(client.floating_ips().len(), 1);
        assert_eq!(second.status.vpc_id(), first.status.vpc_id());
        assert_eq!(second.status.vpc_endpoint.address, first.status.vpc_endpoint.address);
        let sg = client.vpcs()[0].default_security_group.clone().unwrap();
        assert_eq!(client.security_group_rules(&sg.id).len(), 3);
    }

    #[tokio::test]
    async fn test_vpc_drift_is_recreated() {
        let client = MockVpcClient::new(TEST_REGION);
        let mut scope = VpcClusterScope::new(
            Arc::new(client.clone()),
            "capi",
            vpc_cluster_spec(),
            Some(IBMVPCClusterStatus {
                vpc: Some(VPC { id: "r006-gone".to_string(), name: "capi-vpc".to_string() }),
                subnet: Some(Subnet {
                    id: Some("0717-gone".to_string()),
                    name: Some("capi-subnet".to_string()),
                    ..Default::default()
                }),
                public_gateway: Some(PublicGateway {
                    id: "pgw-gone".to_string(),
                    name: "capi-pgw".to_string(),
                }),
                ..Default::default()
            }),
        );

        assert_eq!(scope.provision().await.unwrap(), ReconcileOutcome::Done);
        let vpc_id = scope.status.vpc_id().unwrap().to_string();
        assert_ne!(vpc_id, "r006-gone");
        assert_eq!(client.vpcs()[0].id, vpc_id);

        // Subnet and gateway of the lost VPC are rebuilt inside the new one
        let subnets = client.subnets();
        assert_eq!(subnets.len(), 1);
        assert_eq!(subnets[0].vpc.id, vpc_id);
        assert_eq!(scope.status.subnet_id(), Some(subnets[0].id.as_str()));
        let gateway = scope.status.public_gateway.clone().unwrap();
        assert_ne!(gateway.id, "pgw-gone");
        assert!(client.get_subnet_public_gateway(&subnets[0].id).await.unwrap().is_some());
        assert!(scope.status.ready);
    }

    #[tokio::test]
    async fn test_vpc_drift_drops_load_balancer_endpoint() {
        let client = MockVpcClient::new(TEST_REGION);
        let mut scope = VpcClusterScope::new(
            Arc::new(client.clone()),
            "capi",
            load_balanced_spec(&[]),
            Some(IBMVPCClusterStatus {
                vpc: Some(VPC { id: "r006-gone".to_string(), name: "capi-vpc".to_string() }),
                vpc_endpoint: VPCEndpoint {
                    address: Some("old.lb.appdomain.cloud".to_string()),
                    floating_ip_id: None,
                    load_balancer_id: Some("r006-lb-gone".to_string()),
                },
                control_plane_load_balancer_state: Some("active".to_string()),
                ..Default::default()
            }),
        );

        scope.ensure_vpc().await.unwrap();
        assert_eq!(scope.status.vpc_endpoint, VPCEndpoint::default());
        assert!(scope.status.control_plane_load_balancer_state.is_none());
        assert!(scope.status.subnet.is_none());
    }

    #[tokio::test]
    async fn test_custom_vpc_name_and_empty_resource_group() {
        let client = MockVpcClient::new(TEST_REGION);
        let spec = IBMVPCClusterSpec {
            vpc: Some("shared-vpc".to_string()),
            resource_group: String::new(),
            ..vpc_cluster_spec()
        };
        let mut scope = scope(&client, spec);
        scope.ensure_vpc().await.unwrap();

        let vpc = &client.vpcs()[0];
        assert_eq!(vpc.name, "shared-vpc");
        assert!(vpc.resource_group.is_none());
    }

    #[tokio::test]
    async fn test_subnet_needs_address_prefix_in_zone() {
        let client = MockVpcClient::new(TEST_REGION);
        let spec = IBMVPCClusterSpec { zone: "eu-de-1".to_string(), ..vpc_cluster_spec() };
        let mut scope = scope(&client, spec);

        let err = scope.provision().await.unwrap_err();
        assert!(matches!(err, ControllerError::Provision(_)));
        assert!(!scope.status.ready);
        let condition = get_condition(&scope.status.conditions, SUBNET_READY_CONDITION).unwrap();
        assert_eq!(condition.reason.as_deref(), Some(NETWORK_PROVISION_FAILED_REASON));
        assert_eq!(condition.severity, ConditionSeverity::Error);
        assert!(client.subnets().is_empty());
    }

    #[tokio::test]
    async fn test_vpc_failure_marks_condition() {
        let client = MockVpcClient::new(TEST_REGION);
        client.fail_on("create_vpc");
        let mut scope = scope(&client, vpc_cluster_spec());

        assert!(matches!(scope.provision().await, Err(ControllerError::IbmCloud(_))));
        let condition = get_condition(&scope.status.conditions, VPC_READY_CONDITION).unwrap();
        assert_eq!(condition.status, ConditionStatus::False);
        assert_eq!(condition.reason.as_deref(), Some(NETWORK_PROVISION_FAILED_REASON));
    }

    #[tokio::test]
    async fn test_missing_public_gateway_is_reattached() {
        let client = MockVpcClient::new(TEST_REGION);
        let mut scope = scope(&client, vpc_cluster_spec());
        scope.provision().await.unwrap();

        let subnet_id = scope.status.subnet_id().unwrap().to_string();
        client.unset_subnet_public_gateway(&subnet_id).await.unwrap();
        scope.status.public_gateway = None;

        scope.ensure_subnet().await.unwrap();
        assert_eq!(client.public_gateways().len(), 1, "existing gateway is adopted");
        assert!(client.get_subnet_public_gateway(&subnet_id).await.unwrap().is_some());
        assert!(scope.status.public_gateway.is_some());
    }

    #[tokio::test]
    async fn test_load_balancer_waits_until_active() {
        let client = MockVpcClient::new(TEST_REGION);
        let mut scope = scope(&client, load_balanced_spec(&[22623]));

        let outcome = scope.provision().await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::RequeueAfter(REQUEUE_NOT_READY));
        assert!(!scope.status.ready);
        assert!(client.floating_ips().is_empty(), "load balancer replaces the floating IP");
        let condition = get_condition(&scope.status.conditions, LOAD_BALANCER_READY_CONDITION).unwrap();
        assert_eq!(condition.reason.as_deref(), Some(LOAD_BALANCER_NOT_READY_REASON));
        assert_eq!(scope.status.control_plane_load_balancer_state.as_deref(), Some("create_pending"));

        let lb = client.load_balancers()[0].clone();
        assert_eq!(lb.name, "capi-load-balancer");
        assert_eq!(lb.listeners.len(), 2);
        assert_eq!(lb.pools[0].name, "capi-load-balancer-pool");
        assert_eq!(scope.status.vpc_endpoint.address, lb.hostname);

        client.set_load_balancer_status(&lb.id, "active");
        let outcome = scope.provision().await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Done);
        assert!(scope.status.ready);
        assert!(is_true(&scope.status.conditions, LOAD_BALANCER_READY_CONDITION));
        assert_eq!(client.load_balancers().len(), 1);
    }

    #[tokio::test]
    async fn test_load_balancer_with_custom_port() {
        let client = MockVpcClient::new(TEST_REGION);
        let mut spec = load_balanced_spec(&[6443]);
        spec.control_plane_endpoint.port = 443;
        let mut scope = scope(&client, spec);
        scope.provision().await.unwrap();

        let lb = &client.load_balancers()[0];
        let ports: Vec<&str> = lb.listeners.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(ports, vec!["443", "6443"]);
        assert_eq!(scope.control_plane_endpoint().unwrap().port, 443);
    }

    #[tokio::test]
    async fn test_delete_waits_for_instances() {
        let client = MockVpcClient::new(TEST_REGION);
        let mut scope = scope(&client, vpc_cluster_spec());
        scope.provision().await.unwrap();
        let vpc_id = scope.status.vpc_id().unwrap().to_string();

        client.add_instance(Instance {
            id: "0717-worker".to_string(),
            name: "capi-md-0".to_string(),
            status: "running".to_string(),
            vpc: Some(ResourceReference { id: vpc_id, name: "capi-vpc".to_string() }),
            ..Default::default()
        });

        let outcome = scope.delete().await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::RequeueAfter(REQUEUE_INSTANCES_REMAINING));
        assert!(client.deleted().is_empty());
    }

    #[tokio::test]
    async fn test_delete_in_reverse_order() {
        let client = MockVpcClient::new(TEST_REGION);
        let mut scope = scope(&client, load_balanced_spec(&[]));
        scope.provision().await.unwrap();
        let lb_id = scope.status.vpc_endpoint.load_balancer_id.clone().unwrap();
        let subnet_id = scope.status.subnet_id().unwrap().to_string();
        let pgw_id = scope.status.public_gateway.clone().unwrap().id;
        let vpc_id = scope.status.vpc_id().unwrap().to_string();

        let outcome = scope.delete().await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Done);
        assert_eq!(
            client.deleted(),
            vec![
                format!("load_balancer:{}", lb_id),
                format!("public_gateway:{}", pgw_id),
                format!("subnet:{}", subnet_id),
                format!("vpc:{}", vpc_id),
            ]
        );
        assert!(scope.status.vpc.is_none());
        assert!(scope.status.subnet.is_none());
        assert!(scope.status.public_gateway.is_none());
        assert!(scope.status.vpc_endpoint.load_balancer_id.is_none());
    }

    #[tokio::test]
    async fn test_delete_waits_for_pending_load_balancer_deletion() {
        let client = MockVpcClient::new(TEST_REGION);
        client.add_load_balancer(LoadBalancer {
            id: "r006-lb-pending".to_string(),
            name: "capi-load-balancer".to_string(),
            provisioning_status: "delete_pending".to_string(),
            ..Default::default()
        });
        let mut scope = VpcClusterScope::new(
            Arc::new(client.clone()),
            "capi",
            load_balanced_spec(&[]),
            Some(IBMVPCClusterStatus {
                vpc_endpoint: VPCEndpoint {
                    load_balancer_id: Some("r006-lb-pending".to_string()),
                    ..Default::default()
                },
                ..Default::default()
            }),
        );

        let outcome = scope.delete().await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::RequeueAfter(REQUEUE_NOT_READY));
        assert!(client.deleted().is_empty());
        assert_eq!(scope.status.control_plane_load_balancer_state.as_deref(), Some("delete_pending"));
    }

    #[tokio::test]
    async fn test_delete_tolerates_already_deleted_resources() {
        let client = MockVpcClient::new(TEST_REGION);
        client.add_vpc(Vpc { id: "r006-vpc-left".to_string(), name: "capi-vpc".to_string(), ..Default::default() });
        let mut scope = VpcClusterScope::new(
            Arc::new(client.clone()),
            "capi",
            vpc_cluster_spec(),
            Some(IBMVPCClusterStatus {
                vpc: Some(VPC { id: "r006-vpc-left".to_string(), name: "capi-vpc".to_string() }),
                subnet: Some(Subnet { id: Some("0717-gone".to_string()), ..Default::default() }),
                vpc_endpoint: VPCEndpoint {
                    address: Some("169.48.0.99".to_string()),
                    floating_ip_id: Some("r006-fip-gone".to_string()),
                    load_balancer_id: None,
                },
                ..Default::default()
            }),
        );

        assert_eq!(scope.delete().await.unwrap(), ReconcileOutcome::Done);
        assert_eq!(client.deleted(), vec!["vpc:r006-vpc-left".to_string()]);
        assert_eq!(scope.status.vpc_endpoint, VPCEndpoint::default());
    }
}
