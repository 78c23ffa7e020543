//! VPC cluster scope
//!
//! Provisions the network side of a VPC workload cluster in order:
//! VPC → security group rules → subnet → public gateway → control plane
//! endpoint (floating IP or load balancer). Teardown runs in reverse and
//! refuses to start while instances still live in the VPC.

use crate::error::ControllerError;
use crate::reconcile_helpers::{ReconcileOutcome, REQUEUE_INSTANCES_REMAINING, REQUEUE_NOT_READY};
use crate::scope::ignore_not_found;
use crds::{
    mark_false, mark_true, APIEndpoint, ConditionSeverity, IBMVPCClusterSpec, IBMVPCClusterStatus,
    DEFAULT_API_SERVER_PORT, LOAD_BALANCER_NOT_READY_REASON, LOAD_BALANCER_READY_CONDITION,
    NETWORK_PROVISION_FAILED_REASON, READY_CONDITION, SUBNET_READY_CONDITION, VPC_READY_CONDITION,
};
use ibmcloud_client::{
    FloatingIp, FloatingIpPrototype, IbmCloudError, IdentityReference, LoadBalancer,
    LoadBalancerListenerPrototype, LoadBalancerPoolHealthMonitorPrototype, LoadBalancerPoolPrototype,
    LoadBalancerPrototype, NameReference, PublicGateway, PublicGatewayPrototype, SecurityGroupRulePrototype,
    Subnet, SubnetPrototype, Vpc, VpcClientTrait, VpcPrototype,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Inbound rules every cluster VPC needs on its default security group
const API_SERVER_RULE_PORT: i64 = DEFAULT_API_SERVER_PORT as i64;
const SSH_RULE_PORT: i64 = 22;

/// Scope for one IBMVPCCluster reconciliation
pub struct VpcClusterScope {
    client: Arc<dyn VpcClientTrait>,
    /// CAPI cluster name, used to derive resource names
    pub cluster_name: String,
    /// Desired state
    pub spec: IBMVPCClusterSpec,
    /// Working copy of the observed state
    pub status: IBMVPCClusterStatus,
}

impl VpcClusterScope {
    /// Create a scope from the object's spec and current status
    pub fn new(
        client: Arc<dyn VpcClientTrait>,
        cluster_name: impl Into<String>,
        spec: IBMVPCClusterSpec,
        status: Option<IBMVPCClusterStatus>,
    ) -> Self {
        Self {
            client,
            cluster_name: cluster_name.into(),
            spec,
            status: status.unwrap_or_default(),
        }
    }

    fn vpc_name(&self) -> String {
        self.spec
            .vpc
            .clone()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| format!("{}-vpc", self.cluster_name))
    }

    fn subnet_name(&self) -> String {
        format!("{}-subnet", self.cluster_name)
    }

    fn public_gateway_name(&self) -> String {
        format!("{}-pgw", self.cluster_name)
    }

    fn floating_ip_name(&self) -> String {
        format!("{}-control-plane", self.cluster_name)
    }

    fn load_balancer_name(&self) -> Option<String> {
        self.spec.control_plane_load_balancer.as_ref().map(|lb| {
            lb.name
                .clone()
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| format!("{}-load-balancer", self.cluster_name))
        })
    }

    fn resource_group(&self) -> Option<IdentityReference> {
        (!self.spec.resource_group.is_empty()).then(|| IdentityReference::new(&self.spec.resource_group))
    }

    fn api_server_port(&self) -> i32 {
        match self.spec.control_plane_endpoint.port {
            0 => DEFAULT_API_SERVER_PORT,
            port => port,
        }
    }

    /// Control plane endpoint to publish on the spec, once an address exists
    pub fn control_plane_endpoint(&self) -> Option<APIEndpoint> {
        let host = self.status.vpc_endpoint.address.clone().filter(|a| !a.is_empty())?;
        Some(APIEndpoint { host, port: self.api_server_port() })
    }

    /// Bring up every cloud resource of the cluster
    pub async fn provision(&mut self) -> Result<ReconcileOutcome, ControllerError> {
        if let Err(e) = self.ensure_vpc().await {
            mark_false(
                &mut self.status.conditions,
                VPC_READY_CONDITION,
                NETWORK_PROVISION_FAILED_REASON,
                ConditionSeverity::Error,
                e.to_string(),
            );
            self.status.ready = false;
            return Err(e);
        }

        if let Err(e) = self.ensure_subnet().await {
            mark_false(
                &mut self.status.conditions,
                SUBNET_READY_CONDITION,
                NETWORK_PROVISION_FAILED_REASON,
                ConditionSeverity::Error,
                e.to_string(),
            );
            self.status.ready = false;
            return Err(e);
        }

        let outcome = if self.spec.control_plane_load_balancer.is_some() {
            self.ensure_load_balancer().await?
        } else {
            self.ensure_floating_ip().await?;
            ReconcileOutcome::Done
        };

        self.status.ready = outcome == ReconcileOutcome::Done;
        if self.status.ready {
            mark_true(&mut self.status.conditions, READY_CONDITION);
        }
        Ok(outcome)
    }

    /// Create or adopt the cluster VPC
    pub async fn ensure_vpc(&mut self) -> Result<(), ControllerError> {
        if let Some(id) = self.status.vpc_id().map(str::to_string) {
            match self.client.get_vpc(&id).await {
                Ok(vpc) => {
                    debug!("VPC {} ({}) already exists", vpc.name, vpc.id);
                    mark_true(&mut self.status.conditions, VPC_READY_CONDITION);
                    return Ok(());
                }
                Err(e) if e.is_not_found() => {
                    warn!("VPC {} recorded in status no longer exists (drift detected), will recreate", id);
                    self.forget_vpc();
                }
                Err(e) => return Err(e.into()),
            }
        }

        let name = self.vpc_name();
        let vpc = match self.ensure_vpc_unique(&name).await? {
            Some(vpc) => {
                info!("Adopting existing VPC {} ({})", vpc.name, vpc.id);
                vpc
            }
            None => {
                let vpc = self
                    .client
                    .create_vpc(&VpcPrototype {
                        name: name.clone(),
                        resource_group: self.resource_group(),
                        address_prefix_management: "auto".to_string(),
                    })
                    .await?;
                info!("Created VPC {} ({})", vpc.name, vpc.id);
                vpc
            }
        };

        self.ensure_security_group_rules(&vpc).await?;

        self.status.vpc = Some(crds::VPC { id: vpc.id, name: vpc.name });
        mark_true(&mut self.status.conditions, VPC_READY_CONDITION);
        Ok(())
    }

    /// Drop the VPC and everything that lived inside it. The floating IP is
    /// zone-scoped and survives the VPC, so it stays recorded.
    fn forget_vpc(&mut self) {
        self.status.vpc = None;
        self.status.subnet = None;
        self.status.public_gateway = None;
        if self.status.vpc_endpoint.load_balancer_id.take().is_some() {
            self.status.vpc_endpoint.address = None;
        }
        self.status.control_plane_load_balancer_state = None;
    }

    async fn ensure_vpc_unique(&self, name: &str) -> Result<Option<Vpc>, IbmCloudError> {
        let vpcs = self
            .client
            .list_vpcs(self.resource_group().as_ref().map(|rg| rg.id.as_str()))
            .await?;
        Ok(vpcs.into_iter().find(|v| v.name == name))
    }

    async fn ensure_security_group_rules(&self, vpc: &Vpc) -> Result<(), ControllerError> {
        let Some(security_group) = vpc.default_security_group.as_ref() else {
            warn!("VPC {} has no default security group, skipping inbound rules", vpc.id);
            return Ok(());
        };

        let existing = self.client.list_security_group_rules(&security_group.id).await?;
        for rule in [
            SecurityGroupRulePrototype::inbound_tcp(API_SERVER_RULE_PORT),
            SecurityGroupRulePrototype::inbound_tcp(SSH_RULE_PORT),
            SecurityGroupRulePrototype::inbound_icmp(),
        ] {
            if existing.iter().any(|r| rule.matches(r)) {
                debug!(
                    "Security group {} already allows {} {:?}",
                    security_group.id, rule.protocol, rule.port_min
                );
                continue;
            }
            self.client.create_security_group_rule(&security_group.id, &rule).await?;
            info!(
                "Added inbound {} rule {:?} to security group {}",
                rule.protocol, rule.port_min, security_group.id
            );
        }
        Ok(())
    }

    /// Create or adopt the cluster subnet and make sure it has a public gateway
    pub async fn ensure_subnet(&mut self) -> Result<(), ControllerError> {
        let vpc_id = self
            .status
            .vpc_id()
            .map(str::to_string)
            .ok_or_else(|| ControllerError::Provision("VPC must exist before its subnet".to_string()))?;

        let subnet_id = match self.status.subnet_id().map(str::to_string) {
            Some(id) => {
                if self.status.public_gateway.is_some() {
                    debug!("Subnet {} and its public gateway already recorded", id);
                    mark_true(&mut self.status.conditions, SUBNET_READY_CONDITION);
                    return Ok(());
                }
                id
            }
            None => {
                let name = self.subnet_name();
                let subnet = match self.ensure_subnet_unique(&vpc_id, &name).await? {
                    Some(subnet) => {
                        info!("Adopting existing subnet {} ({})", subnet.name, subnet.id);
                        subnet
                    }
                    None => self.create_subnet(&vpc_id, &name).await?,
                };
                let id = subnet.id.clone();
                self.status.subnet = Some(crds::Subnet {
                    id: Some(subnet.id),
                    name: Some(subnet.name),
                    ipv4_cidr_block: subnet.ipv4_cidr_block,
                    zone: Some(subnet.zone.name),
                });
                id
            }
        };

        self.ensure_public_gateway(&vpc_id, &subnet_id).await?;
        mark_true(&mut self.status.conditions, SUBNET_READY_CONDITION);
        Ok(())
    }

    async fn ensure_subnet_unique(&self, vpc_id: &str, name: &str) -> Result<Option<Subnet>, IbmCloudError> {
        let subnets = self
            .client
            .list_subnets(self.resource_group().as_ref().map(|rg| rg.id.as_str()))
            .await?;
        Ok(subnets.into_iter().find(|s| s.name == name && s.vpc.id == vpc_id))
    }

    async fn create_subnet(&self, vpc_id: &str, name: &str) -> Result<Subnet, ControllerError> {
        let prefixes = self.client.list_vpc_address_prefixes(vpc_id).await?;
        let prefix = prefixes
            .into_iter()
            .find(|p| p.zone.name == self.spec.zone)
            .ok_or_else(|| {
                ControllerError::Provision(format!(
                    "VPC {} has no address prefix in zone {}",
                    vpc_id, self.spec.zone
                ))
            })?;

        let subnet = self
            .client
            .create_subnet(&SubnetPrototype {
                name: name.to_string(),
                vpc: IdentityReference::new(vpc_id),
                zone: NameReference::new(&self.spec.zone),
                ipv4_cidr_block: prefix.cidr,
                resource_group: self.resource_group(),
            })
            .await?;
        info!(
            "Created subnet {} ({}) with CIDR {}",
            subnet.name,
            subnet.id,
            subnet.ipv4_cidr_block.as_deref().unwrap_or("unknown")
        );
        Ok(subnet)
    }

    async fn ensure_public_gateway(&mut self, vpc_id: &str, subnet_id: &str) -> Result<(), ControllerError> {
        if let Some(attached) = self.client.get_subnet_public_gateway(subnet_id).await? {
            debug!("Subnet {} already has public gateway {}", subnet_id, attached.id);
            self.record_public_gateway(&attached);
            return Ok(());
        }

        let name = self.public_gateway_name();
        let existing = self
            .client
            .list_public_gateways()
            .await?
            .into_iter()
            .find(|g| g.name == name && g.vpc.id == vpc_id);
        let gateway = match existing {
            Some(gateway) => {
                info!("Adopting existing public gateway {} ({})", gateway.name, gateway.id);
                gateway
            }
            None => {
                let gateway = self
                    .client
                    .create_public_gateway(&PublicGatewayPrototype {
                        name,
                        vpc: IdentityReference::new(vpc_id),
                        zone: NameReference::new(&self.spec.zone),
                        resource_group: self.resource_group(),
                    })
                    .await?;
                info!("Created public gateway {} ({})", gateway.name, gateway.id);
                gateway
            }
        };

        let attached = self.client.set_subnet_public_gateway(subnet_id, &gateway.id).await?;
        info!("Attached public gateway {} to subnet {}", attached.id, subnet_id);
        self.record_public_gateway(&attached);
        Ok(())
    }

    fn record_public_gateway(&mut self, gateway: &PublicGateway) {
        self.status.public_gateway = Some(crds::PublicGateway {
            id: gateway.id.clone(),
            name: gateway.name.clone(),
        });
    }

    /// Reserve a floating IP for the control plane endpoint
    pub async fn ensure_floating_ip(&mut self) -> Result<(), ControllerError> {
        if self.status.vpc_endpoint.floating_ip_id.is_some() {
            debug!("Floating IP already recorded for cluster {}", self.cluster_name);
            return Ok(());
        }

        let name = self.floating_ip_name();
        let fip = match self.ensure_fip_unique(&name).await? {
            Some(fip) => {
                info!("Adopting existing floating IP {} ({})", fip.name, fip.address);
                fip
            }
            None => {
                let fip = self
                    .client
                    .create_floating_ip(&FloatingIpPrototype {
                        name,
                        zone: NameReference::new(&self.spec.zone),
                        resource_group: self.resource_group(),
                    })
                    .await?;
                info!("Created floating IP {} ({})", fip.name, fip.address);
                fip
            }
        };

        self.status.vpc_endpoint.address = Some(fip.address);
        self.status.vpc_endpoint.floating_ip_id = Some(fip.id);
        Ok(())
    }

    async fn ensure_fip_unique(&self, name: &str) -> Result<Option<FloatingIp>, IbmCloudError> {
        let fips = self.client.list_floating_ips().await?;
        Ok(fips.into_iter().find(|f| f.name == name))
    }

    /// Create or adopt the control plane load balancer and wait for it to go active
    pub async fn ensure_load_balancer(&mut self) -> Result<ReconcileOutcome, ControllerError> {
        let Some(name) = self.load_balancer_name() else {
            return Ok(ReconcileOutcome::Done);
        };

        let lb = match self.status.vpc_endpoint.load_balancer_id.clone() {
            Some(id) => match self.client.get_load_balancer(&id).await {
                Ok(lb) => Some(lb),
                Err(e) if e.is_not_found() => {
                    warn!("Load balancer {} recorded in status no longer exists (drift detected)", id);
                    self.status.vpc_endpoint.load_balancer_id = None;
                    None
                }
                Err(e) => return Err(e.into()),
            },
            None => None,
        };

        let lb = match lb {
            Some(lb) => lb,
            None => match self.ensure_load_balancer_unique(&name).await? {
                Some(lb) => {
                    info!("Adopting existing load balancer {} ({})", lb.name, lb.id);
                    lb
                }
                None => self.create_load_balancer(&name).await?,
            },
        };

        self.status.vpc_endpoint.load_balancer_id = Some(lb.id.clone());
        self.status.control_plane_load_balancer_state = Some(lb.provisioning_status.clone());
        if let Some(hostname) = lb.hostname.clone().filter(|h| !h.is_empty()) {
            self.status.vpc_endpoint.address = Some(hostname);
        }

        if !lb.is_active() {
            info!(
                "Load balancer {} is {}, waiting for it to become active",
                lb.name, lb.provisioning_status
            );
            mark_false(
                &mut self.status.conditions,
                LOAD_BALANCER_READY_CONDITION,
                LOAD_BALANCER_NOT_READY_REASON,
                ConditionSeverity::Info,
                format!("load balancer is {}", lb.provisioning_status),
            );
            return Ok(ReconcileOutcome::RequeueAfter(REQUEUE_NOT_READY));
        }

        mark_true(&mut self.status.conditions, LOAD_BALANCER_READY_CONDITION);
        Ok(ReconcileOutcome::Done)
    }

    async fn ensure_load_balancer_unique(&self, name: &str) -> Result<Option<LoadBalancer>, IbmCloudError> {
        let lbs = self.client.list_load_balancers().await?;
        Ok(lbs.into_iter().find(|lb| lb.name == name))
    }

    async fn create_load_balancer(&self, name: &str) -> Result<LoadBalancer, ControllerError> {
        let subnet_id = self
            .status
            .subnet_id()
            .ok_or_else(|| ControllerError::Provision("subnet must exist before the load balancer".to_string()))?;
        let public = self
            .spec
            .control_plane_load_balancer
            .as_ref()
            .is_none_or(|lb| lb.public);

        let pool_name = format!("{}-pool", name);
        let mut ports = vec![i64::from(self.api_server_port())];
        if let Some(lb) = self.spec.control_plane_load_balancer.as_ref() {
            for listener in &lb.additional_listeners {
                if !ports.contains(&listener.port) {
                    ports.push(listener.port);
                }
            }
        }

        let prototype = LoadBalancerPrototype {
            name: name.to_string(),
            is_public: public,
            subnets: vec![IdentityReference::new(subnet_id)],
            pools: vec![LoadBalancerPoolPrototype {
                name: pool_name.clone(),
                algorithm: "round_robin".to_string(),
                protocol: "tcp".to_string(),
                health_monitor: LoadBalancerPoolHealthMonitorPrototype {
                    delay: 5,
                    max_retries: 2,
                    timeout: 2,
                    type_: "tcp".to_string(),
                },
            }],
            listeners: ports
                .into_iter()
                .map(|port| LoadBalancerListenerPrototype {
                    port,
                    protocol: "tcp".to_string(),
                    default_pool: NameReference::new(&pool_name),
                })
                .collect(),
            resource_group: self.resource_group(),
        };

        let lb = self.client.create_load_balancer(&prototype).await?;
        info!("Created load balancer {} ({})", lb.name, lb.id);
        Ok(lb)
    }

    /// Tear the cluster infrastructure down in reverse dependency order
    pub async fn delete(&mut self) -> Result<ReconcileOutcome, ControllerError> {
        if self.instances_remaining().await? {
            return Ok(ReconcileOutcome::RequeueAfter(REQUEUE_INSTANCES_REMAINING));
        }

        if !self.delete_load_balancer().await? {
            return Ok(ReconcileOutcome::RequeueAfter(REQUEUE_NOT_READY));
        }

        self.delete_subnet().await?;
        self.delete_floating_ip().await?;
        self.delete_vpc().await?;

        self.status.ready = false;
        Ok(ReconcileOutcome::Done)
    }

    async fn instances_remaining(&self) -> Result<bool, ControllerError> {
        let Some(vpc_id) = self.status.vpc_id() else {
            return Ok(false);
        };
        let instances = match self.client.list_instances(Some(vpc_id)).await {
            Ok(instances) => instances,
            Err(e) if e.is_not_found() => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        if instances.is_empty() {
            return Ok(false);
        }
        info!(
            "VPC {} still has {} instance(s), waiting before deleting cluster infrastructure",
            vpc_id,
            instances.len()
        );
        Ok(true)
    }

    /// Returns `true` once the load balancer is gone
    async fn delete_load_balancer(&mut self) -> Result<bool, ControllerError> {
        let Some(id) = self.status.vpc_endpoint.load_balancer_id.clone() else {
            return Ok(true);
        };

        match self.client.get_load_balancer(&id).await {
            Err(e) if e.is_not_found() => {
                info!("Load balancer {} deleted", id);
                self.status.vpc_endpoint.load_balancer_id = None;
                self.status.control_plane_load_balancer_state = None;
                return Ok(true);
            }
            Err(e) => return Err(e.into()),
            Ok(lb) if lb.provisioning_status == "delete_pending" => {
                debug!("Load balancer {} is still being deleted", id);
                self.status.control_plane_load_balancer_state = Some(lb.provisioning_status);
                return Ok(false);
            }
            Ok(_) => {}
        }

        ignore_not_found(self.client.delete_load_balancer(&id).await)?;
        info!("Deleting load balancer {}", id);

        match self.client.get_load_balancer(&id).await {
            Err(e) if e.is_not_found() => {
                self.status.vpc_endpoint.load_balancer_id = None;
                self.status.control_plane_load_balancer_state = None;
                Ok(true)
            }
            Err(e) => Err(e.into()),
            Ok(lb) => {
                self.status.control_plane_load_balancer_state = Some(lb.provisioning_status);
                Ok(false)
            }
        }
    }

    async fn delete_subnet(&mut self) -> Result<(), ControllerError> {
        let Some(subnet_id) = self.status.subnet_id().map(str::to_string) else {
            return Ok(());
        };

        let gateway = match self.client.get_subnet_public_gateway(&subnet_id).await {
            Ok(gateway) => gateway.map(|g| g.id),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e.into()),
        };
        let gateway = gateway.or_else(|| self.status.public_gateway.as_ref().map(|g| g.id.clone()));

        if let Some(gateway_id) = gateway {
            ignore_not_found(self.client.unset_subnet_public_gateway(&subnet_id).await)?;
            ignore_not_found(self.client.delete_public_gateway(&gateway_id).await)?;
            info!("Deleted public gateway {}", gateway_id);
        }
        self.status.public_gateway = None;

        ignore_not_found(self.client.delete_subnet(&subnet_id).await)?;
        info!("Deleted subnet {}", subnet_id);
        self.status.subnet = None;
        Ok(())
    }

    async fn delete_floating_ip(&mut self) -> Result<(), ControllerError> {
        let Some(id) = self.status.vpc_endpoint.floating_ip_id.clone() else {
            return Ok(());
        };
        ignore_not_found(self.client.delete_floating_ip(&id).await)?;
        info!("Deleted floating IP {}", id);
        self.status.vpc_endpoint.floating_ip_id = None;
        self.status.vpc_endpoint.address = None;
        Ok(())
    }

    async fn delete_vpc(&mut self) -> Result<(), ControllerError> {
        let Some(id) = self.status.vpc_id().map(str::to_string) else {
            return Ok(());
        };
        ignore_not_found(self.client.delete_vpc(&id).await)?;
        info!("Deleted VPC {}", id);
        self.status.vpc = None;
        Ok(())
    }
}
