//! VPC machine scope
//!
//! One virtual server instance per IBMVPCMachine. Control plane instances are
//! also registered with the cluster load balancer pool when one exists.

use crate::error::ControllerError;
use crate::reconcile_helpers::{vpc_provider_id, ReconcileOutcome, REQUEUE_NOT_READY};
use crate::scope::ignore_not_found;
use crds::{
    mark_false, mark_true, ConditionSeverity, IBMVPCClusterStatus, IBMVPCMachineSpec, IBMVPCMachineStatus,
    MachineAddress, MachineAddressType, DEFAULT_API_SERVER_PORT, INSTANCE_ERRORED_REASON, INSTANCE_NOT_READY_REASON,
    INSTANCE_PROVISION_FAILED_REASON, INSTANCE_READY_CONDITION, INSTANCE_STATE_UNKNOWN_REASON,
    INSTANCE_STOPPED_REASON, READY_CONDITION,
};
use ibmcloud_client::{
    IdentityReference, Instance, InstancePrototype, LoadBalancerPoolMemberPrototype, LoadBalancerPoolMemberTarget,
    NameReference, NetworkInterfacePrototype, VpcClientTrait,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Scope for one IBMVPCMachine reconciliation
pub struct VpcMachineScope {
    client: Arc<dyn VpcClientTrait>,
    /// CAPI cluster name
    pub cluster_name: String,
    /// IBMVPCMachine name
    pub machine_name: String,
    /// Desired instance
    pub spec: IBMVPCMachineSpec,
    /// Status written back to the IBMVPCMachine
    pub status: IBMVPCMachineStatus,
    cluster_status: IBMVPCClusterStatus,
    resource_group: String,
    is_control_plane: bool,
    bootstrap_data: Option<String>,
}

impl VpcMachineScope {
    /// Scope for a worker; see `with_cluster` and `control_plane`
    pub fn new(
        client: Arc<dyn VpcClientTrait>,
        cluster_name: impl Into<String>,
        machine_name: impl Into<String>,
        spec: IBMVPCMachineSpec,
        status: Option<IBMVPCMachineStatus>,
    ) -> Self {
        Self {
            client,
            cluster_name: cluster_name.into(),
            machine_name: machine_name.into(),
            spec,
            status: status.unwrap_or_default(),
            cluster_status: IBMVPCClusterStatus::default(),
            resource_group: String::new(),
            is_control_plane: false,
            bootstrap_data: None,
        }
    }

    /// Network state and resource group of the owning IBMVPCCluster
    #[must_use]
    pub fn with_cluster(mut self, status: IBMVPCClusterStatus, resource_group: impl Into<String>) -> Self {
        self.cluster_status = status;
        self.resource_group = resource_group.into();
        self
    }

    /// Mark the machine as a control plane member
    #[must_use]
    pub fn control_plane(mut self, is_control_plane: bool) -> Self {
        self.is_control_plane = is_control_plane;
        self
    }

    /// Cloud-init user data from the bootstrap provider
    #[must_use]
    pub fn with_bootstrap_data(mut self, data: Option<String>) -> Self {
        self.bootstrap_data = data;
        self
    }

    /// Name of the cloud instance
    pub fn instance_name(&self) -> String {
        self.spec
            .name
            .clone()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| self.machine_name.clone())
    }

    /// Provider ID to publish on the machine once the instance exists
    pub fn provider_id(&self) -> String {
        vpc_provider_id(&self.cluster_name, &self.machine_name)
    }

    /// Create or adopt the instance and report its state
    pub async fn reconcile(&mut self) -> Result<ReconcileOutcome, ControllerError> {
        let instance = match self.ensure_instance().await {
            Ok(instance) => instance,
            Err(e) => {
                mark_false(
                    &mut self.status.conditions,
                    INSTANCE_READY_CONDITION,
                    INSTANCE_PROVISION_FAILED_REASON,
                    ConditionSeverity::Error,
                    e.to_string(),
                );
                self.status.ready = false;
                return Err(e);
            }
        };

        let outcome = self.observe_instance(&instance);
        if !self.status.ready || !self.is_control_plane {
            return Ok(outcome);
        }
        if self.cluster_status.vpc_endpoint.load_balancer_id.is_some() {
            return Ok(outcome.merge(self.ensure_pool_member(&instance).await?));
        }
        self.ensure_floating_ip_binding(&instance).await?;
        Ok(outcome)
    }

    /// Look the instance up by ID, then by name, and create it when missing
    pub async fn ensure_instance(&mut self) -> Result<Instance, ControllerError> {
        if let Some(id) = self.status.instance_id.clone() {
            match self.client.get_instance(&id).await {
                Ok(instance) => return Ok(instance),
                Err(e) if e.is_not_found() => {
                    warn!("Instance {} recorded for machine {} no longer exists (drift detected)", id, self.machine_name);
                    self.status.instance_id = None;
                    self.status.instance_status = None;
                    self.status.addresses.clear();
                }
                Err(e) => return Err(e.into()),
            }
        }

        let vpc_id = self
            .cluster_status
            .vpc_id()
            .map(str::to_string)
            .ok_or_else(|| ControllerError::Provision("cluster VPC is not provisioned yet".to_string()))?;

        let name = self.instance_name();
        if let Some(instance) = self.find_instance(&vpc_id, &name).await? {
            info!("Adopting existing instance {} ({})", instance.name, instance.id);
            self.status.instance_id = Some(instance.id.clone());
            return Ok(instance);
        }

        let subnet_id = self
            .spec
            .primary_network_interface
            .subnet
            .clone()
            .filter(|s| !s.is_empty())
            .or_else(|| self.cluster_status.subnet_id().map(str::to_string))
            .ok_or_else(|| ControllerError::Provision("no subnet available for the instance".to_string()))?;

        let prototype = InstancePrototype {
            name,
            vpc: IdentityReference::new(&vpc_id),
            zone: NameReference::new(&self.spec.zone),
            profile: NameReference::new(&self.spec.profile),
            image: IdentityReference::new(&self.spec.image),
            primary_network_interface: NetworkInterfacePrototype {
                subnet: IdentityReference::new(subnet_id),
            },
            keys: self.spec.ssh_keys.iter().map(IdentityReference::new).collect(),
            resource_group: (!self.resource_group.is_empty()).then(|| IdentityReference::new(&self.resource_group)),
            user_data: self.bootstrap_data.clone(),
        };

        let instance = self.client.create_instance(&prototype).await?;
        info!("Created instance {} ({}) for machine {}", instance.name, instance.id, self.machine_name);
        self.status.instance_id = Some(instance.id.clone());
        Ok(instance)
    }

    async fn find_instance(&self, vpc_id: &str, name: &str) -> Result<Option<Instance>, ControllerError> {
        let instances = self.client.list_instances(Some(vpc_id)).await?;
        Ok(instances.into_iter().find(|i| i.name == name))
    }

    /// Translate the instance state into status and conditions
    pub fn observe_instance(&mut self, instance: &Instance) -> ReconcileOutcome {
        self.status.instance_id = Some(instance.id.clone());
        self.status.instance_status = Some(instance.status.clone());
        if let Some(ip) = instance.primary_ipv4_address() {
            self.status.addresses = vec![MachineAddress::internal_ip(ip)];
        }

        let (reason, severity, outcome) = match instance.status.as_str() {
            "running" => {
                debug!("Instance {} is running", instance.id);
                self.status.ready = true;
                mark_true(&mut self.status.conditions, INSTANCE_READY_CONDITION);
                mark_true(&mut self.status.conditions, READY_CONDITION);
                return ReconcileOutcome::Done;
            }
            "pending" | "starting" => (
                INSTANCE_NOT_READY_REASON,
                ConditionSeverity::Warning,
                ReconcileOutcome::RequeueAfter(REQUEUE_NOT_READY),
            ),
            "stopped" | "stopping" => (INSTANCE_STOPPED_REASON, ConditionSeverity::Error, ReconcileOutcome::Done),
            "failed" => (INSTANCE_ERRORED_REASON, ConditionSeverity::Error, ReconcileOutcome::Done),
            _ => (
                INSTANCE_STATE_UNKNOWN_REASON,
                ConditionSeverity::Info,
                ReconcileOutcome::RequeueAfter(REQUEUE_NOT_READY),
            ),
        };

        info!("Instance {} is {}", instance.id, instance.status);
        self.status.ready = false;
        mark_false(
            &mut self.status.conditions,
            INSTANCE_READY_CONDITION,
            reason,
            severity,
            format!("instance is {}", instance.status),
        );
        outcome
    }

    /// Register a control plane instance with the API server load balancer
    pub async fn ensure_pool_member(&mut self, instance: &Instance) -> Result<ReconcileOutcome, ControllerError> {
        let Some(lb_id) = self.cluster_status.vpc_endpoint.load_balancer_id.clone() else {
            return Ok(ReconcileOutcome::Done);
        };
        let Some(ip) = instance.primary_ipv4_address() else {
            debug!("Instance {} has no address yet", instance.id);
            return Ok(ReconcileOutcome::RequeueAfter(REQUEUE_NOT_READY));
        };

        let lb = self.client.get_load_balancer(&lb_id).await?;
        if !lb.is_active() {
            debug!("Load balancer {} is {}, retrying pool membership later", lb.id, lb.provisioning_status);
            return Ok(ReconcileOutcome::RequeueAfter(REQUEUE_NOT_READY));
        }
        let pool = lb
            .pools
            .first()
            .ok_or_else(|| ControllerError::Provision(format!("load balancer {} has no pool", lb.id)))?;

        let members = self.client.list_load_balancer_pool_members(&lb.id, &pool.id).await?;
        if members.iter().any(|m| m.target.address.as_deref() == Some(ip)) {
            debug!("Instance {} already in pool {}", instance.id, pool.id);
            return Ok(ReconcileOutcome::Done);
        }

        self.client
            .create_load_balancer_pool_member(
                &lb.id,
                &pool.id,
                &LoadBalancerPoolMemberPrototype {
                    port: i64::from(DEFAULT_API_SERVER_PORT),
                    target: LoadBalancerPoolMemberTarget {
                        address: Some(ip.to_string()),
                        id: None,
                    },
                },
            )
            .await?;
        info!("Added {} to load balancer pool {}", ip, pool.name);
        Ok(ReconcileOutcome::Done)
    }

    /// Bind the cluster floating IP to the primary interface of a control plane
    /// instance and report it as the machine's external address
    pub async fn ensure_floating_ip_binding(&mut self, instance: &Instance) -> Result<(), ControllerError> {
        let Some(fip_id) = self.cluster_status.vpc_endpoint.floating_ip_id.clone() else {
            return Ok(());
        };
        let nic_id = instance
            .primary_network_interface
            .as_ref()
            .map(|nic| nic.id.clone())
            .ok_or_else(|| {
                ControllerError::Provision(format!("instance {} has no primary network interface", instance.id))
            })?;

        let fip = self.client.get_floating_ip(&fip_id).await?;
        let fip = match fip.target.as_ref() {
            Some(_) if fip.is_bound_to(&nic_id) => {
                debug!("Floating IP {} already bound to instance {}", fip.address, instance.id);
                fip
            }
            // One control plane instance owns the endpoint address
            Some(target) => {
                debug!("Floating IP {} is bound to interface {}, leaving it there", fip.address, target.id);
                return Ok(());
            }
            None => {
                let bound = self
                    .client
                    .add_instance_network_interface_floating_ip(&instance.id, &nic_id, &fip_id)
                    .await?;
                info!("Bound floating IP {} to instance {}", bound.address, instance.id);
                bound
            }
        };

        self.status.addresses.retain(|a| a.type_ != MachineAddressType::ExternalIP);
        self.status.addresses.push(MachineAddress::external_ip(fip.address));
        Ok(())
    }

    /// Remove the instance (and its pool membership)
    pub async fn delete(&mut self) -> Result<ReconcileOutcome, ControllerError> {
        let instance = match self.status.instance_id.clone() {
            Some(id) => match self.client.get_instance(&id).await {
                Ok(instance) => Some(instance),
                Err(e) if e.is_not_found() => None,
                Err(e) => return Err(e.into()),
            },
            None => match self.cluster_status.vpc_id().map(str::to_string) {
                Some(vpc_id) => self.find_instance(&vpc_id, &self.instance_name()).await?,
                None => None,
            },
        };

        let Some(instance) = instance else {
            debug!("No instance left for machine {}", self.machine_name);
            self.clear_instance();
            return Ok(ReconcileOutcome::Done);
        };

        if self.is_control_plane {
            self.remove_pool_member(&instance).await?;
        }

        ignore_not_found(self.client.delete_instance(&instance.id).await)?;
        info!("Deleted instance {} ({})", instance.name, instance.id);
        self.clear_instance();
        Ok(ReconcileOutcome::Done)
    }

    async fn remove_pool_member(&self, instance: &Instance) -> Result<(), ControllerError> {
        let (Some(lb_id), Some(ip)) = (
            self.cluster_status.vpc_endpoint.load_balancer_id.as_deref(),
            instance.primary_ipv4_address(),
        ) else {
            return Ok(());
        };

        let lb = match self.client.get_load_balancer(lb_id).await {
            Ok(lb) => lb,
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        for pool in &lb.pools {
            let members = self.client.list_load_balancer_pool_members(&lb.id, &pool.id).await?;
            for member in members.iter().filter(|m| m.target.address.as_deref() == Some(ip)) {
                ignore_not_found(
                    self.client
                        .delete_load_balancer_pool_member(&lb.id, &pool.id, &member.id)
                        .await,
                )?;
                info!("Removed {} from load balancer pool {}", ip, pool.name);
            }
        }
        Ok(())
    }

    fn clear_instance(&mut self) {
        self.status.ready = false;
        self.status.instance_id = None;
        self.status.instance_status = None;
        self.status.addresses.clear();
    }
}
