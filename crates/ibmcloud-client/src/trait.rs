//! Client traits for mocking
//!
//! These traits abstract the IBM Cloud clients so reconcilers and scopes can be
//! unit tested against in-memory implementations. The concrete `VpcClient`
//! and `PowerVsClient` implement them.

use crate::error::IbmCloudError;
use crate::models::*;

/// VPC API operations for one region
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait VpcClientTrait: Send + Sync {
    /// Region this client talks to
    fn region(&self) -> &str;

    // VPCs
    async fn list_vpcs(&self, resource_group_id: Option<&str>) -> Result<Vec<Vpc>, IbmCloudError>;
    async fn get_vpc(&self, id: &str) -> Result<Vpc, IbmCloudError>;
    async fn create_vpc(&self, prototype: &VpcPrototype) -> Result<Vpc, IbmCloudError>;
    async fn delete_vpc(&self, id: &str) -> Result<(), IbmCloudError>;
    async fn list_vpc_address_prefixes(&self, vpc_id: &str) -> Result<Vec<AddressPrefix>, IbmCloudError>;

    // Security groups
    async fn create_security_group_rule(&self, security_group_id: &str, prototype: &SecurityGroupRulePrototype) -> Result<SecurityGroupRule, IbmCloudError>;
    async fn list_security_group_rules(&self, security_group_id: &str) -> Result<Vec<SecurityGroupRule>, IbmCloudError>;

    // Subnets
    async fn list_subnets(&self, resource_group_id: Option<&str>) -> Result<Vec<Subnet>, IbmCloudError>;
    async fn get_subnet(&self, id: &str) -> Result<Subnet, IbmCloudError>;
    async fn create_subnet(&self, prototype: &SubnetPrototype) -> Result<Subnet, IbmCloudError>;
    async fn delete_subnet(&self, id: &str) -> Result<(), IbmCloudError>;
    /// Public gateway attached to a subnet, `None` when nothing is attached
    async fn get_subnet_public_gateway(&self, subnet_id: &str) -> Result<Option<PublicGateway>, IbmCloudError>;
    async fn set_subnet_public_gateway(&self, subnet_id: &str, public_gateway_id: &str) -> Result<PublicGateway, IbmCloudError>;
    async fn unset_subnet_public_gateway(&self, subnet_id: &str) -> Result<(), IbmCloudError>;

    // Public gateways
    async fn list_public_gateways(&self) -> Result<Vec<PublicGateway>, IbmCloudError>;
    async fn create_public_gateway(&self, prototype: &PublicGatewayPrototype) -> Result<PublicGateway, IbmCloudError>;
    async fn delete_public_gateway(&self, id: &str) -> Result<(), IbmCloudError>;

    // Floating IPs
    async fn list_floating_ips(&self) -> Result<Vec<FloatingIp>, IbmCloudError>;
    async fn get_floating_ip(&self, id: &str) -> Result<FloatingIp, IbmCloudError>;
    async fn create_floating_ip(&self, prototype: &FloatingIpPrototype) -> Result<FloatingIp, IbmCloudError>;
    async fn delete_floating_ip(&self, id: &str) -> Result<(), IbmCloudError>;

    // Instances
    async fn list_instances(&self, vpc_id: Option<&str>) -> Result<Vec<Instance>, IbmCloudError>;
    async fn get_instance(&self, id: &str) -> Result<Instance, IbmCloudError>;
    async fn create_instance(&self, prototype: &InstancePrototype) -> Result<Instance, IbmCloudError>;
    async fn delete_instance(&self, id: &str) -> Result<(), IbmCloudError>;
    /// Bind a floating IP to a network interface of the instance
    async fn add_instance_network_interface_floating_ip(&self, instance_id: &str, network_interface_id: &str, floating_ip_id: &str) -> Result<FloatingIp, IbmCloudError>;

    // Load balancers
    async fn list_load_balancers(&self) -> Result<Vec<LoadBalancer>, IbmCloudError>;
    async fn get_load_balancer(&self, id: &str) -> Result<LoadBalancer, IbmCloudError>;
    async fn create_load_balancer(&self, prototype: &LoadBalancerPrototype) -> Result<LoadBalancer, IbmCloudError>;
    async fn delete_load_balancer(&self, id: &str) -> Result<(), IbmCloudError>;
    async fn list_load_balancer_pool_members(&self, load_balancer_id: &str, pool_id: &str) -> Result<Vec<LoadBalancerPoolMember>, IbmCloudError>;
    async fn create_load_balancer_pool_member(&self, load_balancer_id: &str, pool_id: &str, prototype: &LoadBalancerPoolMemberPrototype) -> Result<LoadBalancerPoolMember, IbmCloudError>;
    async fn delete_load_balancer_pool_member(&self, load_balancer_id: &str, pool_id: &str, member_id: &str) -> Result<(), IbmCloudError>;
}

/// PowerVS API operations for one service instance (workspace)
#[async_trait::async_trait]
pub trait PowerVsClientTrait: Send + Sync {
    /// GUID of the workspace
    fn service_instance_id(&self) -> &str;
    /// Zone the workspace lives in (e.g. "dal12")
    fn zone(&self) -> &str;
    /// Region serving the zone (e.g. "us-south")
    fn region(&self) -> &str;

    // Instances
    async fn list_instances(&self) -> Result<Vec<PvmInstanceReference>, IbmCloudError>;
    async fn get_instance(&self, id: &str) -> Result<PvmInstance, IbmCloudError>;
    async fn create_instance(&self, request: &PvmInstanceCreate) -> Result<PvmInstance, IbmCloudError>;
    async fn delete_instance(&self, id: &str) -> Result<(), IbmCloudError>;

    // Images
    async fn list_images(&self) -> Result<Vec<ImageReference>, IbmCloudError>;
    async fn get_image(&self, id: &str) -> Result<Image, IbmCloudError>;
    async fn delete_image(&self, id: &str) -> Result<(), IbmCloudError>;
    async fn create_cos_image_import(&self, request: &CreateCosImageImportJob) -> Result<JobReference, IbmCloudError>;
    async fn get_job(&self, id: &str) -> Result<Job, IbmCloudError>;

    // Networks
    async fn list_networks(&self) -> Result<Vec<NetworkReference>, IbmCloudError>;
    async fn get_network(&self, id: &str) -> Result<Network, IbmCloudError>;
}
