//! VPC operations for the mock client

use super::{not_found, MockState};
use crate::client_trait::VpcClientTrait;
use crate::error::IbmCloudError;
use crate::models::*;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

type Store<T> = Arc<Mutex<HashMap<String, T>>>;

/// Mock VPC client for one region
#[derive(Clone, Default)]
pub struct MockVpcClient {
    region: String,
    state: MockState,
    vpcs: Store<Vpc>,
    address_prefixes: Store<Vec<AddressPrefix>>,
    security_group_rules: Store<Vec<SecurityGroupRule>>,
    subnets: Store<Subnet>,
    public_gateways: Store<PublicGateway>,
    floating_ips: Store<FloatingIp>,
    instances: Store<Instance>,
    /// Creation requests, kept so tests can assert on user data and placement
    instance_requests: Arc<Mutex<Vec<InstancePrototype>>>,
    load_balancers: Store<LoadBalancer>,
    /// Keyed by pool ID
    pool_members: Store<Vec<LoadBalancerPoolMember>>,
    /// Floating IP binding requests, in order
    bound_floating_ips: Arc<Mutex<Vec<String>>>,
}

impl MockVpcClient {
    /// Create a new mock client
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            ..Default::default()
        }
    }

    /// Deletions recorded so far, as `"<kind>:<id>"`
    pub fn deleted(&self) -> Vec<String> {
        self.state.deleted()
    }

    /// Make an operation (trait method name) return a 500 error
    pub fn fail_on(&self, operation: &str) {
        self.state.fail_on(operation);
    }

    pub fn add_vpc(&self, vpc: Vpc) {
        self.vpcs.lock().unwrap().insert(vpc.id.clone(), vpc);
    }

    pub fn add_address_prefix(&self, vpc_id: &str, prefix: AddressPrefix) {
        self.address_prefixes
            .lock()
            .unwrap()
            .entry(vpc_id.to_string())
            .or_default()
            .push(prefix);
    }

    pub fn add_subnet(&self, subnet: Subnet) {
        self.subnets.lock().unwrap().insert(subnet.id.clone(), subnet);
    }

    pub fn add_public_gateway(&self, gateway: PublicGateway) {
        self.public_gateways.lock().unwrap().insert(gateway.id.clone(), gateway);
    }

    pub fn add_floating_ip(&self, fip: FloatingIp) {
        self.floating_ips.lock().unwrap().insert(fip.id.clone(), fip);
    }

    pub fn add_instance(&self, instance: Instance) {
        self.instances.lock().unwrap().insert(instance.id.clone(), instance);
    }

    pub fn add_load_balancer(&self, lb: LoadBalancer) {
        self.load_balancers.lock().unwrap().insert(lb.id.clone(), lb);
    }

    pub fn set_instance_status(&self, id: &str, status: &str) {
        if let Some(instance) = self.instances.lock().unwrap().get_mut(id) {
            instance.status = status.to_string();
        }
    }

    pub fn set_load_balancer_status(&self, id: &str, provisioning_status: &str) {
        if let Some(lb) = self.load_balancers.lock().unwrap().get_mut(id) {
            lb.provisioning_status = provisioning_status.to_string();
        }
    }

    pub fn vpcs(&self) -> Vec<Vpc> {
        self.vpcs.lock().unwrap().values().cloned().collect()
    }

    pub fn subnets(&self) -> Vec<Subnet> {
        self.subnets.lock().unwrap().values().cloned().collect()
    }

    pub fn public_gateways(&self) -> Vec<PublicGateway> {
        self.public_gateways.lock().unwrap().values().cloned().collect()
    }

    pub fn floating_ips(&self) -> Vec<FloatingIp> {
        self.floating_ips.lock().unwrap().values().cloned().collect()
    }

    pub fn instances(&self) -> Vec<Instance> {
        self.instances.lock().unwrap().values().cloned().collect()
    }

    /// Floating IP IDs passed to `add_instance_network_interface_floating_ip`
    pub fn bound_floating_ips(&self) -> Vec<String> {
        self.bound_floating_ips.lock().unwrap().clone()
    }

    pub fn instance_requests(&self) -> Vec<InstancePrototype> {
        self.instance_requests.lock().unwrap().clone()
    }

    pub fn load_balancers(&self) -> Vec<LoadBalancer> {
        self.load_balancers.lock().unwrap().values().cloned().collect()
    }

    pub fn security_group_rules(&self, security_group_id: &str) -> Vec<SecurityGroupRule> {
        self.security_group_rules
            .lock()
            .unwrap()
            .get(security_group_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn pool_members(&self, pool_id: &str) -> Vec<LoadBalancerPoolMember> {
        self.pool_members.lock().unwrap().get(pool_id).cloned().unwrap_or_default()
    }

    fn vpc_reference(&self, vpc_id: &str) -> Result<ResourceReference, IbmCloudError> {
        self.vpcs
            .lock()
            .unwrap()
            .get(vpc_id)
            .map(|v| ResourceReference { id: v.id.clone(), name: v.name.clone() })
            .ok_or_else(|| not_found("vpc", vpc_id))
    }
}

fn sorted_by_name<T, F: Fn(&T) -> &str>(mut items: Vec<T>, name: F) -> Vec<T> {
    items.sort_by(|a, b| name(a).cmp(name(b)));
    items
}

#[async_trait::async_trait]
impl VpcClientTrait for MockVpcClient {
    fn region(&self) -> &str {
        &self.region
    }

    async fn list_vpcs(&self, resource_group_id: Option<&str>) -> Result<Vec<Vpc>, IbmCloudError> {
        self.state.check("list_vpcs")?;
        let vpcs: Vec<Vpc> = self
            .vpcs()
            .into_iter()
            .filter(|v| match resource_group_id {
                Some(rg) => v.resource_group.as_ref().is_some_and(|g| g.id == rg),
                None => true,
            })
            .collect();
        Ok(sorted_by_name(vpcs, |v| v.name.as_str()))
    }

    async fn get_vpc(&self, id: &str) -> Result<Vpc, IbmCloudError> {
        self.state.check("get_vpc")?;
        self.vpcs.lock().unwrap().get(id).cloned().ok_or_else(|| not_found("vpc", id))
    }

    async fn create_vpc(&self, prototype: &VpcPrototype) -> Result<Vpc, IbmCloudError> {
        self.state.check("create_vpc")?;
        let id = self.state.next_id("r006-vpc");
        let security_group = ResourceReference {
            id: self.state.next_id("r006-sg"),
            name: format!("{}-default-sg", prototype.name),
        };
        let vpc = Vpc {
            id: id.clone(),
            name: prototype.name.clone(),
            crn: Some(format!("crn:v1:bluemix:public:is:{}:a/mock::vpc:{}", self.region, id)),
            status: Some("available".to_string()),
            default_security_group: Some(security_group),
            resource_group: prototype
                .resource_group
                .as_ref()
                .map(|rg| ResourceReference { id: rg.id.clone(), name: String::new() }),
        };
        self.add_vpc(vpc.clone());

        if prototype.address_prefix_management == "auto" {
            for (index, cidr) in ["10.240.0.0/18", "10.240.64.0/18", "10.240.128.0/18"].iter().enumerate() {
                self.add_address_prefix(
                    &id,
                    AddressPrefix {
                        id: self.state.next_id("r006-prefix"),
                        name: format!("{}-prefix-{}", prototype.name, index + 1),
                        cidr: cidr.to_string(),
                        zone: NameReference::new(format!("{}-{}", self.region, index + 1)),
                        is_default: true,
                    },
                );
            }
        }
        Ok(vpc)
    }

    async fn delete_vpc(&self, id: &str) -> Result<(), IbmCloudError> {
        self.state.check("delete_vpc")?;
        self.vpcs.lock().unwrap().remove(id).ok_or_else(|| not_found("vpc", id))?;
        self.state.record_delete("vpc", id);
        Ok(())
    }

    async fn list_vpc_address_prefixes(&self, vpc_id: &str) -> Result<Vec<AddressPrefix>, IbmCloudError> {
        self.state.check("list_vpc_address_prefixes")?;
        self.vpc_reference(vpc_id)?;
        Ok(self.address_prefixes.lock().unwrap().get(vpc_id).cloned().unwrap_or_default())
    }

    async fn create_security_group_rule(
        &self,
        security_group_id: &str,
        prototype: &SecurityGroupRulePrototype,
    ) -> Result<SecurityGroupRule, IbmCloudError> {
        self.state.check("create_security_group_rule")?;
        let rule = SecurityGroupRule {
            id: self.state.next_id("r006-rule"),
            direction: prototype.direction.clone(),
            protocol: prototype.protocol.clone(),
            port_min: prototype.port_min,
            port_max: prototype.port_max,
            ip_version: Some(prototype.ip_version.clone()),
            remote: prototype.remote.clone(),
        };
        self.security_group_rules
            .lock()
            .unwrap()
            .entry(security_group_id.to_string())
            .or_default()
            .push(rule.clone());
        Ok(rule)
    }

    async fn list_security_group_rules(&self, security_group_id: &str) -> Result<Vec<SecurityGroupRule>, IbmCloudError> {
        self.state.check("list_security_group_rules")?;
        Ok(self.security_group_rules(security_group_id))
    }

    async fn list_subnets(&self, _resource_group_id: Option<&str>) -> Result<Vec<Subnet>, IbmCloudError> {
        self.state.check("list_subnets")?;
        Ok(sorted_by_name(self.subnets(), |s| s.name.as_str()))
    }

    async fn get_subnet(&self, id: &str) -> Result<Subnet, IbmCloudError> {
        self.state.check("get_subnet")?;
        self.subnets.lock().unwrap().get(id).cloned().ok_or_else(|| not_found("subnet", id))
    }

    async fn create_subnet(&self, prototype: &SubnetPrototype) -> Result<Subnet, IbmCloudError> {
        self.state.check("create_subnet")?;
        let subnet = Subnet {
            id: self.state.next_id("0717-subnet"),
            name: prototype.name.clone(),
            ipv4_cidr_block: Some(prototype.ipv4_cidr_block.clone()),
            zone: prototype.zone.clone(),
            vpc: self.vpc_reference(&prototype.vpc.id)?,
            public_gateway: None,
            status: Some("available".to_string()),
        };
        self.add_subnet(subnet.clone());
        Ok(subnet)
    }

    async fn delete_subnet(&self, id: &str) -> Result<(), IbmCloudError> {
        self.state.check("delete_subnet")?;
        self.subnets.lock().unwrap().remove(id).ok_or_else(|| not_found("subnet", id))?;
        self.state.record_delete("subnet", id);
        Ok(())
    }

    async fn get_subnet_public_gateway(&self, subnet_id: &str) -> Result<Option<PublicGateway>, IbmCloudError> {
        self.state.check("get_subnet_public_gateway")?;
        let subnet = self.get_subnet(subnet_id).await?;
        Ok(subnet
            .public_gateway
            .and_then(|pgw| self.public_gateways.lock().unwrap().get(&pgw.id).cloned()))
    }

    async fn set_subnet_public_gateway(
        &self,
        subnet_id: &str,
        public_gateway_id: &str,
    ) -> Result<PublicGateway, IbmCloudError> {
        self.state.check("set_subnet_public_gateway")?;
        let gateway = self
            .public_gateways
            .lock()
            .unwrap()
            .get(public_gateway_id)
            .cloned()
            .ok_or_else(|| not_found("public gateway", public_gateway_id))?;
        let mut subnets = self.subnets.lock().unwrap();
        let subnet = subnets.get_mut(subnet_id).ok_or_else(|| not_found("subnet", subnet_id))?;
        subnet.public_gateway = Some(ResourceReference { id: gateway.id.clone(), name: gateway.name.clone() });
        Ok(gateway)
    }

    async fn unset_subnet_public_gateway(&self, subnet_id: &str) -> Result<(), IbmCloudError> {
        self.state.check("unset_subnet_public_gateway")?;
        let mut subnets = self.subnets.lock().unwrap();
        let subnet = subnets.get_mut(subnet_id).ok_or_else(|| not_found("subnet", subnet_id))?;
        if subnet.public_gateway.take().is_none() {
            return Err(not_found("subnet public gateway", subnet_id));
        }
        Ok(())
    }

    async fn list_public_gateways(&self) -> Result<Vec<PublicGateway>, IbmCloudError> {
        self.state.check("list_public_gateways")?;
        Ok(sorted_by_name(self.public_gateways(), |g| g.name.as_str()))
    }

    async fn create_public_gateway(&self, prototype: &PublicGatewayPrototype) -> Result<PublicGateway, IbmCloudError> {
        self.state.check("create_public_gateway")?;
        let gateway = PublicGateway {
            id: self.state.next_id("r006-pgw"),
            name: prototype.name.clone(),
            zone: prototype.zone.clone(),
            vpc: self.vpc_reference(&prototype.vpc.id)?,
            status: Some("available".to_string()),
        };
        self.add_public_gateway(gateway.clone());
        Ok(gateway)
    }

    async fn delete_public_gateway(&self, id: &str) -> Result<(), IbmCloudError> {
        self.state.check("delete_public_gateway")?;
        self.public_gateways
            .lock()
            .unwrap()
            .remove(id)
            .ok_or_else(|| not_found("public gateway", id))?;
        self.state.record_delete("public_gateway", id);
        Ok(())
    }

    async fn list_floating_ips(&self) -> Result<Vec<FloatingIp>, IbmCloudError> {
        self.state.check("list_floating_ips")?;
        Ok(sorted_by_name(self.floating_ips(), |f| f.name.as_str()))
    }

    async fn create_floating_ip(&self, prototype: &FloatingIpPrototype) -> Result<FloatingIp, IbmCloudError> {
        self.state.check("create_floating_ip")?;
        let count = self.floating_ips.lock().unwrap().len();
        let fip = FloatingIp {
            id: self.state.next_id("r006-fip"),
            name: prototype.name.clone(),
            address: format!("169.48.0.{}", count + 10),
            zone: Some(prototype.zone.clone()),
            status: Some("available".to_string()),
            target: None,
        };
        self.add_floating_ip(fip.clone());
        Ok(fip)
    }

    async fn get_floating_ip(&self, id: &str) -> Result<FloatingIp, IbmCloudError> {
        self.state.check("get_floating_ip")?;
        self.floating_ips
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| not_found("floating ip", id))
    }

    async fn delete_floating_ip(&self, id: &str) -> Result<(), IbmCloudError> {
        self.state.check("delete_floating_ip")?;
        self.floating_ips
            .lock()
            .unwrap()
            .remove(id)
            .ok_or_else(|| not_found("floating ip", id))?;
        self.state.record_delete("floating_ip", id);
        Ok(())
    }

    async fn list_instances(&self, vpc_id: Option<&str>) -> Result<Vec<Instance>, IbmCloudError> {
        self.state.check("list_instances")?;
        let instances: Vec<Instance> = self
            .instances()
            .into_iter()
            .filter(|i| match vpc_id {
                Some(vpc) => i.vpc.as_ref().is_some_and(|v| v.id == vpc),
                None => true,
            })
            .collect();
        Ok(sorted_by_name(instances, |i| i.name.as_str()))
    }

    async fn get_instance(&self, id: &str) -> Result<Instance, IbmCloudError> {
        self.state.check("get_instance")?;
        self.instances.lock().unwrap().get(id).cloned().ok_or_else(|| not_found("instance", id))
    }

    async fn create_instance(&self, prototype: &InstancePrototype) -> Result<Instance, IbmCloudError> {
        self.state.check("create_instance")?;
        let subnet = self.get_subnet(&prototype.primary_network_interface.subnet.id).await?;
        let count = self.instances.lock().unwrap().len();
        let instance = Instance {
            id: self.state.next_id("0717-instance"),
            name: prototype.name.clone(),
            status: "running".to_string(),
            zone: Some(prototype.zone.clone()),
            vpc: Some(self.vpc_reference(&prototype.vpc.id)?),
            primary_network_interface: Some(NetworkInterfaceReference {
                id: self.state.next_id("0717-nic"),
                name: "eth0".to_string(),
                subnet: Some(ResourceReference { id: subnet.id, name: subnet.name }),
                primary_ip: Some(ReservedIpReference { address: format!("10.240.0.{}", count + 4) }),
                primary_ipv4_address: None,
            }),
        };
        self.instance_requests.lock().unwrap().push(prototype.clone());
        self.add_instance(instance.clone());
        Ok(instance)
    }

    async fn delete_instance(&self, id: &str) -> Result<(), IbmCloudError> {
        self.state.check("delete_instance")?;
        let instance = self.instances.lock().unwrap().remove(id).ok_or_else(|| not_found("instance", id))?;
        // Deleting the instance releases floating IPs bound to its interface
        if let Some(nic) = instance.primary_network_interface {
            for fip in self.floating_ips.lock().unwrap().values_mut() {
                if fip.is_bound_to(&nic.id) {
                    fip.target = None;
                }
            }
        }
        self.state.record_delete("instance", id);
        Ok(())
    }

    async fn add_instance_network_interface_floating_ip(
        &self,
        instance_id: &str,
        network_interface_id: &str,
        floating_ip_id: &str,
    ) -> Result<FloatingIp, IbmCloudError> {
        self.state.check("add_instance_network_interface_floating_ip")?;
        let instance = self.get_instance(instance_id).await?;
        let nic = instance
            .primary_network_interface
            .filter(|nic| nic.id == network_interface_id)
            .ok_or_else(|| not_found("network interface", network_interface_id))?;
        let mut fips = self.floating_ips.lock().unwrap();
        let fip = fips
            .get_mut(floating_ip_id)
            .ok_or_else(|| not_found("floating ip", floating_ip_id))?;
        fip.target = Some(ResourceReference { id: nic.id, name: nic.name });
        self.bound_floating_ips.lock().unwrap().push(floating_ip_id.to_string());
        Ok(fip.clone())
    }

    async fn list_load_balancers(&self) -> Result<Vec<LoadBalancer>, IbmCloudError> {
        self.state.check("list_load_balancers")?;
        Ok(sorted_by_name(self.load_balancers(), |lb| lb.name.as_str()))
    }

    async fn get_load_balancer(&self, id: &str) -> Result<LoadBalancer, IbmCloudError> {
        self.state.check("get_load_balancer")?;
        self.load_balancers
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| not_found("load balancer", id))
    }

    async fn create_load_balancer(&self, prototype: &LoadBalancerPrototype) -> Result<LoadBalancer, IbmCloudError> {
        self.state.check("create_load_balancer")?;
        let id = self.state.next_id("r006-lb");
        let pools = prototype
            .pools
            .iter()
            .map(|p| ResourceReference { id: self.state.next_id("r006-pool"), name: p.name.clone() })
            .collect();
        let listeners = prototype
            .listeners
            .iter()
            .map(|l| ResourceReference { id: self.state.next_id("r006-listener"), name: l.port.to_string() })
            .collect();
        let subnets = prototype
            .subnets
            .iter()
            .map(|s| ResourceReference { id: s.id.clone(), name: String::new() })
            .collect();
        let lb = LoadBalancer {
            id: id.clone(),
            name: prototype.name.clone(),
            hostname: Some(format!("{}-{}.lb.appdomain.cloud", prototype.name, id)),
            provisioning_status: "create_pending".to_string(),
            operating_status: Some("offline".to_string()),
            is_public: prototype.is_public,
            pools,
            listeners,
            subnets,
        };
        self.add_load_balancer(lb.clone());
        Ok(lb)
    }

    async fn delete_load_balancer(&self, id: &str) -> Result<(), IbmCloudError> {
        self.state.check("delete_load_balancer")?;
        self.load_balancers
            .lock()
            .unwrap()
            .remove(id)
            .ok_or_else(|| not_found("load balancer", id))?;
        self.state.record_delete("load_balancer", id);
        Ok(())
    }

    async fn list_load_balancer_pool_members(
        &self,
        load_balancer_id: &str,
        pool_id: &str,
    ) -> Result<Vec<LoadBalancerPoolMember>, IbmCloudError> {
        self.state.check("list_load_balancer_pool_members")?;
        self.get_load_balancer(load_balancer_id).await?;
        Ok(self.pool_members(pool_id))
    }

    async fn create_load_balancer_pool_member(
        &self,
        load_balancer_id: &str,
        pool_id: &str,
        prototype: &LoadBalancerPoolMemberPrototype,
    ) -> Result<LoadBalancerPoolMember, IbmCloudError> {
        self.state.check("create_load_balancer_pool_member")?;
        self.get_load_balancer(load_balancer_id).await?;
        let member = LoadBalancerPoolMember {
            id: self.state.next_id("r006-member"),
            port: prototype.port,
            target: prototype.target.clone(),
            provisioning_status: Some("create_pending".to_string()),
            health: Some("unknown".to_string()),
        };
        self.pool_members
            .lock()
            .unwrap()
            .entry(pool_id.to_string())
            .or_default()
            .push(member.clone());
        Ok(member)
    }

    async fn delete_load_balancer_pool_member(
        &self,
        load_balancer_id: &str,
        pool_id: &str,
        member_id: &str,
    ) -> Result<(), IbmCloudError> {
        self.state.check("delete_load_balancer_pool_member")?;
        self.get_load_balancer(load_balancer_id).await?;
        let mut members = self.pool_members.lock().unwrap();
        let pool = members.get_mut(pool_id).ok_or_else(|| not_found("pool", pool_id))?;
        let before = pool.len();
        pool.retain(|m| m.id != member_id);
        if pool.len() == before {
            return Err(not_found("pool member", member_id));
        }
        self.state.record_delete("pool_member", member_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_vpc_populates_default_prefixes_and_security_group() {
        let client = MockVpcClient::new("us-south");
        let vpc = client
            .create_vpc(&VpcPrototype {
                name: "capi".to_string(),
                resource_group: None,
                address_prefix_management: "auto".to_string(),
            })
            .await
            .unwrap();

        assert!(vpc.default_security_group.is_some());
        let prefixes = client.list_vpc_address_prefixes(&vpc.id).await.unwrap();
        assert_eq!(prefixes.len(), 3);
        assert_eq!(prefixes[0].zone.name, "us-south-1");
    }

    #[tokio::test]
    async fn test_deletes_are_recorded_and_missing_is_not_found() {
        let client = MockVpcClient::new("us-south");
        client.add_floating_ip(FloatingIp { id: "fip-1".to_string(), ..Default::default() });

        client.delete_floating_ip("fip-1").await.unwrap();
        assert!(client.delete_floating_ip("fip-1").await.unwrap_err().is_not_found());
        assert_eq!(client.deleted(), vec!["floating_ip:fip-1".to_string()]);
    }

    #[tokio::test]
    async fn test_floating_ip_released_with_instance() {
        let client = MockVpcClient::new("us-south");
        client.add_floating_ip(FloatingIp { id: "fip-1".to_string(), ..Default::default() });
        client.add_instance(Instance {
            id: "ins-1".to_string(),
            primary_network_interface: Some(NetworkInterfaceReference { id: "nic-1".to_string(), ..Default::default() }),
            ..Default::default()
        });

        assert!(client
            .add_instance_network_interface_floating_ip("ins-1", "nic-2", "fip-1")
            .await
            .unwrap_err()
            .is_not_found());
        let fip = client.add_instance_network_interface_floating_ip("ins-1", "nic-1", "fip-1").await.unwrap();
        assert!(fip.is_bound_to("nic-1"));

        client.delete_instance("ins-1").await.unwrap();
        assert!(client.get_floating_ip("fip-1").await.unwrap().target.is_none());
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let client = MockVpcClient::new("us-south");
        client.fail_on("list_vpcs");
        assert!(matches!(client.list_vpcs(None).await, Err(IbmCloudError::Api { status: 500, .. })));
    }
}
