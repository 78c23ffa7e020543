//! VPC (generation 2) API models
//!
//! See: https://cloud.ibm.com/apidocs/vpc/latest

use serde::{Deserialize, Serialize};

/// Reference to a resource by ID (request bodies)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityReference {
    pub id: String,
}

impl IdentityReference {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Reference to a resource by name (zones, profiles)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameReference {
    pub name: String,
}

impl NameReference {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Reference embedded in responses
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceReference {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// VPC
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vpc {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub crn: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub default_security_group: Option<ResourceReference>,
    #[serde(default)]
    pub resource_group: Option<ResourceReference>,
}

/// Request body for creating a VPC
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VpcPrototype {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_group: Option<IdentityReference>,
    /// "auto" creates one default address prefix per zone
    pub address_prefix_management: String,
}

/// VPC address prefix
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AddressPrefix {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub cidr: String,
    pub zone: NameReference,
    #[serde(default)]
    pub is_default: bool,
}

/// Security group rule remote (CIDR block, address or security group)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroupRuleRemote {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cidr_block: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Security group rule
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecurityGroupRule {
    pub id: String,
    pub direction: String,
    pub protocol: String,
    #[serde(default)]
    pub port_min: Option<i64>,
    #[serde(default)]
    pub port_max: Option<i64>,
    #[serde(default)]
    pub ip_version: Option<String>,
    #[serde(default)]
    pub remote: Option<SecurityGroupRuleRemote>,
}

/// Request body for creating a security group rule
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SecurityGroupRulePrototype {
    pub direction: String,
    pub protocol: String,
    pub ip_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port_min: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port_max: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote: Option<SecurityGroupRuleRemote>,
}

impl SecurityGroupRulePrototype {
    /// Inbound TCP rule for a single port from anywhere
    pub fn inbound_tcp(port: i64) -> Self {
        Self {
            direction: "inbound".to_string(),
            protocol: "tcp".to_string(),
            ip_version: "ipv4".to_string(),
            port_min: Some(port),
            port_max: Some(port),
            remote: None,
        }
    }

    /// Inbound ICMP rule from anywhere
    pub fn inbound_icmp() -> Self {
        Self {
            direction: "inbound".to_string(),
            protocol: "icmp".to_string(),
            ip_version: "ipv4".to_string(),
            port_min: None,
            port_max: None,
            remote: None,
        }
    }

    /// Whether an existing rule already grants what this prototype asks for
    pub fn matches(&self, rule: &SecurityGroupRule) -> bool {
        rule.direction == self.direction
            && rule.protocol == self.protocol
            && rule.port_min == self.port_min
            && rule.port_max == self.port_max
    }
}

/// Subnet
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subnet {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub ipv4_cidr_block: Option<String>,
    pub zone: NameReference,
    pub vpc: ResourceReference,
    #[serde(default)]
    pub public_gateway: Option<ResourceReference>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Request body for creating a subnet
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubnetPrototype {
    pub name: String,
    pub vpc: IdentityReference,
    pub zone: NameReference,
    pub ipv4_cidr_block: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_group: Option<IdentityReference>,
}

/// Public gateway
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PublicGateway {
    pub id: String,
    pub name: String,
    pub zone: NameReference,
    pub vpc: ResourceReference,
    #[serde(default)]
    pub status: Option<String>,
}

/// Request body for creating a public gateway
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicGatewayPrototype {
    pub name: String,
    pub vpc: IdentityReference,
    pub zone: NameReference,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_group: Option<IdentityReference>,
}

/// Floating IP
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FloatingIp {
    pub id: String,
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub zone: Option<NameReference>,
    #[serde(default)]
    pub status: Option<String>,
    /// Network interface the address is bound to, if any
    #[serde(default)]
    pub target: Option<ResourceReference>,
}

impl FloatingIp {
    /// Whether the address is bound to the given network interface
    pub fn is_bound_to(&self, network_interface_id: &str) -> bool {
        self.target.as_ref().is_some_and(|t| t.id == network_interface_id)
    }
}

/// Request body for reserving a floating IP in a zone
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FloatingIpPrototype {
    pub name: String,
    pub zone: NameReference,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_group: Option<IdentityReference>,
}

/// Reserved IP reference on a network interface
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservedIpReference {
    pub address: String,
}

/// Network interface reference on an instance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkInterfaceReference {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub subnet: Option<ResourceReference>,
    #[serde(default)]
    pub primary_ip: Option<ReservedIpReference>,
    /// Older API versions report the address directly
    #[serde(default)]
    pub primary_ipv4_address: Option<String>,
}

impl NetworkInterfaceReference {
    /// IPv4 address of the interface, whichever field carries it
    pub fn ipv4_address(&self) -> Option<&str> {
        self.primary_ip
            .as_ref()
            .map(|ip| ip.address.as_str())
            .or(self.primary_ipv4_address.as_deref())
            .filter(|a| !a.is_empty() && *a != "0.0.0.0")
    }
}

/// Virtual server instance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub id: String,
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub zone: Option<NameReference>,
    #[serde(default)]
    pub vpc: Option<ResourceReference>,
    #[serde(default)]
    pub primary_network_interface: Option<NetworkInterfaceReference>,
}

impl Instance {
    pub fn primary_ipv4_address(&self) -> Option<&str> {
        self.primary_network_interface
            .as_ref()
            .and_then(NetworkInterfaceReference::ipv4_address)
    }
}

/// Network interface in an instance prototype
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkInterfacePrototype {
    pub subnet: IdentityReference,
}

/// Request body for creating an instance
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstancePrototype {
    pub name: String,
    pub vpc: IdentityReference,
    pub zone: NameReference,
    pub profile: NameReference,
    pub image: IdentityReference,
    pub primary_network_interface: NetworkInterfacePrototype,
    pub keys: Vec<IdentityReference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_group: Option<IdentityReference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_data: Option<String>,
}

/// Load balancer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadBalancer {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub hostname: Option<String>,
    /// active, create_pending, update_pending, delete_pending, maintenance_pending, failed
    pub provisioning_status: String,
    #[serde(default)]
    pub operating_status: Option<String>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub pools: Vec<ResourceReference>,
    #[serde(default)]
    pub listeners: Vec<ResourceReference>,
    #[serde(default)]
    pub subnets: Vec<ResourceReference>,
}

impl LoadBalancer {
    pub fn is_active(&self) -> bool {
        self.provisioning_status == "active"
    }
}

/// Pool health monitor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadBalancerPoolHealthMonitorPrototype {
    pub delay: i64,
    pub max_retries: i64,
    pub timeout: i64,
    #[serde(rename = "type")]
    pub type_: String,
}

/// Pool created together with a load balancer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadBalancerPoolPrototype {
    pub name: String,
    pub algorithm: String,
    pub protocol: String,
    pub health_monitor: LoadBalancerPoolHealthMonitorPrototype,
}

/// Listener created together with a load balancer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadBalancerListenerPrototype {
    pub port: i64,
    pub protocol: String,
    pub default_pool: NameReference,
}

/// Request body for creating a load balancer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadBalancerPrototype {
    pub name: String,
    pub is_public: bool,
    pub subnets: Vec<IdentityReference>,
    pub pools: Vec<LoadBalancerPoolPrototype>,
    pub listeners: Vec<LoadBalancerListenerPrototype>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_group: Option<IdentityReference>,
}

/// Pool member target
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancerPoolMemberTarget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Load balancer pool member
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadBalancerPoolMember {
    pub id: String,
    pub port: i64,
    pub target: LoadBalancerPoolMemberTarget,
    #[serde(default)]
    pub provisioning_status: Option<String>,
    #[serde(default)]
    pub health: Option<String>,
}

/// Request body for adding a pool member
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadBalancerPoolMemberPrototype {
    pub port: i64,
    pub target: LoadBalancerPoolMemberTarget,
}
