//! IBMVPCCluster Custom Resource Definition
//!
//! Describes the VPC-level infrastructure of a workload cluster: the VPC, one
//! subnet with a public gateway in a single zone, and a control plane
//! endpoint backed either by a floating IP or a VPC load balancer.

use crate::capi::APIEndpoint;
use crate::conditions::Condition;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// IBMVPCClusterSpec defines the desired state of the VPC cluster infrastructure
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "IBMVPCCluster",
    namespaced,
    status = "IBMVPCClusterStatus",
    shortname = "ibmvpccl",
    printcolumn = r#"{"name":"Ready","type":"boolean","jsonPath":".status.ready"}"#,
    printcolumn = r#"{"name":"VPC","type":"string","jsonPath":".status.vpc.id"}"#,
    printcolumn = r#"{"name":"Endpoint","type":"string","jsonPath":".status.vpcEndpoint.address"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct IBMVPCClusterSpec {
    /// IBM Cloud region (e.g. "us-south")
    pub region: String,

    /// Resource group ID the VPC resources are created in
    pub resource_group: String,

    /// Name of the VPC to create or adopt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpc: Option<String>,

    /// Zone the subnet, public gateway and floating IP live in (e.g. "us-south-1")
    pub zone: String,

    /// API server endpoint; filled in by the controller when empty
    #[serde(default)]
    pub control_plane_endpoint: APIEndpoint,

    /// Front the control plane with a VPC load balancer instead of a floating IP
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_plane_load_balancer: Option<VPCLoadBalancerSpec>,
}

/// Control plane load balancer settings
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct VPCLoadBalancerSpec {
    /// Load balancer name (defaults to "<cluster>-load-balancer")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Public (internet facing) or private load balancer
    #[serde(default = "default_true")]
    pub public: bool,

    /// Extra listeners forwarded to the control plane pool
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_listeners: Vec<AdditionalListenerSpec>,
}

fn default_true() -> bool {
    true
}

/// Extra load balancer listener
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalListenerSpec {
    /// TCP port to listen on
    pub port: i64,
}

/// Reference to a VPC
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct VPC {
    /// VPC ID
    pub id: String,
    /// VPC name
    pub name: String,
}

/// Observed subnet
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Subnet {
    /// Subnet ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Subnet name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// IPv4 CIDR of the subnet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv4_cidr_block: Option<String>,
    /// Zone of the subnet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
}

/// Observed public gateway
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PublicGateway {
    /// Gateway ID
    pub id: String,
    /// Gateway name
    pub name: String,
}

/// Observed control plane endpoint
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct VPCEndpoint {
    /// Address (floating IP or load balancer hostname)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    /// Floating IP ID when the endpoint is a floating IP
    #[serde(default, rename = "floatingIPID", skip_serializing_if = "Option::is_none")]
    pub floating_ip_id: Option<String>,

    /// Load balancer ID when the endpoint is a load balancer
    #[serde(default, rename = "loadBalancerIPID", skip_serializing_if = "Option::is_none")]
    pub load_balancer_id: Option<String>,
}

/// IBMVPCClusterStatus defines the observed state of the VPC cluster infrastructure
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IBMVPCClusterStatus {
    /// Infrastructure is ready for machines
    #[serde(default)]
    pub ready: bool,

    /// VPC in use
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpc: Option<VPC>,

    /// Cluster subnet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet: Option<Subnet>,

    /// Public gateway attached to the cluster subnet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_gateway: Option<PublicGateway>,

    /// Control plane endpoint
    #[serde(default)]
    pub vpc_endpoint: VPCEndpoint,

    /// Provisioning status of the control plane load balancer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_plane_load_balancer_state: Option<String>,

    /// Conditions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl IBMVPCClusterStatus {
    /// ID of the VPC recorded in status
    pub fn vpc_id(&self) -> Option<&str> {
        self.vpc.as_ref().map(|v| v.id.as_str()).filter(|id| !id.is_empty())
    }

    /// ID of the subnet recorded in status
    pub fn subnet_id(&self) -> Option<&str> {
        self.subnet.as_ref().and_then(|s| s.id.as_deref()).filter(|id| !id.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_balancer_defaults_to_public() {
        let spec: IBMVPCClusterSpec = serde_json::from_value(serde_json::json!({
            "region": "us-south",
            "resourceGroup": "rg-id",
            "zone": "us-south-1",
            "controlPlaneLoadBalancer": { "name": "capi-lb" }
        }))
        .unwrap();
        let lb = spec.control_plane_load_balancer.unwrap();
        assert!(lb.public);
        assert!(lb.additional_listeners.is_empty());
        assert!(!spec.control_plane_endpoint.is_valid());
    }

    #[test]
    fn test_status_endpoint_field_names() {
        let status = IBMVPCClusterStatus {
            vpc_endpoint: VPCEndpoint {
                address: Some("169.0.0.1".to_string()),
                floating_ip_id: Some("fip-1".to_string()),
                load_balancer_id: None,
            },
            ..Default::default()
        };
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["vpcEndpoint"]["floatingIPID"], "fip-1");
        assert_eq!(status.vpc_id(), None);
    }
}
