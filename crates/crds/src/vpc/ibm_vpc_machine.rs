//! IBMVPCMachine Custom Resource Definition
//!
//! One VPC virtual server instance backing a CAPI Machine.

use crate::capi::MachineAddress;
use crate::conditions::Condition;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// IBMVPCMachineSpec defines the desired state of a VPC instance
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "IBMVPCMachine",
    namespaced,
    status = "IBMVPCMachineStatus",
    shortname = "ibmvpcm",
    printcolumn = r#"{"name":"Ready","type":"boolean","jsonPath":".status.ready"}"#,
    printcolumn = r#"{"name":"State","type":"string","jsonPath":".status.instanceStatus"}"#,
    printcolumn = r#"{"name":"ProviderID","type":"string","jsonPath":".spec.providerID"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct IBMVPCMachineSpec {
    /// Instance name (defaults to the object name)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Image ID to boot from
    pub image: String,

    /// Zone to place the instance in
    pub zone: String,

    /// Instance profile
    #[serde(default = "default_profile")]
    pub profile: String,

    /// SSH key IDs injected into the instance
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ssh_keys: Vec<String>,

    /// Primary network interface settings
    #[serde(default)]
    pub primary_network_interface: NetworkInterface,

    /// Provider ID, set by the controller
    #[serde(default, rename = "providerID", skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
}

fn default_profile() -> String {
    "bx2-4x16".to_string()
}

/// Network interface settings
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterface {
    /// Subnet ID (defaults to the cluster subnet)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet: Option<String>,
}

/// IBMVPCMachineStatus defines the observed state of a VPC instance
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IBMVPCMachineStatus {
    /// Instance is running
    #[serde(default)]
    pub ready: bool,

    /// Instance ID
    #[serde(default, rename = "instanceID", skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,

    /// Instance status reported by VPC ("pending", "running", ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_status: Option<String>,

    /// Addresses of the instance
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub addresses: Vec<MachineAddress>,

    /// Conditions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_machine_spec_defaults() {
        let spec: IBMVPCMachineSpec = serde_json::from_value(serde_json::json!({
            "image": "r006-image",
            "zone": "us-south-1",
            "sshKeys": ["r006-key"]
        }))
        .unwrap();
        assert_eq!(spec.profile, "bx2-4x16");
        assert_eq!(spec.primary_network_interface.subnet, None);
        assert_eq!(spec.ssh_keys, vec!["r006-key".to_string()]);
    }
}
