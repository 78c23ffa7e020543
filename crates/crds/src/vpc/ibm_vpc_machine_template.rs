//! IBMVPCMachineTemplate Custom Resource Definition
//!
//! Immutable template CAPI MachineSets and control planes clone IBMVPCMachines from.

use super::ibm_vpc_machine::IBMVPCMachineSpec;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// IBMVPCMachineTemplateSpec holds the machine template
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "IBMVPCMachineTemplate",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct IBMVPCMachineTemplateSpec {
    /// Template of the machine
    pub template: IBMVPCMachineTemplateResource,
}

/// Machine template body
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IBMVPCMachineTemplateResource {
    /// Spec stamped onto each IBMVPCMachine
    pub spec: IBMVPCMachineSpec,
}
