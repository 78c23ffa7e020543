//! IBMPowerVSMachineTemplate Custom Resource Definition

use super::ibm_powervs_machine::IBMPowerVSMachineSpec;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// IBMPowerVSMachineTemplateSpec holds the machine template
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "IBMPowerVSMachineTemplate",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct IBMPowerVSMachineTemplateSpec {
    /// Template of the machine
    pub template: IBMPowerVSMachineTemplateResource,
}

/// Machine template body
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IBMPowerVSMachineTemplateResource {
    /// Spec stamped onto each IBMPowerVSMachine
    pub spec: IBMPowerVSMachineSpec,
}
