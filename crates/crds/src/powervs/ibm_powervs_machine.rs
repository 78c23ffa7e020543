//! IBMPowerVSMachine Custom Resource Definition
//!
//! One PowerVS virtual server (PVM instance) backing a CAPI Machine.

use crate::capi::MachineAddress;
use crate::conditions::Condition;
use crate::references::{IBMCloudResourceReference, ObjectReference};
use crate::validation::SpecError;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// IBMPowerVSMachineSpec defines the desired state of a PowerVS instance
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "IBMPowerVSMachine",
    namespaced,
    status = "IBMPowerVSMachineStatus",
    shortname = "ibmpowervsm",
    printcolumn = r#"{"name":"Ready","type":"boolean","jsonPath":".status.ready"}"#,
    printcolumn = r#"{"name":"State","type":"string","jsonPath":".status.instanceState"}"#,
    printcolumn = r#"{"name":"ProviderID","type":"string","jsonPath":".spec.providerID"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct IBMPowerVSMachineSpec {
    /// PowerVS service instance (workspace) GUID
    #[serde(rename = "serviceInstanceID")]
    pub service_instance_id: String,

    /// SSH key pair name registered in the workspace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_key: Option<String>,

    /// Boot image by ID or name; mutually exclusive with `imageRef`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<IBMCloudResourceReference>,

    /// Boot image imported by an IBMPowerVSImage; mutually exclusive with `image`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<ObjectReference>,

    /// Machine type (e.g. "s922", "e980")
    #[serde(default = "default_system_type")]
    pub system_type: String,

    /// Processor sharing mode
    #[serde(default)]
    pub processor_type: PowerVSProcessorType,

    /// Number of processors, fractional for shared/capped (e.g. "0.25")
    #[serde(default = "default_processors")]
    pub processors: String,

    /// Memory in GiB
    #[serde(default = "default_memory", rename = "memoryGiB")]
    pub memory_gib: i32,

    /// Network to attach
    pub network: IBMCloudResourceReference,

    /// Provider ID, set by the controller
    #[serde(default, rename = "providerID", skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
}

fn default_system_type() -> String {
    "s922".to_string()
}

fn default_processors() -> String {
    "0.25".to_string()
}

fn default_memory() -> i32 {
    2
}

/// Processor sharing mode of a PowerVS instance
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
pub enum PowerVSProcessorType {
    /// Whole dedicated cores
    Dedicated,
    /// Shared uncapped
    #[default]
    Shared,
    /// Shared capped
    Capped,
}

impl PowerVSProcessorType {
    /// Value expected by the PowerVS API
    pub fn as_api_str(self) -> &'static str {
        match self {
            Self::Dedicated => "dedicated",
            Self::Shared => "shared",
            Self::Capped => "capped",
        }
    }
}

impl IBMPowerVSMachineSpec {
    /// Check the spec before any cloud call is made
    pub fn validate(&self) -> Result<(), SpecError> {
        match (&self.image, &self.image_ref) {
            (None, None) => return Err(SpecError::MissingOneOf("spec.image", "spec.imageRef")),
            (Some(_), Some(_)) => return Err(SpecError::Conflicting("spec.image", "spec.imageRef")),
            (Some(image), None) => image.validate("spec.image")?,
            (None, Some(_)) => {}
        }
        self.network.validate("spec.network")?;

        let processors: f64 = self.processors.parse().map_err(|_| SpecError::InvalidValue {
            field: "spec.processors",
            reason: format!("{:?} is not a number", self.processors),
        })?;
        if processors <= 0.0 {
            return Err(SpecError::InvalidValue {
                field: "spec.processors",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.processor_type == PowerVSProcessorType::Dedicated && processors.fract() != 0.0 {
            return Err(SpecError::InvalidValue {
                field: "spec.processors",
                reason: "dedicated processors must be a whole number".to_string(),
            });
        }
        if self.memory_gib < 2 {
            return Err(SpecError::InvalidValue {
                field: "spec.memoryGiB",
                reason: "must be at least 2".to_string(),
            });
        }
        Ok(())
    }
}

/// IBMPowerVSMachineStatus defines the observed state of a PowerVS instance
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IBMPowerVSMachineStatus {
    /// Instance is active
    #[serde(default)]
    pub ready: bool,

    /// PVM instance ID
    #[serde(default, rename = "instanceID", skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,

    /// Instance state ("BUILD", "ACTIVE", "SHUTOFF", "ERROR", ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_state: Option<String>,

    /// Health status reported by PowerVS
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<String>,

    /// Fault message when the instance is in error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fault: Option<String>,

    /// Addresses of the instance
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub addresses: Vec<MachineAddress>,

    /// Region of the workspace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Zone of the workspace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,

    /// Conditions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}
