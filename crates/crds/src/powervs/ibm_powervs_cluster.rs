//! IBMPowerVSCluster Custom Resource Definition
//!
//! A PowerVS workspace (service instance) plus the network machines attach to.
//! The control plane endpoint is supplied by the user.

use crate::capi::APIEndpoint;
use crate::conditions::Condition;
use crate::references::IBMCloudResourceReference;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// IBMPowerVSClusterSpec defines the desired state of the PowerVS cluster infrastructure
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "IBMPowerVSCluster",
    namespaced,
    status = "IBMPowerVSClusterStatus",
    shortname = "ibmpowervscl",
    printcolumn = r#"{"name":"Ready","type":"boolean","jsonPath":".status.ready"}"#,
    printcolumn = r#"{"name":"Network","type":"string","jsonPath":".status.networkID"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct IBMPowerVSClusterSpec {
    /// PowerVS service instance (workspace) GUID
    #[serde(rename = "serviceInstanceID")]
    pub service_instance_id: String,

    /// Network machines attach to
    pub network: IBMCloudResourceReference,

    /// API server endpoint
    #[serde(default)]
    pub control_plane_endpoint: APIEndpoint,
}

/// IBMPowerVSClusterStatus defines the observed state of the PowerVS cluster infrastructure
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IBMPowerVSClusterStatus {
    /// Infrastructure is ready for machines
    #[serde(default)]
    pub ready: bool,

    /// Resolved network ID
    #[serde(default, rename = "networkID", skip_serializing_if = "Option::is_none")]
    pub network_id: Option<String>,

    /// Conditions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}
