//! Core Cluster API types read by the infrastructure controllers
//!
//! Only the fields this provider consumes are modelled; everything else on the
//! upstream objects is ignored during deserialization. These types are never
//! installed by `crdgen`: the core Cluster API provider owns their CRDs.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Label carrying the owning CAPI cluster name
pub const CLUSTER_NAME_LABEL: &str = "cluster.x-k8s.io/cluster-name";
/// Annotation pausing reconciliation of an object
pub const PAUSED_ANNOTATION: &str = "cluster.x-k8s.io/paused";
/// Label present on control plane machines
pub const CONTROL_PLANE_LABEL: &str = "cluster.x-k8s.io/control-plane";
/// Key of the bootstrap data secret holding the user data payload
pub const BOOTSTRAP_DATA_KEY: &str = "value";
/// Default Kubernetes API server port
pub const DEFAULT_API_SERVER_PORT: i32 = 6443;

/// Endpoint used to reach a cluster's API server
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct APIEndpoint {
    /// Hostname or IP
    #[serde(default)]
    pub host: String,

    /// Port
    #[serde(default)]
    pub port: i32,
}

impl APIEndpoint {
    /// Whether host and port are both set
    pub fn is_valid(&self) -> bool {
        !self.host.is_empty() && self.port != 0
    }
}

/// Kind of machine address
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum MachineAddressType {
    /// Node hostname
    Hostname,
    /// Externally routable IP
    ExternalIP,
    /// Cluster-internal IP
    InternalIP,
    /// External DNS name
    ExternalDNS,
    /// Internal DNS name
    InternalDNS,
}

/// Address of a machine
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MachineAddress {
    /// Address kind
    #[serde(rename = "type")]
    pub type_: MachineAddressType,

    /// The address itself
    pub address: String,
}

impl MachineAddress {
    /// Internal IP address
    pub fn internal_ip(address: impl Into<String>) -> Self {
        Self { type_: MachineAddressType::InternalIP, address: address.into() }
    }

    /// External IP address
    pub fn external_ip(address: impl Into<String>) -> Self {
        Self { type_: MachineAddressType::ExternalIP, address: address.into() }
    }
}

/// Subset of the CAPI Cluster spec
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[kube(
    group = "cluster.x-k8s.io",
    version = "v1beta1",
    kind = "Cluster",
    namespaced,
    status = "ClusterStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    /// Reconciliation of the whole cluster is paused
    #[serde(default)]
    pub paused: bool,

    /// API server endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_plane_endpoint: Option<APIEndpoint>,

    /// Infrastructure cluster object (IBMVPCCluster or IBMPowerVSCluster)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infrastructure_ref: Option<InfrastructureRef>,
}

/// Reference from a CAPI Cluster to its infrastructure object
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InfrastructureRef {
    /// API version of the referenced object
    #[serde(default)]
    pub api_version: String,

    /// Kind of the referenced object
    #[serde(default)]
    pub kind: String,

    /// Name of the referenced object
    pub name: String,
}

impl Cluster {
    /// Name of the infrastructure object of `kind`, defaulting to the cluster's own name
    pub fn infrastructure_name(&self, kind: &str) -> Option<String> {
        match self.spec.infrastructure_ref.as_ref() {
            Some(reference) if reference.kind == kind => Some(reference.name.clone()),
            _ => self.metadata.name.clone(),
        }
    }
}

/// Subset of the CAPI Cluster status
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStatus {
    /// Infrastructure provider reported ready
    #[serde(default)]
    pub infrastructure_ready: bool,

    /// Lifecycle phase
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
}

/// Subset of the CAPI Machine spec
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[kube(
    group = "cluster.x-k8s.io",
    version = "v1beta1",
    kind = "Machine",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct MachineSpec {
    /// Owning cluster name
    pub cluster_name: String,

    /// Bootstrap configuration
    #[serde(default)]
    pub bootstrap: Bootstrap,

    /// Provider ID once set by the infrastructure provider
    #[serde(default, rename = "providerID", skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,

    /// Infrastructure machine object (IBMVPCMachine or IBMPowerVSMachine)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infrastructure_ref: Option<InfrastructureRef>,
}

/// Machine bootstrap configuration
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct Bootstrap {
    /// Name of the secret holding bootstrap data, set once the bootstrap provider is done
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_secret_name: Option<String>,
}

impl Machine {
    /// Whether the machine belongs to the control plane
    pub fn is_control_plane(&self) -> bool {
        self.metadata
            .labels
            .as_ref()
            .is_some_and(|labels| labels.contains_key(CONTROL_PLANE_LABEL))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::collections::BTreeMap;

    #[test]
    fn test_cluster_deserializes_with_unknown_fields() {
        let cluster: Cluster = serde_json::from_value(serde_json::json!({
            "apiVersion": "cluster.x-k8s.io/v1beta1",
            "kind": "Cluster",
            "metadata": { "name": "capi", "namespace": "default" },
            "spec": {
                "clusterNetwork": { "pods": { "cidrBlocks": ["192.168.0.0/16"] } },
                "infrastructureRef": { "kind": "IBMVPCCluster", "name": "capi" }
            },
            "status": { "infrastructureReady": true, "phase": "Provisioned" }
        }))
        .unwrap();
        assert!(!cluster.spec.paused);
        assert_eq!(cluster.infrastructure_name("IBMVPCCluster").as_deref(), Some("capi"));
        assert!(cluster.status.unwrap().infrastructure_ready);
    }

    #[test]
    fn test_infrastructure_name_follows_ref_of_matching_kind() {
        let mut cluster = Cluster::new(
            "capi",
            ClusterSpec {
                infrastructure_ref: Some(InfrastructureRef {
                    api_version: "infrastructure.cluster.x-k8s.io/v1beta1".to_string(),
                    kind: "IBMVPCCluster".to_string(),
                    name: "capi-vpc-infra".to_string(),
                }),
                ..Default::default()
            },
        );
        assert_eq!(cluster.infrastructure_name("IBMVPCCluster").as_deref(), Some("capi-vpc-infra"));
        assert_eq!(cluster.infrastructure_name("IBMPowerVSCluster").as_deref(), Some("capi"));

        cluster.spec.infrastructure_ref = None;
        assert_eq!(cluster.infrastructure_name("IBMVPCCluster").as_deref(), Some("capi"));
    }

    #[test]
    fn test_machine_control_plane_label() {
        let mut machine = Machine {
            metadata: ObjectMeta::default(),
            spec: MachineSpec { cluster_name: "capi".to_string(), ..Default::default() },
        };
        assert!(!machine.is_control_plane());

        machine.metadata.labels = Some(BTreeMap::from([(CONTROL_PLANE_LABEL.to_string(), String::new())]));
        assert!(machine.is_control_plane());
    }
}
