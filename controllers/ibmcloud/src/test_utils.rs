//! Test utilities for unit testing scopes and reconcilers
//!
//! Builders for CRDs, CAPI objects and bootstrap secrets with the values the
//! mock IBM Cloud clients expect (region `us-south`, zone `us-south-1`).

use crds::*;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use k8s_openapi::ByteString;
use std::collections::BTreeMap;

pub const TEST_NAMESPACE: &str = "default";
pub const TEST_REGION: &str = "us-south";
pub const TEST_ZONE: &str = "us-south-1";
pub const TEST_RESOURCE_GROUP: &str = "4f0a2b3c-resource-group";
pub const TEST_WORKSPACE: &str = "d7c5e2f1-powervs-workspace";
pub const TEST_POWERVS_ZONE: &str = "dal12";

fn meta(name: &str, namespace: &str, cluster: Option<&str>) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(namespace.to_string()),
        uid: Some(format!("uid-{}", name)),
        labels: cluster.map(|c| BTreeMap::from([(CLUSTER_NAME_LABEL.to_string(), c.to_string())])),
        ..Default::default()
    }
}

fn owned_by_machine(mut meta: ObjectMeta, machine: &str) -> ObjectMeta {
    meta.owner_references = Some(vec![OwnerReference {
        api_version: "cluster.x-k8s.io/v1beta1".to_string(),
        kind: "Machine".to_string(),
        name: machine.to_string(),
        uid: format!("uid-{}", machine),
        ..Default::default()
    }]);
    meta
}

/// VPC cluster spec in `us-south-1` with a floating IP endpoint
pub fn vpc_cluster_spec() -> IBMVPCClusterSpec {
    IBMVPCClusterSpec {
        region: TEST_REGION.to_string(),
        resource_group: TEST_RESOURCE_GROUP.to_string(),
        vpc: None,
        zone: TEST_ZONE.to_string(),
        control_plane_endpoint: APIEndpoint::default(),
        control_plane_load_balancer: None,
    }
}

/// IBMVPCCluster labelled with its own name as the CAPI cluster
pub fn vpc_cluster(name: &str, namespace: &str) -> IBMVPCCluster {
    IBMVPCCluster {
        metadata: meta(name, namespace, Some(name)),
        spec: vpc_cluster_spec(),
        status: None,
    }
}

/// CAPI Cluster pointing at an infrastructure object of the same name
pub fn capi_cluster(name: &str, namespace: &str, infrastructure_ready: bool) -> Cluster {
    Cluster {
        metadata: meta(name, namespace, None),
        spec: ClusterSpec::default(),
        status: Some(ClusterStatus {
            infrastructure_ready,
            phase: Some("Provisioned".to_string()),
        }),
    }
}

/// VPC machine spec booting from a stock image
pub fn vpc_machine_spec() -> IBMVPCMachineSpec {
    IBMVPCMachineSpec {
        name: None,
        image: "r006-image-ubuntu-22-04".to_string(),
        zone: TEST_ZONE.to_string(),
        profile: "bx2-2x8".to_string(),
        ssh_keys: vec!["r006-key-0001".to_string()],
        primary_network_interface: NetworkInterface::default(),
        provider_id: None,
    }
}

/// IBMVPCMachine owned by a CAPI Machine of the same name
pub fn vpc_machine(name: &str, namespace: &str, cluster: &str) -> IBMVPCMachine {
    IBMVPCMachine {
        metadata: owned_by_machine(meta(name, namespace, Some(cluster)), name),
        spec: vpc_machine_spec(),
        status: None,
    }
}

/// CAPI Machine, optionally labelled as control plane and with bootstrap data
pub fn capi_machine(name: &str, namespace: &str, cluster: &str, control_plane: bool, secret: Option<&str>) -> Machine {
    let mut metadata = meta(name, namespace, Some(cluster));
    if control_plane {
        metadata
            .labels
            .get_or_insert_with(BTreeMap::new)
            .insert(CONTROL_PLANE_LABEL.to_string(), String::new());
    }
    Machine {
        metadata,
        spec: MachineSpec {
            cluster_name: cluster.to_string(),
            bootstrap: Bootstrap {
                data_secret_name: secret.map(str::to_string),
            },
            provider_id: None,
            infrastructure_ref: None,
        },
    }
}

/// Bootstrap data secret as written by a bootstrap provider
pub fn bootstrap_secret(name: &str, namespace: &str, data: &str) -> Secret {
    Secret {
        metadata: meta(name, namespace, None),
        data: Some(BTreeMap::from([(
            BOOTSTRAP_DATA_KEY.to_string(),
            ByteString(data.as_bytes().to_vec()),
        )])),
        ..Default::default()
    }
}

/// PowerVS cluster spec attaching the workspace network by name
pub fn powervs_cluster_spec() -> IBMPowerVSClusterSpec {
    IBMPowerVSClusterSpec {
        service_instance_id: TEST_WORKSPACE.to_string(),
        network: IBMCloudResourceReference::by_name("capi-net"),
        control_plane_endpoint: APIEndpoint {
            host: "192.168.0.5".to_string(),
            port: DEFAULT_API_SERVER_PORT,
        },
    }
}

/// PowerVS machine spec booting from an image referenced by name
pub fn powervs_machine_spec() -> IBMPowerVSMachineSpec {
    IBMPowerVSMachineSpec {
        service_instance_id: TEST_WORKSPACE.to_string(),
        ssh_key: Some("capi-key".to_string()),
        image: Some(IBMCloudResourceReference::by_name("rhcos-414")),
        image_ref: None,
        system_type: "s922".to_string(),
        processor_type: PowerVSProcessorType::Shared,
        processors: "0.25".to_string(),
        memory_gib: 4,
        network: IBMCloudResourceReference::by_name("capi-net"),
        provider_id: None,
    }
}

/// PowerVS image imported from a public COS bucket
pub fn powervs_image_spec(cluster: &str) -> IBMPowerVSImageSpec {
    IBMPowerVSImageSpec {
        cluster_name: cluster.to_string(),
        service_instance_id: TEST_WORKSPACE.to_string(),
        bucket: "power-oss-bucket".to_string(),
        object: "rhcos-414.ova.gz".to_string(),
        region: TEST_REGION.to_string(),
        storage_type: "tier1".to_string(),
        os_type: "rhel".to_string(),
        delete_policy: DeletePolicy::Delete,
    }
}
