//! Reconciliation scopes
//!
//! A scope bundles an IBM Cloud client with one resource's spec and a
//! working copy of its status for a single reconciliation pass. Every
//! operation is idempotent: resources are looked up by ID, then by name,
//! and only created when neither finds them.
//!
//! - `vpc_cluster`: VPC, subnet, public gateway, floating IP, load balancer
//! - `vpc_machine`: VPC instances and load balancer pool membership
//! - `powervs_cluster`: PowerVS network resolution
//! - `powervs_machine`: PowerVS instances
//! - `powervs_image`: COS image import jobs and images

pub mod powervs_cluster;
pub mod powervs_image;
pub mod powervs_machine;
pub mod vpc_cluster;
pub mod vpc_machine;

#[cfg(test)]
mod powervs_image_test;
#[cfg(test)]
mod powervs_machine_test;
#[cfg(test)]
mod vpc_cluster_test;

pub use powervs_cluster::PowerVsClusterScope;
pub use powervs_image::PowerVsImageScope;
pub use powervs_machine::PowerVsMachineScope;
pub use vpc_cluster::VpcClusterScope;
pub use vpc_machine::VpcMachineScope;

use crate::error::ControllerError;
use crds::IBMCloudResourceReference;
use ibmcloud_client::{IbmCloudError, PowerVsClientTrait};
use tracing::debug;

/// Deleting something that is already gone is success
pub(crate) fn ignore_not_found(result: Result<(), IbmCloudError>) -> Result<(), IbmCloudError> {
    match result {
        Err(e) if e.is_not_found() => {
            debug!("Resource already deleted: {}", e);
            Ok(())
        }
        other => other,
    }
}

/// Resolve a PowerVS network reference (ID or exact name) to a network ID
pub(crate) async fn resolve_network(
    client: &dyn PowerVsClientTrait,
    reference: &IBMCloudResourceReference,
) -> Result<String, ControllerError> {
    reference.validate("spec.network")?;

    if let Some(id) = reference.id.as_deref().filter(|id| !id.is_empty()) {
        return match client.get_network(id).await {
            Ok(network) => Ok(network.network_id),
            Err(e) if e.is_not_found() => Err(ControllerError::Provision(format!(
                "network {} not found in workspace {}",
                id,
                client.service_instance_id()
            ))),
            Err(e) => Err(e.into()),
        };
    }

    let name = reference.name.as_deref().unwrap_or_default();
    let networks = client.list_networks().await?;
    let mut matches = networks.into_iter().filter(|n| n.name == name);
    match (matches.next(), matches.next()) {
        (Some(network), None) => Ok(network.network_id),
        (Some(_), Some(_)) => Err(ControllerError::Provision(format!(
            "network name {} is ambiguous in workspace {}, reference it by ID",
            name,
            client.service_instance_id()
        ))),
        (None, _) => Err(ControllerError::Provision(format!(
            "network {} not found in workspace {}",
            name,
            client.service_instance_id()
        ))),
    }
}
