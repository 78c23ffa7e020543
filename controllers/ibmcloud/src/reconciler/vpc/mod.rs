//! IBM Cloud VPC reconcilers
//!
//! - `cluster`: IBMVPCCluster (VPC, subnet, gateway, control plane endpoint)
//! - `machine`: IBMVPCMachine (virtual server instances)

pub mod cluster;
pub mod machine;
