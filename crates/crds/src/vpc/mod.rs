//! IBM Cloud VPC infrastructure CRDs
//!
//! Handles: IBMVPCCluster, IBMVPCMachine, IBMVPCMachineTemplate

pub mod ibm_vpc_cluster;
pub mod ibm_vpc_machine;
pub mod ibm_vpc_machine_template;

pub use ibm_vpc_cluster::*;
pub use ibm_vpc_machine::*;
pub use ibm_vpc_machine_template::*;
