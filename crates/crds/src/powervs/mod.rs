//! IBM Power Systems Virtual Server infrastructure CRDs
//!
//! Handles: IBMPowerVSCluster, IBMPowerVSMachine, IBMPowerVSMachineTemplate, IBMPowerVSImage

pub mod ibm_powervs_cluster;
pub mod ibm_powervs_image;
pub mod ibm_powervs_machine;
pub mod ibm_powervs_machine_template;

pub use ibm_powervs_cluster::*;
pub use ibm_powervs_image::*;
pub use ibm_powervs_machine::*;
pub use ibm_powervs_machine_template::*;
