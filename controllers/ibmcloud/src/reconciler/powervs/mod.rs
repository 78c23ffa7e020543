//! IBM Power Virtual Server reconcilers
//!
//! - `cluster`: IBMPowerVSCluster (network resolution)
//! - `machine`: IBMPowerVSMachine (PVM instances)
//! - `image`: IBMPowerVSImage (COS image import)

pub mod cluster;
pub mod image;
pub mod machine;
