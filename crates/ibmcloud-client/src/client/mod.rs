//! IBM Cloud API clients
//!
//! One client per service: VPC (regional), PowerVS (per workspace) and the
//! global Resource Controller.

mod powervs;
mod resource_controller;
mod vpc;

pub use powervs::PowerVsClient;
pub use resource_controller::ResourceControllerClient;
pub use vpc::{VpcClient, VPC_API_VERSION};
