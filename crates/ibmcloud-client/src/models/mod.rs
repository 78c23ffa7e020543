//! IBM Cloud API models
//!
//! Request and response bodies for the VPC (snake_case), PowerVS (camelCase)
//! and Resource Controller APIs. Only the fields the provider reads or sends
//! are modelled; unknown fields are ignored on input.

pub mod powervs;
pub mod resource_controller;
pub mod vpc;

pub use powervs::*;
pub use resource_controller::*;
pub use vpc::*;
