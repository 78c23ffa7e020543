//! CAPIBM CRD Definitions
//!
//! Kubernetes Custom Resource Definitions for the IBM Cloud Cluster API
//! infrastructure provider, plus the small slice of core Cluster API types
//! the controllers read.

pub mod capi;
pub mod conditions;
pub mod powervs;
pub mod references;
pub mod validation;
pub mod vpc;

pub use capi::*;
pub use conditions::*;
pub use powervs::*;
pub use references::*;
pub use validation::SpecError;
pub use vpc::*;

/// API group served by every infrastructure CRD in this crate
pub const INFRASTRUCTURE_GROUP: &str = "infrastructure.cluster.x-k8s.io";

/// API version served by every infrastructure CRD in this crate
pub const INFRASTRUCTURE_VERSION: &str = "v1beta1";
