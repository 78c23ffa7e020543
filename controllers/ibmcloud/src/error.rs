//! Controller-specific error types.
//!
//! This module defines error types specific to the IBM Cloud controller
//! that are not covered by upstream library errors.

use crds::SpecError;
use ibmcloud_client::IbmCloudError;
use kube::Error as KubeError;
use thiserror::Error;

/// Errors that can occur in the IBM Cloud controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// IBM Cloud API error
    #[error("IBM Cloud error: {0}")]
    IbmCloud(#[from] IbmCloudError),

    /// Resource spec cannot be acted upon
    #[error("Invalid spec: {0}")]
    Spec(#[from] SpecError),

    /// JSON (de)serialization of a patch failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Prometheus registry error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Bootstrap data secret is malformed
    #[error("Invalid bootstrap data: {0}")]
    BootstrapData(String),

    /// Cloud resource could not be provisioned as described
    #[error("Provisioning failed: {0}")]
    Provision(String),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),
}

impl ControllerError {
    /// Short, stable label for the metrics `result` dimension
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Kube(_) => "kube",
            Self::IbmCloud(_) => "ibmcloud",
            Self::Spec(_) => "spec",
            Self::Serialization(_) => "serialization",
            Self::Metrics(_) => "metrics",
            Self::InvalidConfig(_) => "config",
            Self::BootstrapData(_) => "bootstrap_data",
            Self::Provision(_) => "provision",
            Self::Watch(_) => "watch",
        }
    }
}
