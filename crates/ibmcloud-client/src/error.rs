//! IBM Cloud client errors

use thiserror::Error;

/// Errors that can occur when interacting with IBM Cloud APIs
#[derive(Debug, Error)]
pub enum IbmCloudError {
    /// HTTP request/response error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IBM Cloud API returned an error status
    #[error("IBM Cloud API error ({status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body or summary
        message: String,
    },

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Authentication failed (invalid API key, expired token, missing access)
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request (e.g., missing required fields)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// PowerVS zone has no known region
    #[error("Unknown PowerVS zone: {0}")]
    UnknownZone(String),
}

impl IbmCloudError {
    /// Whether the error means the resource does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
