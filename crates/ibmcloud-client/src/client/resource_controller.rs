//! Resource Controller API client
//!
//! Used to resolve a PowerVS workspace GUID to its CRN and zone.

use crate::auth::IamAuthenticator;
use crate::common::HttpClient;
use crate::error::IbmCloudError;
use crate::models::ResourceInstance;
use reqwest::Client;
use std::sync::Arc;

/// Resource Controller client
pub struct ResourceControllerClient {
    http: HttpClient,
}

impl ResourceControllerClient {
    /// Create a new Resource Controller client
    pub fn new(client: Client, auth: Arc<IamAuthenticator>, base_url: String) -> Self {
        Self {
            http: HttpClient::new(client, base_url, auth),
        }
    }

    /// Get a service instance by GUID
    pub async fn get_resource_instance(&self, guid: &str) -> Result<ResourceInstance, IbmCloudError> {
        self.http
            .get(&format!("/v2/resource_instances/{}", urlencoding::encode(guid)))
            .await
    }
}
