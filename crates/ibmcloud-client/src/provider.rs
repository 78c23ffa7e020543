//! Client provider
//!
//! Hands out cached, authenticated clients: VPC clients per region and
//! PowerVS clients per workspace. PowerVS workspaces are resolved through the
//! Resource Controller to find their zone, region and CRN.

use crate::auth::IamAuthenticator;
use crate::client::{PowerVsClient, ResourceControllerClient, VpcClient};
use crate::client_trait::{PowerVsClientTrait, VpcClientTrait};
use crate::endpoints::{region_for_zone, ServiceEndpoints};
use crate::error::IbmCloudError;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Source of IBM Cloud clients
#[async_trait::async_trait]
pub trait ClientProvider: Send + Sync {
    /// VPC client for a region
    async fn vpc(&self, region: &str) -> Result<Arc<dyn VpcClientTrait>, IbmCloudError>;

    /// PowerVS client for a workspace (service instance GUID)
    async fn power_vs(&self, service_instance_id: &str) -> Result<Arc<dyn PowerVsClientTrait>, IbmCloudError>;
}

/// Provider backed by the real IBM Cloud APIs
pub struct IbmCloudClientProvider {
    client: Client,
    auth: Arc<IamAuthenticator>,
    endpoints: ServiceEndpoints,
    resource_controller: ResourceControllerClient,
    vpc_clients: Mutex<HashMap<String, Arc<dyn VpcClientTrait>>>,
    powervs_clients: Mutex<HashMap<String, Arc<dyn PowerVsClientTrait>>>,
}

impl IbmCloudClientProvider {
    /// Create a new provider
    ///
    /// # Arguments
    /// * `api_key` - IBM Cloud API key
    /// * `iam_url` - IAM base URL
    /// * `endpoints` - Per-region service endpoint overrides
    pub fn new(api_key: String, iam_url: String, endpoints: ServiceEndpoints) -> Result<Self, IbmCloudError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(IbmCloudError::Http)?;
        let auth = Arc::new(IamAuthenticator::new(client.clone(), iam_url, api_key));
        let resource_controller =
            ResourceControllerClient::new(client.clone(), auth.clone(), endpoints.resource_controller_url());

        Ok(Self {
            client,
            auth,
            endpoints,
            resource_controller,
            vpc_clients: Mutex::new(HashMap::new()),
            powervs_clients: Mutex::new(HashMap::new()),
        })
    }

    /// Validate the API key with a token exchange
    pub async fn validate(&self) -> Result<(), IbmCloudError> {
        self.auth.validate().await
    }
}

#[async_trait::async_trait]
impl ClientProvider for IbmCloudClientProvider {
    async fn vpc(&self, region: &str) -> Result<Arc<dyn VpcClientTrait>, IbmCloudError> {
        if region.is_empty() {
            return Err(IbmCloudError::InvalidRequest("VPC region must not be empty".to_string()));
        }

        let mut clients = self.vpc_clients.lock().await;
        if let Some(client) = clients.get(region) {
            return Ok(client.clone());
        }

        let url = self.endpoints.vpc_url(region);
        debug!("Creating VPC client for region {} at {}", region, url);
        let client: Arc<dyn VpcClientTrait> = Arc::new(VpcClient::new(
            self.client.clone(),
            self.auth.clone(),
            region.to_string(),
            url,
        ));
        clients.insert(region.to_string(), client.clone());
        Ok(client)
    }

    async fn power_vs(&self, service_instance_id: &str) -> Result<Arc<dyn PowerVsClientTrait>, IbmCloudError> {
        if service_instance_id.is_empty() {
            return Err(IbmCloudError::InvalidRequest(
                "PowerVS service instance ID must not be empty".to_string(),
            ));
        }

        let mut clients = self.powervs_clients.lock().await;
        if let Some(client) = clients.get(service_instance_id) {
            return Ok(client.clone());
        }

        let instance = self
            .resource_controller
            .get_resource_instance(service_instance_id)
            .await?;
        let region = region_for_zone(&instance.region_id)?;
        let url = self.endpoints.powervs_url(region);
        info!(
            "Resolved PowerVS workspace {} ({}) in zone {} region {}",
            instance.name, instance.guid, instance.region_id, region
        );

        let client: Arc<dyn PowerVsClientTrait> = Arc::new(PowerVsClient::new(
            self.client.clone(),
            self.auth.clone(),
            &url,
            &instance,
            region.to_string(),
        ));
        clients.insert(service_instance_id.to_string(), client.clone());
        Ok(client)
    }
}
