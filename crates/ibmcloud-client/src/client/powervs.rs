//! Power Virtual Server API client
//!
//! All calls are scoped to one workspace: the URL carries the workspace GUID
//! and the `CRN` header carries its CRN.

use crate::auth::IamAuthenticator;
use crate::common::HttpClient;
use crate::client_trait::PowerVsClientTrait;
use crate::error::IbmCloudError;
use crate::models::*;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PvmInstanceList {
    #[serde(default)]
    pvm_instances: Vec<PvmInstanceReference>,
}

#[derive(Deserialize)]
struct ImageList {
    #[serde(default)]
    images: Vec<ImageReference>,
}

#[derive(Deserialize)]
struct NetworkList {
    #[serde(default)]
    networks: Vec<NetworkReference>,
}

/// PowerVS API client bound to one workspace
pub struct PowerVsClient {
    http: HttpClient,
    service_instance_id: String,
    zone: String,
    region: String,
}

impl PowerVsClient {
    /// Create a new PowerVS client
    ///
    /// # Arguments
    /// * `client` - Shared HTTP client
    /// * `auth` - IAM authenticator
    /// * `base_url` - Regional API URL (e.g. "https://us-south.power-iaas.cloud.ibm.com")
    /// * `instance` - Workspace as returned by the Resource Controller
    /// * `region` - Region serving the workspace zone
    pub fn new(
        client: Client,
        auth: Arc<IamAuthenticator>,
        base_url: &str,
        instance: &ResourceInstance,
        region: String,
    ) -> Self {
        let url = format!(
            "{}/pcloud/v1/cloud-instances/{}",
            base_url.trim_end_matches('/'),
            instance.guid
        );
        let http = HttpClient::new(client, url, auth).with_header("CRN", &instance.crn);
        Self {
            http,
            service_instance_id: instance.guid.clone(),
            zone: instance.region_id.clone(),
            region,
        }
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        self.http.base_url()
    }
}

#[async_trait::async_trait]
impl PowerVsClientTrait for PowerVsClient {
    fn service_instance_id(&self) -> &str {
        &self.service_instance_id
    }

    fn zone(&self) -> &str {
        &self.zone
    }

    fn region(&self) -> &str {
        &self.region
    }

    async fn list_instances(&self) -> Result<Vec<PvmInstanceReference>, IbmCloudError> {
        let list: PvmInstanceList = self.http.get("/pvm-instances").await?;
        Ok(list.pvm_instances)
    }

    async fn get_instance(&self, id: &str) -> Result<PvmInstance, IbmCloudError> {
        self.http.get(&format!("/pvm-instances/{}", id)).await
    }

    async fn create_instance(&self, request: &PvmInstanceCreate) -> Result<PvmInstance, IbmCloudError> {
        debug!("Creating PowerVS instance {}", request.server_name);
        // The API answers with one entry per created replica
        let created: Vec<PvmInstance> = self
            .http
            .post("/pvm-instances", &serde_json::to_value(request)?)
            .await?;
        created.into_iter().next().ok_or_else(|| IbmCloudError::Api {
            status: 200,
            message: format!("create of instance {} returned no instances", request.server_name),
        })
    }

    async fn delete_instance(&self, id: &str) -> Result<(), IbmCloudError> {
        self.http.delete(&format!("/pvm-instances/{}", id)).await
    }

    async fn list_images(&self) -> Result<Vec<ImageReference>, IbmCloudError> {
        let list: ImageList = self.http.get("/images").await?;
        Ok(list.images)
    }

    async fn get_image(&self, id: &str) -> Result<Image, IbmCloudError> {
        self.http.get(&format!("/images/{}", id)).await
    }

    async fn delete_image(&self, id: &str) -> Result<(), IbmCloudError> {
        self.http.delete(&format!("/images/{}", id)).await
    }

    async fn create_cos_image_import(&self, request: &CreateCosImageImportJob) -> Result<JobReference, IbmCloudError> {
        debug!(
            "Importing image {} from cos://{}/{}",
            request.image_name, request.bucket_name, request.image_filename
        );
        self.http.post("/cos-images", &serde_json::to_value(request)?).await
    }

    async fn get_job(&self, id: &str) -> Result<Job, IbmCloudError> {
        self.http.get(&format!("/jobs/{}", id)).await
    }

    async fn list_networks(&self) -> Result<Vec<NetworkReference>, IbmCloudError> {
        let list: NetworkList = self.http.get("/networks").await?;
        Ok(list.networks)
    }

    async fn get_network(&self, id: &str) -> Result<Network, IbmCloudError> {
        self.http.get(&format!("/networks/{}", id)).await
    }
}
