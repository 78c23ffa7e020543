//! Power Virtual Server API models
//!
//! See: https://cloud.ibm.com/apidocs/power-cloud

use serde::{Deserialize, Serialize};

/// Instance health as reported by PowerVS
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PvmInstanceHealth {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Fault details for an instance in ERROR state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PvmInstanceFault {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
}

/// Network attachment of an instance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PvmInstanceNetwork {
    #[serde(rename = "networkID", default)]
    pub network_id: String,
    #[serde(default)]
    pub network_name: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(rename = "externalIP", default)]
    pub external_ip: Option<String>,
}

/// PowerVS virtual machine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PvmInstance {
    #[serde(rename = "pvmInstanceID")]
    pub pvm_instance_id: String,
    pub server_name: String,
    /// ACTIVE, BUILD, SHUTOFF, ERROR, ...
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub health: Option<PvmInstanceHealth>,
    #[serde(default)]
    pub fault: Option<PvmInstanceFault>,
    #[serde(default)]
    pub networks: Vec<PvmInstanceNetwork>,
    #[serde(default)]
    pub processors: f64,
    #[serde(default)]
    pub memory: f64,
    #[serde(default)]
    pub proc_type: Option<String>,
    #[serde(default)]
    pub sys_type: Option<String>,
}

/// Instance summary from list calls
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PvmInstanceReference {
    #[serde(rename = "pvmInstanceID")]
    pub pvm_instance_id: String,
    pub server_name: String,
    #[serde(default)]
    pub status: String,
}

/// Network to attach at instance creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PvmInstanceAddNetwork {
    #[serde(rename = "networkID")]
    pub network_id: String,
}

/// Request body for creating an instance
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PvmInstanceCreate {
    pub server_name: String,
    #[serde(rename = "imageID")]
    pub image_id: String,
    /// dedicated, shared or capped
    pub proc_type: String,
    pub processors: f64,
    pub memory: f64,
    pub sys_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_pair_name: Option<String>,
    pub networks: Vec<PvmInstanceAddNetwork>,
    /// Base64 encoded cloud-init data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_data: Option<String>,
}

/// Boot image
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    #[serde(rename = "imageID")]
    pub image_id: String,
    pub name: String,
    /// active, queued, saving, failed, ...
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub storage_type: Option<String>,
}

/// Image summary from list calls
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageReference {
    #[serde(rename = "imageID")]
    pub image_id: String,
    pub name: String,
    #[serde(default)]
    pub state: Option<String>,
}

/// Request body for importing an image from Cloud Object Storage
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCosImageImportJob {
    pub image_name: String,
    pub bucket_name: String,
    pub image_filename: String,
    pub region: String,
    /// "public" buckets need no HMAC keys
    pub bucket_access: String,
    pub storage_type: String,
    pub os_type: String,
}

/// Reference to an asynchronous job
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobReference {
    pub id: String,
}

/// Job progress
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatus {
    /// queued, running, completed, failed
    pub state: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// Asynchronous job (e.g. image import)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
}

/// Network summary from list calls
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkReference {
    #[serde(rename = "networkID")]
    pub network_id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub type_: Option<String>,
}

/// Network
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    #[serde(rename = "networkID")]
    pub network_id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub type_: Option<String>,
    #[serde(default)]
    pub cidr: Option<String>,
}
