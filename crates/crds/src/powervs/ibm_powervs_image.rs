//! IBMPowerVSImage Custom Resource Definition
//!
//! Imports a boot image from an IBM Cloud Object Storage bucket into a
//! PowerVS workspace so machines can reference it through `imageRef`.

use crate::conditions::Condition;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// IBMPowerVSImageSpec defines the desired state of an imported image
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[kube(
    group = "infrastructure.cluster.x-k8s.io",
    version = "v1beta1",
    kind = "IBMPowerVSImage",
    namespaced,
    status = "IBMPowerVSImageStatus",
    shortname = "ibmpowervsimg",
    printcolumn = r#"{"name":"Ready","type":"boolean","jsonPath":".status.ready"}"#,
    printcolumn = r#"{"name":"State","type":"string","jsonPath":".status.imageState"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct IBMPowerVSImageSpec {
    /// Name of the CAPI cluster the image belongs to
    pub cluster_name: String,

    /// PowerVS service instance (workspace) GUID
    #[serde(rename = "serviceInstanceID")]
    pub service_instance_id: String,

    /// COS bucket holding the image
    pub bucket: String,

    /// Object (file) name in the bucket, e.g. "rhcos-416.ova.gz"
    pub object: String,

    /// COS bucket region
    pub region: String,

    /// Storage tier of the imported image
    #[serde(default = "default_storage_type")]
    pub storage_type: String,

    /// Operating system of the image
    #[serde(default = "default_os_type")]
    pub os_type: String,

    /// What to do with the cloud image when this object is deleted
    #[serde(default)]
    pub delete_policy: DeletePolicy,
}

fn default_storage_type() -> String {
    "tier1".to_string()
}

fn default_os_type() -> String {
    "rhel".to_string()
}

/// Fate of the cloud image on deletion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeletePolicy {
    /// Delete the image from the workspace
    #[default]
    Delete,
    /// Leave the image in the workspace
    Retain,
}

/// IBMPowerVSImageStatus defines the observed state of an imported image
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IBMPowerVSImageStatus {
    /// Image is active and usable
    #[serde(default)]
    pub ready: bool,

    /// Image ID in the workspace
    #[serde(default, rename = "imageID", skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,

    /// Image state ("queued", "saving", "active", "failed")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_state: Option<String>,

    /// ID of the last COS import job
    #[serde(default, rename = "jobID", skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,

    /// Conditions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_spec_defaults() {
        let spec: IBMPowerVSImageSpec = serde_json::from_value(serde_json::json!({
            "clusterName": "capi",
            "serviceInstanceID": "svc",
            "bucket": "images",
            "object": "rhcos.ova.gz",
            "region": "us-south"
        }))
        .unwrap();
        assert_eq!(spec.storage_type, "tier1");
        assert_eq!(spec.os_type, "rhel");
        assert_eq!(spec.delete_policy, DeletePolicy::Delete);
    }

    #[test]
    fn test_delete_policy_lowercase() {
        let policy: DeletePolicy = serde_json::from_value(serde_json::json!("retain")).unwrap();
        assert_eq!(policy, DeletePolicy::Retain);
    }
}
