//! Resource references used across the IBM Cloud CRDs
//!
//! IBM Cloud resources are addressed either by their immutable ID or by their
//! (account-unique) name. References to other Kubernetes objects follow the
//! `TypedLocalObjectReference` shape.

use crate::validation::SpecError;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Reference to an IBM Cloud resource by ID or by name
///
/// When both are set the ID wins; the name is then only informational.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct IBMCloudResourceReference {
    /// Unique identifier of the resource
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Name of the resource
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl IBMCloudResourceReference {
    /// Reference a resource by ID
    pub fn by_id(id: impl Into<String>) -> Self {
        Self { id: Some(id.into()), name: None }
    }

    /// Reference a resource by name
    pub fn by_name(name: impl Into<String>) -> Self {
        Self { id: None, name: Some(name.into()) }
    }

    /// Ensure the reference can be resolved
    pub fn validate(&self, field: &'static str) -> Result<(), SpecError> {
        let empty = |v: &Option<String>| v.as_deref().is_none_or(str::is_empty);
        if empty(&self.id) && empty(&self.name) {
            return Err(SpecError::EmptyReference(field));
        }
        Ok(())
    }
}

/// Kubernetes-style reference to another object in this API group
///
/// Follows the `TypedLocalObjectReference` pattern: `apiGroup`, `kind`, `name`
/// and an optional namespace defaulting to the referencing object's namespace.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectReference {
    /// API group of the referenced resource
    #[serde(default = "default_api_group")]
    pub api_group: String,

    /// Kind of the referenced resource (e.g. "IBMPowerVSImage")
    pub kind: String,

    /// Name of the referenced resource
    pub name: String,

    /// Namespace of the referenced resource (defaults to the referencing resource's namespace)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

fn default_api_group() -> String {
    crate::INFRASTRUCTURE_GROUP.to_string()
}

impl ObjectReference {
    /// Reference an object of `kind` in the infrastructure API group, same namespace
    pub fn infrastructure(kind: &str, name: impl Into<String>) -> Self {
        Self {
            api_group: default_api_group(),
            kind: kind.to_string(),
            name: name.into(),
            namespace: None,
        }
    }

    /// Namespace to look the object up in, given the referencing object's namespace
    pub fn namespace_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.namespace.as_deref().unwrap_or(fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_requires_id_or_name() {
        let empty = IBMCloudResourceReference::default();
        assert_eq!(empty.validate("spec.network"), Err(SpecError::EmptyReference("spec.network")));

        let blank = IBMCloudResourceReference { id: Some(String::new()), name: None };
        assert!(blank.validate("spec.network").is_err());

        assert!(IBMCloudResourceReference::by_id("abc").validate("spec.network").is_ok());
        assert!(IBMCloudResourceReference::by_name("net").validate("spec.network").is_ok());
    }

    #[test]
    fn test_object_reference_defaults_api_group() {
        let reference: ObjectReference = serde_json::from_value(serde_json::json!({
            "kind": "IBMPowerVSImage",
            "name": "rhcos"
        }))
        .unwrap();
        assert_eq!(reference.api_group, "infrastructure.cluster.x-k8s.io");
        assert_eq!(reference.namespace_or("capi"), "capi");
    }
}
