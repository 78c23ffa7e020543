//! Resource Controller models
//!
//! See: https://cloud.ibm.com/apidocs/resource-controller/resource-controller

use serde::{Deserialize, Serialize};

/// Service instance (e.g. a PowerVS workspace)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceInstance {
    pub id: String,
    pub guid: String,
    pub crn: String,
    pub name: String,
    /// For PowerVS workspaces this is the zone (e.g. "dal12")
    pub region_id: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub resource_group_id: Option<String>,
}

impl ResourceInstance {
    pub fn is_active(&self) -> bool {
        self.state.as_deref() == Some("active")
    }
}
