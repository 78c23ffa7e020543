//! Service endpoint resolution
//!
//! Derives the public VPC, PowerVS and Resource Controller URLs for a region
//! and applies per-region overrides (private endpoints, test environments).
//!
//! Override syntax: `region1:vpc=url,powervs=url,rc=url;region2:vpc=url`

use crate::error::IbmCloudError;
use std::collections::HashMap;

/// Default IAM endpoint
pub const DEFAULT_IAM_URL: &str = "https://iam.cloud.ibm.com";

/// Default Resource Controller endpoint
pub const DEFAULT_RESOURCE_CONTROLLER_URL: &str = "https://resource-controller.cloud.ibm.com";

/// Overridden URLs for one region
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionEndpoints {
    pub vpc: Option<String>,
    pub powervs: Option<String>,
    pub rc: Option<String>,
}

/// Per-region service endpoint overrides
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceEndpoints {
    regions: HashMap<String, RegionEndpoints>,
}

impl ServiceEndpoints {
    /// Parse an override string
    ///
    /// An empty string yields no overrides. Unknown service keys and entries
    /// without a region are rejected.
    pub fn parse(value: &str) -> Result<Self, IbmCloudError> {
        let mut regions: HashMap<String, RegionEndpoints> = HashMap::new();

        for entry in value.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            let (region, services) = entry.split_once(':').ok_or_else(|| {
                IbmCloudError::InvalidRequest(format!(
                    "service endpoint entry '{}' must be of the form region:service=url",
                    entry
                ))
            })?;
            let region = region.trim();
            if region.is_empty() {
                return Err(IbmCloudError::InvalidRequest(format!(
                    "service endpoint entry '{}' has an empty region",
                    entry
                )));
            }

            let endpoints = regions.entry(region.to_string()).or_default();
            for service in services.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                let (key, url) = service.split_once('=').ok_or_else(|| {
                    IbmCloudError::InvalidRequest(format!(
                        "service endpoint '{}' must be of the form service=url",
                        service
                    ))
                })?;
                let url = url.trim().trim_end_matches('/').to_string();
                if url.is_empty() {
                    return Err(IbmCloudError::InvalidRequest(format!(
                        "service endpoint '{}' has an empty URL",
                        service
                    )));
                }
                match key.trim() {
                    "vpc" => endpoints.vpc = Some(url),
                    "powervs" => endpoints.powervs = Some(url),
                    "rc" => endpoints.rc = Some(url),
                    other => {
                        return Err(IbmCloudError::InvalidRequest(format!(
                            "unknown service '{}' in service endpoint override (expected vpc, powervs or rc)",
                            other
                        )))
                    }
                }
            }
        }

        Ok(Self { regions })
    }

    /// Overrides configured for a region, if any
    pub fn region(&self, region: &str) -> Option<&RegionEndpoints> {
        self.regions.get(region)
    }

    /// VPC API base URL for a region
    pub fn vpc_url(&self, region: &str) -> String {
        self.region(region)
            .and_then(|r| r.vpc.clone())
            .unwrap_or_else(|| format!("https://{}.iaas.cloud.ibm.com/v1", region))
    }

    /// PowerVS API base URL for a region
    pub fn powervs_url(&self, region: &str) -> String {
        self.region(region)
            .and_then(|r| r.powervs.clone())
            .unwrap_or_else(|| format!("https://{}.power-iaas.cloud.ibm.com", region))
    }

    /// Resource Controller base URL
    ///
    /// The Resource Controller is global, so the first `rc` override found
    /// (in region name order) wins.
    pub fn resource_controller_url(&self) -> String {
        let mut regions: Vec<&String> = self.regions.keys().collect();
        regions.sort();
        regions
            .into_iter()
            .find_map(|r| self.regions.get(r).and_then(|e| e.rc.clone()))
            .unwrap_or_else(|| DEFAULT_RESOURCE_CONTROLLER_URL.to_string())
    }
}

/// Map a PowerVS zone to the region that serves its API
pub fn region_for_zone(zone: &str) -> Result<&'static str, IbmCloudError> {
    let region = match zone {
        "dal10" | "dal12" => "us-south",
        "us-east" | "wdc06" | "wdc07" => "us-east",
        "lon04" | "lon06" => "lon",
        "eu-de-1" | "eu-de-2" => "eu-de",
        "tor01" => "tor",
        "mon01" => "mon",
        "osa21" => "osa",
        "tok04" => "tok",
        "syd04" | "syd05" => "syd",
        "sao01" => "sao",
        "mad02" | "mad04" => "mad",
        other => return Err(IbmCloudError::UnknownZone(other.to_string())),
    };
    Ok(region)
}
