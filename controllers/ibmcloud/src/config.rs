//! Controller configuration
//!
//! Read once from environment variables at startup.

use crate::error::ControllerError;
use ibmcloud_client::endpoints::DEFAULT_IAM_URL;
use ibmcloud_client::ServiceEndpoints;
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

const DEFAULT_METRICS_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_RECONCILE_CONCURRENCY: u16 = 3;
const DEFAULT_SYNC_PERIOD_SECONDS: u64 = 600;

/// Runtime configuration of the controller
#[derive(Clone)]
pub struct ControllerConfig {
    /// IBM Cloud API key
    pub api_key: String,
    /// IAM endpoint used for the token exchange
    pub iam_url: String,
    /// Per-region service endpoint overrides
    pub service_endpoints: ServiceEndpoints,
    /// Namespace to watch, all namespaces when `None`
    pub namespace: Option<String>,
    /// Address of the metrics and probe server
    pub metrics_bind_addr: SocketAddr,
    /// Concurrent reconciliations per kind
    pub reconcile_concurrency: u16,
    /// Requeue interval for objects that are fully reconciled
    pub sync_period: Duration,
}

impl fmt::Debug for ControllerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerConfig")
            .field("api_key", &"<redacted>")
            .field("iam_url", &self.iam_url)
            .field("service_endpoints", &self.service_endpoints)
            .field("namespace", &self.namespace)
            .field("metrics_bind_addr", &self.metrics_bind_addr)
            .field("reconcile_concurrency", &self.reconcile_concurrency)
            .field("sync_period", &self.sync_period)
            .finish()
    }
}

impl ControllerConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ControllerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_key = get("IBMCLOUD_API_KEY").ok_or_else(|| {
            ControllerError::InvalidConfig("IBMCLOUD_API_KEY environment variable is required".to_string())
        })?;

        let iam_url = get("IBMCLOUD_IAM_ENDPOINT")
            .unwrap_or_else(|| DEFAULT_IAM_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let service_endpoints = match get("IBMCLOUD_SERVICE_ENDPOINTS") {
            Some(raw) => ServiceEndpoints::parse(&raw).map_err(|e| {
                ControllerError::InvalidConfig(format!("IBMCLOUD_SERVICE_ENDPOINTS: {}", e))
            })?,
            None => ServiceEndpoints::default(),
        };

        let metrics_bind_addr = get("METRICS_BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_METRICS_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ControllerError::InvalidConfig(format!("METRICS_BIND_ADDR: {}", e)))?;

        let reconcile_concurrency = match get("RECONCILE_CONCURRENCY") {
            Some(raw) => match raw.parse::<u16>() {
                Ok(0) | Err(_) => {
                    return Err(ControllerError::InvalidConfig(format!(
                        "RECONCILE_CONCURRENCY must be a positive integer, got {:?}",
                        raw
                    )));
                }
                Ok(n) => n,
            },
            None => DEFAULT_RECONCILE_CONCURRENCY,
        };

        let sync_period_seconds = match get("SYNC_PERIOD_SECONDS") {
            Some(raw) => raw.parse::<u64>().map_err(|_| {
                ControllerError::InvalidConfig(format!("SYNC_PERIOD_SECONDS must be a number of seconds, got {:?}", raw))
            })?,
            None => DEFAULT_SYNC_PERIOD_SECONDS,
        };

        Ok(Self {
            api_key,
            iam_url,
            service_endpoints,
            namespace: get("WATCH_NAMESPACE"),
            metrics_bind_addr,
            reconcile_concurrency,
            sync_period: Duration::from_secs(sync_period_seconds),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ControllerConfig::from_lookup(lookup(&[("IBMCLOUD_API_KEY", "key")])).unwrap();
        assert_eq!(config.api_key, "key");
        assert_eq!(config.iam_url, "https://iam.cloud.ibm.com");
        assert_eq!(config.service_endpoints, ServiceEndpoints::default());
        assert_eq!(config.namespace, None);
        assert_eq!(config.metrics_bind_addr.to_string(), "0.0.0.0:8080");
        assert_eq!(config.reconcile_concurrency, 3);
        assert_eq!(config.sync_period, Duration::from_secs(600));
    }

    #[test]
    fn test_api_key_required() {
        let err = ControllerConfig::from_lookup(lookup(&[("IBMCLOUD_API_KEY", "  ")])).unwrap_err();
        assert!(matches!(err, ControllerError::InvalidConfig(_)));
    }

    #[test]
    fn test_overrides() {
        let config = ControllerConfig::from_lookup(lookup(&[
            ("IBMCLOUD_API_KEY", "key"),
            ("IBMCLOUD_IAM_ENDPOINT", "https://private.iam.cloud.ibm.com/"),
            ("IBMCLOUD_SERVICE_ENDPOINTS", "us-south:vpc=https://us-south.private.iaas.cloud.ibm.com/v1"),
            ("WATCH_NAMESPACE", "capi-system"),
            ("METRICS_BIND_ADDR", "127.0.0.1:9090"),
            ("RECONCILE_CONCURRENCY", "8"),
            ("SYNC_PERIOD_SECONDS", "30"),
        ]))
        .unwrap();

        assert_eq!(config.iam_url, "https://private.iam.cloud.ibm.com");
        assert_eq!(
            config.service_endpoints.vpc_url("us-south"),
            "https://us-south.private.iaas.cloud.ibm.com/v1"
        );
        assert_eq!(config.namespace.as_deref(), Some("capi-system"));
        assert_eq!(config.metrics_bind_addr.port(), 9090);
        assert_eq!(config.reconcile_concurrency, 8);
        assert_eq!(config.sync_period, Duration::from_secs(30));
    }

    #[test]
    fn test_rejects_bad_values() {
        for (key, value) in [
            ("IBMCLOUD_SERVICE_ENDPOINTS", "us-south:cos=https://example.com"),
            ("METRICS_BIND_ADDR", "not-an-address"),
            ("RECONCILE_CONCURRENCY", "0"),
            ("SYNC_PERIOD_SECONDS", "ten"),
        ] {
            let result = ControllerConfig::from_lookup(lookup(&[("IBMCLOUD_API_KEY", "key"), (key, value)]));
            assert!(
                matches!(result, Err(ControllerError::InvalidConfig(_))),
                "{}={} should be rejected",
                key,
                value
            );
        }
    }

    #[test]
    fn test_debug_hides_api_key() {
        let config = ControllerConfig::from_lookup(lookup(&[("IBMCLOUD_API_KEY", "super-secret")])).unwrap();
        assert!(!format!("{:?}", config).contains("super-secret"));
    }
}
