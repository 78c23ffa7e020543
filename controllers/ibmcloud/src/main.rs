//! IBM Cloud infrastructure controller
//!
//! Cluster API infrastructure provider for IBM Cloud:
//! - IBMVPCCluster / IBMVPCMachine: VPC networking, control plane endpoint and instances
//! - IBMPowerVSCluster / IBMPowerVSMachine: Power Virtual Server networks and instances
//! - IBMPowerVSImage: boot images imported from Cloud Object Storage

mod backoff;
mod config;
mod controller;
mod error;
mod metrics;
mod reconcile_helpers;
mod reconciler;
mod scope;
mod watcher;

#[cfg(test)]
mod reconcile_helpers_test;
#[cfg(test)]
mod test_utils;

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use controller::Controller;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // kube and reqwest both pull in rustls; pick the provider explicitly
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        warn!("A rustls crypto provider was already installed");
    }

    info!("Starting IBM Cloud infrastructure controller");

    let config = ControllerConfig::from_env()?;

    info!("Configuration:");
    info!("  IAM endpoint: {}", config.iam_url);
    info!("  Namespace: {}", config.namespace.as_deref().unwrap_or("all namespaces"));
    info!("  Metrics address: {}", config.metrics_bind_addr);
    info!("  Reconcile concurrency: {}", config.reconcile_concurrency);
    info!("  Sync period: {:?}", config.sync_period);

    // Initialize and run controller
    let controller = Controller::new(config).await?;
    controller.run().await?;

    Ok(())
}
