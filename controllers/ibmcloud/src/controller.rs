//! Main controller implementation.
//!
//! This module contains the `Controller` struct that wires the IBM Cloud
//! client provider, the reconciler and one watcher per infrastructure kind,
//! and serves metrics and probes next to them.

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::metrics::{self, Metrics};
use crate::reconciler::Reconciler;
use crate::watcher::Watcher;
use ibmcloud_client::IbmCloudClientProvider;
use kube::Client;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Main controller for IBM Cloud infrastructure.
pub struct Controller {
    vpc_cluster_watcher: JoinHandle<Result<(), ControllerError>>,
    vpc_machine_watcher: JoinHandle<Result<(), ControllerError>>,
    powervs_cluster_watcher: JoinHandle<Result<(), ControllerError>>,
    powervs_machine_watcher: JoinHandle<Result<(), ControllerError>>,
    powervs_image_watcher: JoinHandle<Result<(), ControllerError>>,
    metrics_server: JoinHandle<Result<(), ControllerError>>,
}

impl Controller {
    /// Creates a new controller instance and starts its watchers.
    pub async fn new(config: ControllerConfig) -> Result<Self, ControllerError> {
        info!("Initializing IBM Cloud infrastructure controller");

        let kube_client = Client::try_default().await.map_err(ControllerError::Kube)?;

        let provider = IbmCloudClientProvider::new(
            config.api_key.clone(),
            config.iam_url.clone(),
            config.service_endpoints.clone(),
        )?;

        // Validate the API key before any watcher starts
        info!("Validating IBM Cloud API key against {}...", config.iam_url);
        provider.validate().await.map_err(|e| {
            error!("Failed to validate IBM Cloud credentials: {}", e);
            error!("Please ensure:");
            error!("  1. IBMCLOUD_API_KEY is set to a valid API key");
            error!("  2. IAM is reachable at {}", config.iam_url);
            ControllerError::IbmCloud(e)
        })?;
        info!("IBM Cloud credentials validated");

        let metrics = Arc::new(Metrics::new()?);
        let reconciler = Arc::new(Reconciler::new(
            Box::new(provider),
            kube_client.clone(),
            Arc::clone(&metrics),
            config.sync_period,
        ));

        let watcher_instance = Arc::new(Watcher::new(
            reconciler,
            &kube_client,
            config.namespace.as_deref(),
            config.reconcile_concurrency,
        ));

        let vpc_cluster_watcher = {
            let watcher = Arc::clone(&watcher_instance);
            tokio::spawn(async move { watcher.watch_vpc_clusters().await })
        };

        let vpc_machine_watcher = {
            let watcher = Arc::clone(&watcher_instance);
            tokio::spawn(async move { watcher.watch_vpc_machines().await })
        };

        let powervs_cluster_watcher = {
            let watcher = Arc::clone(&watcher_instance);
            tokio::spawn(async move { watcher.watch_powervs_clusters().await })
        };

        let powervs_machine_watcher = {
            let watcher = Arc::clone(&watcher_instance);
            tokio::spawn(async move { watcher.watch_powervs_machines().await })
        };

        let powervs_image_watcher = {
            let watcher = Arc::clone(&watcher_instance);
            tokio::spawn(async move { watcher.watch_powervs_images().await })
        };

        let metrics_server = {
            let metrics = Arc::clone(&metrics);
            let addr = config.metrics_bind_addr;
            tokio::spawn(async move { metrics::serve(addr, metrics).await })
        };

        metrics.set_ready(true);
        info!("IBM Cloud infrastructure controller initialized");

        Ok(Self {
            vpc_cluster_watcher,
            vpc_machine_watcher,
            powervs_cluster_watcher,
            powervs_machine_watcher,
            powervs_image_watcher,
            metrics_server,
        })
    }

    /// Runs until any watcher or the metrics server exits.
    pub async fn run(mut self) -> Result<(), ControllerError> {
        info!("IBM Cloud infrastructure controller running");

        // Watchers run forever; returning from any of them is fatal
        tokio::select! {
            result = &mut self.vpc_cluster_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("IBMVPCCluster watcher panicked: {}", e)))?
                    .map_err(|e| ControllerError::Watch(format!("IBMVPCCluster watcher error: {}", e)))?;
            }
            result = &mut self.vpc_machine_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("IBMVPCMachine watcher panicked: {}", e)))?
                    .map_err(|e| ControllerError::Watch(format!("IBMVPCMachine watcher error: {}", e)))?;
            }
            result = &mut self.powervs_cluster_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("IBMPowerVSCluster watcher panicked: {}", e)))?
                    .map_err(|e| ControllerError::Watch(format!("IBMPowerVSCluster watcher error: {}", e)))?;
            }
            result = &mut self.powervs_machine_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("IBMPowerVSMachine watcher panicked: {}", e)))?
                    .map_err(|e| ControllerError::Watch(format!("IBMPowerVSMachine watcher error: {}", e)))?;
            }
            result = &mut self.powervs_image_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("IBMPowerVSImage watcher panicked: {}", e)))?
                    .map_err(|e| ControllerError::Watch(format!("IBMPowerVSImage watcher error: {}", e)))?;
            }
            result = &mut self.metrics_server => {
                result.map_err(|e| ControllerError::Watch(format!("metrics server panicked: {}", e)))??;
            }
        }

        Ok(())
    }
}
