//! Mock IBM Cloud clients for unit testing
//!
//! In-memory implementations of `VpcClientTrait`, `PowerVsClientTrait` and
//! `ClientProvider` that can be used without an IBM Cloud account.
//!
//! The mock is organized into service modules:
//! - `vpc.rs` - VPCs, subnets, gateways, floating IPs, instances, load balancers
//! - `powervs.rs` - PowerVS instances, images, import jobs, networks
//!
//! Every delete is recorded as `"<kind>:<id>"` so tests can assert teardown
//! order, and individual operations can be forced to fail.

mod powervs;
mod vpc;

pub use powervs::MockPowerVsClient;
pub use vpc::MockVpcClient;

use crate::client_trait::{PowerVsClientTrait, VpcClientTrait};
use crate::error::IbmCloudError;
use crate::provider::ClientProvider;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Shared bookkeeping for the mocks
#[derive(Clone, Default)]
pub(crate) struct MockState {
    next_id: Arc<Mutex<u64>>,
    deleted: Arc<Mutex<Vec<String>>>,
    failing: Arc<Mutex<HashSet<String>>>,
}

impl MockState {
    pub(crate) fn next_id(&self, prefix: &str) -> String {
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        format!("{}-{:04}", prefix, *next)
    }

    pub(crate) fn record_delete(&self, kind: &str, id: &str) {
        self.deleted.lock().unwrap().push(format!("{}:{}", kind, id));
    }

    pub(crate) fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub(crate) fn fail_on(&self, operation: &str) {
        self.failing.lock().unwrap().insert(operation.to_string());
    }

    /// Error out if `operation` was configured to fail
    pub(crate) fn check(&self, operation: &str) -> Result<(), IbmCloudError> {
        if self.failing.lock().unwrap().contains(operation) {
            return Err(IbmCloudError::Api {
                status: 500,
                message: format!("{} failed (injected)", operation),
            });
        }
        Ok(())
    }
}

pub(crate) fn not_found(kind: &str, id: &str) -> IbmCloudError {
    IbmCloudError::NotFound(format!("{} {} not found", kind, id))
}

/// Mock provider returning the same mock clients for every region
#[derive(Clone)]
pub struct MockClientProvider {
    pub vpc: MockVpcClient,
    pub power_vs: MockPowerVsClient,
}

impl MockClientProvider {
    pub fn new(vpc: MockVpcClient, power_vs: MockPowerVsClient) -> Self {
        Self { vpc, power_vs }
    }
}

impl Default for MockClientProvider {
    fn default() -> Self {
        Self::new(
            MockVpcClient::new("us-south"),
            MockPowerVsClient::new("d7c5e2f1-powervs-workspace", "dal12", "us-south"),
        )
    }
}

#[async_trait::async_trait]
impl ClientProvider for MockClientProvider {
    async fn vpc(&self, _region: &str) -> Result<Arc<dyn VpcClientTrait>, IbmCloudError> {
        Ok(Arc::new(self.vpc.clone()))
    }

    async fn power_vs(&self, service_instance_id: &str) -> Result<Arc<dyn PowerVsClientTrait>, IbmCloudError> {
        if service_instance_id != self.power_vs.service_instance_id() {
            return Err(not_found("resource instance", service_instance_id));
        }
        Ok(Arc::new(self.power_vs.clone()))
    }
}
