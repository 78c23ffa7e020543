//! PowerVS operations for the mock client

use super::{not_found, MockState};
use crate::client_trait::PowerVsClientTrait;
use crate::error::IbmCloudError;
use crate::models::*;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Mock PowerVS client for one workspace
#[derive(Clone, Default)]
pub struct MockPowerVsClient {
    service_instance_id: String,
    zone: String,
    region: String,
    state: MockState,
    instances: Arc<Mutex<HashMap<String, PvmInstance>>>,
    instance_requests: Arc<Mutex<Vec<PvmInstanceCreate>>>,
    images: Arc<Mutex<HashMap<String, Image>>>,
    import_requests: Arc<Mutex<Vec<CreateCosImageImportJob>>>,
    jobs: Arc<Mutex<HashMap<String, Job>>>,
    networks: Arc<Mutex<HashMap<String, Network>>>,
}

impl MockPowerVsClient {
    /// Create a new mock client
    pub fn new(service_instance_id: impl Into<String>, zone: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            service_instance_id: service_instance_id.into(),
            zone: zone.into(),
            region: region.into(),
            ..Default::default()
        }
    }

    /// Deletions recorded so far, as `"<kind>:<id>"`
    pub fn deleted(&self) -> Vec<String> {
        self.state.deleted()
    }

    /// Make an operation (trait method name) return a 500 error
    pub fn fail_on(&self, operation: &str) {
        self.state.fail_on(operation);
    }

    pub fn add_instance(&self, instance: PvmInstance) {
        self.instances
            .lock()
            .unwrap()
            .insert(instance.pvm_instance_id.clone(), instance);
    }

    pub fn add_image(&self, image: Image) {
        self.images.lock().unwrap().insert(image.image_id.clone(), image);
    }

    pub fn add_job(&self, job: Job) {
        self.jobs.lock().unwrap().insert(job.id.clone(), job);
    }

    pub fn add_network(&self, network: Network) {
        self.networks.lock().unwrap().insert(network.network_id.clone(), network);
    }

    pub fn set_instance_status(&self, id: &str, status: &str) {
        if let Some(instance) = self.instances.lock().unwrap().get_mut(id) {
            instance.status = status.to_string();
        }
    }

    pub fn set_instance_fault(&self, id: &str, message: &str) {
        if let Some(instance) = self.instances.lock().unwrap().get_mut(id) {
            instance.fault = Some(PvmInstanceFault {
                code: Some(500),
                message: Some(message.to_string()),
                details: None,
            });
        }
    }

    pub fn set_image_state(&self, id: &str, state: &str) {
        if let Some(image) = self.images.lock().unwrap().get_mut(id) {
            image.state = Some(state.to_string());
        }
    }

    /// Move a job to a new state (queued, running, completed, failed)
    pub fn set_job_state(&self, id: &str, state: &str) {
        if let Some(job) = self.jobs.lock().unwrap().get_mut(id) {
            job.status.state = state.to_string();
        }
    }

    pub fn instances(&self) -> Vec<PvmInstance> {
        self.instances.lock().unwrap().values().cloned().collect()
    }

    pub fn instance_requests(&self) -> Vec<PvmInstanceCreate> {
        self.instance_requests.lock().unwrap().clone()
    }

    pub fn images(&self) -> Vec<Image> {
        self.images.lock().unwrap().values().cloned().collect()
    }

    pub fn import_requests(&self) -> Vec<CreateCosImageImportJob> {
        self.import_requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl PowerVsClientTrait for MockPowerVsClient {
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
        self.state.check("list_instances")?;
        let mut instances: Vec<PvmInstanceReference> = self
            .instances()
            .into_iter()
            .map(|i| PvmInstanceReference {
                pvm_instance_id: i.pvm_instance_id,
                server_name: i.server_name,
                status: i.status,
            })
            .collect();
        instances.sort_by(|a, b| a.server_name.cmp(&b.server_name));
        Ok(instances)
    }

    async fn get_instance(&self, id: &str) -> Result<PvmInstance, IbmCloudError> {
        self.state.check("get_instance")?;
        self.instances
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| not_found("pvm instance", id))
    }

    async fn create_instance(&self, request: &PvmInstanceCreate) -> Result<PvmInstance, IbmCloudError> {
        self.state.check("create_instance")?;
        let count = self.instances.lock().unwrap().len();
        let networks = request
            .networks
            .iter()
            .map(|n| PvmInstanceNetwork {
                network_id: n.network_id.clone(),
                network_name: self.networks.lock().unwrap().get(&n.network_id).map(|net| net.name.clone()),
                ip_address: Some(format!("192.168.0.{}", count + 10)),
                external_ip: None,
            })
            .collect();
        let instance = PvmInstance {
            pvm_instance_id: self.state.next_id("pvm"),
            server_name: request.server_name.clone(),
            status: "BUILD".to_string(),
            health: Some(PvmInstanceHealth { status: "PENDING".to_string(), reason: None }),
            fault: None,
            networks,
            processors: request.processors,
            memory: request.memory,
            proc_type: Some(request.proc_type.clone()),
            sys_type: Some(request.sys_type.clone()),
        };
        self.instance_requests.lock().unwrap().push(request.clone());
        self.add_instance(instance.clone());
        Ok(instance)
    }

    async fn delete_instance(&self, id: &str) -> Result<(), IbmCloudError> {
        self.state.check("delete_instance")?;
        self.instances
            .lock()
            .unwrap()
            .remove(id)
            .ok_or_else(|| not_found("pvm instance", id))?;
        self.state.record_delete("pvm_instance", id);
        Ok(())
    }

    async fn list_images(&self) -> Result<Vec<ImageReference>, IbmCloudError> {
        self.state.check("list_images")?;
        let mut images: Vec<ImageReference> = self
            .images()
            .into_iter()
            .map(|i| ImageReference { image_id: i.image_id, name: i.name, state: i.state })
            .collect();
        images.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(images)
    }

    async fn get_image(&self, id: &str) -> Result<Image, IbmCloudError> {
        self.state.check("get_image")?;
        self.images.lock().unwrap().get(id).cloned().ok_or_else(|| not_found("image", id))
    }

    async fn delete_image(&self, id: &str) -> Result<(), IbmCloudError> {
        self.state.check("delete_image")?;
        self.images.lock().unwrap().remove(id).ok_or_else(|| not_found("image", id))?;
        self.state.record_delete("image", id);
        Ok(())
    }

    async fn create_cos_image_import(&self, request: &CreateCosImageImportJob) -> Result<JobReference, IbmCloudError> {
        self.state.check("create_cos_image_import")?;
        let job = Job {
            id: self.state.next_id("job"),
            status: JobStatus { state: "queued".to_string(), message: None },
        };
        self.import_requests.lock().unwrap().push(request.clone());
        self.add_job(job.clone());
        Ok(JobReference { id: job.id })
    }

    async fn get_job(&self, id: &str) -> Result<Job, IbmCloudError> {
        self.state.check("get_job")?;
        self.jobs.lock().unwrap().get(id).cloned().ok_or_else(|| not_found("job", id))
    }

    async fn list_networks(&self) -> Result<Vec<NetworkReference>, IbmCloudError> {
        self.state.check("list_networks")?;
        let mut networks: Vec<NetworkReference> = self
            .networks
            .lock()
            .unwrap()
            .values()
            .map(|n| NetworkReference { network_id: n.network_id.clone(), name: n.name.clone(), type_: n.type_.clone() })
            .collect();
        networks.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(networks)
    }

    async fn get_network(&self, id: &str) -> Result<Network, IbmCloudError> {
        self.state.check("get_network")?;
        self.networks.lock().unwrap().get(id).cloned().ok_or_else(|| not_found("network", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_instance_starts_in_build() {
        let client = MockPowerVsClient::new("ws", "dal12", "us-south");
        client.add_network(Network { network_id: "net-1".to_string(), name: "capi-net".to_string(), ..Default::default() });

        let instance = client
            .create_instance(&PvmInstanceCreate {
                server_name: "m-0".to_string(),
                image_id: "img".to_string(),
                proc_type: "shared".to_string(),
                processors: 0.25,
                memory: 4.0,
                sys_type: "s922".to_string(),
                key_pair_name: Some("key".to_string()),
                networks: vec![PvmInstanceAddNetwork { network_id: "net-1".to_string() }],
                user_data: None,
            })
            .await
            .unwrap();

        assert_eq!(instance.status, "BUILD");
        assert_eq!(instance.networks[0].network_name.as_deref(), Some("capi-net"));
        assert_eq!(client.list_instances().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_import_job_lifecycle() {
        let client = MockPowerVsClient::new("ws", "dal12", "us-south");
        let job = client
            .create_cos_image_import(&CreateCosImageImportJob {
                image_name: "rhcos".to_string(),
                bucket_name: "images".to_string(),
                image_filename: "rhcos.ova.gz".to_string(),
                region: "us-south".to_string(),
                bucket_access: "public".to_string(),
                storage_type: "tier1".to_string(),
                os_type: "rhel".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(client.get_job(&job.id).await.unwrap().status.state, "queued");
        client.set_job_state(&job.id, "running");
        assert_eq!(client.get_job(&job.id).await.unwrap().status.state, "running");
    }
}
