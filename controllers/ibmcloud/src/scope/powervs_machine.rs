//! PowerVS machine scope
//!
//! One PowerVS virtual machine per IBMPowerVSMachine, booted from an image
//! referenced directly or through an IBMPowerVSImage object.

use crate::error::ControllerError;
use crate::reconcile_helpers::{powervs_provider_id, ReconcileOutcome, REQUEUE_INSTANCE_BUILD, REQUEUE_NOT_READY};
use crate::scope::{ignore_not_found, resolve_network};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use crds::{
    mark_false, mark_true, ConditionSeverity, IBMCloudResourceReference, IBMPowerVSImageStatus,
    IBMPowerVSMachineSpec, IBMPowerVSMachineStatus, MachineAddress, SpecError, INSTANCE_ERRORED_REASON,
    INSTANCE_NOT_READY_REASON, INSTANCE_PROVISION_FAILED_REASON, INSTANCE_READY_CONDITION,
    INSTANCE_STATE_UNKNOWN_REASON, INSTANCE_STOPPED_REASON, READY_CONDITION, WAITING_FOR_IBM_POWERVS_IMAGE_REASON,
};
use ibmcloud_client::{PowerVsClientTrait, PvmInstance, PvmInstanceAddNetwork, PvmInstanceCreate};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Scope for one IBMPowerVSMachine reconciliation
pub struct PowerVsMachineScope {
    client: Arc<dyn PowerVsClientTrait>,
    /// CAPI cluster name
    pub cluster_name: String,
    /// IBMPowerVSMachine name, also the PVM instance name
    pub machine_name: String,
    /// Desired instance
    pub spec: IBMPowerVSMachineSpec,
    /// Status written back to the IBMPowerVSMachine
    pub status: IBMPowerVSMachineStatus,
    bootstrap_data: Option<String>,
}

impl PowerVsMachineScope {
    /// Scope for one machine in the client's workspace
    pub fn new(
        client: Arc<dyn PowerVsClientTrait>,
        cluster_name: impl Into<String>,
        machine_name: impl Into<String>,
        spec: IBMPowerVSMachineSpec,
        status: Option<IBMPowerVSMachineStatus>,
    ) -> Self {
        Self {
            client,
            cluster_name: cluster_name.into(),
            machine_name: machine_name.into(),
            spec,
            status: status.unwrap_or_default(),
            bootstrap_data: None,
        }
    }

    /// Cloud-init user data, sent base64 encoded
    #[must_use]
    pub fn with_bootstrap_data(mut self, data: Option<String>) -> Self {
        self.bootstrap_data = data;
        self
    }

    /// `ibmpowervs://<region>/<zone>/<workspace>/<instance>` once the instance exists
    pub fn provider_id(&self) -> Option<String> {
        let instance_id = self.status.instance_id.as_deref()?;
        Some(powervs_provider_id(
            self.client.region(),
            self.client.zone(),
            self.client.service_instance_id(),
            instance_id,
        ))
    }

    /// Create or adopt the instance and report its state.
    ///
    /// `image_status` is the status of the IBMPowerVSImage named by
    /// `spec.imageRef`, when the machine uses one.
    pub async fn reconcile(
        &mut self,
        image_status: Option<&IBMPowerVSImageStatus>,
    ) -> Result<ReconcileOutcome, ControllerError> {
        let instance = match self.ensure_instance(image_status).await {
            Ok(Some(instance)) => instance,
            Ok(None) => return Ok(ReconcileOutcome::RequeueAfter(REQUEUE_NOT_READY)),
            Err(e) => {
                mark_false(
                    &mut self.status.conditions,
                    INSTANCE_READY_CONDITION,
                    INSTANCE_PROVISION_FAILED_REASON,
                    ConditionSeverity::Error,
                    e.to_string(),
                );
                self.status.ready = false;
                return Err(e);
            }
        };
        Ok(self.observe_instance(&instance))
    }

    /// Look the instance up by ID, then by name, and create it when missing.
    ///
    /// Returns `None` while the boot image is not available yet.
    pub async fn ensure_instance(
        &mut self,
        image_status: Option<&IBMPowerVSImageStatus>,
    ) -> Result<Option<PvmInstance>, ControllerError> {
        self.spec.validate()?;

        if let Some(id) = self.status.instance_id.clone() {
            match self.client.get_instance(&id).await {
                Ok(instance) => return Ok(Some(instance)),
                Err(e) if e.is_not_found() => {
                    warn!("Instance {} recorded for machine {} no longer exists (drift detected)", id, self.machine_name);
                    self.status.instance_id = None;
                    self.status.instance_state = None;
                    self.status.addresses.clear();
                }
                Err(e) => return Err(e.into()),
            }
        }

        if let Some(existing) = self.find_instance().await? {
            info!("Adopting existing instance {} ({})", existing.server_name, existing.pvm_instance_id);
            self.status.instance_id = Some(existing.pvm_instance_id.clone());
            return Ok(Some(self.client.get_instance(&existing.pvm_instance_id).await?));
        }

        let Some(image_id) = self.resolve_image(image_status).await? else {
            return Ok(None);
        };
        let network_id = resolve_network(self.client.as_ref(), &self.spec.network).await?;

        let processors: f64 = self.spec.processors.parse().map_err(|_| SpecError::InvalidValue {
            field: "spec.processors",
            reason: format!("{:?} is not a number", self.spec.processors),
        })?;

        let request = PvmInstanceCreate {
            server_name: self.machine_name.clone(),
            image_id,
            proc_type: self.spec.processor_type.as_api_str().to_string(),
            processors,
            memory: f64::from(self.spec.memory_gib),
            sys_type: self.spec.system_type.clone(),
            key_pair_name: self.spec.ssh_key.clone().filter(|k| !k.is_empty()),
            networks: vec![PvmInstanceAddNetwork { network_id }],
            user_data: self.bootstrap_data.as_ref().map(|data| STANDARD.encode(data)),
        };

        let instance = self.client.create_instance(&request).await?;
        info!(
            "Created instance {} ({}) in workspace {}",
            instance.server_name,
            instance.pvm_instance_id,
            self.client.service_instance_id()
        );
        self.status.instance_id = Some(instance.pvm_instance_id.clone());
        Ok(Some(instance))
    }

    async fn find_instance(&self) -> Result<Option<ibmcloud_client::PvmInstanceReference>, ControllerError> {
        let instances = self.client.list_instances().await?;
        Ok(instances.into_iter().find(|i| i.server_name == self.machine_name))
    }

    /// Boot image ID, or `None` while an imageRef is still importing
    pub async fn resolve_image(
        &mut self,
        image_status: Option<&IBMPowerVSImageStatus>,
    ) -> Result<Option<String>, ControllerError> {
        if let Some(image) = self.spec.image.clone() {
            return self.lookup_image(&image).await.map(Some);
        }

        match image_status {
            Some(status) if status.ready => {
                if let Some(id) = status.image_id.clone() {
                    return Ok(Some(id));
                }
            }
            _ => {}
        }

        let name = self
            .spec
            .image_ref
            .as_ref()
            .map(|r| r.name.clone())
            .unwrap_or_default();
        debug!("Waiting for IBMPowerVSImage {} to become ready", name);
        mark_false(
            &mut self.status.conditions,
            INSTANCE_READY_CONDITION,
            WAITING_FOR_IBM_POWERVS_IMAGE_REASON,
            ConditionSeverity::Info,
            format!("waiting for IBMPowerVSImage {}", name),
        );
        Ok(None)
    }

    async fn lookup_image(&self, image: &IBMCloudResourceReference) -> Result<String, ControllerError> {
        if let Some(id) = image.id.as_deref().filter(|id| !id.is_empty()) {
            return match self.client.get_image(id).await {
                Ok(image) => Ok(image.image_id),
                Err(e) if e.is_not_found() => Err(ControllerError::Provision(format!(
                    "image {} not found in workspace {}",
                    id,
                    self.client.service_instance_id()
                ))),
                Err(e) => Err(e.into()),
            };
        }

        let name = image.name.as_deref().unwrap_or_default();
        self.client
            .list_images()
            .await?
            .into_iter()
            .find(|i| i.name == name)
            .map(|i| i.image_id)
            .ok_or_else(|| {
                ControllerError::Provision(format!(
                    "image {} not found in workspace {}",
                    name,
                    self.client.service_instance_id()
                ))
            })
    }

    /// Translate the instance state into status and conditions
    pub fn observe_instance(&mut self, instance: &PvmInstance) -> ReconcileOutcome {
        self.status.instance_id = Some(instance.pvm_instance_id.clone());
        self.status.instance_state = Some(instance.status.clone());
        self.status.health = instance.health.as_ref().map(|h| h.status.clone());
        self.status.fault = instance.fault.as_ref().and_then(|f| f.message.clone());
        self.status.region = Some(self.client.region().to_string());
        self.status.zone = Some(self.client.zone().to_string());

        let mut addresses = Vec::new();
        for network in &instance.networks {
            if let Some(ip) = network.ip_address.as_deref().filter(|ip| !ip.is_empty()) {
                addresses.push(MachineAddress::internal_ip(ip));
            }
            if let Some(ip) = network.external_ip.as_deref().filter(|ip| !ip.is_empty()) {
                addresses.push(MachineAddress::external_ip(ip));
            }
        }
        if !addresses.is_empty() {
            self.status.addresses = addresses;
        }

        let (reason, severity, message, outcome) = match instance.status.as_str() {
            "ACTIVE" => {
                debug!("Instance {} is active", instance.pvm_instance_id);
                self.status.ready = true;
                mark_true(&mut self.status.conditions, INSTANCE_READY_CONDITION);
                mark_true(&mut self.status.conditions, READY_CONDITION);
                return ReconcileOutcome::Done;
            }
            "BUILD" => (
                INSTANCE_NOT_READY_REASON,
                ConditionSeverity::Warning,
                "instance is building".to_string(),
                ReconcileOutcome::RequeueAfter(REQUEUE_INSTANCE_BUILD),
            ),
            "SHUTOFF" => (
                INSTANCE_STOPPED_REASON,
                ConditionSeverity::Error,
                "instance is shut off".to_string(),
                ReconcileOutcome::Done,
            ),
            "ERROR" => (
                INSTANCE_ERRORED_REASON,
                ConditionSeverity::Error,
                self.status
                    .fault
                    .clone()
                    .unwrap_or_else(|| "instance is in error state".to_string()),
                ReconcileOutcome::Done,
            ),
            other => (
                INSTANCE_STATE_UNKNOWN_REASON,
                ConditionSeverity::Info,
                format!("instance is {}", other),
                ReconcileOutcome::RequeueAfter(REQUEUE_NOT_READY),
            ),
        };

        info!("Instance {} is {}", instance.pvm_instance_id, instance.status);
        self.status.ready = false;
        mark_false(&mut self.status.conditions, INSTANCE_READY_CONDITION, reason, severity, message);
        outcome
    }

    /// Delete the instance, found by ID or by name
    pub async fn delete(&mut self) -> Result<ReconcileOutcome, ControllerError> {
        let id = match self.status.instance_id.clone() {
            Some(id) => Some(id),
            None => self.find_instance().await?.map(|i| i.pvm_instance_id),
        };

        if let Some(id) = id {
            ignore_not_found(self.client.delete_instance(&id).await)?;
            info!("Deleted instance {} for machine {}", id, self.machine_name);
        }

        self.status.ready = false;
        self.status.instance_id = None;
        self.status.instance_state = None;
        self.status.addresses.clear();
        Ok(ReconcileOutcome::Done)
    }
}
