//! PowerVS image scope
//!
//! Imports a boot image from Cloud Object Storage. The import runs as an
//! asynchronous PowerVS job; the image itself shows up in the workspace once
//! the job completes and then moves through `queued`/`saving` to `active`.

use crate::error::ControllerError;
use crate::reconcile_helpers::{ReconcileOutcome, REQUEUE_IMAGE_IMPORT};
use crate::scope::ignore_not_found;
use crds::{
    get_condition, mark_false, mark_true, ConditionSeverity, DeletePolicy, IBMPowerVSImageSpec,
    IBMPowerVSImageStatus, SpecError, IMAGE_IMPORT_FAILED_REASON, IMAGE_IMPORT_JOB_READY_CONDITION,
    IMAGE_IMPORT_RUNNING_REASON, IMAGE_NOT_READY_REASON, IMAGE_QUEUED_REASON, IMAGE_READY_CONDITION,
    READY_CONDITION,
};
use ibmcloud_client::{CreateCosImageImportJob, Image, Job, PowerVsClientTrait};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Scope for one IBMPowerVSImage reconciliation
pub struct PowerVsImageScope {
    client: Arc<dyn PowerVsClientTrait>,
    /// Name of the image in the workspace, taken from the IBMPowerVSImage name
    pub image_name: String,
    /// Import source and delete policy
    pub spec: IBMPowerVSImageSpec,
    /// Status written back to the IBMPowerVSImage
    pub status: IBMPowerVSImageStatus,
}

impl PowerVsImageScope {
    /// Scope for the image `image_name` in the client's workspace
    pub fn new(
        client: Arc<dyn PowerVsClientTrait>,
        image_name: impl Into<String>,
        spec: IBMPowerVSImageSpec,
        status: Option<IBMPowerVSImageStatus>,
    ) -> Self {
        Self {
            client,
            image_name: image_name.into(),
            spec,
            status: status.unwrap_or_default(),
        }
    }

    fn validate(&self) -> Result<(), SpecError> {
        for (field, value) in [
            ("spec.bucket", &self.spec.bucket),
            ("spec.object", &self.spec.object),
            ("spec.region", &self.spec.region),
        ] {
            if value.is_empty() {
                return Err(SpecError::InvalidValue {
                    field,
                    reason: "must not be empty".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Drive the import until the image is active
    pub async fn reconcile(&mut self) -> Result<ReconcileOutcome, ControllerError> {
        self.validate()?;

        if let Some(image) = self.find_image().await? {
            return Ok(self.observe_image(&image));
        }

        if let Some(job_id) = self.status.job_id.clone() {
            match self.client.get_job(&job_id).await {
                Ok(job) => match job.status.state.as_str() {
                    "failed" => {
                        self.observe_job(&job);
                        self.status.job_id = None;
                        return Err(ControllerError::Provision(format!(
                            "image import job {} failed: {}",
                            job.id,
                            job.status.message.as_deref().unwrap_or("no message")
                        )));
                    }
                    "completed" => {
                        self.observe_job(&job);
                        return self.image_missing_after(&job);
                    }
                    _ => return Ok(self.observe_job(&job)),
                },
                Err(e) if e.is_not_found() => {
                    warn!("Import job {} no longer exists, starting a new import", job_id);
                    self.status.job_id = None;
                }
                Err(e) => return Err(e.into()),
            }
        }

        let job = self
            .client
            .create_cos_image_import(&CreateCosImageImportJob {
                image_name: self.image_name.clone(),
                bucket_name: self.spec.bucket.clone(),
                image_filename: self.spec.object.clone(),
                region: self.spec.region.clone(),
                bucket_access: "public".to_string(),
                storage_type: self.spec.storage_type.clone(),
                os_type: self.spec.os_type.clone(),
            })
            .await?;
        info!(
            "Started import of {}/{} as image {} (job {})",
            self.spec.bucket, self.spec.object, self.image_name, job.id
        );
        self.status.job_id = Some(job.id);
        self.status.ready = false;
        mark_false(
            &mut self.status.conditions,
            IMAGE_IMPORT_JOB_READY_CONDITION,
            IMAGE_QUEUED_REASON,
            ConditionSeverity::Info,
            "import job queued",
        );
        Ok(ReconcileOutcome::RequeueAfter(REQUEUE_IMAGE_IMPORT))
    }

    /// A completed job gets one more pass for its image to show up, then a new
    /// import is started
    fn image_missing_after(&mut self, job: &Job) -> Result<ReconcileOutcome, ControllerError> {
        let message = format!(
            "import job {} completed but image {} is not in the workspace",
            job.id, self.image_name
        );
        self.status.ready = false;
        let seen = get_condition(&self.status.conditions, IMAGE_READY_CONDITION)
            .is_some_and(|c| c.message.as_deref() == Some(message.as_str()));
        if seen {
            warn!("{}, starting a new import", message);
            self.status.job_id = None;
            return Err(ControllerError::Provision(message));
        }

        debug!("Import job {} completed, waiting for image {} to appear", job.id, self.image_name);
        mark_false(
            &mut self.status.conditions,
            IMAGE_READY_CONDITION,
            IMAGE_NOT_READY_REASON,
            ConditionSeverity::Warning,
            message,
        );
        Ok(ReconcileOutcome::RequeueAfter(REQUEUE_IMAGE_IMPORT))
    }

    async fn find_image(&mut self) -> Result<Option<Image>, ControllerError> {
        if let Some(id) = self.status.image_id.clone() {
            match self.client.get_image(&id).await {
                Ok(image) => return Ok(Some(image)),
                Err(e) if e.is_not_found() => {
                    warn!("Image {} recorded in status no longer exists (drift detected)", id);
                    self.status.image_id = None;
                    self.status.image_state = None;
                }
                Err(e) => return Err(e.into()),
            }
        }

        let found = self
            .client
            .list_images()
            .await?
            .into_iter()
            .find(|i| i.name == self.image_name);
        match found {
            Some(reference) => Ok(Some(self.client.get_image(&reference.image_id).await?)),
            None => Ok(None),
        }
    }

    /// Translate the import job state into conditions
    pub fn observe_job(&mut self, job: &Job) -> ReconcileOutcome {
        let (reason, severity) = match job.status.state.as_str() {
            "completed" => {
                mark_true(&mut self.status.conditions, IMAGE_IMPORT_JOB_READY_CONDITION);
                return ReconcileOutcome::Done;
            }
            "queued" => (IMAGE_QUEUED_REASON, ConditionSeverity::Info),
            "running" => (IMAGE_IMPORT_RUNNING_REASON, ConditionSeverity::Info),
            "failed" => (IMAGE_IMPORT_FAILED_REASON, ConditionSeverity::Error),
            _ => (IMAGE_NOT_READY_REASON, ConditionSeverity::Warning),
        };

        debug!("Import job {} is {}", job.id, job.status.state);
        self.status.ready = false;
        mark_false(
            &mut self.status.conditions,
            IMAGE_IMPORT_JOB_READY_CONDITION,
            reason,
            severity,
            job.status
                .message
                .clone()
                .unwrap_or_else(|| format!("import job is {}", job.status.state)),
        );
        if severity == ConditionSeverity::Error {
            ReconcileOutcome::Done
        } else {
            ReconcileOutcome::RequeueAfter(REQUEUE_IMAGE_IMPORT)
        }
    }

    /// Translate the image state into status and conditions
    pub fn observe_image(&mut self, image: &Image) -> ReconcileOutcome {
        let state = image.state.clone().unwrap_or_default();
        self.status.image_id = Some(image.image_id.clone());
        self.status.image_state = Some(state.clone());

        match state.as_str() {
            "active" => {
                debug!("Image {} is active", image.image_id);
                self.status.ready = true;
                mark_true(&mut self.status.conditions, IMAGE_READY_CONDITION);
                mark_true(&mut self.status.conditions, READY_CONDITION);
                ReconcileOutcome::Done
            }
            "failed" => {
                warn!("Image {} failed to import", image.image_id);
                self.status.ready = false;
                mark_false(
                    &mut self.status.conditions,
                    IMAGE_READY_CONDITION,
                    IMAGE_NOT_READY_REASON,
                    ConditionSeverity::Error,
                    "image is in failed state",
                );
                ReconcileOutcome::Done
            }
            other => {
                self.status.ready = false;
                mark_false(
                    &mut self.status.conditions,
                    IMAGE_READY_CONDITION,
                    IMAGE_NOT_READY_REASON,
                    ConditionSeverity::Info,
                    format!("image is {}", if other.is_empty() { "unknown" } else { other }),
                );
                ReconcileOutcome::RequeueAfter(REQUEUE_IMAGE_IMPORT)
            }
        }
    }

    /// Delete the workspace image unless the delete policy retains it
    pub async fn delete(&mut self) -> Result<ReconcileOutcome, ControllerError> {
        if self.spec.delete_policy == DeletePolicy::Retain {
            info!("Retaining image {} per delete policy", self.image_name);
            self.status.ready = false;
            return Ok(ReconcileOutcome::Done);
        }

        let id = match self.status.image_id.clone() {
            Some(id) => Some(id),
            None => self
                .client
                .list_images()
                .await?
                .into_iter()
                .find(|i| i.name == self.image_name)
                .map(|i| i.image_id),
        };

        if let Some(id) = id {
            ignore_not_found(self.client.delete_image(&id).await)?;
            info!("Deleted image {} ({})", self.image_name, id);
        }

        self.status.ready = false;
        self.status.image_id = None;
        self.status.image_state = None;
        Ok(ReconcileOutcome::Done)
    }
}
