//! Unit tests for the PowerVS image scope

#[cfg(test)]
mod tests {
    use crate::error::ControllerError;
    use crate::reconcile_helpers::{ReconcileOutcome, REQUEUE_IMAGE_IMPORT};
    use crate::scope::PowerVsImageScope;
    use crate::test_utils::*;
    use crds::*;
    use ibmcloud_client::{Image, MockPowerVsClient};
    use std::sync::Arc;

    fn workspace() -> MockPowerVsClient {
        MockPowerVsClient::new(TEST_WORKSPACE, TEST_POWERVS_ZONE, TEST_REGION)
    }

    fn image_scope(client: &MockPowerVsClient) -> PowerVsImageScope {
        PowerVsImageScope::new(Arc::new(client.clone()), "capi-rhcos", powervs_image_spec("capi"), None)
    }

    fn reason(scope: &PowerVsImageScope, type_: &str) -> Option<String> {
        get_condition(&scope.status.conditions, type_).and_then(|c| c.reason.clone())
    }

    fn import_image(client: &MockPowerVsClient, state: &str) -> String {
        client.add_image(Image {
            image_id: "img-0001".to_string(),
            name: "capi-rhcos".to_string(),
            state: Some(state.to_string()),
            storage_type: Some("tier1".to_string()),
        });
        "img-0001".to_string()
    }

    #[tokio::test]
    async fn test_import_lifecycle() {
        let client = workspace();
        let mut scope = image_scope(&client);

        // Job created
        assert_eq!(scope.reconcile().await.unwrap(), ReconcileOutcome::RequeueAfter(REQUEUE_IMAGE_IMPORT));
        let job_id = scope.status.job_id.clone().unwrap();
        assert_eq!(reason(&scope, IMAGE_IMPORT_JOB_READY_CONDITION).as_deref(), Some(IMAGE_QUEUED_REASON));
        let request = &client.import_requests()[0];
        assert_eq!(request.image_name, "capi-rhcos");
        assert_eq!(request.bucket_name, "power-oss-bucket");
        assert_eq!(request.image_filename, "rhcos-414.ova.gz");
        assert_eq!(request.region, TEST_REGION);
        assert_eq!(request.bucket_access, "public");
        assert_eq!(request.os_type, "rhel");

        // Still queued: no second job
        assert_eq!(scope.reconcile().await.unwrap(), ReconcileOutcome::RequeueAfter(REQUEUE_IMAGE_IMPORT));
        assert_eq!(client.import_requests().len(), 1);

        client.set_job_state(&job_id, "running");
        scope.reconcile().await.unwrap();
        assert_eq!(
            reason(&scope, IMAGE_IMPORT_JOB_READY_CONDITION).as_deref(),
            Some(IMAGE_IMPORT_RUNNING_REASON)
        );

        client.set_job_state(&job_id, "completed");
        assert_eq!(scope.reconcile().await.unwrap(), ReconcileOutcome::RequeueAfter(REQUEUE_IMAGE_IMPORT));
        assert!(is_true(&scope.status.conditions, IMAGE_IMPORT_JOB_READY_CONDITION));

        let image_id = import_image(&client, "saving");
        assert_eq!(scope.reconcile().await.unwrap(), ReconcileOutcome::RequeueAfter(REQUEUE_IMAGE_IMPORT));
        assert_eq!(scope.status.image_id.as_deref(), Some(image_id.as_str()));
        assert_eq!(reason(&scope, IMAGE_READY_CONDITION).as_deref(), Some(IMAGE_NOT_READY_REASON));
        assert!(!scope.status.ready);

        client.set_image_state(&image_id, "active");
        assert_eq!(scope.reconcile().await.unwrap(), ReconcileOutcome::Done);
        assert!(scope.status.ready);
        assert!(is_true(&scope.status.conditions, READY_CONDITION));
        assert_eq!(scope.status.image_state.as_deref(), Some("active"));
        assert_eq!(client.import_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_job_allows_new_import() {
        let client = workspace();
        let mut scope = image_scope(&client);
        scope.reconcile().await.unwrap();
        let job_id = scope.status.job_id.clone().unwrap();

        client.set_job_state(&job_id, "failed");
        assert!(matches!(scope.reconcile().await, Err(ControllerError::Provision(_))));
        assert_eq!(
            reason(&scope, IMAGE_IMPORT_JOB_READY_CONDITION).as_deref(),
            Some(IMAGE_IMPORT_FAILED_REASON)
        );
        assert!(scope.status.job_id.is_none());

        scope.reconcile().await.unwrap();
        assert_eq!(client.import_requests().len(), 2);
        assert_ne!(scope.status.job_id.as_deref(), Some(job_id.as_str()));
    }

    #[tokio::test]
    async fn test_completed_job_without_image_starts_new_import() {
        let client = workspace();
        let mut scope = image_scope(&client);
        scope.reconcile().await.unwrap();
        let job_id = scope.status.job_id.clone().unwrap();
        client.set_job_state(&job_id, "completed");

        // First pass waits for the image and explains why
        assert_eq!(scope.reconcile().await.unwrap(), ReconcileOutcome::RequeueAfter(REQUEUE_IMAGE_IMPORT));
        let condition = get_condition(&scope.status.conditions, IMAGE_READY_CONDITION).unwrap();
        assert_eq!(condition.reason.as_deref(), Some(IMAGE_NOT_READY_REASON));
        assert!(condition.message.as_deref().unwrap().contains(&job_id));
        assert_eq!(scope.status.job_id.as_deref(), Some(job_id.as_str()));

        // Still missing: the job is given up on
        assert!(matches!(scope.reconcile().await, Err(ControllerError::Provision(_))));
        assert!(scope.status.job_id.is_none());

        scope.reconcile().await.unwrap();
        assert_eq!(client.import_requests().len(), 2);
        assert_ne!(scope.status.job_id.as_deref(), Some(job_id.as_str()));
    }

    #[tokio::test]
    async fn test_existing_image_is_adopted_without_import() {
        let client = workspace();
        import_image(&client, "active");
        let mut scope = image_scope(&client);

        assert_eq!(scope.reconcile().await.unwrap(), ReconcileOutcome::Done);
        assert!(scope.status.ready);
        assert!(client.import_requests().is_empty());
    }

    #[tokio::test]
    async fn test_failed_image_is_not_ready() {
        let client = workspace();
        import_image(&client, "failed");
        let mut scope = image_scope(&client);

        assert_eq!(scope.reconcile().await.unwrap(), ReconcileOutcome::Done);
        assert!(!scope.status.ready);
        let condition = get_condition(&scope.status.conditions, IMAGE_READY_CONDITION).unwrap();
        assert_eq!(condition.severity, ConditionSeverity::Error);
    }

    #[tokio::test]
    async fn test_empty_bucket_is_rejected() {
        let client = workspace();
        let mut scope = image_scope(&client);
        scope.spec.bucket.clear();

        assert!(matches!(scope.reconcile().await, Err(ControllerError::Spec(_))));
        assert!(client.import_requests().is_empty());
    }

    #[tokio::test]
    async fn test_delete_respects_policy() {
        let client = workspace();
        let image_id = import_image(&client, "active");

        let mut retained = image_scope(&client);
        retained.spec.delete_policy = DeletePolicy::Retain;
        retained.reconcile().await.unwrap();
        assert_eq!(retained.delete().await.unwrap(), ReconcileOutcome::Done);
        assert!(client.deleted().is_empty());

        let mut deleted = image_scope(&client);
        assert_eq!(deleted.delete().await.unwrap(), ReconcileOutcome::Done);
        assert_eq!(client.deleted(), vec![format!("image:{}", image_id)]);
        assert!(deleted.status.image_id.is_none());
    }
}
