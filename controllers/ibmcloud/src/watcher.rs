//! Kubernetes resource watchers.
//!
//! This module handles watching the infrastructure CRDs for changes
//! and triggering reconciliation using kube_runtime::Controller.
//!
//! All watchers use a generic `watch_resource()` helper that records
//! metrics, applies the per-object Fibonacci backoff on errors and turns a
//! `ReconcileOutcome` into a requeue.
//!
//! Changes to the owning CAPI objects (pause, infrastructureReady, bootstrap
//! data) requeue the infrastructure objects right away: a Cluster maps to
//! every object that belongs to it, a Machine to its infrastructureRef.

use crate::error::ControllerError;
use crate::reconcile_helpers::{cluster_name_label, resource_key, ReconcileOutcome};
use crate::reconciler::Reconciler;
use crds::{Cluster, IBMPowerVSCluster, IBMPowerVSImage, IBMPowerVSMachine, IBMVPCCluster, IBMVPCMachine, Machine};
use futures::StreamExt;
use kube::{Api, Client, Resource, ResourceExt};
use kube_runtime::{
    controller::{Action, Config as ControllerConfig},
    reflector::ObjectRef,
    watcher, Controller,
};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Boxed per-kind reconcile future
type ReconcileFuture = Pin<Box<dyn Future<Output = Result<ReconcileOutcome, ControllerError>> + Send>>;

/// Generic watcher helper around kube_runtime::Controller.
///
/// The Controller reconnects the watch, deduplicates events and limits
/// concurrency; errors are requeued after the object's next backoff delay.
async fn watch_resource<K, F>(
    controller: Controller<K>,
    reconciler: Arc<Reconciler>,
    reconcile_fn: F,
    concurrency: u16,
) -> Result<(), ControllerError>
where
    K: Resource<DynamicType = ()> + Clone + Send + Sync + 'static + std::fmt::Debug + serde::de::DeserializeOwned,
    F: Fn(Arc<Reconciler>, Arc<K>) -> ReconcileFuture + Send + Sync + Clone + 'static,
{
    let kind = K::kind(&()).to_string();
    info!("Starting {} watcher", kind);

    let error_policy = |obj: Arc<K>, error: &ControllerError, ctx: Arc<Reconciler>| {
        let key = resource_key(obj.as_ref());
        let delay = ctx.backoff.next_delay(&key);
        error!(
            "Reconciliation error for {} (attempt {}), retrying in {:?}: {}",
            key,
            ctx.backoff.error_count(&key),
            delay,
            error
        );
        Action::requeue(delay)
    };

    let reconcile = move |obj: Arc<K>, ctx: Arc<Reconciler>| {
        let reconcile_fn = reconcile_fn.clone();
        async move {
            let key = resource_key(obj.as_ref());
            let kind = K::kind(&()).to_string();
            debug!("Reconciling {}", key);

            let started = Instant::now();
            let result = reconcile_fn(Arc::clone(&ctx), obj).await;
            let elapsed = started.elapsed();

            match result {
                Ok(outcome) => {
                    ctx.metrics.observe(&kind, Ok(outcome.is_requeue()), elapsed);
                    ctx.backoff.reset(&key);
                    Ok(outcome.into_action(ctx.sync_period))
                }
                Err(e) => {
                    ctx.metrics.observe(&kind, Err(&e), elapsed);
                    Err(e)
                }
            }
        }
    };

    // Debounce batches the status and finalizer updates we make ourselves
    let controller_config = ControllerConfig::default()
        .debounce(Duration::from_secs(5))
        .concurrency(concurrency);

    controller
        .with_config(controller_config)
        .run(reconcile, error_policy, reconciler)
        .for_each(|res| {
            let kind = kind.clone();
            async move {
                if let Err(e) = res {
                    error!("Controller error for {}: {}", kind, e);
                }
            }
        })
        .await;

    Ok(())
}

/// Infrastructure objects that belong to a CAPI Cluster
pub(crate) trait ClusterMember {
    /// Name of the owning CAPI Cluster
    fn capi_cluster_name(&self) -> Option<&str>;
}

impl ClusterMember for IBMVPCCluster {
    fn capi_cluster_name(&self) -> Option<&str> {
        cluster_name_label(&self.metadata)
    }
}

impl ClusterMember for IBMVPCMachine {
    fn capi_cluster_name(&self) -> Option<&str> {
        cluster_name_label(&self.metadata)
    }
}

impl ClusterMember for IBMPowerVSCluster {
    fn capi_cluster_name(&self) -> Option<&str> {
        cluster_name_label(&self.metadata)
    }
}

impl ClusterMember for IBMPowerVSMachine {
    fn capi_cluster_name(&self) -> Option<&str> {
        cluster_name_label(&self.metadata)
    }
}

impl ClusterMember for IBMPowerVSImage {
    fn capi_cluster_name(&self) -> Option<&str> {
        Some(self.spec.cluster_name.as_str()).filter(|name| !name.is_empty())
    }
}

/// Objects among `objects` that belong to `cluster`
pub(crate) fn cluster_members<K>(objects: &[Arc<K>], cluster: &Cluster) -> Vec<ObjectRef<K>>
where
    K: Resource<DynamicType = ()> + ClusterMember,
{
    let namespace = cluster.namespace();
    objects
        .iter()
        .filter(|obj| obj.namespace() == namespace && obj.capi_cluster_name() == cluster.metadata.name.as_deref())
        .map(|obj| ObjectRef::from_obj(obj.as_ref()))
        .collect()
}

/// Infrastructure machine of kind `K` a CAPI Machine points at
pub(crate) fn machine_infrastructure<K>(machine: &Machine) -> Option<ObjectRef<K>>
where
    K: Resource<DynamicType = ()>,
{
    let reference = machine.spec.infrastructure_ref.as_ref()?;
    if reference.kind != K::kind(&()) || reference.name.is_empty() {
        return None;
    }
    let object = ObjectRef::new(&reference.name);
    Some(match machine.namespace() {
        Some(namespace) => object.within(&namespace),
        None => object,
    })
}

/// Watches the infrastructure CRDs for changes.
pub struct Watcher {
    reconciler: Arc<Reconciler>,
    concurrency: u16,
    cluster_api: Api<Cluster>,
    machine_api: Api<Machine>,
    vpc_cluster_api: Api<IBMVPCCluster>,
    vpc_machine_api: Api<IBMVPCMachine>,
    powervs_cluster_api: Api<IBMPowerVSCluster>,
    powervs_machine_api: Api<IBMPowerVSMachine>,
    powervs_image_api: Api<IBMPowerVSImage>,
}

/// Api scoped to `namespace`, or cluster-wide
fn scoped_api<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<Scope = k8s_openapi::NamespaceResourceScope, DynamicType = ()>,
{
    match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}

impl Watcher {
    /// Watcher over `namespace`, or every namespace when `None`
    pub fn new(reconciler: Arc<Reconciler>, client: &Client, namespace: Option<&str>, concurrency: u16) -> Self {
        Self {
            reconciler,
            concurrency,
            cluster_api: scoped_api(client, namespace),
            machine_api: scoped_api(client, namespace),
            vpc_cluster_api: scoped_api(client, namespace),
            vpc_machine_api: scoped_api(client, namespace),
            powervs_cluster_api: scoped_api(client, namespace),
            powervs_machine_api: scoped_api(client, namespace),
            powervs_image_api: scoped_api(client, namespace),
        }
    }

    /// Controller for `api` that is also triggered by changes to the owning Cluster
    fn cluster_controller<K>(&self, api: Api<K>) -> Controller<K>
    where
        K: Resource<DynamicType = ()>
            + ClusterMember
            + Clone
            + Send
            + Sync
            + 'static
            + std::fmt::Debug
            + serde::de::DeserializeOwned,
    {
        let controller = Controller::new(api, watcher::Config::default());
        let store = controller.store();
        controller.watches(self.cluster_api.clone(), watcher::Config::default(), move |cluster: Cluster| {
            cluster_members(&store.state(), &cluster)
        })
    }

    /// As `cluster_controller`, plus changes to the owning Machine
    fn machine_controller<K>(&self, api: Api<K>) -> Controller<K>
    where
        K: Resource<DynamicType = ()>
            + ClusterMember
            + Clone
            + Send
            + Sync
            + 'static
            + std::fmt::Debug
            + serde::de::DeserializeOwned,
    {
        self.cluster_controller(api)
            .watches(self.machine_api.clone(), watcher::Config::default(), |machine: Machine| {
                machine_infrastructure::<K>(&machine)
            })
    }

    /// Run the IBMVPCCluster controller
    pub async fn watch_vpc_clusters(&self) -> Result<(), ControllerError> {
        watch_resource(
            self.cluster_controller(self.vpc_cluster_api.clone()),
            Arc::clone(&self.reconciler),
            |reconciler, obj| Box::pin(async move { reconciler.reconcile_vpc_cluster(&obj).await }),
            self.concurrency,
        )
        .await
    }

    /// Run the IBMVPCMachine controller
    pub async fn watch_vpc_machines(&self) -> Result<(), ControllerError> {
        watch_resource(
            self.machine_controller(self.vpc_machine_api.clone()),
            Arc::clone(&self.reconciler),
            |reconciler, obj| Box::pin(async move { reconciler.reconcile_vpc_machine(&obj).await }),
            self.concurrency,
        )
        .await
    }

    /// Run the IBMPowerVSCluster controller
    pub async fn watch_powervs_clusters(&self) -> Result<(), ControllerError> {
        watch_resource(
            self.cluster_controller(self.powervs_cluster_api.clone()),
            Arc::clone(&self.reconciler),
            |reconciler, obj| Box::pin(async move { reconciler.reconcile_powervs_cluster(&obj).await }),
            self.concurrency,
        )
        .await
    }

    /// Run the IBMPowerVSMachine controller
    pub async fn watch_powervs_machines(&self) -> Result<(), ControllerError> {
        watch_resource(
            self.machine_controller(self.powervs_machine_api.clone()),
            Arc::clone(&self.reconciler),
            |reconciler, obj| Box::pin(async move { reconciler.reconcile_powervs_machine(&obj).await }),
            self.concurrency,
        )
        .await
    }

    /// Run the IBMPowerVSImage controller
    pub async fn watch_powervs_images(&self) -> Result<(), ControllerError> {
        watch_resource(
            self.cluster_controller(self.powervs_image_api.clone()),
            Arc::clone(&self.reconciler),
            |reconciler, obj| Box::pin(async move { reconciler.reconcile_powervs_image(&obj).await }),
            self.concurrency,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use crds::InfrastructureRef;

    #[test]
    fn test_cluster_maps_to_its_members_only() {
        let cluster = capi_cluster("capi", TEST_NAMESPACE, false);
        let objects = vec![
            Arc::new(vpc_machine("capi-cp-0", TEST_NAMESPACE, "capi")),
            Arc::new(vpc_machine("other-cp-0", TEST_NAMESPACE, "other")),
            Arc::new(vpc_machine("capi-cp-0", "elsewhere", "capi")),
        ];

        let members = cluster_members(&objects, &cluster);
        assert_eq!(members, vec![ObjectRef::<IBMVPCMachine>::new("capi-cp-0").within(TEST_NAMESPACE)]);
    }

    #[test]
    fn test_image_belongs_through_spec_cluster_name() {
        let cluster = capi_cluster("capi", TEST_NAMESPACE, false);
        let mut image = IBMPowerVSImage::new("capi-rhcos", powervs_image_spec("capi"));
        image.metadata.namespace = Some(TEST_NAMESPACE.to_string());
        let mut orphan = IBMPowerVSImage::new("shared-rhcos", powervs_image_spec(""));
        orphan.metadata.namespace = Some(TEST_NAMESPACE.to_string());

        let members = cluster_members(&[Arc::new(image), Arc::new(orphan)], &cluster);
        assert_eq!(members, vec![ObjectRef::<IBMPowerVSImage>::new("capi-rhcos").within(TEST_NAMESPACE)]);
    }

    #[test]
    fn test_machine_maps_to_matching_infrastructure_kind() {
        let mut machine = capi_machine("capi-cp-0", TEST_NAMESPACE, "capi", true, None);
        assert!(machine_infrastructure::<IBMVPCMachine>(&machine).is_none());

        machine.spec.infrastructure_ref = Some(InfrastructureRef {
            api_version: "infrastructure.cluster.x-k8s.io/v1beta2".to_string(),
            kind: "IBMVPCMachine".to_string(),
            name: "capi-cp-0-abcde".to_string(),
        });
        assert_eq!(
            machine_infrastructure::<IBMVPCMachine>(&machine),
            Some(ObjectRef::new("capi-cp-0-abcde").within(TEST_NAMESPACE))
        );
        assert!(machine_infrastructure::<IBMPowerVSMachine>(&machine).is_none());
    }
}
