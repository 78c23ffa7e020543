//! Prometheus metrics and health probes
//!
//! Serves `/metrics` in the Prometheus text format plus `/healthz` and
//! `/readyz` for the kubelet.

use crate::error::ControllerError;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Reconciliation metrics shared by every watcher
pub struct Metrics {
    /// Reconciliations by kind and result (`success`, `requeue` or an error kind)
    pub reconcile_total: CounterVec,
    /// Failed reconciliations by kind and error kind
    pub reconcile_errors_total: CounterVec,
    /// Reconciliation latency by kind
    pub reconcile_duration_seconds: HistogramVec,
    registry: Registry,
    ready: AtomicBool,
}

impl Metrics {
    /// Create and register the controller metrics
    pub fn new() -> Result<Self, ControllerError> {
        let registry = Registry::new_custom(Some("capibm".to_string()), None)?;

        let reconcile_total = CounterVec::new(
            Opts::new("reconcile_total", "Total reconciliations"),
            &["kind", "result"],
        )?;

        let reconcile_errors_total = CounterVec::new(
            Opts::new("reconcile_errors_total", "Failed reconciliations"),
            &["kind", "error"],
        )?;

        let reconcile_duration_seconds = HistogramVec::new(
            HistogramOpts::new("reconcile_duration_seconds", "Reconciliation latency in seconds")
                .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
            &["kind"],
        )?;

        registry.register(Box::new(reconcile_total.clone()))?;
        registry.register(Box::new(reconcile_errors_total.clone()))?;
        registry.register(Box::new(reconcile_duration_seconds.clone()))?;

        Ok(Self {
            reconcile_total,
            reconcile_errors_total,
            reconcile_duration_seconds,
            registry,
            ready: AtomicBool::new(false),
        })
    }

    /// Record a finished reconciliation
    pub fn observe(&self, kind: &str, result: Result<bool, &ControllerError>, elapsed: Duration) {
        let label = match result {
            Ok(false) => "success",
            Ok(true) => "requeue",
            Err(e) => {
                self.reconcile_errors_total.with_label_values(&[kind, e.kind()]).inc();
                "error"
            }
        };
        self.reconcile_total.with_label_values(&[kind, label]).inc();
        self.reconcile_duration_seconds
            .with_label_values(&[kind])
            .observe(elapsed.as_secs_f64());
    }

    /// Flip the readiness probe
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::Relaxed);
    }

    /// Whether the controller reported itself ready
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }

    /// Gather all metrics in Prometheus text format
    pub fn gather(&self) -> Result<String, ControllerError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = vec![];
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| ControllerError::Watch(format!("metrics are not UTF-8: {}", e)))
    }
}

async fn metrics_handler(State(metrics): State<Arc<Metrics>>) -> Response {
    match metrics.gather() {
        Ok(body) => ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body).into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn readyz_handler(State(metrics): State<Arc<Metrics>>) -> Response {
    if metrics.is_ready() {
        (StatusCode::OK, "ok").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready").into_response()
    }
}

fn routes(metrics: Arc<Metrics>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(|| async { "ok" }))
        .route("/readyz", get(readyz_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(metrics)
}

/// Serve metrics and probes until the listener fails
pub async fn serve(addr: SocketAddr, metrics: Arc<Metrics>) -> Result<(), ControllerError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ControllerError::InvalidConfig(format!("failed to bind metrics server to {}: {}", addr, e)))?;
    info!("Metrics and probe server listening on {}", addr);

    axum::serve(listener, routes(metrics))
        .await
        .map_err(|e| ControllerError::Watch(format!("metrics server error: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observe_counts_by_kind_and_result() {
        let metrics = Metrics::new().unwrap();
        metrics.observe("IBMVPCCluster", Ok(false), Duration::from_millis(20));
        metrics.observe("IBMVPCCluster", Ok(true), Duration::from_millis(20));
        let err = ControllerError::Provision("no address prefix".to_string());
        metrics.observe("IBMVPCCluster", Err(&err), Duration::from_millis(20));

        let total = |result: &str| metrics.reconcile_total.with_label_values(&["IBMVPCCluster", result]).get();
        assert_eq!(total("success"), 1.0);
        assert_eq!(total("requeue"), 1.0);
        assert_eq!(total("error"), 1.0);
        assert_eq!(
            metrics
                .reconcile_errors_total
                .with_label_values(&["IBMVPCCluster", "provision"])
                .get(),
            1.0
        );
    }

    #[test]
    fn test_gather_uses_prefix() {
        let metrics = Metrics::new().unwrap();
        metrics.observe("IBMPowerVSImage", Ok(false), Duration::from_secs(1));
        let text = metrics.gather().unwrap();
        assert!(text.contains("capibm_reconcile_total"));
        assert!(text.contains("capibm_reconcile_duration_seconds_bucket"));
        assert!(text.contains("kind=\"IBMPowerVSImage\""));
    }

    #[tokio::test]
    async fn test_readyz_follows_flag() {
        let metrics = Arc::new(Metrics::new().unwrap());
        assert_eq!(readyz_handler(State(metrics.clone())).await.status(), StatusCode::SERVICE_UNAVAILABLE);

        metrics.set_ready(true);
        assert_eq!(readyz_handler(State(metrics.clone())).await.status(), StatusCode::OK);
        assert_eq!(metrics_handler(State(metrics)).await.status(), StatusCode::OK);
    }
}
