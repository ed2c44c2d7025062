//! Health server for Kubernetes probes and Prometheus metrics.
//!
//! Provides:
//! - `/ping` - Plain-text liveness responder ("Ok")
//! - `/healthz` - Liveness probe (always returns 200 if server is running)
//! - `/readyz` - Readiness probe (returns 200 once the webhook is serving)
//! - `/metrics` - Prometheus metrics endpoint

use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};
use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::{EncodeLabel, EncodeLabelSet, LabelSetEncoder};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;
use tokio::sync::RwLock;
use tracing::info;

/// Labels for admission decisions (webhook + verdict)
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct AdmissionLabels {
    pub webhook: String,
    pub verdict: String,
}

impl EncodeLabelSet for AdmissionLabels {
    fn encode(&self, encoder: &mut LabelSetEncoder<'_>) -> Result<(), std::fmt::Error> {
        ("webhook", self.webhook.as_str()).encode(encoder.encode_label())?;
        ("verdict", self.verdict.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Labels for failed admission requests (webhook + error kind)
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct ErrorLabels {
    pub webhook: String,
    pub kind: String,
}

impl EncodeLabelSet for ErrorLabels {
    fn encode(&self, encoder: &mut LabelSetEncoder<'_>) -> Result<(), std::fmt::Error> {
        ("webhook", self.webhook.as_str()).encode(encoder.encode_label())?;
        ("kind", self.kind.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Labels for per-webhook latency
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct WebhookLabels {
    pub webhook: String,
}

impl EncodeLabelSet for WebhookLabels {
    fn encode(&self, encoder: &mut LabelSetEncoder<'_>) -> Result<(), std::fmt::Error> {
        ("webhook", self.webhook.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Labels for rewritten images (container population)
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct PopulationLabels {
    pub population: String,
}

impl EncodeLabelSet for PopulationLabels {
    fn encode(&self, encoder: &mut LabelSetEncoder<'_>) -> Result<(), std::fmt::Error> {
        ("population", self.population.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Labels for ping requests (status code + method)
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct PingLabels {
    pub code: String,
    pub method: String,
}

impl EncodeLabelSet for PingLabels {
    fn encode(&self, encoder: &mut LabelSetEncoder<'_>) -> Result<(), std::fmt::Error> {
        ("code", self.code.as_str()).encode(encoder.encode_label())?;
        ("method", self.method.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Shared metrics for the webhook
pub struct Metrics {
    /// Admission decisions counter
    pub admission_requests_total: Family<AdmissionLabels, Counter>,
    /// Failed admission requests counter
    pub admission_errors_total: Family<ErrorLabels, Counter>,
    /// Admission request duration histogram
    pub admission_duration_seconds: Family<WebhookLabels, Histogram>,
    /// Rewritten images counter
    pub images_rewritten_total: Family<PopulationLabels, Counter>,
    /// Ping requests counter
    pub ping_requests_total: Family<PingLabels, Counter>,
    /// Prometheus registry
    registry: Registry,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Create a new metrics instance with registered metrics
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let admission_requests_total = Family::<AdmissionLabels, Counter>::default();
        registry.register(
            "kubenab_admission_requests",
            "Total number of admission decisions",
            admission_requests_total.clone(),
        );

        let admission_errors_total = Family::<ErrorLabels, Counter>::default();
        registry.register(
            "kubenab_admission_errors",
            "Total number of admission requests that failed",
            admission_errors_total.clone(),
        );

        let admission_duration_seconds =
            Family::<WebhookLabels, Histogram>::new_with_constructor(|| {
                Histogram::new(exponential_buckets(0.0001, 2.0, 15))
            });
        registry.register(
            "kubenab_admission_duration_seconds",
            "Duration of admission request handling in seconds",
            admission_duration_seconds.clone(),
        );

        let images_rewritten_total = Family::<PopulationLabels, Counter>::default();
        registry.register(
            "kubenab_images_rewritten",
            "Total number of container images rewritten to the private registry",
            images_rewritten_total.clone(),
        );

        let ping_requests_total = Family::<PingLabels, Counter>::default();
        registry.register(
            "kubenab_ping_requests",
            "Total number of requests on /ping",
            ping_requests_total.clone(),
        );

        Self {
            admission_requests_total,
            admission_errors_total,
            admission_duration_seconds,
            images_rewritten_total,
            ping_requests_total,
            registry,
        }
    }

    /// Record a completed admission decision
    pub fn record_admission(&self, webhook: &str, verdict: &str, duration_secs: f64) {
        let labels = AdmissionLabels {
            webhook: webhook.to_string(),
            verdict: verdict.to_string(),
        };
        self.admission_requests_total.get_or_create(&labels).inc();
        self.observe_duration(webhook, duration_secs);
    }

    /// Record a failed admission request
    pub fn record_error(&self, webhook: &str, kind: &str, duration_secs: f64) {
        let labels = ErrorLabels {
            webhook: webhook.to_string(),
            kind: kind.to_string(),
        };
        self.admission_errors_total.get_or_create(&labels).inc();
        self.observe_duration(webhook, duration_secs);
    }

    /// Record rewritten images for a container population
    pub fn record_rewrites(&self, population: &str, count: u64) {
        if count == 0 {
            return;
        }
        let labels = PopulationLabels {
            population: population.to_string(),
        };
        self.images_rewritten_total.get_or_create(&labels).inc_by(count);
    }

    /// Record a ping request
    pub fn record_ping(&self, code: StatusCode, method: &Method) {
        let labels = PingLabels {
            code: code.as_u16().to_string(),
            method: method.as_str().to_lowercase(),
        };
        self.ping_requests_total.get_or_create(&labels).inc();
    }

    fn observe_duration(&self, webhook: &str, duration_secs: f64) {
        let labels = WebhookLabels {
            webhook: webhook.to_string(),
        };
        self.admission_duration_seconds
            .get_or_create(&labels)
            .observe(duration_secs);
    }

    /// Encode metrics to Prometheus text format
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        if encode(&mut buffer, &self.registry).is_err() {
            tracing::error!("Failed to encode metrics");
            return "# Error encoding metrics".to_string();
        }
        buffer
    }
}

/// Shared state for the health server
pub struct HealthState {
    /// Whether the webhook listener is serving
    ready: RwLock<bool>,
    /// Metrics registry
    pub metrics: Metrics,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    /// Create a new health state (starts as not ready)
    pub fn new() -> Self {
        Self {
            ready: RwLock::new(false),
            metrics: Metrics::new(),
        }
    }

    /// Mark the webhook as ready or not ready
    pub async fn set_ready(&self, ready: bool) {
        *self.ready.write().await = ready;
    }

    /// Check if the webhook is ready
    pub async fn is_ready(&self) -> bool {
        *self.ready.read().await
    }
}

/// Ping handler
async fn ping(State(state): State<Arc<HealthState>>, method: Method) -> impl IntoResponse {
    info!(path = "/ping", "Serving request");
    state.metrics.record_ping(StatusCode::OK, &method);
    (StatusCode::OK, "Ok")
}

/// Liveness probe handler
///
/// Returns 200 OK if the process is alive.
async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Readiness probe handler
///
/// Returns 200 OK if the webhook is serving.
/// Returns 503 Service Unavailable if not ready.
async fn readyz(State(state): State<Arc<HealthState>>) -> Response {
    if state.is_ready().await {
        (StatusCode::OK, "ready").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready").into_response()
    }
}

/// Metrics handler
async fn metrics_handler(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let body = state.metrics.encode();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

/// Create the health server router
pub fn create_router(state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Run the health server
///
/// Binds to 0.0.0.0 on `port` and serves health/metrics endpoints.
pub async fn run_health_server(state: Arc<HealthState>, port: u16) -> Result<(), std::io::Error> {
    let app = create_router(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!(port = port, "Starting health server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
