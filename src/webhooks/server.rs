//! Admission webhook server.
//!
//! Provides HTTPS endpoints for Kubernetes admission webhooks:
//! - `POST /mutate` - rewrites pod images to the private registry
//! - `POST /validate` - rejects pods pulling from other registries
//!
//! Both endpoints consume and produce `AdmissionReview` JSON. Malformed
//! requests are answered with a bare status code.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router,
    body::Bytes,
    extract::{State, rejection::BytesRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use axum_server::tls_rustls::RustlsConfig;
use k8s_openapi::api::core::v1::Pod;
use kube::core::DynamicObject;
use kube::core::admission::{AdmissionRequest, AdmissionReview};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::AdmissionConfig;
use crate::health::HealthState;
use crate::webhooks::error::AdmissionError;
use crate::webhooks::policies::{
    ContainerKind, ImageRewrite, MutationOutcome, ValidationDecision, mutate_pod, validate_pod,
};
use crate::webhooks::review::{AdmissionReviewResponse, Verdict};

/// Shared state for webhook handlers
pub struct WebhookState {
    pub config: AdmissionConfig,
    pub health: Arc<HealthState>,
}

impl WebhookState {
    pub fn new(config: AdmissionConfig, health: Arc<HealthState>) -> Self {
        Self { config, health }
    }
}

/// The two admission endpoints
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Webhook {
    Mutate,
    Validate,
}

impl Webhook {
    pub fn as_str(&self) -> &'static str {
        match self {
            Webhook::Mutate => "mutate",
            Webhook::Validate => "validate",
        }
    }
}

/// Create the webhook router
pub fn create_webhook_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route("/mutate", post(mutate))
        .route("/validate", post(validate))
        .with_state(state)
}

async fn mutate(
    State(state): State<Arc<WebhookState>>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    serve(&state, Webhook::Mutate, body)
}

async fn validate(
    State(state): State<Arc<WebhookState>>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    serve(&state, Webhook::Validate, body)
}

fn serve(state: &WebhookState, webhook: Webhook, body: Result<Bytes, BytesRejection>) -> Response {
    info!(path = %format!("/{}", webhook.as_str()), "Serving request");
    let started = Instant::now();

    let result = body
        .map_err(AdmissionError::from)
        .and_then(|body| handle_review(&state.config, webhook, &body));
    let elapsed = started.elapsed().as_secs_f64();

    let metrics = &state.health.metrics;
    match result {
        Ok(encoded) => {
            metrics.record_admission(webhook.as_str(), encoded.verdict.as_str(), elapsed);
            for kind in [ContainerKind::Container, ContainerKind::InitContainer] {
                metrics.record_rewrites(kind.field(), encoded.review.rewrite_count(kind));
            }
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "application/json")],
                encoded.body,
            )
                .into_response()
        }
        Err(e) => {
            error!(webhook = webhook.as_str(), error = %e, "Failed to handle admission request");
            metrics.record_error(webhook.as_str(), e.kind(), elapsed);
            ([(header::CONTENT_TYPE, "application/json")], e).into_response()
        }
    }
}

/// A decided AdmissionReview and the images rewritten to reach it
#[derive(Debug)]
pub struct Review {
    pub response: AdmissionReviewResponse,
    pub rewrites: Vec<ImageRewrite>,
}

impl Review {
    fn decided(response: AdmissionReviewResponse) -> Self {
        Self {
            response,
            rewrites: Vec::new(),
        }
    }

    /// Number of rewrites applied to the given container population
    pub fn rewrite_count(&self, kind: ContainerKind) -> u64 {
        self.rewrites.iter().filter(|r| r.kind == kind).count() as u64
    }
}

/// An encoded AdmissionReview response and the verdict it carries
#[derive(Debug)]
pub struct EncodedReview {
    pub body: Vec<u8>,
    pub verdict: Verdict,
    pub review: Review,
}

/// Decide an AdmissionReview body and encode the response.
pub fn handle_review(
    config: &AdmissionConfig,
    webhook: Webhook,
    body: &[u8],
) -> Result<EncodedReview, AdmissionError> {
    debug!(body = %String::from_utf8_lossy(body), "AdmissionReview received");

    let review = match webhook {
        Webhook::Mutate => review_mutation(config, body)?,
        Webhook::Validate => review_validation(config, body)?,
    };

    let verdict = review.response.verdict();
    let body =
        serde_json::to_vec(&review.response).map_err(AdmissionError::ResponseSerialization)?;
    Ok(EncodedReview {
        body,
        verdict,
        review,
    })
}

/// Run the mutation policy on an AdmissionReview body.
pub fn review_mutation(config: &AdmissionConfig, body: &[u8]) -> Result<Review, AdmissionError> {
    let request = decode_review(body)?;
    let namespace = request.namespace.clone().unwrap_or_default();
    info!(uid = %request.uid, namespace = %namespace, "AdmissionReview namespace");

    // The pod is only decoded for namespaces that need inspection
    let outcome = if config.whitelist.is_namespace_exempt(&namespace) {
        info!(namespace = %namespace, "Namespace is whitelisted");
        MutationOutcome::exempt()
    } else {
        let mut pod = decode_pod(request)?;
        mutate_pod(&mut pod, &namespace, config).map_err(AdmissionError::PatchSerialization)?
    };

    let response = AdmissionReviewResponse::from_mutation(&outcome)
        .map_err(AdmissionError::PatchSerialization)?;
    Ok(Review {
        response,
        rewrites: outcome.rewrites,
    })
}

/// Run the validation policy on an AdmissionReview body.
pub fn review_validation(config: &AdmissionConfig, body: &[u8]) -> Result<Review, AdmissionError> {
    let request = decode_review(body)?;
    let namespace = request.namespace.clone().unwrap_or_default();
    info!(uid = %request.uid, namespace = %namespace, "AdmissionReview namespace");

    let decision = if config.whitelist.is_namespace_exempt(&namespace) {
        info!(namespace = %namespace, "Namespace is whitelisted");
        ValidationDecision::Allowed
    } else {
        let pod = decode_pod(request)?;
        validate_pod(&pod, &namespace, &config.whitelist)
    };

    match decision.cause() {
        Some(cause) => warn!(namespace = %namespace, cause = %cause, "Admission request denied"),
        None => info!(
            namespace = %namespace,
            allowed = decision.is_allowed(),
            "Admission request decided"
        ),
    }

    Ok(Review::decided(AdmissionReviewResponse::from_validation(
        &decision,
    )))
}

fn decode_review(body: &[u8]) -> Result<AdmissionRequest<DynamicObject>, AdmissionError> {
    let review: AdmissionReview<DynamicObject> =
        serde_json::from_slice(body).map_err(AdmissionError::EnvelopeDecode)?;
    let request: AdmissionRequest<DynamicObject> = review.try_into()?;
    Ok(request)
}

fn decode_pod(request: AdmissionRequest<DynamicObject>) -> Result<Pod, AdmissionError> {
    let object = request
        .object
        .ok_or_else(|| AdmissionError::PodDecode("missing object in request".to_string()))?;
    serde_json::to_value(object)
        .and_then(serde_json::from_value::<Pod>)
        .map_err(|e| AdmissionError::PodDecode(e.to_string()))
}

/// Errors that can occur when running the webhook server
#[derive(Error, Debug)]
pub enum WebhookError {
    /// Certificate or key could not be loaded
    #[error("TLS configuration error: {0}")]
    TlsConfig(#[source] std::io::Error),

    /// The listener failed
    #[error("Webhook server error: {0}")]
    Server(#[source] std::io::Error),
}

/// Run the webhook server with TLS
///
/// Binds to 0.0.0.0 on `port` and serves `/mutate` and `/validate`.
/// The server is marked ready once the certificates are loaded.
///
/// # Arguments
/// * `state` - Shared admission configuration and health state
/// * `cert_path` - Path to TLS certificate file (PEM format)
/// * `key_path` - Path to TLS private key file (PEM format)
/// * `port` - Port to listen on
pub async fn run_webhook_server(
    state: Arc<WebhookState>,
    cert_path: &Path,
    key_path: &Path,
    port: u16,
) -> Result<(), WebhookError> {
    let health = state.health.clone();
    let app = create_webhook_router(state);

    let config = RustlsConfig::from_pem_file(cert_path, key_path)
        .await
        .map_err(WebhookError::TlsConfig)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(port = port, "Webhook server listening with TLS");
    health.set_ready(true).await;

    axum_server::bind_rustls(addr, config)
        .serve(app.into_make_service())
        .await
        .map_err(WebhookError::Server)?;

    Ok(())
}
