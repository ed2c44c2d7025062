//! Error types for admission request handling.
//!
//! Malformed input is answered with `400 Bad Request`; failing to encode a
//! computed response is an internal error. No error is retried.

use axum::extract::rejection::BytesRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kube::core::admission::ConvertAdmissionReviewError;
use thiserror::Error;

/// Error type for admission request handling
#[derive(Error, Debug)]
pub enum AdmissionError {
    /// The request body could not be read
    #[error("Failed to read request body: {0}")]
    BodyRead(#[from] BytesRejection),

    /// The body is not an AdmissionReview
    #[error("Failed to decode AdmissionReview: {0}")]
    EnvelopeDecode(#[source] serde_json::Error),

    /// The AdmissionReview has no request
    #[error("Invalid AdmissionReview: {0}")]
    MissingRequest(#[from] ConvertAdmissionReviewError),

    /// The request object is missing or is not a pod
    #[error("Failed to decode pod: {0}")]
    PodDecode(String),

    /// The patch document could not be serialized
    #[error("Failed to serialize patch: {0}")]
    PatchSerialization(#[source] serde_json::Error),

    /// The response envelope could not be serialized
    #[error("Failed to serialize AdmissionReview response: {0}")]
    ResponseSerialization(#[source] serde_json::Error),
}

impl AdmissionError {
    /// HTTP status returned to the API server
    pub fn status_code(&self) -> StatusCode {
        match self {
            AdmissionError::ResponseSerialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AdmissionError::BodyRead(_)
            | AdmissionError::EnvelopeDecode(_)
            | AdmissionError::MissingRequest(_)
            | AdmissionError::PodDecode(_)
            | AdmissionError::PatchSerialization(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Short label used in metrics
    pub fn kind(&self) -> &'static str {
        match self {
            AdmissionError::BodyRead(_) => "body_read",
            AdmissionError::EnvelopeDecode(_) => "envelope_decode",
            AdmissionError::MissingRequest(_) => "missing_request",
            AdmissionError::PodDecode(_) => "pod_decode",
            AdmissionError::PatchSerialization(_) => "patch_serialization",
            AdmissionError::ResponseSerialization(_) => "response_serialization",
        }
    }
}

impl IntoResponse for AdmissionError {
    fn into_response(self) -> Response {
        self.status_code().into_response()
    }
}
