//! Admission webhooks for pod container images.
//!
//! - `/mutate`: rewrites images to the private registry and attaches a pull secret
//! - `/validate`: rejects pods with images from non-whitelisted registries

pub mod error;
pub mod policies;
pub mod review;
mod server;

pub use error::AdmissionError;
pub use policies::{MutationOutcome, ValidationDecision, WhitelistConfig};
pub use review::{AdmissionDecision, AdmissionReviewResponse, Verdict};
pub use server::{
    EncodedReview, Review, Webhook, WebhookError, WebhookState, create_webhook_router,
    handle_review, review_mutation, review_validation, run_webhook_server,
};
