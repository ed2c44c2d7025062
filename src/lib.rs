//! kubenab library crate
//!
//! Admission webhooks that route pod images through a private registry.

pub mod config;
pub mod health;
pub mod webhooks;

pub use config::{AdmissionConfig, Args, ConfigError};
pub use health::HealthState;
pub use webhooks::{WebhookError, WebhookState, run_webhook_server};
