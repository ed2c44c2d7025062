//! Registry enforcement for the validating webhook.
//!
//! A pod is rejected as soon as one of its images does not come from a
//! whitelisted registry. Containers and init containers are inspected as a
//! single sequence, so the first failure in either population ends the
//! inspection.

use k8s_openapi::api::core::v1::Pod;
use tracing::{debug, info, warn};

use super::{WhitelistConfig, pod_containers};

/// Prefix of the denial cause for images outside the whitelist
pub const UNAPPROVED_IMAGE_MESSAGE: &str = "Image is not being pulled from Private Registry";

/// Decision of the validation policy
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValidationDecision {
    Allowed,
    Denied {
        /// Human-readable cause; `None` when nothing was inspected
        cause: Option<String>,
    },
}

impl ValidationDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, ValidationDecision::Allowed)
    }

    /// Denial cause, if any
    pub fn cause(&self) -> Option<&str> {
        match self {
            ValidationDecision::Allowed => None,
            ValidationDecision::Denied { cause } => cause.as_deref(),
        }
    }

    fn unapproved_image(image: &str) -> Self {
        ValidationDecision::Denied {
            cause: Some(format!("{}: {}", UNAPPROVED_IMAGE_MESSAGE, image)),
        }
    }
}

/// Check every container image of `pod` against the registry whitelist.
///
/// The decision starts as denied and only becomes allowed through an exempt
/// namespace or an approved image. A pod with no containers in a
/// non-exempt namespace is therefore denied without a cause.
pub fn validate_pod(pod: &Pod, namespace: &str, whitelist: &WhitelistConfig) -> ValidationDecision {
    if whitelist.is_namespace_exempt(namespace) {
        info!(namespace = %namespace, "Namespace is whitelisted");
        return ValidationDecision::Allowed;
    }

    let mut decision = ValidationDecision::Denied { cause: None };
    for (kind, container) in pod_containers(pod) {
        let image = container.image.as_deref().unwrap_or_default();
        debug!(kind = %kind, container = %container.name, image = %image, "Inspecting container image");

        if !whitelist.is_registry_approved(image) {
            warn!(kind = %kind, image = %image, "{}", UNAPPROVED_IMAGE_MESSAGE);
            return ValidationDecision::unapproved_image(image);
        }

        debug!(image = %image, "Image is being pulled from Private Registry");
        decision = ValidationDecision::Allowed;
    }

    decision
}
