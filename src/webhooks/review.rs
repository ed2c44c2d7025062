//! AdmissionReview response envelope.
//!
//! Responses carry only the decision: the request uid, apiVersion and kind
//! are not echoed back.

use json_patch::Patch;
use k8s_openapi::ByteString;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{Status, StatusCause, StatusDetails};
use serde::{Deserialize, Serialize};

use crate::webhooks::policies::{MutationOutcome, ValidationDecision};

/// Patch type marker for JSON Patch documents
pub const JSON_PATCH_TYPE: &str = "JSONPatch";
/// Status reason used for rejected pods
pub const STATUS_REASON_INVALID: &str = "Invalid";

/// Outgoing AdmissionReview
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct AdmissionReviewResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<AdmissionDecision>,
}

/// Decision part of the outgoing AdmissionReview
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionDecision {
    #[serde(default)]
    pub uid: String,
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<ByteString>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch_type: Option<String>,
    #[serde(default, rename = "status", skip_serializing_if = "Option::is_none")]
    pub result: Option<Status>,
}

/// How a request was decided, for logging and metrics
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Allowed,
    Patched,
    Denied,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Allowed => "allowed",
            Verdict::Patched => "patched",
            Verdict::Denied => "denied",
        }
    }
}

impl AdmissionReviewResponse {
    fn wrap(decision: AdmissionDecision) -> Self {
        Self {
            response: Some(decision),
        }
    }

    /// Envelope for a mutation outcome.
    ///
    /// Fails only if the patch cannot be serialized.
    pub fn from_mutation(outcome: &MutationOutcome) -> Result<Self, serde_json::Error> {
        let mut decision = AdmissionDecision {
            allowed: outcome.allowed(),
            ..Default::default()
        };

        if let Some(patch) = non_empty(outcome.patch.as_ref()) {
            decision.patch = Some(ByteString(serde_json::to_vec(patch)?));
            decision.patch_type = Some(JSON_PATCH_TYPE.to_string());
        }

        Ok(Self::wrap(decision))
    }

    /// Envelope for a validation decision.
    pub fn from_validation(decision: &ValidationDecision) -> Self {
        Self::wrap(AdmissionDecision {
            allowed: decision.is_allowed(),
            result: decision.cause().map(invalid_status),
            ..Default::default()
        })
    }

    pub fn allowed(&self) -> bool {
        self.response.as_ref().is_some_and(|r| r.allowed)
    }

    /// Decoded patch document, if any
    pub fn patch(&self) -> Option<&[u8]> {
        self.response
            .as_ref()
            .and_then(|r| r.patch.as_ref())
            .map(|p| p.0.as_slice())
    }

    /// First status cause message, if any
    pub fn cause(&self) -> Option<&str> {
        self.response
            .as_ref()
            .and_then(|r| r.result.as_ref())
            .and_then(|s| s.details.as_ref())
            .and_then(|d| d.causes.as_ref())
            .and_then(|c| c.first())
            .and_then(|c| c.message.as_deref())
    }

    pub fn verdict(&self) -> Verdict {
        match (self.allowed(), self.patch().is_some()) {
            (true, true) => Verdict::Patched,
            (true, false) => Verdict::Allowed,
            (false, _) => Verdict::Denied,
        }
    }
}

fn non_empty(patch: Option<&Patch>) -> Option<&Patch> {
    patch.filter(|p| !p.0.is_empty())
}

/// Structured rejection carrying `message` as its only cause
fn invalid_status(message: &str) -> Status {
    Status {
        reason: Some(STATUS_REASON_INVALID.to_string()),
        details: Some(StatusDetails {
            causes: Some(vec![StatusCause {
                message: Some(message.to_string()),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}
