//! JSON Patch construction for image rewrites.
//!
//! Every rewritten container produces one `add` operation at its
//! population's path, valued with a one-element array holding the mutated
//! container. When at least one container was rewritten, a trailing
//! operation attaches the registry pull secret.

use json_patch::jsonptr::PointerBuf;
use json_patch::{AddOperation, Patch, PatchOperation};
use k8s_openapi::api::core::v1::Container;
use serde_json::json;

use super::ContainerKind;

/// Pod spec field holding image pull secrets
pub const IMAGE_PULL_SECRETS_FIELD: &str = "imagePullSecrets";

/// Accumulates patch operations for a single admission request.
#[derive(Debug, Default)]
pub struct PatchBuilder {
    operations: Vec<PatchOperation>,
}

impl PatchBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a rewritten container.
    pub fn add_container(
        &mut self,
        kind: ContainerKind,
        container: &Container,
    ) -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(std::slice::from_ref(container))?;
        self.operations.push(add_operation(kind.field(), value));
        Ok(())
    }

    /// Number of container operations recorded so far
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Finish the patch, appending the pull-secret operation.
    ///
    /// Returns `None` when no container was rewritten.
    pub fn build(mut self, pull_secret_name: &str) -> Option<Patch> {
        if self.operations.is_empty() {
            return None;
        }

        self.operations.push(add_operation(
            IMAGE_PULL_SECRETS_FIELD,
            json!([{ "name": pull_secret_name }]),
        ));
        Some(Patch(self.operations))
    }
}

fn add_operation(spec_field: &str, value: serde_json::Value) -> PatchOperation {
    PatchOperation::Add(AddOperation {
        path: PointerBuf::from_tokens(["spec", spec_field]),
        value,
    })
}
