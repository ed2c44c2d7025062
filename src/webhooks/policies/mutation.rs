//! Image rewriting for the mutating webhook.
//!
//! Mutation never denies a request: images outside the registry whitelist
//! are rewritten to the configured registry and a pull secret is attached.

use json_patch::Patch;
use k8s_openapi::api::core::v1::{Container, Pod};
use tracing::{debug, info};

use super::ContainerKind;
use super::image::rewrite_image;
use super::patch::PatchBuilder;
use crate::config::AdmissionConfig;

/// A single image rewrite applied to a container
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageRewrite {
    pub kind: ContainerKind,
    pub container: String,
    pub from: String,
    pub to: String,
}

/// Result of running the mutation policy on a pod
#[derive(Debug, Default)]
pub struct MutationOutcome {
    /// Patch to return to the API server, if any container was rewritten
    pub patch: Option<Patch>,
    /// Rewrites in the order they were applied
    pub rewrites: Vec<ImageRewrite>,
    /// Whether the namespace skipped inspection
    pub namespace_exempt: bool,
}

impl MutationOutcome {
    /// Outcome for a whitelisted namespace
    pub fn exempt() -> Self {
        Self {
            namespace_exempt: true,
            ..Default::default()
        }
    }

    /// Mutation always admits the request.
    pub fn allowed(&self) -> bool {
        true
    }
}

/// Rewrite non-whitelisted images in `pod` and build the matching patch.
///
/// Containers are processed before init containers, each in declaration
/// order. The in-memory pod is updated with the rewritten images.
pub fn mutate_pod(
    pod: &mut Pod,
    namespace: &str,
    config: &AdmissionConfig,
) -> Result<MutationOutcome, serde_json::Error> {
    if config.whitelist.is_namespace_exempt(namespace) {
        info!(namespace = %namespace, "Namespace is whitelisted");
        return Ok(MutationOutcome::exempt());
    }

    let mut builder = PatchBuilder::new();
    let mut rewrites = Vec::new();

    if let Some(spec) = pod.spec.as_mut() {
        for container in spec.containers.iter_mut() {
            if let Some(rewrite) = rewrite_container(ContainerKind::Container, container, config) {
                builder.add_container(ContainerKind::Container, container)?;
                rewrites.push(rewrite);
            }
        }

        for container in spec.init_containers.iter_mut().flatten() {
            if let Some(rewrite) =
                rewrite_container(ContainerKind::InitContainer, container, config)
            {
                builder.add_container(ContainerKind::InitContainer, container)?;
                rewrites.push(rewrite);
            }
        }
    }

    Ok(MutationOutcome {
        patch: builder.build(&config.pull_secret_name),
        rewrites,
        namespace_exempt: false,
    })
}

/// Point the container at the private registry unless it already uses an
/// approved one.
fn rewrite_container(
    kind: ContainerKind,
    container: &mut Container,
    config: &AdmissionConfig,
) -> Option<ImageRewrite> {
    let image = container.image.clone().unwrap_or_default();
    debug!(kind = %kind, container = %container.name, image = %image, "Inspecting container image");

    if config.whitelist.is_registry_approved(&image) {
        debug!(image = %image, "Image is being pulled from Private Registry");
        return None;
    }

    let new_image = rewrite_image(&image, &config.registry_url);
    info!(
        kind = %kind,
        container = %container.name,
        from = %image,
        to = %new_image,
        "Changing image registry"
    );
    container.image = Some(new_image.clone());

    Some(ImageRewrite {
        kind,
        container: container.name.clone(),
        from: image,
        to: new_image,
    })
}
