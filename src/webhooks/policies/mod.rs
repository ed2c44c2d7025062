//! Admission policies for pod container images.
//!
//! - Mutation: rewrite images that do not come from an approved registry
//! - Validation: reject pods whose images do not come from an approved registry
//!
//! Both policies are bypassed for whitelisted namespaces.

pub mod image;
pub mod mutation;
pub mod patch;
pub mod validation;
pub mod whitelist;

use std::fmt;

use k8s_openapi::api::core::v1::{Container, Pod};

pub use image::rewrite_image;
pub use mutation::{ImageRewrite, MutationOutcome, mutate_pod};
pub use patch::PatchBuilder;
pub use validation::{ValidationDecision, validate_pod};
pub use whitelist::WhitelistConfig;

/// The two container populations of a pod
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum ContainerKind {
    Container,
    InitContainer,
}

impl ContainerKind {
    /// Pod spec field holding this population
    pub fn field(&self) -> &'static str {
        match self {
            ContainerKind::Container => "containers",
            ContainerKind::InitContainer => "initContainers",
        }
    }
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field())
    }
}

/// Containers followed by init containers, in declaration order.
pub fn pod_containers(pod: &Pod) -> impl Iterator<Item = (ContainerKind, &Container)> + '_ {
    let spec = pod.spec.as_ref();
    let containers = spec
        .into_iter()
        .flat_map(|spec| spec.containers.iter())
        .map(|container| (ContainerKind::Container, container));
    let init_containers = spec
        .into_iter()
        .flat_map(|spec| spec.init_containers.iter().flatten())
        .map(|container| (ContainerKind::InitContainer, container));
    containers.chain(init_containers)
}
