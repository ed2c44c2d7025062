// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Property-based tests for kubenab.
//!
//! Uses proptest to generate random images, namespaces and pods and verify
//! the admission invariants.

use k8s_openapi::api::core::v1::{Container, Pod, PodSpec};
use proptest::prelude::*;

use kubenab::AdmissionConfig;
use kubenab::webhooks::policies::{
    ValidationDecision, WhitelistConfig, mutate_pod, rewrite_image, validate_pod,
};

const PRIVATE_REGISTRY: &str = "myregistry.io";

/// Strategy for image references with zero to three path segments before the name.
fn any_image() -> impl Strategy<Value = String> {
    (
        prop::collection::vec("[a-z][a-z0-9.-]{0,8}", 0..4),
        "[a-z][a-z0-9-]{0,8}",
        prop::option::of("[a-z0-9.]{1,6}"),
    )
        .prop_map(|(prefix, name, tag)| {
            let mut image = prefix.join("/");
            if !image.is_empty() {
                image.push('/');
            }
            image.push_str(&name);
            if let Some(tag) = tag {
                image.push(':');
                image.push_str(&tag);
            }
            image
        })
}

/// Strategy for namespace names.
fn any_namespace() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,12}"
}

fn pod(containers: &[String], init_containers: &[String]) -> Pod {
    let build = |images: &[String]| -> Vec<Container> {
        images
            .iter()
            .enumerate()
            .map(|(i, image)| Container {
                name: format!("c{}", i),
                image: Some(image.clone()),
                ..Default::default()
            })
            .collect()
    };
    Pod {
        spec: Some(PodSpec {
            containers: build(containers),
            init_containers: Some(build(init_containers)),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn config() -> AdmissionConfig {
    AdmissionConfig::new(
        PRIVATE_REGISTRY,
        "reg-secret",
        WhitelistConfig::new(["kube-system"], [PRIVATE_REGISTRY]),
    )
    .unwrap()
}

/// Rewrites target a registry port while the whitelist names only the host.
fn mirror_config() -> AdmissionConfig {
    AdmissionConfig::new(
        "mirror.corp:5000",
        "reg-secret",
        WhitelistConfig::new(["kube-system"], ["mirror.corp"]),
    )
    .unwrap()
}

proptest! {
    /// Property: a namespace contained in a whitelist pattern is exempt.
    #[test]
    fn test_namespace_substring_is_exempt(
        prefix in "[a-z]{0,4}",
        namespace in any_namespace(),
        suffix in "[a-z]{0,4}"
    ) {
        let pattern = format!("{}{}{}", prefix, namespace, suffix);
        let whitelist = WhitelistConfig::new([pattern.as_str()], [PRIVATE_REGISTRY]);
        prop_assert!(whitelist.is_namespace_exempt(&namespace));
    }

    /// Property: an image containing a registry pattern is approved.
    #[test]
    fn test_image_containing_pattern_is_approved(image in any_image()) {
        let qualified = format!("{}/{}", PRIVATE_REGISTRY, image);
        let whitelist = WhitelistConfig::new(["kube-system"], [PRIVATE_REGISTRY]);
        prop_assert!(whitelist.is_registry_approved(&qualified));
    }

    /// Property: the rewritten image always targets the private registry
    /// and keeps everything after the original host.
    #[test]
    fn test_rewrite_targets_registry(image in any_image()) {
        let rewritten = rewrite_image(&image, PRIVATE_REGISTRY);
        let prefix = format!("{}/", PRIVATE_REGISTRY);
        prop_assert!(rewritten.starts_with(&prefix));

        let segments = image.split('/').count();
        if segments < 3 {
            prop_assert_eq!(&rewritten[prefix.len()..], image.as_str());
        } else {
            let (_, rest) = image.split_once('/').unwrap();
            prop_assert_eq!(&rewritten[prefix.len()..], rest);
        }
    }

    /// Property: mutation is always allowed, emits one operation per
    /// unapproved image plus a trailing pull-secret operation.
    #[test]
    fn test_mutation_operation_count(
        containers in prop::collection::vec(any_image(), 0..4),
        init_containers in prop::collection::vec(any_image(), 0..3),
        namespace in any_namespace()
    ) {
        let config = config();
        prop_assume!(!config.whitelist.is_namespace_exempt(&namespace));

        let unapproved = containers
            .iter()
            .chain(init_containers.iter())
            .filter(|image| !config.whitelist.is_registry_approved(image))
            .count();

        let mut pod = pod(&containers, &init_containers);
        let outcome = mutate_pod(&mut pod, &namespace, &config).unwrap();
        prop_assert!(outcome.allowed());
        prop_assert_eq!(outcome.rewrites.len(), unapproved);

        match outcome.patch {
            Some(patch) => prop_assert_eq!(patch.0.len(), unapproved + 1),
            None => prop_assert_eq!(unapproved, 0),
        }
    }

    /// Property: mutating an already mutated pod produces no further patch.
    #[test]
    fn test_mutation_is_idempotent(
        containers in prop::collection::vec(any_image(), 1..4),
        init_containers in prop::collection::vec(any_image(), 0..3)
    ) {
        let config = config();
        let mut pod = pod(&containers, &init_containers);
        mutate_pod(&mut pod, "default", &config).unwrap();

        let second = mutate_pod(&mut pod, "default", &config).unwrap();
        prop_assert!(second.patch.is_none());
    }

    /// Property: mutation is idempotent when the whitelist entry is contained
    /// in the rewrite target rather than equal to it.
    #[test]
    fn test_mutation_is_idempotent_for_containing_target(
        containers in prop::collection::vec(any_image(), 1..4),
        init_containers in prop::collection::vec(any_image(), 0..3)
    ) {
        let config = mirror_config();
        let mut pod = pod(&containers, &init_containers);
        mutate_pod(&mut pod, "default", &config).unwrap();

        let second = mutate_pod(&mut pod, "default", &config).unwrap();
        prop_assert!(second.patch.is_none());
        prop_assert!(second.rewrites.is_empty());
    }

    /// Property: validation denies exactly when some image is unapproved,
    /// naming the first unapproved image verbatim.
    #[test]
    fn test_validation_matches_first_unapproved_image(
        containers in prop::collection::vec(any_image(), 0..4),
        init_containers in prop::collection::vec(any_image(), 0..3)
    ) {
        let config = config();
        let pod = pod(&containers, &init_containers);
        let decision = validate_pod(&pod, "default", &config.whitelist);

        let first_unapproved = containers
            .iter()
            .chain(init_containers.iter())
            .find(|image| !config.whitelist.is_registry_approved(image));

        match first_unapproved {
            Some(image) => {
                let cause = decision.cause().unwrap();
                let suffix = format!(": {}", image);
                prop_assert!(cause.ends_with(&suffix), "cause {:?}", cause);
            }
            None if containers.is_empty() && init_containers.is_empty() => {
                prop_assert_eq!(decision, ValidationDecision::Denied { cause: None });
            }
            None => prop_assert!(decision.is_allowed()),
        }
    }

    /// Property: validation is deterministic for the same input.
    #[test]
    fn test_validation_deterministic(
        containers in prop::collection::vec(any_image(), 0..4),
        namespace in any_namespace()
    ) {
        let whitelist = config().whitelist;
        let pod = pod(&containers, &[]);
        prop_assert_eq!(
            validate_pod(&pod, &namespace, &whitelist),
            validate_pod(&pod, &namespace, &whitelist)
        );
    }
}
