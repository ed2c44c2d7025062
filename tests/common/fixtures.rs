#![allow(dead_code)]

//! Test fixtures and builder patterns for AdmissionReview requests.

use serde_json::{Value, json};

/// Builder for creating pod AdmissionReview request bodies.
///
/// # Example
/// ```
/// let body = PodReviewBuilder::new("default")
///     .container("nginx:latest")
///     .init_container("busybox")
///     .build();
/// ```
#[derive(Clone, Debug)]
pub struct PodReviewBuilder {
    namespace: String,
    uid: String,
    containers: Vec<String>,
    init_containers: Vec<String>,
}

impl PodReviewBuilder {
    /// Create a new builder for a pod in the given namespace.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            uid: "705ab4f5-6393-11e8-b7cc-42010a800002".to_string(),
            containers: Vec::new(),
            init_containers: Vec::new(),
        }
    }

    /// Add a container with the given image.
    pub fn container(mut self, image: impl Into<String>) -> Self {
        self.containers.push(image.into());
        self
    }

    /// Add an init container with the given image.
    pub fn init_container(mut self, image: impl Into<String>) -> Self {
        self.init_containers.push(image.into());
        self
    }

    /// The pod object as JSON.
    pub fn pod(&self) -> Value {
        let containers = |images: &[String], prefix: &str| -> Vec<Value> {
            images
                .iter()
                .enumerate()
                .map(|(i, image)| json!({ "name": format!("{}-{}", prefix, i), "image": image }))
                .collect()
        };

        let mut spec = json!({ "containers": containers(&self.containers, "app") });
        if !self.init_containers.is_empty() {
            spec["initContainers"] = Value::Array(containers(&self.init_containers, "init"));
        }

        json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": { "name": "test-pod", "namespace": self.namespace },
            "spec": spec,
        })
    }

    /// Serialized AdmissionReview body.
    pub fn build(&self) -> Vec<u8> {
        let review = json!({
            "apiVersion": "admission.k8s.io/v1",
            "kind": "AdmissionReview",
            "request": {
                "uid": self.uid,
                "kind": { "group": "", "version": "v1", "kind": "Pod" },
                "resource": { "group": "", "version": "v1", "resource": "pods" },
                "namespace": self.namespace,
                "operation": "CREATE",
                "userInfo": { "username": "system:admin" },
                "object": self.pod(),
            }
        });
        serde_json::to_vec(&review).expect("AdmissionReview fixture should serialize")
    }
}
