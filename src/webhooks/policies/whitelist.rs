//! Namespace and registry whitelists.
//!
//! Both whitelists use substring matching, but in opposite directions:
//! - Namespaces: a namespace is exempt when a pattern equals or contains it
//! - Registries: an image is approved when it equals or contains a pattern

/// Delimiter used by the whitelist configuration strings
pub const WHITELIST_DELIMITER: char = ',';

/// Immutable whitelist configuration, built once at start-up.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WhitelistConfig {
    namespaces: Vec<String>,
    registries: Vec<String>,
}

impl WhitelistConfig {
    /// Build a whitelist from already-split pattern lists.
    pub fn new<N, R, S>(namespaces: N, registries: R) -> Self
    where
        N: IntoIterator<Item = S>,
        R: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            namespaces: namespaces.into_iter().map(Into::into).collect(),
            registries: registries.into_iter().map(Into::into).collect(),
        }
    }

    /// Build a whitelist from comma-delimited strings.
    ///
    /// Splitting keeps empty entries, so an empty string yields one empty
    /// pattern.
    pub fn parse(namespaces: &str, registries: &str) -> Self {
        Self::new(
            namespaces.split(WHITELIST_DELIMITER),
            registries.split(WHITELIST_DELIMITER),
        )
    }

    pub fn namespaces(&self) -> &[String] {
        &self.namespaces
    }

    pub fn registries(&self) -> &[String] {
        &self.registries
    }

    /// Whether the namespace is exempt from image checks.
    pub fn is_namespace_exempt(&self, namespace: &str) -> bool {
        self.namespaces
            .iter()
            .any(|pattern| pattern == namespace || pattern.contains(namespace))
    }

    /// Whether the image reference already targets an approved registry.
    pub fn is_registry_approved(&self, image: &str) -> bool {
        self.registries
            .iter()
            .any(|pattern| pattern == image || image.contains(pattern.as_str()))
    }

    /// Whether either list holds an empty pattern.
    ///
    /// An empty registry pattern approves every image.
    pub fn has_empty_patterns(&self) -> bool {
        self.namespaces
            .iter()
            .chain(self.registries.iter())
            .any(String::is_empty)
    }
}
