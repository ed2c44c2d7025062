//! Process configuration.
//!
//! Every setting can be given as a command-line flag or through its
//! environment variable. The admission settings are validated once at
//! start-up and are read-only afterwards.

use std::path::PathBuf;

use clap::Parser;
use thiserror::Error;

use crate::webhooks::policies::WhitelistConfig;

/// Default path to webhook TLS certificate
pub const DEFAULT_TLS_CERT_PATH: &str = "/etc/admission-controller/tls/tls.crt";
/// Default path to webhook TLS private key
pub const DEFAULT_TLS_KEY_PATH: &str = "/etc/admission-controller/tls/tls.key";
/// Default webhook server port
pub const DEFAULT_WEBHOOK_PORT: u16 = 443;
/// Default health server port
pub const DEFAULT_HEALTH_PORT: u16 = 8080;

/// Errors in the start-up configuration
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// A required value is empty
    #[error("{0} must not be empty")]
    MissingValue(&'static str),

    /// The registry URL cannot be used as an image prefix
    #[error("invalid docker registry url {0:?}: expected a host such as myregistry.io[:port][/path]")]
    InvalidRegistryUrl(String),
}

/// Command-line arguments
#[derive(Parser, Debug, Clone)]
#[command(name = "kubenab")]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Registry that non-whitelisted images are rewritten to.
    #[arg(long, env = "DOCKER_REGISTRY_URL")]
    pub docker_registry_url: String,

    /// Name of the image pull secret attached to rewritten pods.
    #[arg(long, env = "REGISTRY_SECRET_NAME")]
    pub registry_secret_name: String,

    /// Comma-separated registries that images may be pulled from.
    #[arg(long, env = "WHITELIST_REGISTRIES", default_value = "")]
    pub whitelist_registries: String,

    /// Comma-separated namespaces exempt from image checks.
    #[arg(long, env = "WHITELIST_NAMESPACES", default_value = "")]
    pub whitelist_namespaces: String,

    /// TLS certificate file.
    #[arg(long, env = "TLS_CERT_FILE", default_value = DEFAULT_TLS_CERT_PATH)]
    pub tls_cert: PathBuf,

    /// TLS key file.
    #[arg(long, env = "TLS_KEY_FILE", default_value = DEFAULT_TLS_KEY_PATH)]
    pub tls_key: PathBuf,

    /// Port of the admission webhook (TLS).
    #[arg(long, env = "WEBHOOK_PORT", default_value_t = DEFAULT_WEBHOOK_PORT)]
    pub port: u16,

    /// Port of the health and metrics server.
    #[arg(long, env = "HEALTH_PORT", default_value_t = DEFAULT_HEALTH_PORT)]
    pub health_port: u16,
}

impl Args {
    /// Build the validated admission configuration.
    pub fn admission_config(&self) -> Result<AdmissionConfig, ConfigError> {
        AdmissionConfig::new(
            self.docker_registry_url.trim(),
            self.registry_secret_name.trim(),
            WhitelistConfig::parse(&self.whitelist_namespaces, &self.whitelist_registries),
        )
    }
}

/// Settings shared read-only by every admission request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdmissionConfig {
    /// Namespace and registry whitelists
    pub whitelist: WhitelistConfig,
    /// Registry host that images are rewritten to
    pub registry_url: String,
    /// Image pull secret attached to rewritten pods
    pub pull_secret_name: String,
}

impl AdmissionConfig {
    pub fn new(
        registry_url: impl Into<String>,
        pull_secret_name: impl Into<String>,
        whitelist: WhitelistConfig,
    ) -> Result<Self, ConfigError> {
        let registry_url = registry_url.into();
        let pull_secret_name = pull_secret_name.into();

        if registry_url.is_empty() {
            return Err(ConfigError::MissingValue("DOCKER_REGISTRY_URL"));
        }
        if pull_secret_name.is_empty() {
            return Err(ConfigError::MissingValue("REGISTRY_SECRET_NAME"));
        }
        if registry_url.contains("://") || registry_url.starts_with('/') || registry_url.ends_with('/')
        {
            return Err(ConfigError::InvalidRegistryUrl(registry_url));
        }

        Ok(Self {
            whitelist,
            registry_url,
            pull_secret_name,
        })
    }
}
