//! Configuration loading for TLS Advisor.
//!
//! All settings have working defaults; a TOML file can override any of them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AdvisorError, Result};
use crate::filter::CertFilter;
use crate::store::INSECURE_MODE_TTL_SECS;

/// Fixed HTTPS endpoint used by all diagnostic probes.
pub const DEFAULT_TEST_ENDPOINT: &str = "https://api-v1.classicpress.net/?tls-advisor";

/// Admin server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (default: "127.0.0.1")
    pub bind_address: String,
    /// Port (default: 8990)
    pub port: u16,
    /// Whether to log requests (default: true)
    pub request_logging: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".into(),
            port: 8990,
            request_logging: true,
        }
    }
}

/// Advisor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisorConfig {
    /// Test endpoint hit by the diagnostic probes.
    pub test_endpoint: String,
    /// The runtime's default certificate bundle path.
    pub default_bundle: PathBuf,
    /// The bundled alternate root-certificate file.
    pub replacement_bundle: PathBuf,
    /// Insecure-mode time-to-live in seconds.
    pub insecure_ttl_secs: i64,
    /// Admin server settings.
    pub server: ServerConfig,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            test_endpoint: DEFAULT_TEST_ENDPOINT.into(),
            default_bundle: PathBuf::from("/etc/ssl/certs/ca-certificates.crt"),
            replacement_bundle: PathBuf::from("certs/ca-bundle.crt"),
            insecure_ttl_secs: INSECURE_MODE_TTL_SECS,
            server: ServerConfig::default(),
        }
    }
}

impl AdvisorConfig {
    /// Load from a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AdvisorError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Parse from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| AdvisorError::Configuration(e.to_string()))
    }

    /// The filter configured by these bundle paths.
    pub fn cert_filter(&self) -> CertFilter {
        CertFilter::new(self.default_bundle.clone(), self.replacement_bundle.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AdvisorConfig::default();
        assert_eq!(config.test_endpoint, DEFAULT_TEST_ENDPOINT);
        assert_eq!(config.insecure_ttl_secs, 180);
        assert_eq!(config.server.port, 8990);
        assert_eq!(config.server.bind_address, "127.0.0.1");
    }

    #[test]
    fn test_partial_toml_overrides() {
        let config = AdvisorConfig::from_toml(
            r#"
            test_endpoint = "https://example.com/probe"
            insecure_ttl_secs = 60

            [server]
            port = 9000
            "#,
        )
        .unwrap();
        assert_eq!(config.test_endpoint, "https://example.com/probe");
        assert_eq!(config.insecure_ttl_secs, 60);
        assert_eq!(config.server.port, 9000);
        // Untouched fields keep their defaults.
        assert_eq!(
            config.default_bundle,
            PathBuf::from("/etc/ssl/certs/ca-certificates.crt")
        );
        assert!(config.server.request_logging);
    }

    #[test]
    fn test_invalid_toml_is_a_configuration_error() {
        let err = AdvisorConfig::from_toml("not [ valid").unwrap_err();
        assert!(err.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_cert_filter_paths() {
        let config = AdvisorConfig::default();
        let filter = config.cert_filter();
        assert_eq!(filter.default_bundle, config.default_bundle);
        assert_eq!(filter.replacement_bundle, config.replacement_bundle);
    }
}
