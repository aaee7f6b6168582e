//! Outgoing request mutation: bundle substitution and insecure forcing.
//!
//! While registered, every outgoing HTTPS request passes through
//! [`CertFilter::process`], not just the diagnostic probes. The transform is
//! pure: it returns a modified configuration and touches nothing else.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Configuration of one outgoing HTTPS request, as seen by the filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestConfig {
    /// Certificate-authority bundle used to validate the server certificate.
    pub ca_bundle: PathBuf,
    /// Whether the server certificate is verified at all.
    pub verify_certificates: bool,
    /// Per-request opt-out: exempt this request from insecure-mode forcing.
    pub no_insecure: bool,
}

impl RequestConfig {
    /// A verifying request against the given bundle, with no opt-out set.
    pub fn verifying(ca_bundle: PathBuf) -> Self {
        Self {
            ca_bundle,
            verify_certificates: true,
            no_insecure: false,
        }
    }
}

/// The certificate-override filter.
#[derive(Debug, Clone)]
pub struct CertFilter {
    /// The runtime's default bundle path. Only requests still pointing at
    /// this exact path get the substitute.
    pub default_bundle: PathBuf,
    /// The bundled alternate root-certificate file.
    pub replacement_bundle: PathBuf,
}

impl CertFilter {
    pub fn new(default_bundle: PathBuf, replacement_bundle: PathBuf) -> Self {
        Self {
            default_bundle,
            replacement_bundle,
        }
    }

    /// Transform one outgoing request configuration.
    ///
    /// - A request using the default bundle gets the replacement bundle;
    ///   any other path is left alone.
    /// - With insecure mode active, verification is forced off unless the
    ///   request set the opt-out flag.
    pub fn process(&self, mut config: RequestConfig, insecure_active: bool) -> RequestConfig {
        if config.ca_bundle == self.default_bundle {
            log::debug!(
                "substituting certificate bundle: {} -> {}",
                self.default_bundle.display(),
                self.replacement_bundle.display()
            );
            config.ca_bundle = self.replacement_bundle.clone();
        }
        if insecure_active && !config.no_insecure {
            config.verify_certificates = false;
        }
        config
    }
}
