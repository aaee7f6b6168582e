//! Diagnostic probes: three ordered test requests with short-circuiting.
//!
//! The runner never makes an insecure request unless both safer options are
//! proven broken. A check skipped by the short circuit is recorded as an
//! implicit pass, exactly as if it had succeeded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AdvisorError, Result};
use crate::filter::{CertFilter, RequestConfig};
use crate::store::{insecure_mode_active, TransientStore};

/// One blocking test request. Success means HTTP 200; transport failures and
/// certificate failures are deliberately not distinguished.
pub trait ProbeTransport {
    fn probe(&self, url: &str, config: &RequestConfig) -> bool;
}

/// Real transport backed by reqwest's blocking client.
#[derive(Debug, Default)]
pub struct HttpTransport;

impl HttpTransport {
    fn execute(&self, url: &str, config: &RequestConfig) -> Result<u16> {
        let mut builder = reqwest::blocking::Client::builder();
        if config.verify_certificates {
            let pem = std::fs::read(&config.ca_bundle)?;
            let certs = reqwest::Certificate::from_pem_bundle(&pem)
                .map_err(|e| AdvisorError::Bundle(e.to_string()))?;
            builder = builder.tls_built_in_root_certs(false);
            for cert in certs {
                builder = builder.add_root_certificate(cert);
            }
        } else {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let client = builder
            .build()
            .map_err(|e| AdvisorError::Network(e.to_string()))?;
        let response = client
            .get(url)
            .send()
            .map_err(|e| AdvisorError::Network(e.to_string()))?;
        Ok(response.status().as_u16())
    }
}

impl ProbeTransport for HttpTransport {
    fn probe(&self, url: &str, config: &RequestConfig) -> bool {
        match self.execute(url, config) {
            Ok(200) => true,
            Ok(code) => {
                log::debug!("probe to {} returned HTTP {}", url, code);
                false
            }
            Err(e) => {
                log::debug!("probe to {} failed: {}", url, e);
                false
            }
        }
    }
}

/// Outcome of the three ordered checks.
///
/// `overridden_ran` / `insecure_ran` record whether the check actually hit
/// the network or was short-circuited into an implicit pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SslChecks {
    pub unmodified: bool,
    pub overridden: bool,
    pub insecure: bool,
    pub overridden_ran: bool,
    pub insecure_ran: bool,
}

/// Runs the three checks against the fixed test endpoint.
pub struct DiagnosticRunner<'a, T: ProbeTransport> {
    transport: &'a T,
    filter: &'a CertFilter,
    store: &'a TransientStore,
    endpoint: &'a str,
    /// Whether the filter is registered at all. Follows the capability-probe
    /// decision: on a modern OpenSSL the filter is not registered, so the
    /// "overridden" check exercises an effectively unmodified request.
    filter_registered: bool,
}

impl<'a, T: ProbeTransport> DiagnosticRunner<'a, T> {
    pub fn new(
        transport: &'a T,
        filter: &'a CertFilter,
        store: &'a TransientStore,
        endpoint: &'a str,
        filter_registered: bool,
    ) -> Self {
        Self {
            transport,
            filter,
            store,
            endpoint,
            filter_registered,
        }
    }

    fn through_filter(&self, config: RequestConfig) -> RequestConfig {
        if self.filter_registered {
            self.filter.process(config, insecure_mode_active(self.store))
        } else {
            config
        }
    }

    /// Execute the checks in order, short-circuiting as soon as one passes.
    pub fn run(&self) -> SslChecks {
        // Check 1: unmodified request, filter disabled entirely.
        let base = RequestConfig::verifying(self.filter.default_bundle.clone());
        let unmodified = self.transport.probe(self.endpoint, &base);
        log::info!("unmodified check: {}", if unmodified { "pass" } else { "fail" });
        if unmodified {
            return SslChecks {
                unmodified: true,
                overridden: true,
                insecure: true,
                overridden_ran: false,
                insecure_ran: false,
            };
        }

        // Check 2: filter enabled, but the request opts out of insecure
        // forcing so verification stays on.
        let mut opted_out = base.clone();
        opted_out.no_insecure = true;
        let config = self.through_filter(opted_out);
        let overridden = self.transport.probe(self.endpoint, &config);
        log::info!("overridden check: {}", if overridden { "pass" } else { "fail" });
        if overridden {
            return SslChecks {
                unmodified,
                overridden: true,
                insecure: true,
                overridden_ran: true,
                insecure_ran: false,
            };
        }

        // Check 3: verification forced off. Only reached when both safer
        // options failed.
        let mut insecure_config = base;
        insecure_config.verify_certificates = false;
        let config = self.through_filter(insecure_config);
        let insecure = self.transport.probe(self.endpoint, &config);
        log::info!("insecure check: {}", if insecure { "pass" } else { "fail" });
        SslChecks {
            unmodified,
            overridden,
            insecure,
            overridden_ran: true,
            insecure_ran: true,
        }
    }
}

/// What the user should do, derived from the check results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Recommendation {
    /// Everything works without the advisor; it can be disabled and removed.
    DisableTool,
    /// The bundle override is what keeps requests working; keep the advisor
    /// active and upgrade the server software.
    KeepToolActive,
    /// Certificate verification is currently disabled, until `expires_at`.
    InsecureModeActive { expires_at: DateTime<Utc> },
    /// Only insecure requests work; offer the enable-insecure action.
    OfferInsecureMode,
    /// Nothing worked; likely an outbound connectivity problem.
    UnknownFailure,
}

/// Deterministic decision table over the three check results plus the
/// insecure-mode state.
pub fn recommend(checks: &SslChecks, insecure_expiry: Option<DateTime<Utc>>) -> Recommendation {
    if checks.unmodified {
        return Recommendation::DisableTool;
    }
    if checks.overridden {
        return Recommendation::KeepToolActive;
    }
    if checks.insecure {
        return match insecure_expiry {
            Some(expires_at) => Recommendation::InsecureModeActive { expires_at },
            None => Recommendation::OfferInsecureMode,
        };
    }
    Recommendation::UnknownFailure
}

#[cfg(test)]
pub(crate) mod test_transport {
    use super::*;
    use std::cell::RefCell;

    /// Transport that replays scripted results and records every request
    /// configuration it sees.
    pub struct ScriptedTransport {
        results: RefCell<Vec<bool>>,
        pub seen: RefCell<Vec<RequestConfig>>,
    }

    impl ScriptedTransport {
        pub fn new(results: &[bool]) -> Self {
            let mut reversed: Vec<bool> = results.to_vec();
            reversed.reverse();
            Self {
                results: RefCell::new(reversed),
                seen: RefCell::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> usize {
            self.seen.borrow().len()
        }
    }

    impl ProbeTransport for ScriptedTransport {
        fn probe(&self, _url: &str, config: &RequestConfig) -> bool {
            self.seen.borrow_mut().push(config.clone());
            self.results
                .borrow_mut()
                .pop()
                .expect("scripted transport ran out of results")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_transport::ScriptedTransport;
    use super::*;
    use crate::store::{enable_insecure_mode, insecure_mode_expires_at, INSECURE_MODE_TTL_SECS};
    use std::path::PathBuf;

    const ENDPOINT: &str = "https://api-v1.classicpress.net/?tls-advisor";

    fn fixture() -> (CertFilter, TransientStore) {
        let filter = CertFilter::new(
            PathBuf::from("/etc/ssl/certs/ca-certificates.crt"),
            PathBuf::from("certs/ca-bundle.crt"),
        );
        (filter, TransientStore::default())
    }

    fn run(transport: &ScriptedTransport, filter: &CertFilter, store: &TransientStore) -> SslChecks {
        DiagnosticRunner::new(transport, filter, store, ENDPOINT, true).run()
    }

    #[test]
    fn test_unmodified_pass_makes_exactly_one_call() {
        let (filter, store) = fixture();
        let transport = ScriptedTransport::new(&[true]);
        let checks = run(&transport, &filter, &store);
        assert_eq!(transport.calls(), 1);
        assert!(checks.unmodified && checks.overridden && checks.insecure);
        assert!(!checks.overridden_ran);
        assert!(!checks.insecure_ran);
        assert_eq!(recommend(&checks, None), Recommendation::DisableTool);
    }

    #[test]
    fn test_overridden_pass_stops_before_insecure() {
        let (filter, store) = fixture();
        let transport = ScriptedTransport::new(&[false, true]);
        let checks = run(&transport, &filter, &store);
        assert_eq!(transport.calls(), 2);
        assert!(!checks.unmodified);
        assert!(checks.overridden && checks.overridden_ran);
        assert!(checks.insecure && !checks.insecure_ran);
        assert_eq!(recommend(&checks, None), Recommendation::KeepToolActive);
    }

    #[test]
    fn test_overridden_check_uses_replacement_bundle_and_verifies() {
        let (filter, store) = fixture();
        // Even with insecure mode active, the overridden check opts out so
        // verification must stay on.
        enable_insecure_mode(&store, INSECURE_MODE_TTL_SECS);
        let transport = ScriptedTransport::new(&[false, true]);
        run(&transport, &filter, &store);

        let seen = transport.seen.borrow();
        // Check 1 ran with the filter disabled: default bundle, verifying.
        assert_eq!(seen[0].ca_bundle, filter.default_bundle);
        assert!(seen[0].verify_certificates);
        // Check 2 got the replacement bundle but kept verification on.
        assert_eq!(seen[1].ca_bundle, filter.replacement_bundle);
        assert!(seen[1].verify_certificates);
        assert!(seen[1].no_insecure);
    }

    #[test]
    fn test_insecure_check_runs_last_without_verification() {
        let (filter, store) = fixture();
        let transport = ScriptedTransport::new(&[false, false, true]);
        let checks = run(&transport, &filter, &store);
        assert_eq!(transport.calls(), 3);
        assert!(checks.insecure && checks.insecure_ran);

        let seen = transport.seen.borrow();
        assert!(!seen[2].verify_certificates);
    }

    #[test]
    fn test_all_failures_is_unknown() {
        let (filter, store) = fixture();
        let transport = ScriptedTransport::new(&[false, false, false]);
        let checks = run(&transport, &filter, &store);
        assert_eq!(recommend(&checks, None), Recommendation::UnknownFailure);
    }

    #[test]
    fn test_insecure_pass_offers_or_reports_mode() {
        let (filter, store) = fixture();
        let transport = ScriptedTransport::new(&[false, false, true]);
        let checks = run(&transport, &filter, &store);
        assert_eq!(
            recommend(&checks, None),
            Recommendation::OfferInsecureMode
        );

        enable_insecure_mode(&store, INSECURE_MODE_TTL_SECS);
        let expiry = insecure_mode_expires_at(&store).unwrap();
        assert_eq!(
            recommend(&checks, Some(expiry)),
            Recommendation::InsecureModeActive { expires_at: expiry }
        );
    }

    #[test]
    fn test_unregistered_filter_leaves_configs_alone() {
        let (filter, store) = fixture();
        let transport = ScriptedTransport::new(&[false, false, false]);
        DiagnosticRunner::new(&transport, &filter, &store, ENDPOINT, false).run();
        let seen = transport.seen.borrow();
        // No bundle substitution anywhere when the filter is not registered.
        for config in seen.iter() {
            assert_eq!(config.ca_bundle, filter.default_bundle);
        }
    }

    #[test]
    fn test_disable_recommendation_wins_regardless_of_mode() {
        let checks = SslChecks {
            unmodified: true,
            overridden: true,
            insecure: true,
            overridden_ran: false,
            insecure_ran: false,
        };
        assert_eq!(
            recommend(&checks, Some(Utc::now())),
            Recommendation::DisableTool
        );
    }
}
