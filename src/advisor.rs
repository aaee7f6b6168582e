//! The advisor itself: runs the capability probe, sequences the diagnostic
//! checks, and assembles the report.

use std::sync::Arc;

use crate::backend::{override_decision, OverrideDecision, TlsBackend};
use crate::config::AdvisorConfig;
use crate::filter::CertFilter;
use crate::probe::{recommend, DiagnosticRunner, HttpTransport, ProbeTransport};
use crate::report::{check_rows, DiagnosticReport};
use crate::store::{
    enable_insecure_mode, insecure_mode_expires_at, TransientStore, DASHBOARD_CACHE_KEY,
};

/// Ties the configuration, the shared transient store, and the filter
/// together behind one diagnosis entry point.
pub struct Advisor {
    config: AdvisorConfig,
    store: Arc<TransientStore>,
    filter: CertFilter,
}

impl Advisor {
    pub fn new(config: AdvisorConfig) -> Self {
        Self::with_store(config, Arc::new(TransientStore::default()))
    }

    /// Use an externally owned store (injected clock in tests, shared state
    /// in the admin server).
    pub fn with_store(config: AdvisorConfig, store: Arc<TransientStore>) -> Self {
        let filter = config.cert_filter();
        Self {
            config,
            store,
            filter,
        }
    }

    pub fn config(&self) -> &AdvisorConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<TransientStore> {
        &self.store
    }

    /// Turn on insecure mode for the configured window, clearing the cached
    /// dashboard entry as a best-effort side effect.
    pub fn enable_insecure_mode(&self) {
        enable_insecure_mode(&self.store, self.config.insecure_ttl_secs);
        self.store.delete(DASHBOARD_CACHE_KEY);
    }

    /// Run the full diagnosis with the real HTTP transport.
    pub fn diagnose(&self) -> DiagnosticReport {
        self.diagnose_with(&HttpTransport)
    }

    /// Run the full diagnosis, detecting the TLS backend fresh.
    pub fn diagnose_with<T: ProbeTransport>(&self, transport: &T) -> DiagnosticReport {
        self.diagnose_with_backend(transport, TlsBackend::detect())
    }

    /// Run the diagnosis against a known backend descriptor.
    pub fn diagnose_with_backend<T: ProbeTransport>(
        &self,
        transport: &T,
        backend: Option<TlsBackend>,
    ) -> DiagnosticReport {
        let decision = override_decision(backend.as_ref());
        log::info!("capability probe: {}", decision);

        if decision.is_terminal() {
            return DiagnosticReport {
                backend,
                decision,
                rows: Vec::new(),
                checks: None,
                recommendation: None,
                generated_at: self.store.now(),
            };
        }

        // The filter is only registered when the capability probe says the
        // override applies; the checks exercise exactly what a real request
        // would get.
        let registered = decision == OverrideDecision::OverrideNeeded;
        let runner = DiagnosticRunner::new(
            transport,
            &self.filter,
            &self.store,
            &self.config.test_endpoint,
            registered,
        );
        let checks = runner.run();

        let recommendation = recommend(&checks, insecure_mode_expires_at(&self.store));
        DiagnosticReport {
            backend,
            decision,
            rows: check_rows(&checks, &self.config.test_endpoint),
            checks: Some(checks),
            recommendation: Some(recommendation),
            generated_at: self.store.now(),
        }
    }
}

/// Serialize a report as pretty JSON.
pub fn report_json(report: &DiagnosticReport) -> crate::error::Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::test_transport::ScriptedTransport;
    use crate::probe::Recommendation;
    use crate::report::{CheckKind, CheckStatus};

    fn openssl_old() -> Option<TlsBackend> {
        Some(TlsBackend {
            library: "OpenSSL".into(),
            version: "1.0.1f".into(),
        })
    }

    fn advisor() -> Advisor {
        Advisor::new(AdvisorConfig::default())
    }

    #[test]
    fn test_terminal_backend_runs_no_checks() {
        let advisor = advisor();
        let transport = ScriptedTransport::new(&[]);
        let report = advisor.diagnose_with_backend(&transport, None);
        assert!(report.cannot_operate());
        assert_eq!(transport.calls(), 0);
        assert!(report.rows.is_empty());
        assert!(report.recommendation.is_none());
    }

    #[test]
    fn test_not_openssl_is_terminal() {
        let advisor = advisor();
        let transport = ScriptedTransport::new(&[]);
        let backend = Some(TlsBackend {
            library: "LibreSSL".into(),
            version: "2.8.3".into(),
        });
        let report = advisor.diagnose_with_backend(&transport, backend);
        assert!(report.cannot_operate());
        assert_eq!(transport.calls(), 0);
    }

    #[test]
    fn test_modern_openssl_still_runs_checks_unregistered() {
        let advisor = advisor();
        let transport = ScriptedTransport::new(&[false, false, false]);
        let backend = Some(TlsBackend {
            library: "OpenSSL".into(),
            version: "3.0.13".into(),
        });
        let report = advisor.diagnose_with_backend(&transport, backend);
        assert!(!report.cannot_operate());
        assert_eq!(transport.calls(), 3);
        // Filter not registered for a modern build: no bundle substitution.
        for config in transport.seen.borrow().iter() {
            assert_eq!(config.ca_bundle, advisor.config().default_bundle);
        }
    }

    #[test]
    fn test_clean_system_recommends_disable() {
        let advisor = advisor();
        let transport = ScriptedTransport::new(&[true]);
        let report = advisor.diagnose_with_backend(&transport, openssl_old());
        assert_eq!(transport.calls(), 1);
        assert_eq!(
            report.recommendation,
            Some(Recommendation::DisableTool)
        );
        assert_eq!(report.rows.len(), 1);
    }

    #[test]
    fn test_broken_system_with_working_override() {
        let advisor = advisor();
        let transport = ScriptedTransport::new(&[false, true]);
        let report = advisor.diagnose_with_backend(&transport, openssl_old());
        assert_eq!(transport.calls(), 2);
        assert_eq!(
            report.recommendation,
            Some(Recommendation::KeepToolActive)
        );
    }

    #[test]
    fn test_enable_insecure_mode_flows_into_recommendation() {
        let advisor = advisor();
        advisor.enable_insecure_mode();

        let transport = ScriptedTransport::new(&[false, false, true]);
        let report = advisor.diagnose_with_backend(&transport, openssl_old());
        match report.recommendation {
            Some(Recommendation::InsecureModeActive { .. }) => {}
            other => panic!("expected InsecureModeActive, got {:?}", other),
        }
        // The warning-severity row is present for the executed insecure check.
        let last = report.rows.last().unwrap();
        assert_eq!(last.kind, CheckKind::Insecure);
        assert_eq!(last.status, CheckStatus::Warning);
    }

    #[test]
    fn test_report_serializes_to_json() {
        let advisor = advisor();
        let transport = ScriptedTransport::new(&[true]);
        let report = advisor.diagnose_with_backend(&transport, openssl_old());
        let json = report_json(&report).unwrap();
        assert!(json.contains("\"decision\""));
        assert!(json.contains("\"recommendation\""));
    }
}
