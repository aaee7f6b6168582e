//! TLS Advisor: diagnose and mitigate outbound HTTPS failures caused by
//! outdated OpenSSL builds and the expired "DST Root CA X3" root certificate.
//!
//! The advisor probes the system's TLS backend, runs up to three live test
//! requests against a known endpoint (unmodified, with the bundled
//! certificate override, with verification disabled), and derives a
//! recommendation. Two mitigations are offered: substituting a bundled root
//! certificate for outgoing requests, and a strictly time-boxed insecure
//! mode that disables verification.
//!
//! # Examples
//!
//! ```no_run
//! use advisorlib::{Advisor, AdvisorConfig};
//!
//! let advisor = Advisor::new(AdvisorConfig::default());
//! let report = advisor.diagnose();
//! for row in &report.rows {
//!     println!("[{}] {}", row.status, row.message);
//! }
//! ```

pub mod advisor;
pub mod backend;
pub mod config;
pub mod error;
pub mod filter;
pub mod probe;
pub mod report;
pub mod server;
pub mod store;

pub use advisor::{report_json, Advisor};
pub use backend::{override_decision, should_override_ca, OverrideDecision, TlsBackend};
pub use config::{AdvisorConfig, ServerConfig};
pub use error::{AdvisorError, Result};
pub use filter::{CertFilter, RequestConfig};
pub use probe::{DiagnosticRunner, HttpTransport, ProbeTransport, Recommendation, SslChecks};
pub use report::{render_html, render_text, CheckRow, CheckStatus, DiagnosticReport};
pub use server::AdminServer;
pub use store::{Clock, SystemClock, TransientStore};
