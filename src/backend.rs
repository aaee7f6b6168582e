//! TLS backend detection and the certificate-override decision.
//!
//! Detects which TLS library backs the system's HTTP tooling and decides
//! whether the expired-root workaround applies. OpenSSL builds older than
//! 1.0.2 cannot build an alternate trust path around the expired
//! "DST Root CA X3" certificate, so only those builds need the bundled
//! certificate override.

use serde::{Deserialize, Serialize};

/// First OpenSSL release that handles the expired root correctly.
pub const MIN_SAFE_OPENSSL: [u64; 3] = [1, 0, 2];

/// The TLS library reported by the runtime environment.
///
/// Derived, never stored; read fresh on every diagnosis so that a server
/// upgrade is picked up immediately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsBackend {
    /// Library name as reported (e.g. "OpenSSL", "LibreSSL").
    pub library: String,
    /// Version string as reported (e.g. "1.0.1f", "3.0.13").
    pub version: String,
}

impl std::fmt::Display for TlsBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.library, self.version)
    }
}

impl TlsBackend {
    /// Detect the TLS backend by asking the system `openssl` tool.
    ///
    /// Returns `None` when the tool is missing or its output is not
    /// recognizable, which callers treat as "secure transport capability
    /// absent".
    pub fn detect() -> Option<Self> {
        let output = std::process::Command::new("openssl")
            .arg("version")
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        let text = String::from_utf8_lossy(&output.stdout);
        Self::parse_version_line(text.trim())
    }

    /// Parse a `openssl version` output line such as
    /// `OpenSSL 1.0.1f 6 Jan 2014` or `LibreSSL 2.8.3`.
    pub fn parse_version_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let library = parts.next()?.to_string();
        let version = parts.next()?.to_string();
        Some(Self { library, version })
    }
}

/// Why the certificate override does (or does not) apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverrideDecision {
    /// Old OpenSSL detected; the bundled certificate should be substituted.
    OverrideNeeded,
    /// No TLS tooling found at all; the advisor cannot operate.
    MissingTransport,
    /// The backend is not OpenSSL; the advisor cannot operate.
    NotOpenSsl,
    /// OpenSSL 1.0.2 or newer; no override required.
    ModernOpenSsl,
}

impl std::fmt::Display for OverrideDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OverrideNeeded => write!(f, "Override Needed"),
            Self::MissingTransport => write!(f, "Missing Transport"),
            Self::NotOpenSsl => write!(f, "Not OpenSSL"),
            Self::ModernOpenSsl => write!(f, "Modern OpenSSL"),
        }
    }
}

impl OverrideDecision {
    /// Terminal states where no diagnostic checks should run at all.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::MissingTransport | Self::NotOpenSsl)
    }
}

/// Decide whether the certificate bundle should be overridden, with the
/// specific reason for user-facing messaging.
pub fn override_decision(backend: Option<&TlsBackend>) -> OverrideDecision {
    let backend = match backend {
        Some(b) => b,
        None => return OverrideDecision::MissingTransport,
    };
    if backend.library != "OpenSSL" {
        return OverrideDecision::NotOpenSsl;
    }
    if !version_lt(&backend.version, &MIN_SAFE_OPENSSL) {
        return OverrideDecision::ModernOpenSsl;
    }
    OverrideDecision::OverrideNeeded
}

/// Boolean form of [`override_decision`].
pub fn should_override_ca(backend: Option<&TlsBackend>) -> bool {
    override_decision(backend) == OverrideDecision::OverrideNeeded
}

/// Compare a dotted version string against a numeric threshold,
/// segment by segment.
///
/// Non-numeric suffixes within a segment are ignored, so `1.0.2k`
/// compares equal to `1.0.2` and is therefore not "less". Missing
/// segments count as zero.
pub fn version_lt(version: &str, threshold: &[u64; 3]) -> bool {
    let segments = numeric_segments(version);
    for (i, want) in threshold.iter().enumerate() {
        let have = segments.get(i).copied().unwrap_or(0);
        if have != *want {
            return have < *want;
        }
    }
    false
}

fn numeric_segments(version: &str) -> Vec<u64> {
    version
        .split('.')
        .map(|segment| {
            let digits: String = segment
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect();
            digits.parse().unwrap_or(0)
        })
        .collect()
}
