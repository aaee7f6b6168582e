//! Diagnostic report assembly and rendering.
//!
//! A report is computed per run and never persisted. It carries one row per
//! check that was actually shown to the user, the recommendation, and the
//! detected TLS backend for the footer line.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::backend::{OverrideDecision, TlsBackend};
use crate::probe::{Recommendation, SslChecks};
use crate::server::ENABLE_INSECURE_ACTION;

/// Which probe a row reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    Unmodified,
    Overridden,
    Insecure,
}

/// Severity of one rendered check row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Pass,
    Fail,
    /// The check passed, but what it proves is itself a hazard (an insecure
    /// request going through).
    Warning,
}

impl std::fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pass => write!(f, "PASS"),
            Self::Fail => write!(f, "FAIL"),
            Self::Warning => write!(f, "WARN"),
        }
    }
}

/// One rendered check result.
#[derive(Debug, Clone, Serialize)]
pub struct CheckRow {
    pub kind: CheckKind,
    pub status: CheckStatus,
    pub message: String,
}

/// The full diagnostic report for one page render or CLI run.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticReport {
    /// Detected TLS backend, if any.
    pub backend: Option<TlsBackend>,
    /// Capability-probe outcome.
    pub decision: OverrideDecision,
    /// Rows for the checks that were shown. Empty in terminal states.
    pub rows: Vec<CheckRow>,
    /// Raw check outcome, absent in terminal states.
    pub checks: Option<SslChecks>,
    /// Absent in terminal states.
    pub recommendation: Option<Recommendation>,
    pub generated_at: DateTime<Utc>,
}

impl DiagnosticReport {
    /// Whether the advisor cannot operate on this system at all.
    pub fn cannot_operate(&self) -> bool {
        self.decision.is_terminal()
    }
}

/// Build the user-facing rows from a check outcome. Skipped (implicit-pass)
/// checks produce no row, matching what the probes actually did.
pub fn check_rows(checks: &SslChecks, endpoint: &str) -> Vec<CheckRow> {
    let mut rows = Vec::new();

    rows.push(CheckRow {
        kind: CheckKind::Unmodified,
        status: if checks.unmodified {
            CheckStatus::Pass
        } else {
            CheckStatus::Fail
        },
        message: if checks.unmodified {
            format!(
                "This system can reach {} without the advisor changing anything.",
                endpoint
            )
        } else {
            format!(
                "This system is NOT able to reach {} without the advisor changing anything.",
                endpoint
            )
        },
    });

    if checks.overridden_ran {
        rows.push(CheckRow {
            kind: CheckKind::Overridden,
            status: if checks.overridden {
                CheckStatus::Pass
            } else {
                CheckStatus::Fail
            },
            message: if checks.overridden {
                format!(
                    "This system can reach {} when the advisor overrides the certificate bundle.",
                    endpoint
                )
            } else {
                format!(
                    "This system is NOT able to reach {} when the advisor overrides the certificate bundle.",
                    endpoint
                )
            },
        });
    }

    if checks.insecure_ran {
        rows.push(CheckRow {
            kind: CheckKind::Insecure,
            status: if checks.insecure {
                CheckStatus::Warning
            } else {
                CheckStatus::Fail
            },
            message: if checks.insecure {
                format!(
                    "This system can make INSECURE requests to {} when certificate verification is disabled.",
                    endpoint
                )
            } else {
                format!(
                    "This system is NOT able to reach {} even with certificate verification disabled.",
                    endpoint
                )
            },
        });
    }

    rows
}

/// Recommendation as a short title plus explanatory paragraphs.
pub fn recommendation_text(rec: &Recommendation, now: DateTime<Utc>) -> (String, Vec<String>) {
    match rec {
        Recommendation::DisableTool => (
            "Everything looks fine.".into(),
            vec!["You can disable and remove this tool.".into()],
        ),
        Recommendation::KeepToolActive => (
            "Upgrade your server software.".into(),
            vec![
                "Ask your host to remove the expired \"DST Root CA X3\" certificate from the system and upgrade OpenSSL.".into(),
                "In the meantime, leave this tool active to keep outgoing requests working.".into(),
            ],
        ),
        Recommendation::InsecureModeActive { expires_at } => (
            format!(
                "Certificate verification is disabled for the next {}.",
                human_duration(*expires_at - now)
            ),
            vec![
                "Upgrade your server software before the window closes; insecure mode is a stopgap, not a fix.".into(),
            ],
        ),
        Recommendation::OfferInsecureMode => (
            "Upgrade your server software.".into(),
            vec![
                "Only insecure requests work on this system. You can enable insecure requests for up to 3 minutes while you arrange a real fix.".into(),
            ],
        ),
        Recommendation::UnknownFailure => (
            "Something else went wrong.".into(),
            vec![
                "The advisor could not determine the status of this system.".into(),
                "Check that outbound connections to the test endpoint are allowed at all.".into(),
            ],
        ),
    }
}

/// Reason line for the terminal "cannot operate" states.
pub fn cannot_operate_reason(decision: OverrideDecision) -> Option<&'static str> {
    match decision {
        OverrideDecision::MissingTransport => {
            Some("No OpenSSL tooling was found on this system.")
        }
        OverrideDecision::NotOpenSsl => {
            Some("The TLS backend on this system is not OpenSSL.")
        }
        _ => None,
    }
}

fn backend_footer(backend: Option<&TlsBackend>) -> String {
    match backend {
        Some(b) => format!("TLS backend reported: {}", b),
        None => "TLS backend reported: none".into(),
    }
}

/// Plain-text rendering for the CLI.
pub fn render_text(report: &DiagnosticReport, now: DateTime<Utc>) -> String {
    let mut out = String::new();

    if report.cannot_operate() {
        out.push_str("This tool cannot operate on this system:\n");
        if let Some(reason) = cannot_operate_reason(report.decision) {
            out.push_str(reason);
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&backend_footer(report.backend.as_ref()));
        out.push('\n');
        return out;
    }

    for row in &report.rows {
        out.push_str(&format!("[{}] {}\n", row.status, row.message));
    }

    if let Some(rec) = &report.recommendation {
        let (title, body) = recommendation_text(rec, now);
        out.push('\n');
        out.push_str(&title);
        out.push('\n');
        for paragraph in body {
            out.push_str(&paragraph);
            out.push('\n');
        }
    }

    out.push('\n');
    out.push_str(&backend_footer(report.backend.as_ref()));
    out.push('\n');
    out
}

/// HTML rendering for the admin page.
///
/// `nonce` is the token embedded in the enable-insecure form; the form is
/// only rendered when the recommendation actually offers the action.
pub fn render_html(report: &DiagnosticReport, nonce: Option<&str>, now: DateTime<Utc>) -> String {
    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n<html><head><title>TLS Advisor</title>\n");
    out.push_str(STYLE_BLOCK);
    out.push_str("</head><body><div class=\"wrap\">\n<h1>TLS Advisor</h1>\n");

    if report.cannot_operate() {
        out.push_str("<p><strong>This tool cannot operate on this system:</strong></p>\n");
        if let Some(reason) = cannot_operate_reason(report.decision) {
            out.push_str(&format!("<p>{}</p>\n", html_escape(reason)));
        }
        out.push_str(&format!(
            "<p><em>{}</em></p>\n",
            html_escape(&backend_footer(report.backend.as_ref()))
        ));
        out.push_str("</div></body></html>\n");
        return out;
    }

    out.push_str("<table id=\"tls-advisor-checks\">\n");
    for row in &report.rows {
        let class = match row.status {
            CheckStatus::Pass => "adv-pass",
            CheckStatus::Fail => "adv-fail",
            CheckStatus::Warning => "adv-warn",
        };
        out.push_str(&format!(
            "<tr><td><span class=\"adv-icon {}\">{}</span></td><td><p>{}</p></td></tr>\n",
            class,
            row.status,
            html_escape(&row.message)
        ));
    }
    out.push_str("</table>\n");

    out.push_str("<h2>Recommendations</h2>\n");
    if let Some(rec) = &report.recommendation {
        let (title, body) = recommendation_text(rec, now);
        out.push_str(&format!("<p><strong>{}</strong></p>\n", html_escape(&title)));
        for paragraph in body {
            out.push_str(&format!("<p>{}</p>\n", html_escape(&paragraph)));
        }
        if matches!(rec, Recommendation::OfferInsecureMode) {
            if let Some(token) = nonce {
                out.push_str(&format!(
                    "<form method=\"get\" action=\"/\">\n\
                     <input type=\"hidden\" name=\"action\" value=\"{}\">\n\
                     <input type=\"hidden\" name=\"token\" value=\"{}\">\n\
                     <button class=\"button\">Enable Insecure Requests</button>\n\
                     </form>\n",
                    ENABLE_INSECURE_ACTION,
                    html_escape(token)
                ));
            }
        }
    }

    out.push_str(&format!(
        "<p><em>{}</em></p>\n",
        html_escape(&backend_footer(report.backend.as_ref()))
    ));
    out.push_str("</div></body></html>\n");
    out
}

const STYLE_BLOCK: &str = "<style>\n\
    #tls-advisor-checks { margin: 1.5em 0 2em; border-spacing: 0; }\n\
    #tls-advisor-checks td { padding: 0.5em 0 0.5em 1em; }\n\
    .adv-icon { font-weight: bold; padding: 0.2em 0.5em; border-radius: 0.3em; color: #f1f1f1; }\n\
    .adv-pass { background: #080; }\n\
    .adv-fail { background: #800; }\n\
    .adv-warn { background: #ffb900; }\n\
    </style>\n";

/// Approximate duration wording for the insecure-mode countdown.
pub fn human_duration(delta: Duration) -> String {
    let secs = delta.num_seconds().max(0);
    if secs >= 120 {
        format!("{} minutes", (secs + 59) / 60)
    } else if secs >= 60 {
        "1 minute".into()
    } else if secs == 1 {
        "1 second".into()
    } else {
        format!("{} seconds", secs)
    }
}

fn html_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
