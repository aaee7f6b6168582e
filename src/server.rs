//! Admin HTTP server: one diagnostics page plus the enable-insecure action.
//!
//! A lightweight HTTP/1.1 listener built on tokio. Requests are parsed by
//! hand and dispatched to a synchronous handler; the diagnostic probes are
//! blocking network calls, so page renders run on the blocking pool.

use std::collections::HashMap;
use std::sync::Arc;

use crate::advisor::Advisor;
use crate::backend::TlsBackend;
use crate::config::ServerConfig;
use crate::probe::ProbeTransport;
use crate::report::render_html;
use crate::store::{issue_nonce, verify_nonce};

/// Action name the enable-insecure token is scoped to.
pub const ENABLE_INSECURE_ACTION: &str = "enable-insecure";

/// A parsed incoming request.
#[derive(Debug, Clone)]
pub struct ParsedRequest {
    pub method: String,
    pub path: String,
    pub query: HashMap<String, String>,
}

/// Response handed back to the connection loop.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

/// Admin server serving the diagnostics page.
pub struct AdminServer {
    config: ServerConfig,
    advisor: Arc<Advisor>,
}

impl AdminServer {
    pub fn new(config: ServerConfig, advisor: Arc<Advisor>) -> Self {
        Self { config, advisor }
    }

    /// Parse the request line and query string of a raw HTTP/1.1 request.
    pub fn parse_request(raw: &str) -> Option<ParsedRequest> {
        let request_line = raw.lines().next()?;
        let parts: Vec<&str> = request_line.split_whitespace().collect();
        if parts.len() < 2 {
            return None;
        }

        let method = parts[0].to_uppercase();
        let full_path = parts[1];

        let (path, query) = if let Some(idx) = full_path.find('?') {
            let mut map = HashMap::new();
            for pair in full_path[idx + 1..].split('&') {
                if let Some(eq) = pair.find('=') {
                    map.insert(pair[..eq].to_string(), pair[eq + 1..].to_string());
                }
            }
            (full_path[..idx].to_string(), map)
        } else {
            (full_path.to_string(), HashMap::new())
        };

        Some(ParsedRequest {
            method,
            path,
            query,
        })
    }

    /// Handle the enable-insecure action if the request carries it.
    ///
    /// An invalid or missing token is silently ignored: no state change, and
    /// the page renders as if the action were never requested.
    fn apply_action(advisor: &Advisor, request: &ParsedRequest) -> bool {
        if request.query.get("action").map(String::as_str) != Some(ENABLE_INSECURE_ACTION) {
            return false;
        }
        let token = request.query.get("token").map(String::as_str).unwrap_or("");
        if verify_nonce(advisor.store(), ENABLE_INSECURE_ACTION, token) {
            advisor.enable_insecure_mode();
            true
        } else {
            log::debug!("enable-insecure request with invalid token ignored");
            false
        }
    }

    /// Route one request and produce a response. Testable without tokio.
    pub fn respond<T: ProbeTransport>(
        advisor: &Advisor,
        transport: &T,
        backend: Option<TlsBackend>,
        request: &ParsedRequest,
    ) -> HttpResponse {
        if request.method != "GET" {
            return HttpResponse {
                status: 405,
                content_type: "text/plain",
                body: "Method Not Allowed".into(),
            };
        }
        if request.path != "/" && request.path != "/tls-advisor" {
            return HttpResponse {
                status: 404,
                content_type: "text/plain",
                body: "Not Found".into(),
            };
        }

        Self::apply_action(advisor, request);

        let report = advisor.diagnose_with_backend(transport, backend);
        // A fresh token is only needed when the page will offer the action.
        let nonce = if report.recommendation
            == Some(crate::probe::Recommendation::OfferInsecureMode)
        {
            Some(issue_nonce(advisor.store(), ENABLE_INSECURE_ACTION))
        } else {
            None
        };
        let now = advisor.store().now();
        HttpResponse {
            status: 200,
            content_type: "text/html",
            body: render_html(&report, nonce.as_deref(), now),
        }
    }

    /// Run the server (blocks until shutdown).
    #[cfg(feature = "cli")]
    pub async fn run(&self) -> crate::error::Result<()> {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        let addr = format!("{}:{}", self.config.bind_address, self.config.port);
        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            crate::error::AdvisorError::Network(format!("failed to bind to {}: {}", addr, e))
        })?;

        log::info!("admin server listening on http://{}", addr);

        loop {
            let (mut stream, peer_addr) = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    log::warn!("accept error: {}", e);
                    continue;
                }
            };

            let advisor = self.advisor.clone();
            let request_logging = self.config.request_logging;

            tokio::spawn(async move {
                let mut buf = vec![0u8; 16384];
                let n = match stream.read(&mut buf).await {
                    Ok(n) if n > 0 => n,
                    _ => return,
                };
                let raw = String::from_utf8_lossy(&buf[..n]).to_string();

                let request = match Self::parse_request(&raw) {
                    Some(req) => req,
                    None => {
                        let resp =
                            b"HTTP/1.1 400 Bad Request\r\nContent-Length: 11\r\n\r\nBad Request";
                        let _ = stream.write_all(resp).await;
                        return;
                    }
                };

                if request_logging {
                    log::info!("{} {} from {}", request.method, request.path, peer_addr);
                }

                // The probes block on the network; keep them off the reactor.
                let response = tokio::task::spawn_blocking(move || {
                    Self::respond(
                        &advisor,
                        &crate::probe::HttpTransport,
                        TlsBackend::detect(),
                        &request,
                    )
                })
                .await
                .unwrap_or(HttpResponse {
                    status: 500,
                    content_type: "text/plain",
                    body: "Internal Server Error".into(),
                });

                let raw_response = format!(
                    "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    response.status,
                    status_text(response.status),
                    response.content_type,
                    response.body.len(),
                    response.body
                );
                let _ = stream.write_all(raw_response.as_bytes()).await;
            });
        }
    }

    /// Run stub when the cli feature (and with it tokio) is not enabled.
    #[cfg(not(feature = "cli"))]
    pub async fn run(&self) -> crate::error::Result<()> {
        Err(crate::error::AdvisorError::FeatureNotAvailable(
            "admin server requires the 'cli' feature (for tokio)".into(),
        ))
    }
}

fn status_text(code: u16) -> &'static str {
    match code {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}
