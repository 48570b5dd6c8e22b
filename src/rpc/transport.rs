//! HTTP transport for appliance RPC calls.
//!
//! The trait seam exists so tests (and future wire formats) can substitute a
//! scripted transport; the dispatch core only ever sees normalized
//! `CallResult` values.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::RpcError;
use crate::fleet::{Credentials, Endpoint};

use super::wire::{build_envelope, RpcParam};
use super::CallResult;

/// Default per-call connection timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default per-call overall request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// One blocking remote call against one endpoint.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    async fn call(
        &self,
        endpoint: &Endpoint,
        creds: &Credentials,
        method: &str,
        params: &[RpcParam],
    ) -> Result<CallResult, RpcError>;
}

/// Production transport: XML envelope over HTTP POST via reqwest.
pub struct HttpTransport {
    connect_timeout: Duration,
    request_timeout: Duration,
    verify_tls: bool,
}

impl HttpTransport {
    /// Transport with default timeouts. `verify_tls` is the fleet-wide
    /// setting; individual endpoints may additionally opt out.
    pub fn new(verify_tls: bool) -> Self {
        Self::with_timeouts(verify_tls, DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeouts(
        verify_tls: bool,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Self {
        Self {
            connect_timeout,
            request_timeout,
            verify_tls,
        }
    }

    /// Per-endpoint client, built lazily on first use. Concurrent first calls
    /// race on the endpoint's cell and exactly one build wins.
    async fn client_for<'a>(&self, endpoint: &'a Endpoint) -> &'a reqwest::Client {
        endpoint
            .client
            .get_or_init(|| async {
                let accept_invalid = endpoint.no_verify_tls || !self.verify_tls;
                reqwest::Client::builder()
                    .connect_timeout(self.connect_timeout)
                    .timeout(self.request_timeout)
                    .danger_accept_invalid_certs(accept_invalid)
                    .build()
                    // Fall back to reqwest defaults if builder creation fails
                    // for any reason.
                    .unwrap_or_else(|_| reqwest::Client::new())
            })
            .await
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    async fn call(
        &self,
        endpoint: &Endpoint,
        creds: &Credentials,
        method: &str,
        params: &[RpcParam],
    ) -> Result<CallResult, RpcError> {
        let client = self.client_for(endpoint).await;
        let body = build_envelope(method, params);

        let mut request = client
            .post(endpoint.url())
            .header("Content-Type", "text/xml; charset=utf-8")
            .header("SOAPAction", method)
            .body(body);
        if let Some(username) = &creds.username {
            request = request.basic_auth(username, creds.password.as_deref());
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                let text = response.text().await.unwrap_or_default();
                tracing::debug!(node = %endpoint.name, method, status, "rpc call completed");
                let payload = if text.is_empty() { None } else { Some(text) };
                Ok(CallResult { status, payload })
            }
            Err(err) => {
                if error_chain_mentions_certificate(&err) {
                    return Err(RpcError::TlsVerification {
                        node: endpoint.name.clone(),
                    });
                }
                // Unreachable hosts and timed-out calls are ordinary
                // per-node outcomes, not invocation failures.
                tracing::debug!(node = %endpoint.name, method, error = %err, "rpc call failed");
                Ok(CallResult::unreachable())
            }
        }
    }
}

/// True when any error in the chain points at certificate verification.
///
/// reqwest does not expose a typed TLS-verification error across backends, so
/// the chain's message text is the only portable signal.
pub(crate) fn error_chain_mentions_certificate(err: &dyn std::error::Error) -> bool {
    let mut current: Option<&dyn std::error::Error> = Some(err);
    while let Some(e) = current {
        if e.to_string().to_ascii_lowercase().contains("certificate") {
            return true;
        }
        current = e.source();
    }
    false
}
