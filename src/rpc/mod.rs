//! RPC call gateway: one normalized call to one endpoint.
//!
//! The gateway resolves credentials, delegates to the transport, and hands
//! back a uniform `(status, payload)` result. Remote failures are values;
//! only TLS verification failure (and task panics, at the dispatch layer)
//! surface as errors, because they abort the whole invocation.

pub mod transport;
pub mod wire;

use std::sync::Arc;

use crate::error::RpcError;
use crate::fleet::{EndpointId, Fleet, PasswordSource};

pub use transport::{HttpTransport, RpcTransport};
pub use wire::{RpcParam, RpcValue};

/// Connection-level failure or timeout.
pub const STATUS_UNREACHABLE: u16 = 0;
/// Success.
pub const STATUS_OK: u16 = 200;
/// Authentication required or rejected.
pub const STATUS_UNAUTHORIZED: u16 = 401;
/// Server-reported call timeout.
pub const STATUS_TIMEOUT: u16 = 599;

/// Normalized outcome of one RPC call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallResult {
    pub status: u16,
    pub payload: Option<String>,
}

impl CallResult {
    /// The `(0, None)` unreachable/timeout result.
    pub fn unreachable() -> Self {
        Self {
            status: STATUS_UNREACHABLE,
            payload: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }
}

/// Issues calls against fleet endpoints with resolved credentials.
pub struct Gateway {
    fleet: Arc<Fleet>,
    transport: Arc<dyn RpcTransport>,
    secrets: Arc<dyn PasswordSource>,
}

impl Gateway {
    pub fn new(
        fleet: Arc<Fleet>,
        transport: Arc<dyn RpcTransport>,
        secrets: Arc<dyn PasswordSource>,
    ) -> Self {
        Self {
            fleet,
            transport,
            secrets,
        }
    }

    pub fn fleet(&self) -> &Arc<Fleet> {
        &self.fleet
    }

    /// Perform one call against one endpoint.
    ///
    /// Credentials are re-resolved per call, so a password set after a 401
    /// takes effect immediately on the retry.
    pub async fn call(
        &self,
        id: EndpointId,
        method: &str,
        params: &[RpcParam],
    ) -> Result<CallResult, RpcError> {
        let endpoint = self.fleet.endpoint(id);
        let creds = self.fleet.credentials(id, self.secrets.as_ref());
        self.transport.call(endpoint, &creds, method, params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fleet::{FleetBuilder, NoStoredPasswords};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn gateway_for(conn: &str, transport: Arc<dyn RpcTransport>) -> (Arc<Fleet>, Gateway) {
        let mut builder = FleetBuilder::new();
        builder.add_node("n1", conn).unwrap();
        let fleet = Arc::new(builder.finish());
        let gateway = Gateway::new(
            Arc::clone(&fleet),
            transport,
            Arc::new(NoStoredPasswords),
        );
        (fleet, gateway)
    }

    fn http_response(status_line: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status_line}\r\nContent-Type: text/xml\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    /// Read until the request envelope is complete, so the response is not
    /// written while the client is still sending.
    async fn read_full_request(stream: &mut tokio::net::TcpStream) -> String {
        let mut request = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = stream.read(&mut chunk).await.unwrap_or(0);
            if n == 0 {
                break;
            }
            request.extend_from_slice(&chunk[..n]);
            if String::from_utf8_lossy(&request).contains("</SOAP-ENV:Envelope>") {
                break;
            }
        }
        String::from_utf8_lossy(&request).to_string()
    }

    #[tokio::test]
    async fn successful_call_normalizes_status_and_payload() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.expect("accept");
            let text = read_full_request(&mut stream).await;
            let response = http_response("200 OK", "<result>172800</result>");
            let _ = stream.write_all(response.as_bytes()).await;
            text
        });

        let (_, gateway) = gateway_for(
            &format!("http://admin:secret@{addr}"),
            Arc::new(HttpTransport::new(true)),
        );
        let id = gateway.fleet().find_endpoint("n1").unwrap();
        let result = gateway.call(id, "getUptime", &[]).await.unwrap();
        assert_eq!(result.status, STATUS_OK);
        assert!(result.payload.unwrap().contains("172800"));

        // The request carried the envelope and basic-auth credentials.
        let request = server.await.unwrap();
        assert!(request.contains("POST /remote/"));
        assert!(request.contains("<getUptime>"));
        assert!(
            request.to_ascii_lowercase().contains("authorization: basic"),
            "missing auth header in: {request}"
        );
    }

    #[tokio::test]
    async fn http_error_statuses_pass_through() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.expect("accept");
            read_full_request(&mut stream).await;
            let response = http_response("401 Unauthorized", "");
            let _ = stream.write_all(response.as_bytes()).await;
        });

        let (_, gateway) = gateway_for(
            &format!("http://{addr}"),
            Arc::new(HttpTransport::new(true)),
        );
        let id = gateway.fleet().find_endpoint("n1").unwrap();
        let result = gateway.call(id, "login", &[]).await.unwrap();
        assert_eq!(result.status, STATUS_UNAUTHORIZED);
        assert_eq!(result.payload, None);
    }

    #[tokio::test]
    async fn refused_connection_becomes_status_zero() {
        // Bind then drop to find a port that refuses connections.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (_, gateway) = gateway_for(
            &format!("http://{addr}"),
            Arc::new(HttpTransport::new(true)),
        );
        let id = gateway.fleet().find_endpoint("n1").unwrap();
        let result = gateway.call(id, "getUptime", &[]).await.unwrap();
        assert_eq!(result, CallResult::unreachable());
    }

    #[tokio::test]
    async fn stalled_server_times_out_to_status_zero() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // Accept and hold the connection open without responding.
        let _server = tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.expect("accept");
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let transport = HttpTransport::with_timeouts(
            true,
            Duration::from_millis(500),
            Duration::from_millis(50),
        );
        let (_, gateway) = gateway_for(&format!("http://{addr}"), Arc::new(transport));
        let id = gateway.fleet().find_endpoint("n1").unwrap();
        let result = gateway.call(id, "getUptime", &[]).await.unwrap();
        assert_eq!(result, CallResult::unreachable());
    }

    #[tokio::test]
    async fn concurrent_first_calls_share_one_client() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    break;
                };
                tokio::spawn(async move {
                    read_full_request(&mut stream).await;
                    let response = http_response("200 OK", "<result>ok</result>");
                    let _ = stream.write_all(response.as_bytes()).await;
                });
            }
        });

        let (fleet, gateway) = gateway_for(
            &format!("http://{addr}"),
            Arc::new(HttpTransport::new(true)),
        );
        let gateway = Arc::new(gateway);
        let id = fleet.find_endpoint("n1").unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let gateway = Arc::clone(&gateway);
            handles.push(tokio::spawn(async move {
                gateway.call(id, "getUptime", &[]).await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().unwrap().is_ok());
        }
        // The endpoint's memoized client was initialized exactly once.
        assert!(fleet.endpoint(id).client.initialized());
    }
}
