//! Shared test fixtures: temp dirs and a scripted RPC transport.
//!
//! Kept std-only where possible so unit tests across modules can reuse these
//! without extra dependencies.

use async_trait::async_trait;
use std::collections::{BTreeMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::RpcError;
use crate::fleet::{Credentials, Endpoint};
use crate::rpc::{CallResult, RpcParam, RpcTransport};

static TEST_DIR_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Temporary directory fixture with best-effort cleanup.
#[derive(Debug)]
pub struct TestTempDir {
    path: PathBuf,
}

impl TestTempDir {
    /// Create a unique temporary directory with a readable prefix.
    pub fn new(prefix: &str) -> Self {
        let suffix = TEST_DIR_COUNTER.fetch_add(1, Ordering::Relaxed);
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let dir = std::env::temp_dir().join(format!("mailctl-{prefix}-{millis}-{suffix}"));
        fs::create_dir_all(&dir).expect("failed to create temporary fixture directory");
        Self { path: dir }
    }

    /// Root directory path for this fixture.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Build a child path under the fixture root.
    pub fn child(&self, relative: &str) -> PathBuf {
        self.path.join(relative)
    }

    /// Write UTF-8 text to a child path, creating parent directories as needed.
    pub fn write_text(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.child(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("failed to create parent directories for fixture");
        }
        fs::write(&path, content).expect("failed to write fixture file");
        path
    }
}

impl Drop for TestTempDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

/// One scripted transport reply.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Reply with this status and payload.
    Result(u16, Option<String>),
    /// Fail the call with a TLS verification error.
    TlsFailure,
}

/// One call observed by a [`ScriptedTransport`].
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub node: String,
    pub method: String,
    pub username: Option<String>,
    pub params: Vec<RpcParam>,
}

/// A transport that answers from per-node reply queues.
///
/// Replies are consumed in push order; once a node's queue is empty, the
/// default reply answers every further call. Every call is recorded, with
/// its parameters, for assertions.
pub struct ScriptedTransport {
    queues: Mutex<BTreeMap<String, VecDeque<Reply>>>,
    default: Reply,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedTransport {
    /// Transport that answers every call with `200` and no payload.
    pub fn ok() -> Self {
        Self::with_default(Reply::Result(200, None))
    }

    pub fn with_default(default: Reply) -> Self {
        Self {
            queues: Mutex::new(BTreeMap::new()),
            default,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queue one reply for a node, consumed before the default applies.
    pub fn push_reply(&self, node: &str, reply: Reply) {
        self.queues
            .lock()
            .expect("queue lock poisoned")
            .entry(node.to_string())
            .or_default()
            .push_back(reply);
    }

    /// Recorded calls, in arrival order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("call lock poisoned").clone()
    }

    /// Methods called against one node, in arrival order.
    pub fn methods_for(&self, node: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| call.node == node)
            .map(|call| call.method)
            .collect()
    }
}

#[async_trait]
impl RpcTransport for ScriptedTransport {
    async fn call(
        &self,
        endpoint: &Endpoint,
        creds: &Credentials,
        method: &str,
        params: &[RpcParam],
    ) -> Result<CallResult, RpcError> {
        self.calls.lock().expect("call lock poisoned").push(RecordedCall {
            node: endpoint.name.clone(),
            method: method.to_string(),
            username: creds.username.clone(),
            params: params.to_vec(),
        });

        let reply = self
            .queues
            .lock()
            .expect("queue lock poisoned")
            .get_mut(&endpoint.name)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| self.default.clone());

        match reply {
            Reply::Result(status, payload) => Ok(CallResult { status, payload }),
            Reply::TlsFailure => Err(RpcError::TlsVerification {
                node: endpoint.name.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fleet::FleetBuilder;

    #[test]
    fn temp_dir_fixture_writes_and_resolves_paths() {
        let fixture = TestTempDir::new("fixture");
        let file = fixture.write_text("nested/file.txt", "hello");
        assert_eq!(fs::read_to_string(file).unwrap(), "hello");
    }

    #[tokio::test]
    async fn scripted_transport_replays_queue_then_default() {
        let mut builder = FleetBuilder::new();
        builder.add_node("n1", "10.0.0.1").unwrap();
        let fleet = builder.finish();
        let id = fleet.find_endpoint("n1").unwrap();

        let transport = ScriptedTransport::ok();
        transport.push_reply("n1", Reply::Result(401, None));

        let creds = Credentials::default();
        let first = transport
            .call(fleet.endpoint(id), &creds, "login", &[])
            .await
            .unwrap();
        let second = transport
            .call(fleet.endpoint(id), &creds, "login", &[])
            .await
            .unwrap();
        assert_eq!(first.status, 401);
        assert_eq!(second.status, 200);
        assert_eq!(transport.methods_for("n1"), vec!["login", "login"]);
    }
}
