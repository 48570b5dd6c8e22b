//! Client-side proxy for a long-running remote process.
//!
//! The appliance exposes processes through a poll/push call family
//! (`commandRun`, `commandPoll`, `commandPush`, `commandSignal`,
//! `commandTermsize`, `commandStop`). This proxy turns that into a stream:
//! start it, pull output chunks, push input, and observe a monotonic
//! Running → Done state. Once Done, no further RPC is issued; every
//! operation keeps reporting the terminal condition.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::RpcError;
use crate::fleet::EndpointId;
use crate::rpc::{wire, Gateway, RpcParam, STATUS_OK};
use crate::util::{bytes_to_base64, from_base64, to_base64};

/// Outcome of one poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessPoll {
    /// Output produced since the last poll; may be empty, which simply means
    /// the process had nothing to say yet.
    Output(String),
    /// The process has finished (or the proxy already was Done).
    Done,
}

/// Handle to a process running on one endpoint.
pub struct RemoteProcess {
    gateway: Arc<Gateway>,
    endpoint: EndpointId,
    process_id: String,
    done: AtomicBool,
}

impl RemoteProcess {
    /// Start `argv` on the endpoint with the given viewport size.
    ///
    /// Returns the RPC status and, on success, the live handle. A non-200
    /// start yields `(status, None)` so callers can record it as a partial
    /// result.
    pub async fn start(
        gateway: Arc<Gateway>,
        endpoint: EndpointId,
        argv: &[String],
        size: (u16, u16),
    ) -> Result<(u16, Option<RemoteProcess>), RpcError> {
        let params = [
            RpcParam::items("argv", argv.iter().map(|arg| to_base64(arg))),
            RpcParam::int("cols", i64::from(size.0)),
            RpcParam::int("rows", i64::from(size.1)),
        ];
        let result = gateway.call(endpoint, "commandRun", &params).await?;
        if result.status != STATUS_OK {
            return Ok((result.status, None));
        }

        let process_id = result
            .payload
            .as_deref()
            .map(|payload| {
                wire::extract_result(payload).unwrap_or_else(|| payload.trim().to_string())
            })
            .unwrap_or_default();
        Ok((
            STATUS_OK,
            Some(RemoteProcess {
                gateway,
                endpoint,
                process_id,
                done: AtomicBool::new(false),
            }),
        ))
    }

    pub fn endpoint(&self) -> EndpointId {
        self.endpoint
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }

    fn finish(&self) {
        self.done.store(true, Ordering::SeqCst);
    }

    fn id_param(&self) -> RpcParam {
        RpcParam::str("commandid", self.process_id.clone())
    }

    /// Fetch output accumulated since the last poll.
    ///
    /// Repeated empty polls are expected; pacing between them belongs to the
    /// caller, not this proxy.
    pub async fn poll(&self) -> Result<ProcessPoll, RpcError> {
        if self.is_done() {
            return Ok(ProcessPoll::Done);
        }
        let result = self
            .gateway
            .call(self.endpoint, "commandPoll", &[self.id_param()])
            .await?;
        if result.status != STATUS_OK {
            self.finish();
            return Ok(ProcessPoll::Done);
        }
        let chunk = result
            .payload
            .as_deref()
            .map(|payload| {
                wire::extract_items(payload)
                    .iter()
                    .map(|item| from_base64(item))
                    .collect::<String>()
            })
            .unwrap_or_default();
        Ok(ProcessPoll::Output(chunk))
    }

    /// Send bytes to the process's stdin. Returns the RPC status, or `None`
    /// when the proxy was already Done and no call was made.
    pub async fn push(&self, data: &[u8]) -> Result<Option<u16>, RpcError> {
        if self.is_done() {
            return Ok(None);
        }
        let params = [
            self.id_param(),
            RpcParam::str("data", bytes_to_base64(data)),
        ];
        let result = self
            .gateway
            .call(self.endpoint, "commandPush", &params)
            .await?;
        if result.status != STATUS_OK {
            self.finish();
        }
        Ok(Some(result.status))
    }

    /// Send a POSIX signal by number.
    pub async fn signal(&self, signal: i64) -> Result<Option<u16>, RpcError> {
        if self.is_done() {
            return Ok(None);
        }
        let params = [self.id_param(), RpcParam::int("signal", signal)];
        let result = self
            .gateway
            .call(self.endpoint, "commandSignal", &params)
            .await?;
        if result.status != STATUS_OK {
            self.finish();
        }
        Ok(Some(result.status))
    }

    /// Tell the remote side the viewport changed.
    pub async fn resize(&self, cols: u16, rows: u16) -> Result<Option<u16>, RpcError> {
        if self.is_done() {
            return Ok(None);
        }
        let params = [
            self.id_param(),
            RpcParam::int("cols", i64::from(cols)),
            RpcParam::int("rows", i64::from(rows)),
        ];
        let result = self
            .gateway
            .call(self.endpoint, "commandTermsize", &params)
            .await?;
        if result.status != STATUS_OK {
            self.finish();
        }
        Ok(Some(result.status))
    }

    /// Request termination. Always transitions to Done; the RPC is skipped
    /// when the proxy already was.
    pub async fn stop(&self) -> Result<(), RpcError> {
        if self.done.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let _ = self
            .gateway
            .call(self.endpoint, "commandStop", &[self.id_param()])
            .await?;
        Ok(())
    }

    /// Pull the next non-empty output chunk; `None` exactly when Done.
    ///
    /// Empty polls loop immediately; callers that cannot afford a busy loop
    /// (anything talking to a real node) should pace calls to `poll`
    /// themselves instead.
    pub async fn next_chunk(&self) -> Result<Option<String>, RpcError> {
        loop {
            match self.poll().await? {
                ProcessPoll::Done => return Ok(None),
                ProcessPoll::Output(chunk) if chunk.is_empty() => continue,
                ProcessPoll::Output(chunk) => return Ok(Some(chunk)),
            }
        }
    }
}

/// Resolve a signal given by number or name (`2`, `INT`, `sigterm`).
pub fn parse_signal(value: &str) -> Option<i64> {
    if let Ok(number) = value.parse::<i64>() {
        return Some(number);
    }
    let upper = value.to_ascii_uppercase();
    let name = upper.strip_prefix("SIG").unwrap_or(&upper);
    let number = match name {
        "HUP" => 1,
        "INT" => 2,
        "QUIT" => 3,
        "ILL" => 4,
        "TRAP" => 5,
        "ABRT" => 6,
        "BUS" => 7,
        "FPE" => 8,
        "KILL" => 9,
        "USR1" => 10,
        "SEGV" => 11,
        "USR2" => 12,
        "PIPE" => 13,
        "ALRM" => 14,
        "TERM" => 15,
        "CHLD" => 17,
        "CONT" => 18,
        "STOP" => 19,
        "TSTP" => 20,
        "WINCH" => 28,
        _ => return None,
    };
    Some(number)
}

/// SIGINT, for the batch interrupt path.
pub const SIGINT: i64 = 2;
