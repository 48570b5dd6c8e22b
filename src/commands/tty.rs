//! `tty`: attach an interactive terminal to a command on one node.

use std::sync::Arc;

use crate::bridge::run_interactive;
use crate::error::RpcError;
use crate::fleet::EndpointId;
use crate::process::RemoteProcess;
use crate::rpc::{Gateway, STATUS_UNAUTHORIZED, STATUS_UNREACHABLE};
use crate::util::terminal_size;

use super::Outcome;

pub async fn run(
    gateway: &Arc<Gateway>,
    targets: &[EndpointId],
    argv: &[String],
) -> Result<Outcome, RpcError> {
    let [target] = targets else {
        eprintln!("tty requires exactly one target node (use -n)");
        return Ok(Outcome::failed(1));
    };
    if argv.is_empty() {
        eprintln!("No command specified");
        return Ok(Outcome::failed(1));
    }

    let (status, process) =
        RemoteProcess::start(Arc::clone(gateway), *target, argv, terminal_size()).await?;
    let Some(process) = process else {
        let label = gateway.fleet().label(*target);
        match status {
            STATUS_UNREACHABLE => eprintln!("{label} - Node is unreachable"),
            STATUS_UNAUTHORIZED => eprintln!("{label} - Unauthorized"),
            other => eprintln!("{label} - Failed to start: status {other}"),
        }
        return Ok(Outcome::failed(1));
    };

    let process = Arc::new(process);
    match run_interactive(Arc::clone(&process)).await {
        Ok(()) => Ok(Outcome::success()),
        Err(err) => {
            // Don't leave the remote side running if the local bridge died.
            let _ = process.stop().await;
            eprintln!("error: {err}");
            Ok(Outcome::failed(1))
        }
    }
}
