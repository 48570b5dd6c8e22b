//! `run`: execute one command across the targets and print buffered output.

use std::collections::HashMap;
use std::sync::Arc;

use crate::bridge::run_batch;
use crate::dispatch::Dispatcher;
use crate::error::RpcError;
use crate::fleet::EndpointId;
use crate::process::RemoteProcess;
use crate::rpc::{Gateway, STATUS_OK};

use super::Outcome;

/// Batch viewport size; there is no real terminal behind these processes.
const BATCH_SIZE: (u16, u16) = (80, 24);

pub async fn run(
    gateway: &Arc<Gateway>,
    dispatcher: &Dispatcher,
    targets: &[EndpointId],
    argv: &[String],
) -> Result<Outcome, RpcError> {
    if argv.is_empty() {
        eprintln!("No command specified");
        return Ok(Outcome::failed(1));
    }

    let fleet = Arc::clone(gateway.fleet());
    let argv_owned: Vec<String> = argv.to_vec();
    let started = dispatcher
        .run_each(&fleet, targets, |id| {
            let gateway = Arc::clone(gateway);
            let argv = argv_owned.clone();
            async move { RemoteProcess::start(gateway, id, &argv, BATCH_SIZE).await }
        })
        .await?;

    // Nodes that failed to start still get an (empty) output slot; their
    // failure is reported through the partial flag.
    let mut partial = false;
    let mut handles = Vec::new();
    for (_, (status, process)) in started {
        match process {
            Some(process) if status == STATUS_OK => handles.push(Arc::new(process)),
            _ => partial = true,
        }
    }

    let outputs: HashMap<EndpointId, String> =
        run_batch(&fleet, handles).await?.into_iter().collect();

    for &id in targets {
        let endpoint = fleet.endpoint(id);
        let group = fleet.group(endpoint.group);
        let buffer = outputs.get(&id).map(String::as_str).unwrap_or("");
        for line in buffer.split("\r\n") {
            println!("{} / {}> {}", group.name, endpoint.name, line);
        }
        println!();
    }

    Ok(Outcome {
        exitcode: 0,
        partial,
    })
}
