//! `status`: check reachability and auth state across the targets.

use std::sync::Arc;

use crate::dispatch::{any_partial, Dispatcher};
use crate::error::RpcError;
use crate::fleet::EndpointId;
use crate::render::render_table;
use crate::rpc::{CallResult, Gateway, STATUS_OK, STATUS_UNAUTHORIZED, STATUS_UNREACHABLE};

use super::Outcome;

/// One uptime probe per target, rendered as a table.
pub async fn run(
    gateway: &Arc<Gateway>,
    dispatcher: &Dispatcher,
    targets: &[EndpointId],
    verbose: bool,
) -> Result<Outcome, RpcError> {
    let results = dispatcher
        .call_each(gateway, targets, "getUptime", &[])
        .await?;

    let fleet = gateway.fleet();
    let rows: Vec<Vec<String>> = results
        .iter()
        .map(|(id, result)| {
            let endpoint = fleet.endpoint(*id);
            vec![
                fleet.group(endpoint.group).name.clone(),
                endpoint.name.clone(),
                endpoint.host.clone(),
                status_text(result, verbose),
            ]
        })
        .collect();
    println!(
        "{}",
        render_table(&["Cluster", "Name", "Address", "Status"], &rows)
    );

    if any_partial(&results) {
        Ok(Outcome::partial())
    } else {
        Ok(Outcome::success())
    }
}

fn status_text(result: &CallResult, verbose: bool) -> String {
    if verbose {
        return result.status.to_string();
    }
    match result.status {
        STATUS_OK => "OK".to_string(),
        STATUS_UNREACHABLE => "Offline".to_string(),
        STATUS_UNAUTHORIZED => "Unauthorized".to_string(),
        other => format!("Error {other}"),
    }
}
