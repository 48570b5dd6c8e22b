//! `logout`: remove stored credentials for the targeted nodes.

use std::sync::Arc;

use crate::error::RpcError;
use crate::fleet::EndpointId;
use crate::rpc::Gateway;
use crate::secrets::SecretStore;
use crate::util::ask_confirm;

use super::Outcome;

pub async fn run(
    gateway: &Arc<Gateway>,
    targets: &[EndpointId],
    store: &SecretStore,
    yes: bool,
) -> Result<Outcome, RpcError> {
    run_with_confirm(gateway, targets, store, yes, |prompt| {
        ask_confirm(prompt, true).unwrap_or(false)
    })
    .await
}

/// Logout flow with an injectable confirmation prompt, for tests.
pub(crate) async fn run_with_confirm<F>(
    gateway: &Arc<Gateway>,
    targets: &[EndpointId],
    store: &SecretStore,
    yes: bool,
    mut confirm: F,
) -> Result<Outcome, RpcError>
where
    F: FnMut(&str) -> bool,
{
    let fleet = gateway.fleet();
    for &id in targets {
        let Some(username) = fleet.effective_username(id) else {
            continue;
        };
        let host = &fleet.endpoint(id).host;
        match store.get(host, &username) {
            Ok(Some(_)) => {}
            Ok(None) => continue,
            Err(err) => {
                tracing::warn!("secret store read failed: {err}");
                continue;
            }
        }

        let label = fleet.label(id);
        if yes || confirm(&format!("Log out from {label}?")) {
            if let Err(err) = store.delete(host, &username) {
                eprintln!("failed to remove credentials for {label}: {err}");
            }
        }
    }
    Ok(Outcome::success())
}
