//! `login`: verify credentials per node, prompting and storing on 401.

use std::sync::Arc;

use crate::error::RpcError;
use crate::fleet::EndpointId;
use crate::rpc::{Gateway, STATUS_OK, STATUS_UNAUTHORIZED, STATUS_UNREACHABLE};
use crate::secrets::SecretStore;

use super::Outcome;

pub async fn run(
    gateway: &Arc<Gateway>,
    targets: &[EndpointId],
    store: &SecretStore,
) -> Result<Outcome, RpcError> {
    run_with_prompt(gateway, targets, store, |prompt| {
        rpassword::prompt_password(prompt).unwrap_or_default()
    })
    .await
}

/// Login flow with an injectable password prompt, for tests.
pub(crate) async fn run_with_prompt<F>(
    gateway: &Arc<Gateway>,
    targets: &[EndpointId],
    store: &SecretStore,
    mut prompt: F,
) -> Result<Outcome, RpcError>
where
    F: FnMut(&str) -> String,
{
    let fleet = gateway.fleet();
    for &id in targets {
        let prefix = fleet.label(id);
        let Some(username) = fleet.effective_username(id) else {
            println!("{prefix} - No username configured for node or cluster");
            continue;
        };

        let code = gateway.call(id, "login", &[]).await?.status;
        match code {
            STATUS_UNREACHABLE => println!("{prefix} - Node is unreachable"),
            // Rule of silence: a working login prints nothing.
            STATUS_OK => {}
            STATUS_UNAUTHORIZED => {
                println!("{prefix} - Enter password (blank to skip):");
                let host = fleet.endpoint(id).host.clone();
                loop {
                    let password = prompt(&format!("{username}@{host}> "));
                    if password.is_empty() {
                        break;
                    }

                    fleet.endpoint(id).set_password(&password);
                    let code = gateway.call(id, "login", &[]).await?.status;
                    match code {
                        STATUS_OK => {
                            if let Err(err) = store.set(&host, &username, &password) {
                                tracing::warn!("failed to save password: {err}");
                            }
                            break;
                        }
                        STATUS_UNAUTHORIZED => println!("Invalid login, try again"),
                        STATUS_UNREACHABLE => {
                            println!("The node has gone away");
                            break;
                        }
                        other => {
                            println!("An error occurred, code {other}");
                            break;
                        }
                    }
                }
            }
            other => println!("An error occurred, code {other}"),
        }
    }
    Ok(Outcome::success())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fleet::{Fleet, FleetBuilder, NoStoredPasswords};
    use crate::testsupport::{Reply, ScriptedTransport, TestTempDir};

    fn fixture(transport: Arc<ScriptedTransport>) -> (Arc<Fleet>, Arc<Gateway>) {
        let mut builder = FleetBuilder::new();
        builder.add_node("n1", "http://admin@10.2.0.30").unwrap();
        let fleet = Arc::new(builder.finish());
        let gateway = Arc::new(Gateway::new(
            Arc::clone(&fleet),
            transport,
            Arc::new(NoStoredPasswords),
        ));
        (fleet, gateway)
    }

    #[tokio::test]
    async fn accepted_password_is_persisted() {
        let transport = Arc::new(ScriptedTransport::ok());
        transport.push_reply("n1", Reply::Result(401, None));
        transport.push_reply("n1", Reply::Result(401, None));
        transport.push_reply("n1", Reply::Result(200, None));

        let (_, gateway) = fixture(Arc::clone(&transport));
        let targets: Vec<_> = gateway.fleet().all_endpoints().collect();

        let dir = TestTempDir::new("login");
        let store = SecretStore::at_path(dir.child("secrets.json"));

        let attempts = std::sync::Mutex::new(vec!["wrong".to_string(), "right".to_string()]);
        let outcome = run_with_prompt(&gateway, &targets, &store, |_| {
            let mut guard = attempts.lock().unwrap();
            guard.remove(0)
        })
        .await
        .unwrap();

        assert_eq!(outcome, Outcome::success());
        // Initial probe plus one login per attempted password.
        assert_eq!(transport.methods_for("n1"), vec!["login", "login", "login"]);
        assert_eq!(
            store.get("10.2.0.30", "admin").unwrap().as_deref(),
            Some("right")
        );
    }

    #[tokio::test]
    async fn blank_password_skips_the_node() {
        let transport = Arc::new(ScriptedTransport::ok());
        transport.push_reply("n1", Reply::Result(401, None));

        let (_, gateway) = fixture(Arc::clone(&transport));
        let targets: Vec<_> = gateway.fleet().all_endpoints().collect();
        let dir = TestTempDir::new("login");
        let store = SecretStore::at_path(dir.child("secrets.json"));

        run_with_prompt(&gateway, &targets, &store, |_| String::new())
            .await
            .unwrap();
        assert_eq!(transport.methods_for("n1"), vec!["login"]);
        assert_eq!(store.get("10.2.0.30", "admin").unwrap(), None);
    }

    #[tokio::test]
    async fn node_without_username_is_skipped() {
        let transport = Arc::new(ScriptedTransport::ok());
        let mut builder = FleetBuilder::new();
        builder.add_node("bare", "10.2.0.40").unwrap();
        let fleet = Arc::new(builder.finish());
        let gateway = Arc::new(Gateway::new(
            Arc::clone(&fleet),
            Arc::clone(&transport) as Arc<dyn crate::rpc::RpcTransport>,
            Arc::new(NoStoredPasswords),
        ));
        let targets: Vec<_> = fleet.all_endpoints().collect();
        let dir = TestTempDir::new("login");
        let store = SecretStore::at_path(dir.child("secrets.json"));

        run_with_prompt(&gateway, &targets, &store, |_| {
            panic!("prompt should not be reached")
        })
        .await
        .unwrap();
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn successful_login_is_silent_and_stores_nothing() {
        let transport = Arc::new(ScriptedTransport::ok());
        let (_, gateway) = fixture(Arc::clone(&transport));
        let targets: Vec<_> = gateway.fleet().all_endpoints().collect();
        let dir = TestTempDir::new("login");
        let store = SecretStore::at_path(dir.child("secrets.json"));

        run_with_prompt(&gateway, &targets, &store, |_| {
            panic!("prompt should not be reached")
        })
        .await
        .unwrap();
        assert_eq!(transport.methods_for("n1"), vec!["login"]);
        assert_eq!(store.get("10.2.0.30", "admin").unwrap(), None);
    }
}
