//! Parallel dispatch: fan one logical operation out across endpoints.
//!
//! A fixed-capacity permit pool bounds how many calls are in flight at once,
//! independent of how many endpoints are targeted. Dispatch always joins all
//! tasks (no early exit on failure) and per-endpoint failures come back as
//! ordinary result values. Only two conditions abort a dispatch: a TLS
//! verification failure (fleet-wide misconfiguration) and a task panic
//! (programming error), which is re-raised rather than swallowed.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::RpcError;
use crate::fleet::order::endpoint_cmp;
use crate::fleet::{EndpointId, Fleet};
use crate::rpc::{CallResult, Gateway, RpcParam, STATUS_OK};

/// Ceiling on concurrently in-flight calls across one dispatcher.
pub const MAX_IN_FLIGHT: usize = 64;

/// Bounded fan-out executor shared by all commands in an invocation.
pub struct Dispatcher {
    permits: Arc<Semaphore>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::with_limit(MAX_IN_FLIGHT)
    }

    /// Dispatcher with an explicit in-flight ceiling (tests).
    pub fn with_limit(limit: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(limit)),
        }
    }

    /// Issue the same RPC call against every target concurrently.
    ///
    /// The result set contains exactly one entry per target, in
    /// Deterministic Order, with per-node failures as `status 0` values.
    pub async fn call_each(
        &self,
        gateway: &Arc<Gateway>,
        targets: &[EndpointId],
        method: &str,
        params: &[RpcParam],
    ) -> Result<Vec<(EndpointId, CallResult)>, RpcError> {
        let method = method.to_string();
        let params = params.to_vec();
        self.run_each(gateway.fleet(), targets, |id| {
            let gateway = Arc::clone(gateway);
            let method = method.clone();
            let params = params.clone();
            async move { gateway.call(id, &method, &params).await }
        })
        .await
    }

    /// Fan an arbitrary per-endpoint operation out across the targets.
    ///
    /// Used directly when the per-endpoint work is more than a single call
    /// (e.g. starting a remote process and wrapping its handle).
    pub async fn run_each<T, F, Fut>(
        &self,
        fleet: &Fleet,
        targets: &[EndpointId],
        task: F,
    ) -> Result<Vec<(EndpointId, T)>, RpcError>
    where
        T: Send + 'static,
        F: Fn(EndpointId) -> Fut,
        Fut: Future<Output = Result<T, RpcError>> + Send + 'static,
    {
        if targets.is_empty() {
            return Ok(Vec::new());
        }

        let mut set = JoinSet::new();
        for &id in targets {
            let permits = Arc::clone(&self.permits);
            let fut = task(id);
            set.spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .expect("dispatch permit pool closed");
                (id, fut.await)
            });
        }

        let mut results = Vec::with_capacity(targets.len());
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((id, Ok(value))) => results.push((id, value)),
                // A fatal error (TLS) aborts the dispatch; dropping the set
                // cancels the remaining tasks.
                Ok((_, Err(err))) => return Err(err),
                Err(join_err) => {
                    if join_err.is_panic() {
                        std::panic::resume_unwind(join_err.into_panic());
                    }
                    return Err(RpcError::TaskPanicked(join_err.to_string()));
                }
            }
        }

        results.sort_by(|a, b| endpoint_cmp(fleet, a.0, b.0));
        Ok(results)
    }
}

/// True when any result in the set is non-success; feeds the partial exit
/// code.
pub fn any_partial(results: &[(EndpointId, CallResult)]) -> bool {
    results.iter().any(|(_, result)| result.status != STATUS_OK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fleet::{FleetBuilder, NoStoredPasswords};
    use crate::testsupport::{Reply, ScriptedTransport};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn three_node_fixture(transport: Arc<ScriptedTransport>) -> (Arc<Fleet>, Arc<Gateway>) {
        let mut builder = FleetBuilder::new();
        for name in ["a", "b", "c"] {
            builder.add_node(name, "10.0.0.1").unwrap();
        }
        let c1: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        builder.add_cluster("c1", &c1, None, None).unwrap();
        let fleet = Arc::new(builder.finish());
        let gateway = Arc::new(Gateway::new(
            Arc::clone(&fleet),
            transport,
            Arc::new(NoStoredPasswords),
        ));
        (fleet, gateway)
    }

    #[tokio::test]
    async fn result_set_matches_target_set_under_partial_failure() {
        let transport = Arc::new(ScriptedTransport::ok());
        transport.push_reply("b", Reply::Result(0, None));
        let (fleet, gateway) = three_node_fixture(transport);

        let targets: Vec<_> = fleet.all_endpoints().collect();
        let results = Dispatcher::new()
            .call_each(&gateway, &targets, "getUptime", &[])
            .await
            .unwrap();

        assert_eq!(results.len(), 3);
        let by_name: Vec<(String, u16)> = results
            .iter()
            .map(|(id, r)| (fleet.endpoint(*id).name.clone(), r.status))
            .collect();
        assert_eq!(
            by_name,
            vec![
                ("a".to_string(), 200),
                ("b".to_string(), 0),
                ("c".to_string(), 200)
            ]
        );
        assert!(any_partial(&results));
    }

    #[tokio::test]
    async fn all_success_is_not_partial() {
        let transport = Arc::new(ScriptedTransport::ok());
        let (fleet, gateway) = three_node_fixture(transport);
        let targets: Vec<_> = fleet.all_endpoints().collect();
        let results = Dispatcher::new()
            .call_each(&gateway, &targets, "getUptime", &[])
            .await
            .unwrap();
        assert!(!any_partial(&results));
    }

    #[tokio::test]
    async fn empty_target_set_yields_empty_results() {
        let transport = Arc::new(ScriptedTransport::ok());
        let (_, gateway) = three_node_fixture(transport);
        let results = Dispatcher::new()
            .call_each(&gateway, &[], "getUptime", &[])
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn results_come_back_in_deterministic_order() {
        let transport = Arc::new(ScriptedTransport::ok());

        let mut builder = FleetBuilder::new();
        // Insertion order deliberately scrambled relative to natural order.
        for name in ["n10", "n2", "n1"] {
            builder.add_node(name, "10.0.0.1").unwrap();
        }
        let members: Vec<String> = ["n10", "n2", "n1"].iter().map(|s| s.to_string()).collect();
        builder.add_cluster("c1", &members, None, None).unwrap();
        let fleet = Arc::new(builder.finish());
        let gateway = Arc::new(Gateway::new(
            Arc::clone(&fleet),
            transport,
            Arc::new(NoStoredPasswords),
        ));

        let targets: Vec<_> = fleet.all_endpoints().collect();
        let results = Dispatcher::new()
            .call_each(&gateway, &targets, "getUptime", &[])
            .await
            .unwrap();
        let names: Vec<_> = results
            .iter()
            .map(|(id, _)| fleet.endpoint(*id).name.as_str())
            .collect();
        assert_eq!(names, ["n1", "n2", "n10"]);
    }

    #[tokio::test]
    async fn tls_failure_aborts_whole_dispatch() {
        let transport = Arc::new(ScriptedTransport::ok());
        transport.push_reply("b", Reply::TlsFailure);
        let (fleet, gateway) = three_node_fixture(transport);

        let targets: Vec<_> = fleet.all_endpoints().collect();
        let err = Dispatcher::new()
            .call_each(&gateway, &targets, "getUptime", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, RpcError::TlsVerification { .. }));
    }

    #[tokio::test]
    async fn in_flight_calls_respect_the_permit_ceiling() {
        let mut builder = FleetBuilder::new();
        for i in 0..8 {
            builder.add_node(&format!("n{i}"), "10.0.0.1").unwrap();
        }
        let fleet = Arc::new(builder.finish());
        let targets: Vec<_> = fleet.all_endpoints().collect();

        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let dispatcher = Dispatcher::with_limit(2);
        let results = dispatcher
            .run_each(&fleet, &targets, |_id| {
                let current = Arc::clone(&current);
                let peak = Arc::clone(&peak);
                async move {
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    current.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .await
            .unwrap();

        assert_eq!(results.len(), 8);
        assert!(
            peak.load(Ordering::SeqCst) <= 2,
            "peak concurrency {} exceeded limit",
            peak.load(Ordering::SeqCst)
        );
    }

    #[tokio::test]
    #[should_panic(expected = "deliberate task panic")]
    async fn task_panics_are_re_raised() {
        let mut builder = FleetBuilder::new();
        builder.add_node("n1", "10.0.0.1").unwrap();
        let fleet = Arc::new(builder.finish());
        let targets: Vec<_> = fleet.all_endpoints().collect();

        let _ = Dispatcher::new()
            .run_each::<(), _, _>(&fleet, &targets, |_id| async move {
                panic!("deliberate task panic")
            })
            .await;
    }
}
