//! mailctl: manage fleets of mail-appliance nodes.
//!
//! This crate fans RPC operations out across configured nodes and clusters,
//! aggregates per-node outcomes into deterministically ordered result sets,
//! and can attach a local terminal to a process running on a remote node.
//!
//! # Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use mailctl::config::{build_fleet, load_config};
//! use mailctl::dispatch::Dispatcher;
//! use mailctl::fleet::NoStoredPasswords;
//! use mailctl::rpc::{Gateway, HttpTransport};
//!
//! # async fn example() {
//! let config = load_config(None).unwrap();
//! let fleet = Arc::new(build_fleet(&config, &[]).unwrap());
//! let gateway = Arc::new(Gateway::new(
//!     Arc::clone(&fleet),
//!     Arc::new(HttpTransport::new(config.verify_tls)),
//!     Arc::new(NoStoredPasswords),
//! ));
//! let targets: Vec<_> = fleet.all_endpoints().collect();
//! let results = Dispatcher::new()
//!     .call_each(&gateway, &targets, "getUptime", &[])
//!     .await
//!     .unwrap();
//! for (id, result) in results {
//!     println!("{}: {}", fleet.label(id), result.status);
//! }
//! # }
//! ```

pub mod bridge;
pub mod commands;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod fleet;
pub mod process;
pub mod render;
pub mod rpc;
pub mod secrets;
#[cfg(test)]
pub mod testsupport;
pub mod util;
