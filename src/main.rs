//! CLI entry point for mailctl.

mod cli;

use clap::Parser;
use mailctl::commands::{self, Outcome};
use mailctl::config::{build_fleet, load_config, FileConfig};
use mailctl::dispatch::Dispatcher;
use mailctl::error::{ConfigError, RpcError};
use mailctl::fleet::select::select_targets;
use mailctl::rpc::{Gateway, HttpTransport};
use mailctl::secrets::SecretStore;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Reserved exit code for invocations where some targets did not succeed.
const PARTIAL_EXIT_CODE: i32 = 99;

#[tokio::main]
async fn main() {
    let args = cli::Args::parse();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        // Quick-connect invocations are self-contained; a missing config
        // file is fine for them.
        Err(ConfigError::MissingFile(_)) if !args.quick.is_empty() => FileConfig::default(),
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    let fleet = match build_fleet(&config, &args.quick) {
        Ok(fleet) => Arc::new(fleet),
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    let targets = match select_targets(&fleet, &args.nodes, &args.clusters, &args.slice) {
        Ok(targets) => targets,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    let store = Arc::new(SecretStore::open_default());
    let gateway = Arc::new(Gateway::new(
        Arc::clone(&fleet),
        Arc::new(HttpTransport::new(config.verify_tls)),
        Arc::clone(&store) as Arc<dyn mailctl::fleet::PasswordSource>,
    ));
    let dispatcher = Dispatcher::new();

    let outcome = match run_command(&args, &gateway, &dispatcher, &targets, &store).await {
        Ok(outcome) => outcome,
        Err(err) => {
            eprintln!("ERROR: {err}");
            if let Some(remediation) = err.remediation() {
                eprintln!();
                eprintln!("{remediation}");
            }
            std::process::exit(1);
        }
    };

    if outcome.exitcode != 0 {
        std::process::exit(outcome.exitcode);
    }
    if outcome.partial && !args.ignore_partial {
        std::process::exit(PARTIAL_EXIT_CODE);
    }
}

async fn run_command(
    args: &cli::Args,
    gateway: &Arc<Gateway>,
    dispatcher: &Dispatcher,
    targets: &[mailctl::fleet::EndpointId],
    store: &SecretStore,
) -> Result<Outcome, RpcError> {
    match &args.command {
        cli::Command::Status { verbose } => {
            commands::status::run(gateway, dispatcher, targets, *verbose).await
        }
        cli::Command::Run { command } => {
            commands::run::run(gateway, dispatcher, targets, command).await
        }
        cli::Command::Tty { command } => commands::tty::run(gateway, targets, command).await,
        cli::Command::Login => commands::login::run(gateway, targets, store).await,
        cli::Command::Logout { yes } => commands::logout::run(gateway, targets, store, *yes).await,
    }
}
