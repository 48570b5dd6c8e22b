//! Bridge between the local terminal and remote processes.
//!
//! Interactive mode attaches one remote process to the real terminal: an
//! output worker drains `poll` into local stdout, an input/control worker
//! drains a FIFO event queue into `push`/`resize` calls, and the main loop
//! feeds that queue from local key and resize events while the terminal sits
//! in raw mode behind a drop guard.
//!
//! Batch mode multiplexes many remote processes without a terminal: it polls
//! every outstanding handle in rounds, buffers output per endpoint, stages
//! Ctrl-C into signal-then-stop, and hands the buffers back in Deterministic
//! Order once everything is done.

pub mod keys;

use std::collections::HashMap;
use std::io::{self, IsTerminal, Write};
use std::sync::Arc;
use std::time::Duration;

use crossterm::event::Event;
use crossterm::terminal;
use tokio::sync::mpsc;
use tokio::sync::Notify;
use tokio::time::sleep;

use crate::error::{BridgeError, RpcError};
use crate::fleet::order::sort_endpoints;
use crate::fleet::{EndpointId, Fleet};
use crate::process::{ProcessPoll, RemoteProcess, SIGINT};

/// Bounded wait applied between empty remote polls and as the input worker's
/// re-check interval, keeping resizes responsive even with no traffic.
const DRAIN_WAIT: Duration = Duration::from_millis(200);
/// Local key/resize polling granularity.
const LOCAL_POLL_INTERVAL: Duration = Duration::from_millis(50);
/// Pause between batch poll rounds that produced no output.
const BATCH_ROUND_WAIT: Duration = Duration::from_millis(200);

/// Events flowing from the main loop to the input/control worker.
///
/// The queue is strictly FIFO: scrambling keystroke order would corrupt the
/// remote shell's view of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEvent {
    /// Keystroke or paste bytes for the remote stdin.
    Write(Vec<u8>),
    /// Local terminal viewport changed.
    Resize(u16, u16),
    /// Session teardown sentinel.
    Shutdown,
}

/// Raw mode lifetime guard so terminal state is restored on any return path.
struct RawModeGuard;

impl RawModeGuard {
    fn acquire() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

/// Attach the local terminal to one remote process until it finishes.
///
/// The terminal's prior mode is restored unconditionally, whichever path
/// exits the session.
pub async fn run_interactive(process: Arc<RemoteProcess>) -> Result<(), BridgeError> {
    let (event_tx, event_rx) = mpsc::unbounded_channel::<BridgeEvent>();
    let drain = Arc::new(Notify::new());

    let guard = RawModeGuard::acquire()?;

    let output = tokio::spawn(output_pump(
        Arc::clone(&process),
        Arc::clone(&drain),
        io::stdout(),
    ));
    let input = tokio::spawn(input_pump(
        Arc::clone(&process),
        event_rx,
        Arc::clone(&drain),
    ));

    let local_process = Arc::clone(&process);
    let local = tokio::task::spawn_blocking(move || local_event_loop(&local_process, &event_tx));
    let local_result = local
        .await
        .unwrap_or_else(|join_err| Err(io::Error::other(join_err.to_string())));

    let _ = output.await;
    let _ = input.await;
    drop(guard);

    local_result.map_err(BridgeError::from)
}

/// Output worker: drain remote output into the local writer.
async fn output_pump<W>(process: Arc<RemoteProcess>, drain: Arc<Notify>, mut writer: W)
where
    W: Write + Send + 'static,
{
    loop {
        match process.poll().await {
            Ok(ProcessPoll::Done) => break,
            Err(_) => {
                // A transport-level failure mid-session ends it; mark the
                // proxy done so the other workers unwind too.
                let _ = process.stop().await;
                break;
            }
            Ok(ProcessPoll::Output(chunk)) => {
                if chunk.is_empty() {
                    drain.notify_waiters();
                    sleep(DRAIN_WAIT).await;
                } else {
                    let _ = writer.write_all(chunk.as_bytes());
                    let _ = writer.flush();
                    drain.notify_waiters();
                }
            }
        }
    }
    // Final wakeup so waiters notice the Done state promptly.
    drain.notify_waiters();
}

/// Input/control worker: apply queued events strictly in arrival order.
async fn input_pump(
    process: Arc<RemoteProcess>,
    mut events: mpsc::UnboundedReceiver<BridgeEvent>,
    drain: Arc<Notify>,
) {
    loop {
        // Wake on the next event, a drain signal from the output worker, or
        // the bounded wait elapsing, whichever comes first.
        let event = tokio::select! {
            event = events.recv() => match event {
                Some(event) => Some(event),
                None => break,
            },
            _ = drain.notified() => None,
            _ = sleep(DRAIN_WAIT) => None,
        };

        let Some(event) = event else {
            if process.is_done() {
                break;
            }
            continue;
        };

        match event {
            BridgeEvent::Write(bytes) => match process.push(&bytes).await {
                Ok(Some(status)) if status == crate::rpc::STATUS_OK => {}
                _ => break,
            },
            BridgeEvent::Resize(cols, rows) => {
                let _ = process.resize(cols, rows).await;
            }
            BridgeEvent::Shutdown => {
                let _ = process.stop().await;
                break;
            }
        }
    }
}

/// Main/control loop: poll the local terminal and enqueue events.
///
/// Runs on a blocking thread; exits once the remote process is done.
fn local_event_loop(
    process: &RemoteProcess,
    events: &mpsc::UnboundedSender<BridgeEvent>,
) -> io::Result<()> {
    loop {
        if process.is_done() {
            let _ = events.send(BridgeEvent::Shutdown);
            return Ok(());
        }
        if !crossterm::event::poll(LOCAL_POLL_INTERVAL)? {
            continue;
        }
        let send_result = match crossterm::event::read()? {
            Event::Key(key) => match keys::key_event_bytes(&key) {
                Some(bytes) => events.send(BridgeEvent::Write(bytes)),
                None => Ok(()),
            },
            Event::Resize(cols, rows) => events.send(BridgeEvent::Resize(cols, rows)),
            _ => Ok(()),
        };
        if send_result.is_err() {
            // Input worker is gone; the session is tearing down.
            return Ok(());
        }
    }
}

/// Poll many remote processes to completion without a terminal.
///
/// The first local Ctrl-C sends SIGINT to every still-running process; a
/// second one stops them outright. Buffered output comes back per endpoint
/// in Deterministic Order.
pub async fn run_batch(
    fleet: &Fleet,
    handles: Vec<Arc<RemoteProcess>>,
) -> Result<Vec<(EndpointId, String)>, RpcError> {
    let mut buffers: HashMap<EndpointId, String> = handles
        .iter()
        .map(|handle| (handle.endpoint(), String::new()))
        .collect();
    let mut unfinished = handles;
    let mut sigint_sent = false;
    let progress = io::stderr().is_terminal();
    let mut dots = 3usize;

    // A long-lived listener counts Ctrl-C presses so none are lost between
    // poll rounds; the rounds themselves stay free of signal plumbing.
    let interrupts = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let listener = {
        let interrupts = Arc::clone(&interrupts);
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                interrupts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            }
        })
    };

    let rounds: Result<(), RpcError> = async {
        while !unfinished.is_empty() {
            if progress {
                print_waiting_message(sigint_sent, &mut dots);
            }

            let pressed = interrupts.swap(0, std::sync::atomic::Ordering::SeqCst);
            if pressed > 0 {
                if !sigint_sent {
                    sigint_sent = true;
                    for handle in &unfinished {
                        let _ = handle.signal(SIGINT).await?;
                    }
                } else {
                    for handle in &unfinished {
                        handle.stop().await?;
                    }
                }
            }

            let produced = poll_round(&mut unfinished, &mut buffers).await?;
            if !produced && !unfinished.is_empty() {
                sleep(BATCH_ROUND_WAIT).await;
            }
        }
        Ok(())
    }
    .await;
    listener.abort();
    if progress {
        eprint!("\r");
        let _ = io::stderr().flush();
    }
    rounds?;

    let mut ids: Vec<EndpointId> = buffers.keys().copied().collect();
    sort_endpoints(fleet, &mut ids);
    Ok(ids
        .into_iter()
        .map(|id| {
            let output = buffers.remove(&id).unwrap_or_default();
            (id, output)
        })
        .collect())
}

/// One poll across every outstanding handle; true when any output arrived.
async fn poll_round(
    unfinished: &mut Vec<Arc<RemoteProcess>>,
    buffers: &mut HashMap<EndpointId, String>,
) -> Result<bool, RpcError> {
    let mut produced = false;
    let mut still_running = Vec::with_capacity(unfinished.len());
    for handle in unfinished.drain(..) {
        match handle.poll().await? {
            ProcessPoll::Output(chunk) => {
                if !chunk.is_empty() {
                    produced = true;
                    if let Some(buffer) = buffers.get_mut(&handle.endpoint()) {
                        buffer.push_str(&chunk);
                    }
                }
                still_running.push(handle);
            }
            ProcessPoll::Done => {}
        }
    }
    *unfinished = still_running;
    Ok(produced)
}

fn print_waiting_message(sigint_sent: bool, dots: &mut usize) {
    const MAX_DOTS: usize = 3;
    let trail = format!("{}{}", ".".repeat(*dots), " ".repeat(MAX_DOTS - *dots));
    *dots = if *dots < MAX_DOTS { *dots + 1 } else { 1 };
    let message = if sigint_sent {
        "Termination requested, waiting"
    } else {
        "Waiting for processes to complete"
    };
    let hint = if sigint_sent {
        "(Press Ctrl+C to kill)"
    } else {
        "(Press Ctrl+C to stop it)"
    };
    eprint!("\r{message}{trail} {hint}");
    let _ = io::stderr().flush();
}
