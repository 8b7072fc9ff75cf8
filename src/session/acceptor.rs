//! Session acceptor, grounded on `run_tcp_host` in
//! `src-tauri/src/runtime/lan/peer.rs`.
//!
//! Departs from the teacher: `TcpListener::accept` has no native deadline,
//! so each iteration wraps it in a bounded `tokio::time::timeout` and races
//! that against cancellation, rather than the teacher's bare
//! `tokio::select!` over an unbounded `accept()` future. Only the first
//! accepted connection is kept (spec §4.3); the listener is dropped
//! immediately afterward.

use log::{debug, warn};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::supervisor::{Command, EventRecord};
use crate::util::jittered_secs;

/// Listen on `config.session_port` until either a peer connects (handed
/// off through `handoff`) or `cancel` fires.
pub async fn run(
    config: Config,
    events: mpsc::Sender<EventRecord>,
    commands: mpsc::Sender<Command>,
    cancel: CancellationToken,
    handoff: oneshot::Sender<TcpStream>,
) {
    let listener = match TcpListener::bind(("0.0.0.0", config.session_port)).await {
        Ok(l) => l,
        Err(e) => {
            let reason = format!("acceptor: failed to bind port {}: {e}", config.session_port);
            let _ = events
                .send(EventRecord::TransferError("<acceptor>".into(), reason.clone()))
                .await;
            let _ = commands.send(Command::ConfigFailure(reason)).await;
            return;
        }
    };

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("acceptor: cancelled before any connection arrived");
                return;
            }
            // Poll deadline jittered 5-10s like the beacon's tick, per
            // spec §4.4/§5, so the acceptor re-checks cancellation without
            // lockstepping with other LAN hosts' own accept loops.
            accepted = tokio::time::timeout(jittered_secs(5, 10), listener.accept()) => {
                match accepted {
                    Ok(Ok((stream, addr))) => {
                        debug!("acceptor: accepted connection from {addr}");
                        let _ = handoff.send(stream);
                        return;
                    }
                    Ok(Err(e)) => {
                        warn!("acceptor: accept() failed: {e}");
                    }
                    Err(_timed_out) => {
                        // No connection within this poll window; loop back
                        // around to re-check cancellation.
                    }
                }
            }
        }
    }
}
