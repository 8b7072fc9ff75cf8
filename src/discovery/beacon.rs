//! Periodic broadcast beacon, grounded on `run_beacon_broadcaster` in
//! `src-tauri/src/runtime/lan/discovery.rs`.
//!
//! Departs from the teacher's fixed-interval tick: spec §4.2 calls for a
//! jittered 5-10s period so that multiple hosts on the same LAN don't
//! broadcast in lockstep.

use std::net::SocketAddr;
use std::time::Duration;

use log::{debug, warn};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::codec::{encode_discovery, PeerDescriptor};
use crate::supervisor::{Command, EventRecord};
use crate::util::{jittered_secs, local_ipv4};

/// Broadcast this host's [`PeerDescriptor`] on `discovery_port` until
/// cancelled. Every I/O error is logged and the loop continues (spec §7:
/// transient network errors never abort a long-lived task).
pub async fn run(
    device_name: String,
    session_port: u16,
    discovery_port: u16,
    events: mpsc::Sender<EventRecord>,
    commands: mpsc::Sender<Command>,
    cancel: CancellationToken,
) {
    // Spec §4.2 step 1: resolve the local IPv4 before doing anything else;
    // with none available there is nothing to advertise.
    let Some(local_ip) = local_ipv4() else {
        let _ = events
            .send(EventRecord::Log(log::Level::Warn, "no local IPv4".into()))
            .await;
        return;
    };

    let socket = match super::bind_reusable_udp(0) {
        Ok(std_socket) => match tokio::net::UdpSocket::from_std(std_socket) {
            Ok(s) => s,
            Err(e) => {
                let reason = format!("beacon: failed to adopt broadcast socket: {e}");
                let _ = events
                    .send(EventRecord::TransferError("<beacon>".into(), reason.clone()))
                    .await;
                let _ = commands.send(Command::ConfigFailure(reason)).await;
                return;
            }
        },
        Err(e) => {
            let reason = format!("beacon: failed to bind broadcast socket: {e}");
            let _ = events
                .send(EventRecord::TransferError("<beacon>".into(), reason.clone()))
                .await;
            let _ = commands.send(Command::ConfigFailure(reason)).await;
            return;
        }
    };

    let broadcast_addr: SocketAddr = ([255, 255, 255, 255], discovery_port).into();
    let descriptor = PeerDescriptor {
        ip: local_ip.to_string(),
        port: session_port,
        name: device_name,
    };
    let payload = encode_discovery(&descriptor);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("beacon: cancelled");
                return;
            }
            _ = tokio::time::sleep(jittered_secs(5, 10)) => {
                if let Err(e) = socket.send_to(&payload, broadcast_addr).await {
                    warn!("beacon: send_to failed: {e}");
                    continue;
                }
                // Drain whatever lands on this socket for a few seconds
                // and discard it; the listener, not the beacon, is the
                // authority on discovered peers.
                let mut discard = [0u8; 4096];
                let _ = tokio::time::timeout(Duration::from_secs(5), socket.recv_from(&mut discard)).await;
            }
        }
    }
}
