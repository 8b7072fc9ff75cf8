//! UDP discovery listener, grounded on `run_beacon_listener`/`upsert_peer`
//! in `src-tauri/src/runtime/lan/discovery.rs`.

use log::{debug, warn};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::codec::decode_discovery;
use crate::supervisor::{Command, EventRecord};
use crate::util::local_ipv4;

use super::PeerSet;

/// Listen for discovery datagrams on `discovery_port`, self-filtering this
/// host's own beacon by IP, and emit [`EventRecord::PeerDiscovered`] for
/// every peer not already in `peers` (spec §4.2).
pub async fn run(
    discovery_port: u16,
    peers: PeerSet,
    events: mpsc::Sender<EventRecord>,
    commands: mpsc::Sender<Command>,
    cancel: CancellationToken,
) {
    let socket = match super::bind_reusable_udp(discovery_port) {
        Ok(std_socket) => match tokio::net::UdpSocket::from_std(std_socket) {
            Ok(s) => s,
            Err(e) => {
                let reason = format!("listener: failed to adopt socket: {e}");
                let _ = events
                    .send(EventRecord::TransferError("<listener>".into(), reason.clone()))
                    .await;
                let _ = commands.send(Command::ConfigFailure(reason)).await;
                return;
            }
        },
        Err(e) => {
            let reason = format!("listener: failed to bind port {discovery_port}: {e}");
            let _ = events
                .send(EventRecord::TransferError("<listener>".into(), reason.clone()))
                .await;
            let _ = commands.send(Command::ConfigFailure(reason)).await;
            return;
        }
    };

    let self_ip = local_ipv4().map(|v| v.to_string());
    let mut buf = [0u8; 4096];

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            recv = socket.recv_from(&mut buf) => {
                let (len, _from) = match recv {
                    Ok(v) => v,
                    Err(e) => {
                        warn!("listener: recv_from failed: {e}");
                        continue;
                    }
                };

                let peer = match decode_discovery(&buf[..len]) {
                    Ok(p) => p,
                    Err(e) => {
                        warn!("listener: malformed discovery datagram: {e}");
                        continue;
                    }
                };

                if self_ip.as_deref() == Some(peer.ip.as_str()) {
                    debug!("listener: self; ignored");
                    let _ = events
                        .send(EventRecord::Log(log::Level::Debug, "self; ignored".into()))
                        .await;
                    continue;
                }

                if peers.insert(peer.clone()) {
                    let _ = events.send(EventRecord::PeerDiscovered(peer)).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::net::UdpSocket;
    use tokio::time::timeout;

    use crate::codec::{encode_discovery, PeerDescriptor};
    use crate::util::local_ipv4;

    use super::*;

    async fn spawn_listener(
        port: u16,
    ) -> (
        PeerSet,
        mpsc::Receiver<EventRecord>,
        mpsc::Receiver<Command>,
        CancellationToken,
        tokio::task::JoinHandle<()>,
    ) {
        let peers = super::super::new_peer_set();
        let (events_tx, events_rx) = mpsc::channel(32);
        let (commands_tx, commands_rx) = mpsc::channel(32);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(port, peers.clone(), events_tx, commands_tx, cancel.clone()));
        (peers, events_rx, commands_rx, cancel, handle)
    }

    /// Testable property #1: a beacon datagram advertising this host's own
    /// IP is dropped, not surfaced as `PeerDiscovered`, and logged.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn self_originated_datagram_is_filtered_and_logged() {
        let Some(self_ip) = local_ipv4() else {
            // No routable non-loopback interface in this environment —
            // nothing for the listener to self-filter against.
            return;
        };
        let (peers, mut events_rx, _commands_rx, cancel, handle) = spawn_listener(19201).await;

        let sender = UdpSocket::bind("0.0.0.0:0").await.unwrap();
        let descriptor = PeerDescriptor {
            ip: self_ip.to_string(),
            port: 9999,
            name: "me".into(),
        };
        sender
            .send_to(&encode_discovery(&descriptor), ("127.0.0.1", 19201))
            .await
            .unwrap();

        let event = timeout(Duration::from_secs(2), events_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(&event, EventRecord::Log(log::Level::Debug, msg) if msg == "self; ignored"));
        assert!(peers.snapshot().is_empty());

        cancel.cancel();
        let _ = handle.await;
    }

    /// Testable property #2: the same peer advertised twice is reported as
    /// `PeerDiscovered` only once; a distinct peer still gets its own event.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn duplicate_peer_advertisement_is_reported_once() {
        let (peers, mut events_rx, _commands_rx, cancel, handle) = spawn_listener(19202).await;

        let sender = UdpSocket::bind("0.0.0.0:0").await.unwrap();
        let first_peer = PeerDescriptor {
            ip: "10.77.0.5".into(),
            port: 8888,
            name: "other".into(),
        };
        let payload = encode_discovery(&first_peer);
        sender.send_to(&payload, ("127.0.0.1", 19202)).await.unwrap();
        sender.send_to(&payload, ("127.0.0.1", 19202)).await.unwrap();

        let event = timeout(Duration::from_secs(2), events_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(&event, EventRecord::PeerDiscovered(p) if *p == first_peer));

        // The duplicate never produces a second event: the very next thing
        // the listener reports is a third, distinct peer, not a repeat.
        let second_peer = PeerDescriptor {
            ip: "10.77.0.6".into(),
            port: 8888,
            name: "third".into(),
        };
        sender
            .send_to(&encode_discovery(&second_peer), ("127.0.0.1", 19202))
            .await
            .unwrap();

        let event = timeout(Duration::from_secs(2), events_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(&event, EventRecord::PeerDiscovered(p) if *p == second_peer));

        assert_eq!(peers.snapshot().len(), 2);

        cancel.cancel();
        let _ = handle.await;
    }
}
