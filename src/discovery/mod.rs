//! UDP discovery triad: a best-effort broadcast beacon and a listener that
//! accumulates advertised peers into a shared set, grounded on
//! `src-tauri/src/runtime/lan/discovery.rs`.

pub mod beacon;
pub mod listener;

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::codec::PeerDescriptor;

/// Shared set of peers seen so far this run. No staleness pruning (spec
/// §4.2: peers are never expired, only accumulated, since the listener's
/// lifetime is bounded by the discovery triad's own shutdown).
#[derive(Clone)]
pub struct PeerSet(Arc<RwLock<HashSet<PeerDescriptor>>>);

pub fn new_peer_set() -> PeerSet {
    PeerSet(Arc::new(RwLock::new(HashSet::new())))
}

impl PeerSet {
    /// Insert `peer`, returning `true` if it had not been seen before.
    pub fn insert(&self, peer: PeerDescriptor) -> bool {
        self.0.write().insert(peer)
    }

    pub fn snapshot(&self) -> Vec<PeerDescriptor> {
        self.0.read().iter().cloned().collect()
    }
}

/// Bind a UDP socket with `SO_REUSEADDR`/`SO_REUSEPORT` set, letting
/// multiple local processes share the discovery port (spec §4.2; grounded
/// on `bind_reusable_udp` in `lan/discovery.rs`).
fn bind_reusable_udp(port: u16) -> std::io::Result<std::net::UdpSocket> {
    use socket2::{Domain, Protocol, Socket, Type};

    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    socket.set_reuse_port(true)?;
    socket.set_broadcast(true)?;
    socket.set_nonblocking(true)?;

    let addr: std::net::SocketAddr = ([0, 0, 0, 0], port).into();
    socket.bind(&addr.into())?;
    Ok(socket.into())
}
