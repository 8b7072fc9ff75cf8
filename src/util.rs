//! Small host-introspection helpers, grounded on
//! `examples/original_source/internal/logic/logic.go` (`GetLocalIP`,
//! `GetHostName`) and the `hostname::get()` call in
//! `src-tauri/src/runtime/lan/mod.rs`.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::time::Duration;

use rand::Rng;

/// First non-loopback IPv4 address bound to any local interface.
///
/// The Go original enumerates `net.InterfaceAddrs()` and picks the first
/// non-loopback IPv4; std's portable equivalent (no interface-enumeration
/// API in std) is the standard trick of connecting a UDP socket to an
/// off-host address and reading back the address the OS routed it from —
/// no packet is actually sent for `UdpSocket::connect`.
pub fn local_ipv4() -> Option<Ipv4Addr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket
        .connect(SocketAddr::from(([8, 8, 8, 8], 80)))
        .ok()?;
    match socket.local_addr().ok()?.ip() {
        IpAddr::V4(v4) if !v4.is_loopback() => Some(v4),
        _ => None,
    }
}

/// Human-friendly device label, falling back to a generic name if the OS
/// hostname cannot be read.
pub fn local_device_name() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "lanshare-host".to_string())
}

/// A duration picked uniformly at random from `[min_secs, max_secs]`,
/// shared by every long-lived task that needs to poll for cancellation
/// without lockstepping with its peers on the LAN (spec §4.2, §4.4).
pub fn jittered_secs(min_secs: u64, max_secs: u64) -> Duration {
    Duration::from_millis(rand::thread_rng().gen_range(min_secs * 1_000..=max_secs * 1_000))
}
