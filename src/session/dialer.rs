//! Session dialer, grounded on the connect half of `run_tcp_client` in
//! `src-tauri/src/runtime/lan/peer.rs` — without that function's
//! exponential-backoff reconnect loop. Spec §4.3 standardizes the sender
//! as the sole initiator and a failed dial simply surfaces as a
//! `TransferError`; there is nothing to retry.

use tokio::net::TcpStream;

use crate::codec::PeerDescriptor;
use crate::error::CoreError;

/// Connect once to `peer`'s advertised `(ip, port)`.
pub async fn dial(peer: &PeerDescriptor) -> Result<TcpStream, CoreError> {
    TcpStream::connect((peer.ip.as_str(), peer.port))
        .await
        .map_err(CoreError::from)
}
