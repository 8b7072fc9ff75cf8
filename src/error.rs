//! Error taxonomy shared by the discovery, session, and transfer modules.
//!
//! `TransientNetworkIO` (spec §7) has no variant here: it never leaves the
//! task that observed it — the owning task logs it via an `EventRecord::Log`
//! and continues, so there is nothing for a caller to match on.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("network io failed: {0}")]
    FatalNetworkIO(#[source] std::io::Error),

    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    #[error("transfer truncated: {0}")]
    TruncatedTransfer(String),

    #[error("unsafe path in frame: {0}")]
    UnsafePath(String),

    #[error("filesystem error: {0}")]
    FilesystemError(#[source] std::io::Error),

    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::FatalNetworkIO(e)
    }
}
