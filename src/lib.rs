//! `lanshare` core: LAN peer discovery and a framed file/directory transfer
//! protocol, driven by a supervisor the terminal front-end (or any other
//! collaborator) talks to over a small command/event API.

pub mod codec;
pub mod config;
pub mod discovery;
pub mod error;
pub mod logging;
pub mod session;
pub mod supervisor;
pub mod transfer;
pub mod util;

pub use error::CoreError;
pub use supervisor::{spawn_supervisor, EventRecord, Role, State, SupervisorHandle};
