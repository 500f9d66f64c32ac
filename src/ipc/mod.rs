//! IPC module for daemon-engine communication

mod protocol;
mod server;

pub use protocol::{DaemonStatus, Request, Response};
pub use server::Server;
