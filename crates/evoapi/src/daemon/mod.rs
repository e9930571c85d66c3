//! Daemon mode: one long-lived client (and contact cache) shared by every
//! caller connecting over a UNIX socket.
//!
//! CHANGELOG:
//! - 10/18/2026 - Initial module structure

pub mod client;
pub mod protocol;
pub mod server;
pub mod service;

/// Default socket path (tilde-expanded by the binaries).
pub const DEFAULT_SOCKET: &str = "~/.evoapi/daemon.sock";
