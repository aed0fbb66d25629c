//! Blocking transport abstraction for editor RPC sessions.
//!
//! Provides a unified interface over the four channel kinds an RPC session
//! can run on:
//! - TCP client connections
//! - Unix domain socket connections (Unix only)
//! - the process's own standard streams
//! - a spawned child process, wired up via stdio pipes
//!
//! This is the lowest layer of nvrpc. Everything else builds on top of the
//! [`Transport`] type provided here: a blocking read loop that feeds raw
//! bytes to a callback, writes with transparent would-block retry, and an
//! idempotent stop/shutdown lifecycle.

pub mod endpoint;
pub mod error;
pub mod transport;

pub use endpoint::Endpoint;
pub use error::{Result, TransportError};
pub use transport::{RunExit, Transport, TransportHandle};
