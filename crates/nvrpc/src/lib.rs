//! Editor RPC client and host engine.
//!
//! nvrpc lets an external process act as both caller and callee of a text
//! editor's msgpack-RPC protocol — over TCP, a Unix domain socket, its own
//! standard streams, or a spawned editor child process.
//!
//! # Crate Structure
//!
//! - [`transport`] — blocking channel abstraction (TCP, UDS, stdio, child)
//! - [`codec`] — incremental msgpack-RPC message framing
//! - [`session`] — request/response correlation and the blocking facade

/// Re-export transport types.
pub mod transport {
    pub use nvrpc_transport::*;
}

/// Re-export codec types.
pub mod codec {
    pub use nvrpc_codec::*;
}

/// Re-export session types.
pub mod session {
    pub use nvrpc_session::*;
}
