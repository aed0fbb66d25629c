//! Request/response correlation and the blocking session facade.
//!
//! [`AsyncSession`] is the correlator: it classifies inbound messages,
//! keeps the table of in-flight outbound requests, fires each stored
//! completion when its response decodes, and forwards inbound requests and
//! notifications to a caller-supplied dispatcher. It never blocks a
//! logical caller itself — completions are continuations.
//!
//! [`Session`] is the "just works" layer on top: `request` blocks the
//! calling thread until the matching response arrives (the read loop must
//! be running on some thread for that to resolve), and errors from the
//! peer surface as structured [`SessionError`]s.

pub mod async_session;
pub mod error;
pub mod incoming;
pub mod session;

pub use async_session::{AsyncSession, SessionHandle};
pub use error::{Result, RpcError, SessionError};
pub use incoming::{Incoming, IncomingRequest};
pub use nvrpc_transport::RunExit;
pub use rmpv::Value;
pub use session::Session;
