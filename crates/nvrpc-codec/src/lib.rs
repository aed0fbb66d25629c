//! msgpack-RPC message framing for editor RPC sessions.
//!
//! Every message on the wire is a fixed-arity msgpack array tagged by its
//! leading element:
//! - `[0, msgid, method, args]` — request
//! - `[1, msgid, error, result]` — response
//! - `[2, method, args]` — notification
//!
//! Decoding is incremental: a single transport read may carry a partial
//! message or several concatenated ones, so the codec buffers trailing
//! bytes and never assumes read and message boundaries coincide.

pub mod codec;
pub mod error;
pub mod message;
pub mod stream;

pub use codec::{decode_message, encode_message};
pub use error::{CodecError, Result};
pub use message::{Message, NOTIFICATION, REQUEST, RESPONSE};
pub use stream::{RpcStream, StreamHandle};
