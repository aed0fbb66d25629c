use std::fmt;

use nvrpc_codec::CodecError;
use nvrpc_transport::TransportError;
use rmpv::Value;

/// An error reported by the peer in a response message.
///
/// The wire convention is a `[code, message]` pair; anything else is kept
/// as its textual rendering with code 0.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    /// Interpret a response's non-nil error value.
    pub fn from_value(value: &Value) -> Self {
        if let Value::Array(fields) = value {
            if let [code, message] = fields.as_slice() {
                if let (Some(code), Some(message)) = (code.as_i64(), message.as_str()) {
                    return Self {
                        code,
                        message: message.to_string(),
                    };
                }
            }
        }
        Self {
            code: 0,
            message: value.to_string(),
        }
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Errors surfaced to session callers.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The underlying transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Encoding or decoding failed.
    #[error("codec error: {0}")]
    Codec(CodecError),

    /// The peer answered the request with an error.
    #[error("error response from peer: {0}")]
    Peer(RpcError),

    /// The session ended before the response arrived.
    #[error("connection closed before a response arrived")]
    Disconnected,
}

impl From<CodecError> for SessionError {
    fn from(err: CodecError) -> Self {
        // A transport failure below the codec is still a transport failure.
        match err {
            CodecError::Transport(err) => Self::Transport(err),
            other => Self::Codec(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peer_error_from_code_message_pair() {
        let value = Value::Array(vec![
            Value::from(1),
            Value::from("wrong number of arguments: expecting 1 but got 2"),
        ]);
        let err = RpcError::from_value(&value);
        assert_eq!(err.code, 1);
        assert!(SessionError::Peer(err)
            .to_string()
            .contains("wrong number of arguments"));
    }

    #[test]
    fn peer_error_from_unconventional_value() {
        let err = RpcError::from_value(&Value::from("boom"));
        assert_eq!(err.code, 0);
        assert!(err.message.contains("boom"));
    }

    #[test]
    fn transport_errors_flatten_through_codec() {
        let err = SessionError::from(CodecError::Transport(TransportError::Shutdown));
        assert!(matches!(err, SessionError::Transport(_)));
    }
}
