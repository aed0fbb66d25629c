/// Errors that can occur while encoding or decoding RPC messages.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The leading bytes cannot be decoded as a msgpack value.
    #[error("failed to decode message: {0}")]
    Decode(#[from] rmpv::decode::Error),

    /// A msgpack value decoded, but is not a valid message envelope.
    #[error("malformed message envelope: {reason}")]
    Malformed { reason: String },

    /// Serialization of an outbound message failed.
    #[error("failed to encode message: {0}")]
    Encode(#[from] rmpv::encode::Error),

    /// The underlying transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] nvrpc_transport::TransportError),
}

impl CodecError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CodecError>;
