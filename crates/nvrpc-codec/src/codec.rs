use std::io::{Cursor, ErrorKind};

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{CodecError, Result};
use crate::message::Message;

/// Serialize a message into its tagged-array wire form.
pub fn encode_message(message: &Message, dst: &mut BytesMut) -> Result<()> {
    let value = message.to_value();
    rmpv::encode::write_value(&mut dst.writer(), &value)?;
    Ok(())
}

/// Decode one complete message from the front of the buffer.
///
/// Returns `Ok(None)` if the buffer does not yet contain a complete
/// msgpack value; the partial bytes are retained for the next attempt.
/// On success the consumed bytes are removed from the buffer. Bytes that
/// can never decode, or a value that is not a valid message envelope, are
/// a fatal framing error.
pub fn decode_message(src: &mut BytesMut) -> Result<Option<Message>> {
    if src.is_empty() {
        return Ok(None);
    }

    let mut cursor = Cursor::new(&src[..]);
    match rmpv::decode::read_value(&mut cursor) {
        Ok(value) => {
            let consumed = cursor.position() as usize;
            src.advance(consumed);
            Message::from_value(value).map(Some)
        }
        Err(err) if is_incomplete(&err) => Ok(None),
        Err(err) => Err(CodecError::Decode(err)),
    }
}

/// A read that ran off the end of the buffer means the message is still
/// in flight, not that the stream is corrupt.
fn is_incomplete(err: &rmpv::decode::Error) -> bool {
    match err {
        rmpv::decode::Error::InvalidMarkerRead(io)
        | rmpv::decode::Error::InvalidDataRead(io) => io.kind() == ErrorKind::UnexpectedEof,
        _ => false,
    }
}
