use bytes::BytesMut;
use nvrpc_transport::{RunExit, Transport, TransportHandle};
use tracing::error;

use crate::codec::{decode_message, encode_message};
use crate::error::{CodecError, Result};
use crate::message::Message;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// A message-oriented view over a [`Transport`].
///
/// Owns the transport exclusively. [`run`](RpcStream::run) drives the
/// transport's byte loop through the incremental decoder, invoking the
/// message callback once per fully-decoded message; [`send`](RpcStream::send)
/// serializes and writes one message.
pub struct RpcStream {
    transport: Transport,
    buf: BytesMut,
}

/// Cloneable send/stop/shutdown surface of an [`RpcStream`].
#[derive(Debug, Clone)]
pub struct StreamHandle {
    transport: TransportHandle,
}

impl RpcStream {
    pub fn new(transport: Transport) -> Self {
        Self {
            transport,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Cloneable handle for sending and lifecycle control.
    pub fn handle(&self) -> StreamHandle {
        StreamHandle {
            transport: self.transport.handle(),
        }
    }

    /// Serialize and write one message.
    pub fn send(&self, message: &Message) -> Result<()> {
        let mut buf = BytesMut::new();
        encode_message(message, &mut buf)?;
        self.transport.write(&buf)?;
        Ok(())
    }

    /// Blocking message loop.
    ///
    /// Decoded messages are handed to `on_message` in wire order before the
    /// next one is decoded. Partial trailing bytes are retained across
    /// transport reads. A framing error stops the transport loop and is
    /// returned; end-of-stream and `stop` surface as [`RunExit`].
    pub fn run(&mut self, mut on_message: impl FnMut(Message)) -> Result<RunExit> {
        let Self { transport, buf } = self;
        let control = transport.handle();
        let mut framing_err: Option<CodecError> = None;

        let exit = transport.run(|bytes| {
            buf.extend_from_slice(bytes);
            loop {
                match decode_message(buf) {
                    Ok(Some(message)) => on_message(message),
                    Ok(None) => break,
                    Err(err) => {
                        error!(error = %err, "fatal framing error, stopping read loop");
                        framing_err = Some(err);
                        control.stop();
                        break;
                    }
                }
            }
        });

        if let Some(err) = framing_err {
            return Err(err);
        }
        Ok(exit?)
    }

    /// See [`Transport::stop`].
    pub fn stop(&self) {
        self.transport.stop();
    }

    /// See [`Transport::shutdown`].
    pub fn shutdown(&self) {
        self.transport.shutdown();
    }
}

impl StreamHandle {
    /// Serialize and write one message.
    pub fn send(&self, message: &Message) -> Result<()> {
        let mut buf = BytesMut::new();
        encode_message(message, &mut buf)?;
        self.transport.write(&buf)?;
        Ok(())
    }

    /// See [`Transport::stop`].
    pub fn stop(&self) {
        self.transport.stop();
    }

    /// See [`Transport::shutdown`].
    pub fn shutdown(&self) {
        self.transport.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::thread;

    use rmpv::Value;

    use super::*;

    fn connect_pair() -> (RpcStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let accepted = thread::spawn(move || listener.accept().unwrap().0);
        let transport = Transport::tcp("127.0.0.1", port).unwrap();
        (RpcStream::new(transport), accepted.join().unwrap())
    }

    fn read_one_message(sock: &mut TcpStream) -> Message {
        let mut buf = BytesMut::new();
        let mut chunk = [0u8; 4096];
        loop {
            if let Some(message) = decode_message(&mut buf).unwrap() {
                return message;
            }
            let n = sock.read(&mut chunk).unwrap();
            assert_ne!(n, 0, "peer closed before a full message arrived");
            buf.extend_from_slice(&chunk[..n]);
        }
    }

    fn wire_bytes(message: &Message) -> BytesMut {
        let mut buf = BytesMut::new();
        encode_message(message, &mut buf).unwrap();
        buf
    }

    #[test]
    fn send_writes_decodable_messages() {
        let (stream, mut sock) = connect_pair();

        let request = Message::request(0, "strwidth", vec![Value::from("hi")]);
        stream.send(&request).unwrap();

        assert_eq!(read_one_message(&mut sock), request);
    }

    #[test]
    fn run_delivers_messages_across_read_boundaries() {
        let (mut stream, mut sock) = connect_pair();

        let response = Message::response(0, Value::from(2u32));
        let wire = wire_bytes(&response);
        let split = wire.len() / 2;

        let server = thread::spawn(move || {
            sock.write_all(&wire[..split]).unwrap();
            sock.flush().unwrap();
            sock.write_all(&wire[split..]).unwrap();
            sock.flush().unwrap();
        });

        let handle = stream.handle();
        let mut received = Vec::new();
        stream
            .run(|message| {
                received.push(message);
                handle.stop();
            })
            .unwrap();

        assert_eq!(received, vec![response]);
        server.join().unwrap();
    }

    #[test]
    fn run_delivers_concatenated_messages_in_order() {
        let (mut stream, mut sock) = connect_pair();

        let first = Message::notification("a", vec![]);
        let second = Message::request(1, "b", vec![Value::from(9)]);
        let mut wire = wire_bytes(&first);
        wire.extend_from_slice(&wire_bytes(&second));

        let server = thread::spawn(move || {
            sock.write_all(&wire).unwrap();
        });

        let handle = stream.handle();
        let mut received = Vec::new();
        stream
            .run(|message| {
                received.push(message);
                if received.len() == 2 {
                    handle.stop();
                }
            })
            .unwrap();

        assert_eq!(received, vec![first, second]);
        server.join().unwrap();
    }

    #[test]
    fn framing_error_terminates_run() {
        let (mut stream, mut sock) = connect_pair();

        let server = thread::spawn(move || {
            // A bare integer is valid msgpack but not a message envelope.
            sock.write_all(&[0x05]).unwrap();
        });

        let err = stream.run(|_| panic!("no message should decode")).unwrap_err();
        assert!(matches!(err, CodecError::Malformed { .. }));
        server.join().unwrap();
    }

    #[test]
    fn eof_surfaces_as_clean_exit() {
        let (mut stream, sock) = connect_pair();
        drop(sock);

        let exit = stream.run(|_| {}).unwrap();
        assert_eq!(exit, RunExit::Eof);
    }
}
