use std::sync::mpsc;

use nvrpc_codec::RpcStream;
use nvrpc_transport::{Endpoint, RunExit, Transport};
use rmpv::Value;
use tracing::debug;

use crate::async_session::{AsyncSession, SessionHandle};
use crate::error::{Result, SessionError};
use crate::incoming::Incoming;

/// Blocking facade over [`AsyncSession`].
///
/// [`request`](Session::request) suspends the calling thread until the
/// matching response arrives. The read loop must be progressing on some
/// thread for that to resolve — a host that never enters
/// [`run`](Session::run) will block forever, by design.
pub struct Session {
    inner: AsyncSession,
}

impl Session {
    /// Wrap an existing correlator.
    pub fn new(inner: AsyncSession) -> Self {
        Self { inner }
    }

    /// Open a session for the given endpoint.
    pub fn open(endpoint: &Endpoint) -> Result<Self> {
        Ok(Self::from_transport(Transport::open(endpoint)?))
    }

    /// Connect to an editor listening on TCP.
    pub fn tcp(host: &str, port: u16) -> Result<Self> {
        Ok(Self::from_transport(Transport::tcp(host, port)?))
    }

    /// Connect to an editor listening on a Unix domain socket.
    #[cfg(unix)]
    pub fn unix(path: impl AsRef<std::path::Path>) -> Result<Self> {
        Ok(Self::from_transport(Transport::unix(path)?))
    }

    /// Talk to the editor that spawned us over our own standard streams.
    pub fn stdio() -> Self {
        Self::from_transport(Transport::stdio())
    }

    /// Spawn an editor child process and talk to it over its stdio.
    pub fn child(argv: &[String]) -> Result<Self> {
        Ok(Self::from_transport(Transport::child(argv)?))
    }

    fn from_transport(transport: Transport) -> Self {
        Self::new(AsyncSession::new(RpcStream::new(transport)))
    }

    /// Issue a request and block until its response arrives.
    ///
    /// Returns the peer's result, or an error carrying the peer's code and
    /// message; if the session ends first the call fails with
    /// [`SessionError::Disconnected`] rather than hanging forever.
    pub fn request(&self, method: &str, args: Vec<Value>) -> Result<Value> {
        let (tx, rx) = mpsc::channel();
        self.inner.request(method, args, move |outcome| {
            let _ = tx.send(outcome);
        })?;
        match rx.recv() {
            Ok(outcome) => outcome,
            Err(_) => Err(SessionError::Disconnected),
        }
    }

    /// Send a notification; never waits and never gets a reply.
    pub fn notify(&self, method: &str, args: Vec<Value>) -> Result<()> {
        self.inner.notify(method, args)
    }

    /// Blocking message loop; see [`AsyncSession::run`].
    ///
    /// Each inbound message is logged before dispatch.
    pub fn run<F>(&self, mut dispatcher: F) -> Result<RunExit>
    where
        F: FnMut(&SessionHandle, Incoming),
    {
        self.inner.run(move |handle, incoming| {
            debug!(message = ?incoming, "received");
            dispatcher(handle, incoming);
        })
    }

    /// Fetch the editor's self-describing API catalogue.
    ///
    /// The result is handed to higher layers as-is; the session does not
    /// interpret it.
    pub fn discover_api(&self) -> Result<Value> {
        self.request("nvim_get_api_info", Vec::new())
    }

    /// Cloneable handle for issuing traffic from elsewhere.
    pub fn handle(&self) -> SessionHandle {
        self.inner.handle()
    }

    /// Request the read loop to return; resumable.
    pub fn stop(&self) {
        self.inner.stop();
    }

    /// Terminal: close the transport and fail all pending requests.
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use bytes::BytesMut;
    use nvrpc_codec::{decode_message, encode_message, Message};

    use super::*;

    /// Serve a minimal editor-shaped peer until the client disconnects.
    fn serve_editor<S: Read + Write>(mut sock: S) {
        let mut buf = BytesMut::new();
        let mut chunk = [0u8; 4096];
        let mut current_line = String::new();

        loop {
            while let Some(message) = decode_message(&mut buf).unwrap() {
                let Message::Request {
                    msgid,
                    method,
                    args,
                } = message
                else {
                    continue;
                };

                let reply = match method.as_str() {
                    "strwidth" => {
                        if args.len() == 1 {
                            let width = args[0]
                                .as_str()
                                .map(|s| s.chars().count() as u64)
                                .unwrap_or(0);
                            Message::response(msgid, Value::from(width))
                        } else {
                            Message::error_response(
                                msgid,
                                1,
                                format!(
                                    "wrong number of arguments: expecting 1 but got {}",
                                    args.len()
                                ),
                            )
                        }
                    }
                    "set_current_line" => {
                        current_line = args[0].as_str().unwrap_or_default().to_string();
                        Message::response(msgid, Value::Nil)
                    }
                    "get_current_line" => {
                        Message::response(msgid, Value::from(current_line.clone()))
                    }
                    "nvim_get_api_info" => Message::response(
                        msgid,
                        Value::Array(vec![Value::from(1u64), Value::Map(vec![])]),
                    ),
                    other => Message::error_response(msgid, 0, format!("unknown method {other}")),
                };

                let mut out = BytesMut::new();
                encode_message(&reply, &mut out).unwrap();
                sock.write_all(&out).unwrap();
            }

            match sock.read(&mut chunk) {
                Ok(0) | Err(_) => return,
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
            }
        }
    }

    fn editor_session() -> (Arc<Session>, thread::JoinHandle<()>, thread::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let peer = thread::spawn(move || {
            let (sock, _) = listener.accept().unwrap();
            serve_editor(sock);
        });

        let session = Arc::new(Session::tcp("127.0.0.1", port).unwrap());
        let runner = {
            let session = Arc::clone(&session);
            thread::spawn(move || {
                session.run(|_, _| {}).unwrap();
            })
        };

        (session, runner, peer)
    }

    #[test]
    fn request_blocks_until_result_arrives() {
        let (session, runner, peer) = editor_session();

        let width = session
            .request("strwidth", vec![Value::from("hi")])
            .unwrap();
        assert_eq!(width.as_u64(), Some(2));

        session.shutdown();
        runner.join().unwrap();
        peer.join().unwrap();
    }

    #[test]
    #[cfg(unix)]
    fn request_over_unix_domain_socket() {
        let dir = std::env::temp_dir().join(format!(
            "nvrpc-session-uds-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let sock_path = dir.join("editor.sock");

        let listener = std::os::unix::net::UnixListener::bind(&sock_path).unwrap();
        let peer = thread::spawn(move || {
            let (sock, _) = listener.accept().unwrap();
            serve_editor(sock);
        });

        let session = Arc::new(Session::unix(&sock_path).unwrap());
        let runner = {
            let session = Arc::clone(&session);
            thread::spawn(move || {
                session.run(|_, _| {}).unwrap();
            })
        };

        let width = session
            .request("strwidth", vec![Value::from("foobar")])
            .unwrap();
        assert_eq!(width.as_u64(), Some(6));

        session.shutdown();
        runner.join().unwrap();
        peer.join().unwrap();
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn wrong_argument_count_raises_peer_error() {
        let (session, runner, peer) = editor_session();

        let err = session
            .request("strwidth", vec![Value::from("too"), Value::from("many")])
            .unwrap_err();
        assert!(err.to_string().contains("wrong number of arguments"));

        session.shutdown();
        runner.join().unwrap();
        peer.join().unwrap();
    }

    #[test]
    fn large_string_roundtrips_intact() {
        let (session, runner, peer) = editor_session();

        let large: String = "0123456789abcdef".repeat(1024);
        assert_eq!(large.len(), 16 * 1024);

        session
            .request("set_current_line", vec![Value::from(large.clone())])
            .unwrap();
        let line = session.request("get_current_line", vec![]).unwrap();
        assert_eq!(line.as_str(), Some(large.as_str()));

        session.shutdown();
        runner.join().unwrap();
        peer.join().unwrap();
    }

    #[test]
    fn discover_api_returns_raw_catalogue() {
        let (session, runner, peer) = editor_session();

        let info = session.discover_api().unwrap();
        let fields = info.as_array().expect("api info is an array");
        assert_eq!(fields[0].as_u64(), Some(1));

        session.shutdown();
        runner.join().unwrap();
        peer.join().unwrap();
    }

    #[test]
    fn request_issued_before_loop_starts_still_resolves() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let peer = thread::spawn(move || {
            let (sock, _) = listener.accept().unwrap();
            serve_editor(sock);
        });

        let session = Arc::new(Session::tcp("127.0.0.1", port).unwrap());

        let requester = {
            let session = Arc::clone(&session);
            thread::spawn(move || {
                let width = session
                    .request("strwidth", vec![Value::from("abc")])
                    .unwrap();
                assert_eq!(width.as_u64(), Some(3));
                session.shutdown();
            })
        };

        // The requester is blocked until this loop starts resolving
        // completions.
        session.run(|_, _| {}).unwrap();

        requester.join().unwrap();
        peer.join().unwrap();
    }

    #[test]
    fn clean_disconnect_fails_pending_requests() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let peer = thread::spawn(move || {
            let (mut sock, _) = listener.accept().unwrap();
            // Read one full request, then hang up without answering.
            let mut buf = BytesMut::new();
            let mut chunk = [0u8; 4096];
            loop {
                if decode_message(&mut buf).unwrap().is_some() {
                    return;
                }
                let n = sock.read(&mut chunk).unwrap();
                assert_ne!(n, 0);
                buf.extend_from_slice(&chunk[..n]);
            }
        });

        let session = Arc::new(Session::tcp("127.0.0.1", port).unwrap());
        let runner = {
            let session = Arc::clone(&session);
            thread::spawn(move || session.run(|_, _| {}))
        };

        let err = session
            .request("never_answered", vec![])
            .unwrap_err();
        assert!(matches!(err, SessionError::Disconnected));

        // The loop itself exits cleanly on EOF.
        assert_eq!(runner.join().unwrap().unwrap(), RunExit::Eof);
        peer.join().unwrap();
    }

    #[test]
    #[cfg(unix)]
    fn child_session_delivers_inbound_traffic() {
        // `cat` echoes our notification bytes back verbatim, which decode
        // as an identical inbound notification.
        let session = Arc::new(Session::child(&["cat".to_string()]).unwrap());

        let (tx, rx) = mpsc::channel();
        let runner = {
            let session = Arc::clone(&session);
            thread::spawn(move || {
                session.run(move |_, incoming| {
                    if let Incoming::Notification { method, args } = incoming {
                        let _ = tx.send((method, args));
                    }
                })
            })
        };

        session
            .notify("touched", vec![Value::from(9u32)])
            .unwrap();

        let (method, args) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(method, "touched");
        assert_eq!(args, vec![Value::from(9u32)]);

        session.shutdown();
        runner.join().unwrap().unwrap();
    }
}
