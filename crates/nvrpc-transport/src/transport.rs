use std::fmt;
use std::io::{self, ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream};
#[cfg(unix)]
use std::os::unix::net::UnixStream;
#[cfg(unix)]
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, error, info};

use crate::endpoint::Endpoint;
use crate::error::{Result, TransportError};

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Why a [`Transport::run`] loop returned without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunExit {
    /// The peer closed the stream cleanly.
    Eof,
    /// [`Transport::stop`] was requested; the loop is resumable.
    Stopped,
}

/// One communication channel between this process and an RPC peer.
///
/// Owns the underlying descriptors (and, for the child kind, the spawned
/// process). The read half is driven by [`run`](Transport::run); the write
/// half is shared behind a lock so messages can be sent from the read
/// loop's own callbacks and from other threads.
///
/// `stop` pauses the read loop without closing anything — a later `run`
/// resumes reading. `shutdown` is terminal: descriptors are closed and a
/// spawned child is killed and reaped.
pub struct Transport {
    reader: Reader,
    inner: Arc<Inner>,
}

/// Cloneable write/stop/shutdown surface of a [`Transport`].
///
/// Handles stay valid while the loop runs; writes after `shutdown` return
/// [`TransportError::Shutdown`].
#[derive(Clone)]
pub struct TransportHandle {
    inner: Arc<Inner>,
}

enum Reader {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
    Stdio(io::Stdin),
    Child(ChildStdout),
}

enum Writer {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
    Stdio(io::Stdout),
    Child(ChildStdin),
    Closed,
}

/// Socket clone kept for `shutdown`: shutting the socket down in both
/// directions unblocks a read parked inside `run`.
enum SocketRef {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

struct Inner {
    writer: Mutex<Writer>,
    socket: Mutex<Option<SocketRef>>,
    child: Mutex<Option<Child>>,
    running: AtomicBool,
    shut: AtomicBool,
    kind: &'static str,
}

impl Transport {
    /// Open a transport for the given endpoint.
    pub fn open(endpoint: &Endpoint) -> Result<Self> {
        match endpoint {
            Endpoint::Tcp { host, port } => Self::tcp(host, *port),
            #[cfg(unix)]
            Endpoint::Unix { path } => Self::unix(path),
            Endpoint::Stdio => Ok(Self::stdio()),
            Endpoint::Child { argv } => Self::child(argv),
        }
    }

    /// Connect to a TCP peer.
    pub fn tcp(host: &str, port: u16) -> Result<Self> {
        let addr = format!("{host}:{port}");
        let stream = TcpStream::connect(&addr).map_err(|source| TransportError::Connect {
            addr: addr.clone(),
            source,
        })?;
        stream.set_nodelay(true).map_err(TransportError::Io)?;
        let write_half = stream.try_clone().map_err(TransportError::Io)?;
        let socket = stream.try_clone().map_err(TransportError::Io)?;
        debug!(%addr, "connected over tcp");
        Ok(Self::from_parts(
            Reader::Tcp(stream),
            Writer::Tcp(write_half),
            Some(SocketRef::Tcp(socket)),
            None,
            "tcp",
        ))
    }

    /// Connect to a Unix domain socket peer.
    #[cfg(unix)]
    pub fn unix(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let stream = UnixStream::connect(path).map_err(|source| TransportError::Connect {
            addr: path.display().to_string(),
            source,
        })?;
        let write_half = stream.try_clone().map_err(TransportError::Io)?;
        let socket = stream.try_clone().map_err(TransportError::Io)?;
        debug!(?path, "connected over unix domain socket");
        Ok(Self::from_parts(
            Reader::Unix(stream),
            Writer::Unix(write_half),
            Some(SocketRef::Unix(socket)),
            None,
            "unix",
        ))
    }

    /// Use the process's own standard streams.
    ///
    /// This is the host arrangement: the editor spawned us and owns the
    /// other end of both pipes.
    pub fn stdio() -> Self {
        Self::from_parts(
            Reader::Stdio(io::stdin()),
            Writer::Stdio(io::stdout()),
            None,
            None,
            "stdio",
        )
    }

    /// Spawn `argv` as a child process and talk to it over its stdio.
    ///
    /// The child's stderr is inherited so its own diagnostics stay visible.
    pub fn child(argv: &[String]) -> Result<Self> {
        let (program, args) = argv.split_first().ok_or_else(|| TransportError::Spawn {
            program: String::new(),
            source: io::Error::new(ErrorKind::InvalidInput, "empty argv"),
        })?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|source| TransportError::Spawn {
                program: program.clone(),
                source,
            })?;

        let stdin = child.stdin.take().ok_or_else(|| TransportError::Spawn {
            program: program.clone(),
            source: io::Error::other("child stdin not captured"),
        })?;
        let stdout = child.stdout.take().ok_or_else(|| TransportError::Spawn {
            program: program.clone(),
            source: io::Error::other("child stdout not captured"),
        })?;

        debug!(%program, pid = child.id(), "spawned child process");
        Ok(Self::from_parts(
            Reader::Child(stdout),
            Writer::Child(stdin),
            None,
            Some(child),
            "child",
        ))
    }

    fn from_parts(
        reader: Reader,
        writer: Writer,
        socket: Option<SocketRef>,
        child: Option<Child>,
        kind: &'static str,
    ) -> Self {
        Self {
            reader,
            inner: Arc::new(Inner {
                writer: Mutex::new(writer),
                socket: Mutex::new(socket),
                child: Mutex::new(child),
                running: AtomicBool::new(false),
                shut: AtomicBool::new(false),
                kind,
            }),
        }
    }

    /// Cloneable write/stop/shutdown surface.
    pub fn handle(&self) -> TransportHandle {
        TransportHandle {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Write the whole buffer, retrying transparently when the OS reports
    /// the write would block.
    pub fn write(&self, bytes: &[u8]) -> Result<()> {
        self.inner.write(bytes)
    }

    /// Blocking read loop.
    ///
    /// Reads available bytes and hands each non-empty chunk to `on_data`.
    /// Returns [`RunExit::Eof`] on clean end-of-stream, [`RunExit::Stopped`]
    /// after [`stop`](Transport::stop); any other read error terminates the
    /// loop and is propagated. Read and message boundaries are unrelated —
    /// `on_data` may receive partial or concatenated payloads.
    pub fn run(&mut self, mut on_data: impl FnMut(&[u8])) -> Result<RunExit> {
        if self.inner.shut.load(Ordering::SeqCst) {
            return Err(TransportError::Shutdown);
        }
        self.inner.running.store(true, Ordering::SeqCst);

        let mut chunk = [0u8; READ_CHUNK_SIZE];
        let exit = loop {
            if !self.inner.running.load(Ordering::SeqCst) {
                break Ok(RunExit::Stopped);
            }
            match self.reader.read(&mut chunk) {
                Ok(0) => {
                    info!(kind = self.inner.kind, "transport reached end of stream");
                    break Ok(RunExit::Eof);
                }
                Ok(n) => on_data(&chunk[..n]),
                Err(err)
                    if matches!(err.kind(), ErrorKind::Interrupted | ErrorKind::WouldBlock) =>
                {
                    continue;
                }
                Err(err) => {
                    error!(kind = self.inner.kind, error = %err, "transport read failed");
                    break Err(TransportError::Io(err));
                }
            }
        };

        self.inner.running.store(false, Ordering::SeqCst);
        exit
    }

    /// Request the current `run` loop to return after its current read.
    ///
    /// Idempotent. Does not close descriptors; a later `run` resumes.
    pub fn stop(&self) {
        self.inner.stop();
    }

    /// Close all owned descriptors and reap a spawned child.
    ///
    /// Idempotent. Unblocks a read parked inside `run` where the kind
    /// allows it (sockets via both-direction shutdown, child via kill).
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }

    /// Pid of the spawned child, if this is a child-kind transport.
    pub fn child_id(&self) -> Option<u32> {
        lock(&self.inner.child).as_ref().map(Child::id)
    }
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("kind", &self.inner.kind)
            .finish()
    }
}

impl TransportHandle {
    /// See [`Transport::write`].
    pub fn write(&self, bytes: &[u8]) -> Result<()> {
        self.inner.write(bytes)
    }

    /// See [`Transport::stop`].
    pub fn stop(&self) {
        self.inner.stop();
    }

    /// See [`Transport::shutdown`].
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }
}

impl fmt::Debug for TransportHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportHandle")
            .field("kind", &self.inner.kind)
            .finish()
    }
}

impl Inner {
    fn write(&self, bytes: &[u8]) -> Result<()> {
        let mut writer = lock(&self.writer);
        match writer.as_write() {
            None => Err(TransportError::Shutdown),
            Some(w) => {
                write_all_retry(w, bytes)?;
                flush_retry(w)
            }
        }
    }

    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn shutdown(&self) {
        if self.shut.swap(true, Ordering::SeqCst) {
            return;
        }
        self.running.store(false, Ordering::SeqCst);

        *lock(&self.writer) = Writer::Closed;

        if let Some(socket) = lock(&self.socket).take() {
            match socket {
                SocketRef::Tcp(s) => {
                    let _ = s.shutdown(Shutdown::Both);
                }
                #[cfg(unix)]
                SocketRef::Unix(s) => {
                    let _ = s.shutdown(Shutdown::Both);
                }
            }
        }

        if let Some(mut child) = lock(&self.child).take() {
            debug!(pid = child.id(), "terminating child process");
            let _ = child.kill();
            let _ = child.wait();
        }

        debug!(kind = self.kind, "transport shut down");
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Read for Reader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.read(buf),
            #[cfg(unix)]
            Self::Unix(stream) => stream.read(buf),
            Self::Stdio(stdin) => stdin.read(buf),
            Self::Child(stdout) => stdout.read(buf),
        }
    }
}

impl Writer {
    fn as_write(&mut self) -> Option<&mut dyn Write> {
        match self {
            Self::Tcp(stream) => Some(stream),
            #[cfg(unix)]
            Self::Unix(stream) => Some(stream),
            Self::Stdio(stdout) => Some(stdout),
            Self::Child(stdin) => Some(stdin),
            Self::Closed => None,
        }
    }
}

fn write_all_retry(writer: &mut dyn Write, bytes: &[u8]) -> Result<()> {
    let mut offset = 0usize;
    while offset < bytes.len() {
        match writer.write(&bytes[offset..]) {
            Ok(0) => return Err(TransportError::Closed),
            Ok(n) => offset += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
            Err(err) => return Err(TransportError::Io(err)),
        }
    }
    Ok(())
}

fn flush_retry(writer: &mut dyn Write) -> Result<()> {
    loop {
        match writer.flush() {
            Ok(()) => return Ok(()),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
            Err(err) => return Err(TransportError::Io(err)),
        }
    }
}
