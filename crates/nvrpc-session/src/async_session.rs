use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use nvrpc_codec::{Message, RpcStream, StreamHandle};
use nvrpc_transport::RunExit;
use rmpv::Value;
use tracing::{debug, warn};

use crate::error::{Result, RpcError, SessionError};
use crate::incoming::{Incoming, IncomingRequest};

type Completion = Box<dyn FnOnce(Result<Value>) + Send>;

/// The request/response correlator.
///
/// Owns the [`RpcStream`] exclusively. Outbound requests are keyed by a
/// monotonically increasing msgid and stored as continuations; the read
/// loop fires each one when its response decodes, in arrival order,
/// independent of the order the requests were issued. Inbound requests
/// and notifications are forwarded to the dispatcher passed to
/// [`run`](AsyncSession::run).
///
/// The correlator itself never blocks a logical caller — blocking
/// semantics live in [`Session`](crate::session::Session).
pub struct AsyncSession {
    stream: Mutex<RpcStream>,
    state: Arc<State>,
}

/// Cloneable request/notify/lifecycle surface of an [`AsyncSession`].
///
/// Valid inside dispatch callbacks (reentrant requests) and on other
/// threads while the read loop runs.
#[derive(Clone)]
pub struct SessionHandle {
    state: Arc<State>,
}

struct State {
    stream: StreamHandle,
    pending: Mutex<HashMap<u32, Completion>>,
    next_id: AtomicU32,
}

impl AsyncSession {
    pub fn new(stream: RpcStream) -> Self {
        let handle = stream.handle();
        Self {
            stream: Mutex::new(stream),
            state: Arc::new(State {
                stream: handle,
                pending: Mutex::new(HashMap::new()),
                next_id: AtomicU32::new(0),
            }),
        }
    }

    /// Cloneable handle for issuing traffic from elsewhere.
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            state: Arc::clone(&self.state),
        }
    }

    /// Issue a request; `complete` fires when the response decodes.
    ///
    /// Returns the allocated msgid. See [`SessionHandle::request`].
    pub fn request<F>(&self, method: &str, args: Vec<Value>, complete: F) -> Result<u32>
    where
        F: FnOnce(Result<Value>) + Send + 'static,
    {
        self.handle().request(method, args, complete)
    }

    /// Send a notification; no response will ever arrive.
    pub fn notify(&self, method: &str, args: Vec<Value>) -> Result<()> {
        self.handle().notify(method, args)
    }

    /// Blocking message loop.
    ///
    /// Responses resolve their stored completions; requests and
    /// notifications go to `dispatcher` along with a handle for reentrant
    /// traffic. Only one thread can be inside the loop at a time. On
    /// end-of-stream or a transport/framing failure every still-pending
    /// completion fires with [`SessionError::Disconnected`]; a plain
    /// [`stop`](AsyncSession::stop) leaves pending requests in place for
    /// a resumed loop.
    pub fn run<F>(&self, mut dispatcher: F) -> Result<RunExit>
    where
        F: FnMut(&SessionHandle, Incoming),
    {
        let handle = self.handle();
        let mut stream = lock(&self.stream);
        let result = stream.run(|message| {
            self.state.handle_message(message, &handle, &mut dispatcher);
        });
        drop(stream);

        match &result {
            Ok(RunExit::Stopped) => {}
            Ok(RunExit::Eof) | Err(_) => self.state.fail_pending(),
        }
        result.map_err(SessionError::from)
    }

    /// Request the read loop to return; resumable.
    pub fn stop(&self) {
        self.state.stream.stop();
    }

    /// Terminal: close the transport and fail all pending requests.
    pub fn shutdown(&self) {
        self.state.stream.shutdown();
        self.state.fail_pending();
    }
}

impl SessionHandle {
    /// Issue a request; `complete` fires when the response decodes.
    ///
    /// The completion is stored before the request bytes go out, so a
    /// response can never race the pending table. A send failure removes
    /// the entry and is returned to the caller directly; the completion
    /// does not fire.
    pub fn request<F>(&self, method: &str, args: Vec<Value>, complete: F) -> Result<u32>
    where
        F: FnOnce(Result<Value>) + Send + 'static,
    {
        let msgid = self.state.next_id.fetch_add(1, Ordering::Relaxed);
        self.state
            .lock_pending()
            .insert(msgid, Box::new(complete));

        let message = Message::Request {
            msgid,
            method: method.to_string(),
            args,
        };
        if let Err(err) = self.state.stream.send(&message) {
            self.state.lock_pending().remove(&msgid);
            return Err(err.into());
        }
        debug!(msgid, method, "sent request");
        Ok(msgid)
    }

    /// Send a notification; no response will ever arrive.
    pub fn notify(&self, method: &str, args: Vec<Value>) -> Result<()> {
        self.state.stream.send(&Message::Notification {
            method: method.to_string(),
            args,
        })?;
        debug!(method, "sent notification");
        Ok(())
    }

    /// See [`AsyncSession::stop`].
    pub fn stop(&self) {
        self.state.stream.stop();
    }

    /// See [`AsyncSession::shutdown`].
    pub fn shutdown(&self) {
        self.state.stream.shutdown();
        self.state.fail_pending();
    }
}

impl State {
    fn handle_message<F>(&self, message: Message, handle: &SessionHandle, dispatcher: &mut F)
    where
        F: FnMut(&SessionHandle, Incoming),
    {
        match message {
            Message::Response {
                msgid,
                error,
                result,
            } => {
                let completion = self.lock_pending().remove(&msgid);
                match completion {
                    Some(complete) => {
                        let outcome = if error.is_nil() {
                            Ok(result)
                        } else {
                            Err(SessionError::Peer(RpcError::from_value(&error)))
                        };
                        complete(outcome);
                    }
                    None => warn!(msgid, "discarding response with no pending request"),
                }
            }
            Message::Request {
                msgid,
                method,
                args,
            } => {
                let request = IncomingRequest::new(msgid, method, args, self.stream.clone());
                dispatcher(handle, Incoming::Request(request));
            }
            Message::Notification { method, args } => {
                dispatcher(handle, Incoming::Notification { method, args });
            }
        }
    }

    fn fail_pending(&self) {
        let drained: Vec<Completion> = self.lock_pending().drain().map(|(_, c)| c).collect();
        if drained.is_empty() {
            return;
        }
        debug!(
            count = drained.len(),
            "failing requests still pending at session end"
        );
        for complete in drained {
            complete(Err(SessionError::Disconnected));
        }
    }

    fn lock_pending(&self) -> MutexGuard<'_, HashMap<u32, Completion>> {
        lock(&self.pending)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
