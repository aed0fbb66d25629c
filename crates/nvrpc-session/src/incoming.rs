use std::fmt;

use nvrpc_codec::{Message, StreamHandle};
use rmpv::Value;
use tracing::warn;

use crate::error::Result;

/// An inbound message handed to the dispatcher.
pub enum Incoming {
    /// The peer called us and expects a response.
    Request(IncomingRequest),
    /// Fire-and-forget; no reply is ever sent.
    Notification { method: String, args: Vec<Value> },
}

/// An inbound request bound to its wire msgid.
///
/// The dispatcher must consume it with [`reply`](IncomingRequest::reply)
/// or [`reply_error`](IncomingRequest::reply_error); dropping it without
/// replying leaves the peer waiting and logs a warning.
pub struct IncomingRequest {
    pub method: String,
    pub args: Vec<Value>,
    responder: Responder,
}

impl IncomingRequest {
    pub(crate) fn new(msgid: u32, method: String, args: Vec<Value>, stream: StreamHandle) -> Self {
        Self {
            method,
            args,
            responder: Responder {
                msgid,
                stream,
                replied: false,
            },
        }
    }

    /// The wire msgid the response will be tagged with.
    pub fn msgid(&self) -> u32 {
        self.responder.msgid
    }

    /// Answer the request with a result.
    pub fn reply(self, result: Value) -> Result<()> {
        let msgid = self.responder.msgid;
        self.responder
            .send(Message::response(msgid, result))
    }

    /// Answer the request with an error.
    pub fn reply_error(self, code: i64, message: impl Into<String>) -> Result<()> {
        let msgid = self.responder.msgid;
        self.responder
            .send(Message::error_response(msgid, code, message))
    }
}

struct Responder {
    msgid: u32,
    stream: StreamHandle,
    replied: bool,
}

impl Responder {
    fn send(mut self, message: Message) -> Result<()> {
        self.replied = true;
        self.stream.send(&message)?;
        Ok(())
    }
}

impl Drop for Responder {
    fn drop(&mut self) {
        if !self.replied {
            warn!(msgid = self.msgid, "inbound request dropped without a response");
        }
    }
}

impl fmt::Debug for Incoming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request(request) => request.fmt(f),
            Self::Notification { method, args } => f
                .debug_struct("Notification")
                .field("method", method)
                .field("args", args)
                .finish(),
        }
    }
}

impl fmt::Debug for IncomingRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("msgid", &self.responder.msgid)
            .field("method", &self.method)
            .field("args", &self.args)
            .finish()
    }
}
