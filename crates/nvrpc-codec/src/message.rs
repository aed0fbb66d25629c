use rmpv::Value;

use crate::error::{CodecError, Result};

/// Wire tag of a request message.
pub const REQUEST: u64 = 0;
/// Wire tag of a response message.
pub const RESPONSE: u64 = 1;
/// Wire tag of a notification message.
pub const NOTIFICATION: u64 = 2;

/// One fully-decoded RPC message.
///
/// The peer convention for responses is that `error` is nil on success;
/// a non-nil error is typically a `[code, message]` pair but the codec
/// does not impose that shape — interpretation belongs to the session
/// layer.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Request {
        msgid: u32,
        method: String,
        args: Vec<Value>,
    },
    Response {
        msgid: u32,
        error: Value,
        result: Value,
    },
    Notification {
        method: String,
        args: Vec<Value>,
    },
}

impl Message {
    /// Build a request.
    pub fn request(msgid: u32, method: impl Into<String>, args: Vec<Value>) -> Self {
        Self::Request {
            msgid,
            method: method.into(),
            args,
        }
    }

    /// Build a successful response.
    pub fn response(msgid: u32, result: Value) -> Self {
        Self::Response {
            msgid,
            error: Value::Nil,
            result,
        }
    }

    /// Build an error response with the conventional `[code, message]` pair.
    pub fn error_response(msgid: u32, code: i64, message: impl Into<String>) -> Self {
        Self::Response {
            msgid,
            error: Value::Array(vec![Value::from(code), Value::from(message.into())]),
            result: Value::Nil,
        }
    }

    /// Build a notification.
    pub fn notification(method: impl Into<String>, args: Vec<Value>) -> Self {
        Self::Notification {
            method: method.into(),
            args,
        }
    }

    /// The tagged-array wire representation of this message.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Request {
                msgid,
                method,
                args,
            } => Value::Array(vec![
                Value::from(REQUEST),
                Value::from(*msgid),
                Value::from(method.as_str()),
                Value::Array(args.clone()),
            ]),
            Self::Response {
                msgid,
                error,
                result,
            } => Value::Array(vec![
                Value::from(RESPONSE),
                Value::from(*msgid),
                error.clone(),
                result.clone(),
            ]),
            Self::Notification { method, args } => Value::Array(vec![
                Value::from(NOTIFICATION),
                Value::from(method.as_str()),
                Value::Array(args.clone()),
            ]),
        }
    }

    /// Classify a decoded msgpack value into a typed message.
    ///
    /// The envelope must be an array of the right arity for its tag, with
    /// correctly-typed fields; anything else is a fatal framing error.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Array(fields) = value else {
            return Err(CodecError::malformed("message is not an array"));
        };

        let mut fields = fields.into_iter();
        let tag = fields
            .next()
            .as_ref()
            .and_then(Value::as_u64)
            .ok_or_else(|| CodecError::malformed("missing message type tag"))?;

        match tag {
            REQUEST => {
                let msgid = take_msgid(fields.next())?;
                let method = take_method(fields.next())?;
                let args = take_args(fields.next())?;
                expect_end(fields.next(), "request")?;
                Ok(Self::Request {
                    msgid,
                    method,
                    args,
                })
            }
            RESPONSE => {
                let msgid = take_msgid(fields.next())?;
                let error = fields
                    .next()
                    .ok_or_else(|| CodecError::malformed("response missing error field"))?;
                let result = fields
                    .next()
                    .ok_or_else(|| CodecError::malformed("response missing result field"))?;
                expect_end(fields.next(), "response")?;
                Ok(Self::Response {
                    msgid,
                    error,
                    result,
                })
            }
            NOTIFICATION => {
                let method = take_method(fields.next())?;
                let args = take_args(fields.next())?;
                expect_end(fields.next(), "notification")?;
                Ok(Self::Notification { method, args })
            }
            other => Err(CodecError::malformed(format!(
                "unknown message type tag {other}"
            ))),
        }
    }
}

fn take_msgid(field: Option<Value>) -> Result<u32> {
    let id = field
        .as_ref()
        .and_then(Value::as_u64)
        .ok_or_else(|| CodecError::malformed("message id is not an unsigned integer"))?;
    u32::try_from(id).map_err(|_| CodecError::malformed("message id exceeds 32 bits"))
}

fn take_method(field: Option<Value>) -> Result<String> {
    match field {
        Some(Value::String(name)) => name
            .into_str()
            .ok_or_else(|| CodecError::malformed("method name is not valid utf-8")),
        _ => Err(CodecError::malformed("method name is not a string")),
    }
}

fn take_args(field: Option<Value>) -> Result<Vec<Value>> {
    match field {
        Some(Value::Array(args)) => Ok(args),
        _ => Err(CodecError::malformed("arguments are not an array")),
    }
}

fn expect_end(field: Option<Value>, kind: &str) -> Result<()> {
    if field.is_some() {
        return Err(CodecError::malformed(format!("{kind} has trailing fields")));
    }
    Ok(())
}
