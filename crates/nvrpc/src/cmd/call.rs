use std::sync::Arc;
use std::thread;

use nvrpc_session::{Incoming, Session, SessionHandle};
use rmpv::Value;
use tracing::debug;

use crate::cmd::CallArgs;
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::output::{print_value, OutputFormat};

pub fn run(args: CallArgs, format: OutputFormat) -> CliResult<i32> {
    let endpoint = args.target.resolve()?;
    let session = Arc::new(
        Session::open(&endpoint).map_err(|err| session_error("connect failed", err))?,
    );

    // The read loop must be progressing for the blocking request to
    // resolve.
    let runner = {
        let session = Arc::clone(&session);
        thread::spawn(move || session.run(reject_inbound))
    };

    let result = session.request(&args.method, parse_args(&args.args));

    session.shutdown();
    let _ = runner.join();

    let value = result.map_err(|err| session_error("call failed", err))?;
    print_value(&value, format);
    Ok(SUCCESS)
}

/// This client hosts no methods; answer inbound requests with an error
/// rather than leaving the peer waiting.
pub(crate) fn reject_inbound(_handle: &SessionHandle, incoming: Incoming) {
    match incoming {
        Incoming::Request(request) => {
            let message = format!("method {} is not handled by this client", request.method);
            let _ = request.reply_error(0, message);
        }
        Incoming::Notification { method, .. } => debug!(method, "ignoring notification"),
    }
}

pub(crate) fn parse_args(raw: &[String]) -> Vec<Value> {
    raw.iter().map(|arg| parse_arg(arg)).collect()
}

fn parse_arg(raw: &str) -> Value {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(json) => rmpv::ext::to_value(json).unwrap_or_else(|_| Value::from(raw)),
        Err(_) => Value::from(raw),
    }
}
