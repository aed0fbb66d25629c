//! Act as an editor-spawned host over our own standard streams.
//!
//! The editor starts this process and drives it over stdio; we answer the
//! conventional `poll` handshake request and reject everything else.

use nvrpc::session::{Incoming, Session, Value};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let session = Session::stdio();

    session.run(|_handle, incoming| match incoming {
        Incoming::Request(request) => {
            let outcome = if request.method == "poll" {
                request.reply(Value::from("ok"))
            } else {
                let message = format!("method {} is not registered", request.method);
                request.reply_error(0, message)
            };
            if let Err(err) = outcome {
                eprintln!("failed to respond: {err}");
            }
        }
        Incoming::Notification { method, .. } => {
            eprintln!("ignoring notification {method}");
        }
    })?;

    Ok(())
}
