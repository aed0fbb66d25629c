use nvrpc_session::Session;

use crate::cmd::call::parse_args;
use crate::cmd::NotifyArgs;
use crate::exit::{session_error, CliResult, SUCCESS};

pub fn run(args: NotifyArgs) -> CliResult<i32> {
    let endpoint = args.target.resolve()?;
    let session =
        Session::open(&endpoint).map_err(|err| session_error("connect failed", err))?;

    // Notifications are fire-and-forget; no read loop is needed.
    session
        .notify(&args.method, parse_args(&args.args))
        .map_err(|err| session_error("notify failed", err))?;

    session.shutdown();
    Ok(SUCCESS)
}
