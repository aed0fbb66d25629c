use std::path::PathBuf;

use clap::{Args, Subcommand};
use nvrpc_transport::Endpoint;

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod call;
pub mod info;
pub mod notify;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Issue one request and print the result.
    Call(CallArgs),
    /// Send one notification (no response is ever expected).
    Notify(NotifyArgs),
    /// Connect and print the session's API summary.
    Info(InfoArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Call(args) => call::run(args, format),
        Command::Notify(args) => notify::run(args),
        Command::Info(args) => info::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Where to find the editor. Explicit flags win over the conventional
/// listen-address environment variable.
#[derive(Args, Debug, Default)]
pub struct TargetArgs {
    /// Connect to an editor listening on HOST:PORT.
    #[arg(long, value_name = "HOST:PORT")]
    pub tcp: Option<String>,

    /// Connect to an editor listening on a Unix domain socket path.
    #[arg(long, value_name = "PATH")]
    pub unix: Option<PathBuf>,

    /// Spawn CMD (whitespace-separated argv) and talk over its stdio.
    #[arg(long, value_name = "CMD")]
    pub cmd: Option<String>,

    /// Editor address, either HOST:PORT or a socket path.
    #[arg(long, env = "NVIM_LISTEN_ADDRESS", value_name = "ADDR")]
    pub addr: Option<String>,
}

impl TargetArgs {
    pub fn resolve(&self) -> CliResult<Endpoint> {
        if let Some(tcp) = &self.tcp {
            return parse_tcp(tcp);
        }
        #[cfg(unix)]
        if let Some(path) = &self.unix {
            return Ok(Endpoint::Unix { path: path.clone() });
        }
        if let Some(cmd) = &self.cmd {
            let argv: Vec<String> = cmd.split_whitespace().map(str::to_string).collect();
            if argv.is_empty() {
                return Err(CliError::new(USAGE, "--cmd must not be empty"));
            }
            return Ok(Endpoint::Child { argv });
        }
        if let Some(addr) = &self.addr {
            return parse_addr(addr);
        }
        Err(CliError::new(
            USAGE,
            "no target given: use --tcp, --unix, --cmd, or set NVIM_LISTEN_ADDRESS",
        ))
    }
}

fn parse_tcp(input: &str) -> CliResult<Endpoint> {
    let Some((host, port)) = input.rsplit_once(':') else {
        return Err(CliError::new(USAGE, format!("--tcp expects HOST:PORT, got {input}")));
    };
    let port: u16 = port
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid port in {input}")))?;
    Ok(Endpoint::Tcp {
        host: host.to_string(),
        port,
    })
}

fn parse_addr(input: &str) -> CliResult<Endpoint> {
    if let Some((host, port)) = input.rsplit_once(':') {
        if let Ok(port) = port.parse::<u16>() {
            return Ok(Endpoint::Tcp {
                host: host.to_string(),
                port,
            });
        }
    }
    #[cfg(unix)]
    {
        Ok(Endpoint::Unix {
            path: PathBuf::from(input),
        })
    }
    #[cfg(not(unix))]
    {
        Err(CliError::new(
            USAGE,
            format!("cannot interpret address: {input}"),
        ))
    }
}

#[derive(Args, Debug)]
pub struct CallArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Method name to call.
    pub method: String,

    /// Arguments, each parsed as JSON; bare words fall back to strings.
    #[arg(value_name = "ARG")]
    pub args: Vec<String>,
}

#[derive(Args, Debug)]
pub struct NotifyArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Method name to notify.
    pub method: String,

    /// Arguments, each parsed as JSON; bare words fall back to strings.
    #[arg(value_name = "ARG")]
    pub args: Vec<String>,
}

#[derive(Args, Debug)]
pub struct InfoArgs {
    #[command(flatten)]
    pub target: TargetArgs,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Include build metadata.
    #[arg(long)]
    pub extended: bool,
}
