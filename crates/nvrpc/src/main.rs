mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "nvrpc", version, about = "Editor RPC client CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "warn", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_call_subcommand() {
        let cli = Cli::try_parse_from([
            "nvrpc",
            "call",
            "--tcp",
            "127.0.0.1:6666",
            "nvim_strwidth",
            "\"hi\"",
        ])
        .expect("call args should parse");

        assert!(matches!(cli.command, Command::Call(_)));
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "nvrpc",
            "version",
            "--log-level",
            "debug",
            "--format",
            "json",
        ])
        .expect("global flags should parse anywhere");

        assert!(matches!(cli.command, Command::Version(_)));
        assert!(cli.format.is_some());
    }

    #[test]
    fn rejects_unknown_subcommand() {
        let err = Cli::try_parse_from(["nvrpc", "frobnicate"]).expect_err("should not parse");
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidSubcommand);
    }
}
