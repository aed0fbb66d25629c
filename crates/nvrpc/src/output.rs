use std::io::IsTerminal;

use clap::ValueEnum;
use rmpv::Value;

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    Json,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

/// Print an RPC result value to stdout.
pub fn print_value(value: &Value, format: OutputFormat) {
    match format {
        OutputFormat::Json => match value_to_json(value) {
            Some(json) => println!("{json}"),
            None => println!("{value}"),
        },
        OutputFormat::Pretty => println!("{value}"),
        OutputFormat::Raw => match value.as_str() {
            // Strings print unquoted; everything else keeps its display form.
            Some(text) => println!("{text}"),
            None => println!("{value}"),
        },
    }
}

/// Convert to JSON where the value domain allows it (binary and ext
/// values have no JSON form).
pub fn value_to_json(value: &Value) -> Option<serde_json::Value> {
    rmpv::ext::from_value(value.clone()).ok()
}
