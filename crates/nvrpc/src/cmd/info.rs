use std::sync::Arc;
use std::thread;

use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use nvrpc_session::Session;
use rmpv::Value;
use serde::Serialize;

use crate::cmd::call::reject_inbound;
use crate::cmd::InfoArgs;
use crate::exit::{session_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::OutputFormat;

pub fn run(args: InfoArgs, format: OutputFormat) -> CliResult<i32> {
    let endpoint = args.target.resolve()?;
    let session = Arc::new(
        Session::open(&endpoint).map_err(|err| session_error("connect failed", err))?,
    );

    let runner = {
        let session = Arc::clone(&session);
        thread::spawn(move || session.run(reject_inbound))
    };

    let info = session.discover_api();

    session.shutdown();
    let _ = runner.join();

    let info = info.map_err(|err| session_error("api discovery failed", err))?;
    let summary = ApiSummary::from_value(&info)
        .ok_or_else(|| CliError::new(DATA_INVALID, "unexpected api info shape"))?;

    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string(&summary).unwrap_or_else(|_| "{}".to_string())
        ),
        OutputFormat::Pretty => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["CHANNEL", "VERSION", "FUNCTIONS", "UI EVENTS"])
                .add_row(vec![
                    summary.channel_id.to_string(),
                    summary.version.clone(),
                    summary.functions.to_string(),
                    summary.ui_events.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Raw => println!("{info}"),
    }

    Ok(SUCCESS)
}

/// The few catalogue fields worth summarizing; the raw catalogue itself is
/// consumed by higher layers, not here.
#[derive(Debug, Serialize, PartialEq, Eq)]
struct ApiSummary {
    channel_id: u64,
    version: String,
    functions: usize,
    ui_events: usize,
}

impl ApiSummary {
    fn from_value(info: &Value) -> Option<Self> {
        let fields = info.as_array()?;
        let channel_id = fields.first()?.as_u64()?;
        let metadata = fields.get(1)?.as_map()?;

        let version = map_get(metadata, "version")
            .and_then(format_version)
            .unwrap_or_else(|| "unknown".to_string());
        let functions = map_get(metadata, "functions")
            .and_then(Value::as_array)
            .map(Vec::len)
            .unwrap_or(0);
        let ui_events = map_get(metadata, "ui_events")
            .and_then(Value::as_array)
            .map(Vec::len)
            .unwrap_or(0);

        Some(Self {
            channel_id,
            version,
            functions,
            ui_events,
        })
    }
}

fn map_get<'a>(map: &'a [(Value, Value)], key: &str) -> Option<&'a Value> {
    map.iter()
        .find(|(k, _)| k.as_str() == Some(key))
        .map(|(_, v)| v)
}

fn format_version(value: &Value) -> Option<String> {
    let fields = value.as_map()?;
    let major = map_get(fields, "major")?.as_u64()?;
    let minor = map_get(fields, "minor")?.as_u64()?;
    let patch = map_get(fields, "patch")?.as_u64()?;
    Some(format!("{major}.{minor}.{patch}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str, value: Value) -> (Value, Value) {
        (Value::from(key), value)
    }

    #[test]
    fn summary_from_catalogue() {
        let info = Value::Array(vec![
            Value::from(3u64),
            Value::Map(vec![
                entry(
                    "version",
                    Value::Map(vec![
                        entry("major", Value::from(0u64)),
                        entry("minor", Value::from(11u64)),
                        entry("patch", Value::from(2u64)),
                    ]),
                ),
                entry(
                    "functions",
                    Value::Array(vec![Value::Map(vec![]), Value::Map(vec![])]),
                ),
                entry("ui_events", Value::Array(vec![Value::Map(vec![])])),
            ]),
        ]);

        assert_eq!(
            ApiSummary::from_value(&info),
            Some(ApiSummary {
                channel_id: 3,
                version: "0.11.2".to_string(),
                functions: 2,
                ui_events: 1,
            })
        );
    }

    #[test]
    fn missing_metadata_fields_degrade_gracefully() {
        let info = Value::Array(vec![Value::from(1u64), Value::Map(vec![])]);
        let summary = ApiSummary::from_value(&info).unwrap();
        assert_eq!(summary.version, "unknown");
        assert_eq!(summary.functions, 0);
    }

    #[test]
    fn non_catalogue_value_is_rejected() {
        assert_eq!(ApiSummary::from_value(&Value::from("nope")), None);
    }
}
