//! CLI presentation: formatting of data nodes and load records.

use crate::reducers::ShadowRecord;
use comfy_table::presets::UTF8_FULL;
use comfy_table::Table;
use serde_json::Value;

/// `path = <json>` for a loaded node, or a placeholder when nothing is stored
pub fn format_value(path: &str, value: Option<&Value>) -> String {
    match value {
        Some(value) => {
            let rendered =
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
            format!("{} = {}", path, rendered)
        }
        None => format!("{} = (not loaded)", path),
    }
}

fn format_timestamp(millis: Option<u64>) -> String {
    millis
        .and_then(|ms| i64::try_from(ms).ok())
        .and_then(chrono::DateTime::from_timestamp_millis)
        .map(|at| at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
        .unwrap_or_else(|| "-".to_string())
}

/// Table of load records, one row per requested path
pub fn format_status_table(rows: &[(String, Option<ShadowRecord>)]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Path", "State", "Started", "Loaded", "Failed", "Error"]);
    for (path, record) in rows {
        let record = record.clone().unwrap_or_default();
        let state = if record.is_pending() {
            "loading"
        } else if record.failed_at.is_some() {
            "failed"
        } else if record.loaded_at.is_some() {
            "loaded"
        } else {
            "unknown"
        };
        let error = record
            .error
            .as_ref()
            .map(|e| match &e.code {
                Some(code) => format!("{}: {}", code, e.message),
                None => e.message.clone(),
            })
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            path.clone(),
            state.to_string(),
            format_timestamp(record.started_loading_at),
            format_timestamp(record.loaded_at),
            format_timestamp(record.failed_at),
            error,
        ]);
    }
    table.to_string()
}
