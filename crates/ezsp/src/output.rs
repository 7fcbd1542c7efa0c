use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use ezsp_host::{CallbackKind, EzspFrame};
use ezsp_schema::{Record, Value};
use serde::Serialize;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct FrameOutput<'a> {
    #[serde(flatten)]
    frame: &'a EzspFrame,
    kind: &'static str,
    timestamp: String,
}

pub fn print_frame(frame: &EzspFrame, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&FrameOutput {
            frame,
            kind: frame_kind(frame),
            timestamp: now_unix_seconds(),
        }),
        OutputFormat::Table => {
            let mut table = new_table(vec!["FIELD", "VALUE"]);
            table.add_row(vec!["frame".to_string(), frame_title(frame)]);
            for (name, value) in frame.params.iter() {
                table.add_row(vec![name.to_string(), value_text(value)]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("{} {}", frame_title(frame), record_text(&frame.params));
        }
        OutputFormat::Raw => {
            print_raw(format!("{}\n", record_text(&frame.params)).as_bytes());
        }
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

pub fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn frame_kind(frame: &EzspFrame) -> &'static str {
    match frame.callback_kind() {
        CallbackKind::None => "response",
        CallbackKind::Sync => "callback",
        CallbackKind::Async => "async-callback",
    }
}

fn frame_title(frame: &EzspFrame) -> String {
    format!(
        "{} (0x{:04X}) seq={} {}",
        frame.name(),
        frame.frame_id,
        frame.sequence,
        frame_kind(frame)
    )
}

/// Human-readable rendering of a decoded value.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::Int(n) => n.to_string(),
        Value::UInt(n) => n.to_string(),
        Value::Bytes(bytes) if bytes.is_empty() => "<empty>".to_string(),
        Value::Bytes(bytes) => hex::encode(bytes),
        Value::List(items) => {
            let items: Vec<String> = items.iter().map(value_text).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Record(record) => format!("{{{}}}", record_text(record)),
    }
}

pub fn record_text(record: &Record) -> String {
    record
        .iter()
        .map(|(name, value)| format!("{name}={}", value_text(value)))
        .collect::<Vec<_>>()
        .join(" ")
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_text_renders_nested_values() {
        let record = Record::new()
            .with("status", Value::UInt(0))
            .with("key", Value::Bytes(vec![0xDE, 0xAD]))
            .with("ids", Value::List(vec![Value::UInt(1), Value::UInt(2)]));
        assert_eq!(record_text(&record), "status=0 key=dead ids=[1, 2]");
        assert_eq!(
            value_text(&Value::Record(Record::new().with("a", Value::Int(-1)))),
            "{a=-1}"
        );
        assert_eq!(value_text(&Value::Bytes(Vec::new())), "<empty>");
    }
}
