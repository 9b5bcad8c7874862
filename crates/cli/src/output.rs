//! Rendering of records, tables and errors.
//!
//! Results go to stdout, errors and diagnostics to stderr. JSON output is
//! always pretty-printed and always emitted, even with `--quiet`.

use metaledger_storage::{LifecycleEvent, Record};
use serde::Serialize;

use crate::error::CliError;
use crate::OutputFormat;

/// Header fields rendered first, in this order.
const HEADER_FIELDS: [&str; 7] = [
    "id",
    "kind",
    "status",
    "owner_app_id",
    "created_at",
    "updated_at",
    "version",
];

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("internal error: failed to serialize output: {}", e),
    }
}

/// Scalar JSON values print bare; `null` prints as `-`.
fn plain(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "-".to_string(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `key: value` lines for a record, header first then body fields.
pub(crate) fn record_lines(record: &Record) -> Vec<String> {
    let value = match serde_json::to_value(record) {
        Ok(v) => v,
        Err(e) => return vec![format!("<unrenderable record {}: {}>", record.id, e)],
    };
    let Some(map) = value.as_object() else {
        return vec![value.to_string()];
    };

    let width = map.keys().map(String::len).max().unwrap_or(0) + 1;
    let mut lines = Vec::with_capacity(map.len());
    for key in HEADER_FIELDS {
        if let Some(v) = map.get(key) {
            lines.push(format!("{:<width$} {}", format!("{}:", key), plain(v)));
        }
    }
    for (key, v) in map {
        if HEADER_FIELDS.contains(&key.as_str()) {
            continue;
        }
        lines.push(format!("{:<width$} {}", format!("{}:", key), plain(v)));
    }
    lines
}

pub(crate) fn print_record(record: &Record, output: OutputFormat, quiet: bool) {
    match output {
        OutputFormat::Json => print_json(record),
        OutputFormat::Text if quiet => println!("{}", record.id),
        OutputFormat::Text => {
            for line in record_lines(record) {
                println!("{}", line);
            }
        }
    }
}

pub(crate) fn print_records(records: &[Record], output: OutputFormat, quiet: bool) {
    match output {
        OutputFormat::Json => print_json(records),
        OutputFormat::Text if quiet => {
            for r in records {
                println!("{}", r.id);
            }
        }
        OutputFormat::Text => {
            if records.is_empty() {
                println!("no records");
                return;
            }
            println!(
                "{:<32}  {:<18}  {:<10}  {:<16}  {}",
                "ID", "KIND", "STATUS", "OWNER", "UPDATED"
            );
            for r in records {
                println!(
                    "{:<32}  {:<18}  {:<10}  {:<16}  {}",
                    r.id,
                    r.kind(),
                    r.status(),
                    r.owner_app_id,
                    r.updated_at
                );
            }
        }
    }
}

pub(crate) fn print_history(events: &[LifecycleEvent], output: OutputFormat, quiet: bool) {
    match output {
        OutputFormat::Json => print_json(events),
        OutputFormat::Text if quiet => {
            for e in events {
                println!("{} {}", e.seq, e.operation);
            }
        }
        OutputFormat::Text => {
            for e in events {
                let from = e.from_status.as_deref().unwrap_or("-");
                let details: Vec<String> =
                    e.details.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
                println!(
                    "{:>5}  {}  {:<16}  {} -> {}  {}",
                    e.seq,
                    e.at,
                    e.operation,
                    from,
                    e.to_status,
                    details.join(" ")
                )
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    kind: &'a str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    probe: Option<&'a metaledger_engine::ProbeReport>,
}

#[derive(Serialize)]
struct ErrorEnvelope<'a> {
    error: ErrorBody<'a>,
}

/// Print `err` to stderr unless `quiet`.
pub(crate) fn report_error(err: &CliError, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => {
            eprintln!("error: {}", err);
            if let Some(report) = err.probe_report() {
                if let Some(latency) = report.latency_ms {
                    eprintln!("  gave up after {} ms", latency);
                }
            }
        }
        OutputFormat::Json => {
            let envelope = ErrorEnvelope {
                error: ErrorBody {
                    kind: err.kind(),
                    message: err.to_string(),
                    probe: err.probe_report(),
                },
            };
            match serde_json::to_string_pretty(&envelope) {
                Ok(text) => eprintln!("{}", text),
                Err(_) => eprintln!("{{\"error\": {{\"kind\": \"{}\"}}}}", err.kind()),
            }
        }
    }
}
