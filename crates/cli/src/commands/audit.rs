//! `metaledger audit`: engine-level checks plus JSON Schema validation of
//! every persisted record document.

use std::path::{Path, PathBuf};

use metaledger_engine::AuditFinding;
use metaledger_storage::RecordKind;
use serde::Serialize;

use super::Context;
use crate::error::CliError;
use crate::output::print_json;
use crate::OutputFormat;

static RECORD_SCHEMA_STR: &str = include_str!("../../../../docs/record-schema.json");

#[derive(Serialize)]
struct ChainBreakView {
    seq: u64,
    reason: String,
}

#[derive(Serialize)]
struct AuditView {
    clean: bool,
    records_checked: usize,
    events_checked: usize,
    files_validated: usize,
    chain_break: Option<ChainBreakView>,
    findings: Vec<AuditFinding>,
}

pub(crate) async fn cmd_audit(ctx: &Context) -> Result<(), CliError> {
    let engine = ctx.engine().await?;
    let report = engine.audit().await?;

    let root = engine.store().root().to_path_buf();
    let (files_validated, schema_findings) = validate_store_files(&root).await?;

    let mut findings = report.findings;
    findings.extend(schema_findings);
    let chain_break = report.chain_break.map(|b| ChainBreakView {
        seq: b.seq,
        reason: b.reason,
    });
    let view = AuditView {
        clean: chain_break.is_none() && findings.is_empty(),
        records_checked: report.records_checked,
        events_checked: report.events_checked,
        files_validated,
        chain_break,
        findings,
    };

    match ctx.output {
        OutputFormat::Json => print_json(&view),
        OutputFormat::Text => {
            if !ctx.quiet || !view.clean {
                println!(
                    "checked {} records, {} journal events, {} files",
                    view.records_checked, view.events_checked, view.files_validated
                );
            }
            if let Some(b) = &view.chain_break {
                println!("journal broken at seq {}: {}", b.seq, b.reason);
            }
            for f in &view.findings {
                println!("{}: {}", f.record_id, f.problem);
            }
        }
    }

    if view.clean {
        Ok(())
    } else {
        Err(CliError::failed(
            1,
            "audit",
            format!(
                "audit found {} problem(s){}",
                view.findings.len(),
                if view.chain_break.is_some() {
                    " and a broken journal"
                } else {
                    ""
                }
            ),
        ))
    }
}

/// Validate every `{root}/{kind}/*.json` against the record schema.
///
/// Non-`.json` files (index files, leftover temp files) are skipped.
async fn validate_store_files(root: &Path) -> Result<(usize, Vec<AuditFinding>), CliError> {
    let schema: serde_json::Value = serde_json::from_str(RECORD_SCHEMA_STR).map_err(|e| {
        CliError::failed(
            1,
            "internal",
            format!("failed to parse embedded record schema: {}", e),
        )
    })?;
    let validator = jsonschema::validator_for(&schema).map_err(|e| {
        CliError::failed(
            1,
            "internal",
            format!("failed to compile embedded record schema: {}", e),
        )
    })?;

    let mut validated = 0;
    let mut findings = Vec::new();
    for kind in RecordKind::ALL {
        for path in record_files(&root.join(kind.as_str())).await? {
            validated += 1;
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let finding = |problem: String| AuditFinding {
                record_id: stem.clone(),
                problem,
            };

            let text = match tokio::fs::read_to_string(&path).await {
                Ok(t) => t,
                Err(e) => {
                    findings.push(finding(format!("unreadable {}: {}", path.display(), e)));
                    continue;
                }
            };
            let doc: serde_json::Value = match serde_json::from_str(&text) {
                Ok(v) => v,
                Err(e) => {
                    findings.push(finding(format!("invalid JSON in {}: {}", path.display(), e)));
                    continue;
                }
            };

            for err in validator.iter_errors(&doc) {
                findings.push(finding(format!("schema: {}", err)));
            }
            if doc.get("kind").and_then(|k| k.as_str()) != Some(kind.as_str()) {
                findings.push(finding(format!("stored under {}/ with a different kind", kind)));
            }
            if doc.get("id").and_then(|i| i.as_str()) != Some(stem.as_str()) {
                findings.push(finding("file name does not match record id".to_string()));
            }
        }
    }
    tracing::debug!(files = validated, problems = findings.len(), "schema validation done");
    Ok((validated, findings))
}

async fn record_files(dir: &Path) -> Result<Vec<PathBuf>, CliError> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(io_failure(dir, e)),
    };
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|e| io_failure(dir, e))? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn io_failure(dir: &Path, err: std::io::Error) -> CliError {
    CliError::failed(1, "storage", format!("cannot list {}: {}", dir.display(), err))
}
