//! Import/Export (C9): round-tripping decisions through a markdown file
//! (spec §4.9).
//!
//! Grounded on `original_source/.../services/io_service.py`'s
//! `export_to_markdown`/`import_from_markdown` pair — same file name,
//! same block format, same best-effort-per-block import behavior,
//! translated from `str.split`/`str.find` slicing into the Rust-native
//! line-oriented parse below.

use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::instrument;

use crate::entities::decision;
use crate::error::Result;
use crate::workspace::WorkspaceHandle;

const DECISIONS_FILE: &str = "decisions.md";

/// Result of [`export`] (spec §4.9).
#[derive(Clone, Debug, Serialize)]
pub struct ExportResult {
    pub status: &'static str,
    pub path: String,
    pub files_created: Vec<String>,
}

/// Result of [`import`] (spec §4.9).
#[derive(Clone, Debug, Serialize)]
pub struct ImportResult {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imported: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Writes `decisions.md` into `<out_dir>`, creating it if needed. No
/// file is written (and `files_created` stays empty) if the workspace
/// has no decisions (spec §4.9).
#[instrument(skip(workspace))]
pub fn export(workspace: &WorkspaceHandle, out_dir: &Path) -> Result<ExportResult> {
    fs::create_dir_all(out_dir)?;

    let rows = workspace.storage().list_decisions(Some(1000), None)?;
    let mut files_created = Vec::new();

    if !rows.is_empty() {
        let mut body = String::from("# Decision Log\n\n");
        for row in &rows {
            body.push_str(&format!("## {}\n\n**Timestamp:** {}\n\n", row.summary, row.timestamp.to_rfc3339()));
            if let Some(rationale) = &row.rationale {
                body.push_str(&format!("**Rationale:**\n{rationale}\n\n"));
            }
            if let Some(details) = &row.implementation_details {
                body.push_str(&format!("**Implementation Details:**\n{details}\n\n"));
            }
            if !row.tags.is_empty() {
                body.push_str(&format!("**Tags:** {}\n\n", row.tags.join(", ")));
            }
            body.push_str("---\n");
        }
        fs::write(out_dir.join(DECISIONS_FILE), body)?;
        files_created.push(DECISIONS_FILE.to_string());
    }

    Ok(ExportResult {
        status: "success",
        path: out_dir.display().to_string(),
        files_created,
    })
}

/// Reads `decisions.md` from `<in_dir>`, splitting on `---` block
/// separators; each block starting with `## ` is parsed into a decision
/// and logged. Malformed blocks (missing a summary line, or one that
/// fails decision validation) are counted as failures rather than
/// aborting the whole import (spec §4.9).
#[instrument(skip(workspace))]
pub fn import(workspace: &WorkspaceHandle, in_dir: &Path) -> Result<ImportResult> {
    let path = in_dir.join(DECISIONS_FILE);
    if !path.exists() {
        return Ok(ImportResult {
            status: "failed",
            error: Some(format!("{DECISIONS_FILE} not found")),
            imported: None,
            failed: None,
            message: None,
        });
    }

    let content = fs::read_to_string(&path)?;
    let mut imported = 0usize;
    let mut failed = 0usize;

    for block in content.split("---") {
        let block = block.trim_start_matches('\n');
        if block.trim().is_empty() || !block.starts_with("## ") {
            continue;
        }
        match parse_decision_block(block) {
            Some((summary, rationale)) => match decision::create(workspace, summary, rationale, None, Vec::new()) {
                Ok(_) => imported += 1,
                Err(err) => {
                    tracing::warn!(%err, "failed to import decision block");
                    failed += 1;
                }
            },
            None => failed += 1,
        }
    }

    Ok(ImportResult {
        status: "completed",
        error: None,
        imported: Some(imported),
        failed: Some(failed),
        message: Some(format!("Successfully imported {imported} decisions, {failed} failed to parse")),
    })
}

/// Extracts `(summary, rationale)` from one `## summary\n...` block.
/// `rationale` is the text between a `**Rationale:**` marker and the
/// next `**` marker, trimmed.
fn parse_decision_block(block: &str) -> Option<(String, Option<String>)> {
    let first_line = block.lines().next()?;
    let summary = first_line.trim_start_matches("##").trim().to_string();
    if summary.is_empty() {
        return None;
    }

    let rationale = block.find("**Rationale:**").map(|start| {
        let after = &block[start + "**Rationale:**".len()..];
        match after.find("**") {
            Some(end) => after[..end].trim().to_string(),
            None => after.trim().to_string(),
        }
    });

    Some((summary, rationale))
}
