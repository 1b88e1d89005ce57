//! Unit-table CSV rendering and file output.
//!
//! Column order is a downstream contract:
//! `id, p, text, code, memo, <coders...>, <coder>_label..., all_agree, TN,
//! ignored`. Fields are quoted per RFC 4180.

use std::borrow::Cow;
use std::fs;
use std::path::Path;

use crate::types::{CoderRegistry, Unit};

/// Errors raised when writing output artifacts. These are fatal: a report
/// that cannot be persisted is a failed run.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// An output file could not be written.
    #[error("failed to write '{path}': {source}")]
    Write {
        /// Target path.
        path: String,
        /// Underlying io error.
        #[source]
        source: std::io::Error,
    },
}

/// Quote a field when it contains a comma, quote, or line break.
fn csv_field(raw: &str) -> Cow<'_, str> {
    if raw.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", raw.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(raw)
    }
}

fn bit(flag: bool) -> &'static str {
    if flag { "1" } else { "0" }
}

/// Render the final unit table as CSV text.
pub fn render_csv(units: &[Unit], registry: &CoderRegistry) -> String {
    let mut header: Vec<String> = vec!["id", "p", "text", "code", "memo"]
        .into_iter()
        .map(String::from)
        .collect();
    header.extend(registry.names().iter().cloned());
    header.extend(registry.names().iter().map(|c| format!("{c}_label")));
    header.extend(["all_agree", "TN", "ignored"].map(String::from));

    let mut out = String::new();
    out.push_str(
        &header
            .iter()
            .map(|h| csv_field(h).into_owned())
            .collect::<Vec<_>>()
            .join(","),
    );
    out.push_str("\r\n");

    for unit in units {
        let mut row: Vec<String> = vec![
            unit.id.0.to_string(),
            csv_field(&unit.p).into_owned(),
            csv_field(&unit.text).into_owned(),
            csv_field(&unit.code).into_owned(),
            csv_field(&unit.memo).into_owned(),
        ];
        for coder in registry.names() {
            row.push(bit(unit.flags.get(coder).copied().unwrap_or(false)).to_string());
        }
        for coder in registry.names() {
            let label = unit
                .labels
                .get(coder)
                .and_then(|l| l.as_deref())
                .unwrap_or("");
            row.push(csv_field(label).into_owned());
        }
        row.push(unit.all_agree.as_u8().to_string());
        row.push(bit(unit.tn).to_string());
        row.push(bit(unit.ignored).to_string());
        out.push_str(&row.join(","));
        out.push_str("\r\n");
    }
    out
}

/// Write the unit table to disk with a UTF-8 BOM so spreadsheet tools
/// detect the encoding.
pub fn write_csv(
    path: impl AsRef<Path>,
    units: &[Unit],
    registry: &CoderRegistry,
) -> Result<(), ExportError> {
    let path = path.as_ref();
    let body = format!("\u{feff}{}", render_csv(units, registry));
    fs::write(path, body).map_err(|source| ExportError::Write {
        path: path.display().to_string(),
        source,
    })?;
    tracing::info!(path = %path.display(), rows = units.len(), "wrote unit table");
    Ok(())
}

/// Write a rendered notes report to disk.
pub fn write_notes(path: impl AsRef<Path>, notes: &str) -> Result<(), ExportError> {
    let path = path.as_ref();
    fs::write(path, notes).map_err(|source| ExportError::Write {
        path: path.display().to_string(),
        source,
    })?;
    tracing::info!(path = %path.display(), "wrote notes report");
    Ok(())
}
