//! Tabular-row ingestion: resolving configured columns into rating events.
//!
//! File parsing (CSV/Excel) is a collaborator's job; this module takes an
//! already-split header row plus data rows per source file and produces
//! [`RatingEvent`]s. Column names are configurable through [`ColumnSpec`];
//! a missing required column is fatal for that source.

use std::collections::BTreeSet;

use crate::text::clean_text;
use crate::types::{ColumnSpec, CoderRegistry, RatingEvent};

/// Error type for ingestion.
#[derive(Debug, Clone, thiserror::Error)]
pub enum IngestError {
    /// A configured required column is absent from the header.
    #[error("Missing required column: '{0}'")]
    MissingRequiredColumn(String),
    /// No source tables were provided at all.
    #[error("No input sources found")]
    NoInputFound,
}

/// One source file's rows, pre-split by the file-reading collaborator.
#[derive(Debug, Clone)]
pub struct SourceTable {
    /// Header row.
    pub header: Vec<String>,
    /// Data rows. Short rows are tolerated; missing cells read as empty.
    pub rows: Vec<Vec<String>>,
}

/// Resolved indices of the configured columns within one header.
#[derive(Debug, Clone, Copy)]
struct ColumnIndices {
    file: usize,
    coder: usize,
    text: usize,
    code: usize,
    memo: Option<usize>,
}

fn resolve_columns(header: &[String], spec: &ColumnSpec) -> Result<ColumnIndices, IngestError> {
    let find = |name: &str| header.iter().position(|h| h == name);
    let required = |name: &str| {
        find(name).ok_or_else(|| IngestError::MissingRequiredColumn(name.to_string()))
    };
    Ok(ColumnIndices {
        file: required(&spec.file)?,
        coder: required(&spec.coder)?,
        text: required(&spec.text)?,
        code: required(&spec.code)?,
        memo: find(&spec.memo),
    })
}

fn cell(row: &[String], idx: usize) -> &str {
    row.get(idx).map(String::as_str).unwrap_or("")
}

/// Resolve all source tables into cleaned rating events plus the coder
/// registry observed across them.
///
/// Rows missing any of file/coder/text/code after cleaning are dropped,
/// mirroring how the original drops NA rows. A single source table puts
/// the run into single-coder territory; zero tables is an error.
pub fn resolve_events(
    sources: &[SourceTable],
    spec: &ColumnSpec,
) -> Result<(Vec<RatingEvent>, CoderRegistry), IngestError> {
    if sources.is_empty() {
        return Err(IngestError::NoInputFound);
    }

    let mut events = Vec::new();
    let mut coder_names = BTreeSet::new();

    for source in sources {
        let idx = resolve_columns(&source.header, spec)?;

        for row in &source.rows {
            let file = cell(row, idx.file).trim().to_string();
            let coder = cell(row, idx.coder).trim().to_string();
            let text = clean_text(cell(row, idx.text));
            // Code names lose internal spaces so "Emotions: Joy" and
            // "Emotions:Joy" compare equal.
            let code = cell(row, idx.code).trim().replace(' ', "");
            if file.is_empty() || coder.is_empty() || text.is_empty() || code.is_empty() {
                continue;
            }
            let memo = idx.memo.map(|m| clean_text(cell(row, m))).filter(|m| !m.is_empty());

            coder_names.insert(coder.clone());
            events.push(RatingEvent {
                file,
                coder,
                text,
                code,
                memo,
            });
        }
    }

    let registry = CoderRegistry::from_names(coder_names);
    if sources.len() == 1 || registry.is_single_coder() {
        tracing::info!(
            coders = registry.len(),
            "single source or single coder: agreement metrics will be trivial"
        );
    }
    tracing::info!(events = events.len(), coders = registry.len(), "resolved rating events");
    Ok((events, registry))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> Vec<String> {
        ["File", "Coder", "Coded", "Codename", "Coded_Memo"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn resolves_events_and_registry() {
        let source = SourceTable {
            header: header(),
            rows: vec![
                row(&["P07.txt", "alice", "some  text", "Emotions: Joy", "note"]),
                row(&["P07.txt", "bob", "some text", "Emotions: Joy", ""]),
            ],
        };
        let (events, registry) =
            resolve_events(&[source], &ColumnSpec::default()).expect("resolve");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].text, "some text");
        assert_eq!(events[0].code, "Emotions:Joy");
        assert_eq!(events[0].memo.as_deref(), Some("note"));
        assert!(events[1].memo.is_none());
        assert_eq!(registry.names(), &["alice".to_string(), "bob".to_string()]);
    }

    #[test]
    fn missing_required_column_is_fatal() {
        let source = SourceTable {
            header: vec!["File".to_string(), "Coder".to_string()],
            rows: vec![],
        };
        let err = resolve_events(&[source], &ColumnSpec::default()).unwrap_err();
        assert!(matches!(err, IngestError::MissingRequiredColumn(c) if c == "Coded"));
    }

    #[test]
    fn missing_memo_column_is_tolerated() {
        let source = SourceTable {
            header: ["File", "Coder", "Coded", "Codename"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            rows: vec![row(&["P01.txt", "alice", "text", "X"])],
        };
        let (events, _) = resolve_events(&[source], &ColumnSpec::default()).expect("resolve");
        assert_eq!(events.len(), 1);
        assert!(events[0].memo.is_none());
    }

    #[test]
    fn no_sources_is_an_error() {
        let err = resolve_events(&[], &ColumnSpec::default()).unwrap_err();
        assert!(matches!(err, IngestError::NoInputFound));
    }

    #[test]
    fn incomplete_rows_are_dropped() {
        let source = SourceTable {
            header: header(),
            rows: vec![
                row(&["P01.txt", "alice", "", "X", ""]),
                row(&["", "alice", "text", "X", ""]),
                row(&["P01.txt", "alice", "text", "X", ""]),
            ],
        };
        let (events, _) = resolve_events(&[source], &ColumnSpec::default()).expect("resolve");
        assert_eq!(events.len(), 1);
    }
}
