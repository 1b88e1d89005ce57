//! Raw rating events and the coder registry.
//!
//! A `RatingEvent` is one row of a coder's export: "this coder applied this
//! code to this text span in this file". Events are read-only; the Segment
//! Builder consumes them once.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// One raw coding event from a coder's codebook export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingEvent {
    /// Source file identifier (e.g. `P07.txt`).
    pub file: String,
    /// Coder name.
    pub coder: String,
    /// The coded text span.
    pub text: String,
    /// Code name, either flat (`Trust`) or hierarchical (`Emotions:Joy`).
    pub code: String,
    /// Optional memo attached to the coding.
    pub memo: Option<String>,
}

impl RatingEvent {
    /// Normalized participant id: file name up to the first `.`, lowercased.
    pub fn participant(&self) -> String {
        normalize_participant(&self.file)
    }
}

/// Normalize a file identifier to a participant id.
pub fn normalize_participant(file: &str) -> String {
    file.split('.').next().unwrap_or(file).to_lowercase()
}

/// Configurable column names for the tabular input.
///
/// Defaults follow the QualCoder export layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// File / participant column.
    pub file: String,
    /// Coder name column.
    pub coder: String,
    /// Coded text column.
    pub text: String,
    /// Code name column.
    pub code: String,
    /// Optional memo column.
    pub memo: String,
}

impl Default for ColumnSpec {
    fn default() -> Self {
        Self {
            file: "File".to_string(),
            coder: "Coder".to_string(),
            text: "Coded".to_string(),
            code: "Codename".to_string(),
            memo: "Coded_Memo".to_string(),
        }
    }
}

/// Explicit registry of coders, resolved once at ingestion.
///
/// Replaces dynamic column discovery: every later stage receives this
/// registry and only flags for registered coders are ever set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoderRegistry {
    coders: Vec<String>,
}

impl CoderRegistry {
    /// Build a registry from observed coder names. Names are deduplicated
    /// and sorted for deterministic column order.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set: BTreeSet<String> = names.into_iter().map(Into::into).collect();
        Self {
            coders: set.into_iter().collect(),
        }
    }

    /// Registered coder names in sorted order.
    pub fn names(&self) -> &[String] {
        &self.coders
    }

    /// Number of registered coders.
    pub fn len(&self) -> usize {
        self.coders.len()
    }

    /// True when no coder is registered.
    pub fn is_empty(&self) -> bool {
        self.coders.is_empty()
    }

    /// True when exactly one coder is registered (single-coder mode:
    /// agreement metrics are trivial).
    pub fn is_single_coder(&self) -> bool {
        self.coders.len() == 1
    }

    /// Whether a name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.coders.iter().any(|c| c == name)
    }
}

impl fmt::Display for CoderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.coders.join(", "))
    }
}
