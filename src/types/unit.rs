//! Units of analysis: one row of the working agreement matrix.
//!
//! A `Unit` is a (participant, text, code) combination with one presence
//! flag per registered coder. Units are created by the Segment Builder,
//! appended by the True-Negative Injector, consolidated by the Fuzzy Merge
//! Engine, and annotated by the Agreement Classifier. The Statistics
//! Engine only reads them.
//!
//! ## Invariants
//!
//! Maintained after every structural pass:
//!
//! 1. The flag key set equals the registered coder set.
//! 2. `tn == true` implies every coder flag is false.
//! 3. Ids form a dense `1..=N` sequence.
//! 4. `all_agree == Exact` implies every coder flag is true.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::event::CoderRegistry;

/// Stable integer handle for a unit. Dense `1..=N` after every pass.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct UnitId(pub u32);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Row-level agreement flag (the `all_agree` column).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Agreement {
    /// Disagreement or not yet evaluated.
    #[default]
    None,
    /// Every coder applied the identical code string.
    Exact,
    /// Weighted mode: every coder applied some code in the same category.
    Partial,
}

impl Agreement {
    /// Numeric value used in the exported CSV (0 / 1 / 2).
    pub fn as_u8(&self) -> u8 {
        match self {
            Self::None => 0,
            Self::Exact => 1,
            Self::Partial => 2,
        }
    }
}

/// Method-dependent reporting state assigned by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ReportingStatus {
    /// Not yet classified.
    #[default]
    Unknown,
    /// Uncoded unit counted as agreement (Method C only).
    TrueNegative,
    /// Uncoded unit excluded from the universe (Methods A and B).
    IgnoredTn,
    /// Every coder applied the identical code.
    Agree,
    /// Category-level agreement in weighted mode.
    PartialAgree,
    /// Conflict: coders applied different codes, or omission under
    /// Methods B/C.
    Disagree,
    /// Method A: a coder was silent on this code and their other codes for
    /// this text are a subset of everyone else's (a miss, not a conflict).
    IgnoredOmission,
}

impl fmt::Display for ReportingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unknown => "UNKNOWN",
            Self::TrueNegative => "TRUE_NEGATIVE",
            Self::IgnoredTn => "IGNORED_TN",
            Self::Agree => "AGREE",
            Self::PartialAgree => "PARTIAL_AGREE",
            Self::Disagree => "DISAGREE",
            Self::IgnoredOmission => "IGNORED_OMISSION",
        };
        write!(f, "{s}")
    }
}

/// One row of the working matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    /// Dense sequential id.
    pub id: UnitId,
    /// Normalized participant id (lowercase).
    pub p: String,
    /// The text span. Mutated by merging.
    pub text: String,
    /// Code name (`Category:Name` or flat), `"None"` for injected negatives.
    pub code: String,
    /// Accumulated memo text.
    pub memo: String,
    /// Presence flag per registered coder.
    pub flags: BTreeMap<String, bool>,
    /// The code string each coder actually applied, for multi-class stats.
    pub labels: BTreeMap<String, Option<String>>,
    /// True-negative marker: no coder touched this text.
    pub tn: bool,
    /// Row-level agreement, recomputed by the classifier.
    pub all_agree: Agreement,
    /// Excluded from the analysis universe by the active method.
    pub ignored: bool,
    /// Final reporting state.
    pub reporting_status: ReportingStatus,
}

impl Unit {
    /// Create a coded unit with all flags cleared.
    pub fn new(p: impl Into<String>, text: impl Into<String>, code: impl Into<String>, registry: &CoderRegistry) -> Self {
        let flags = registry.names().iter().map(|c| (c.clone(), false)).collect();
        let labels = registry.names().iter().map(|c| (c.clone(), None)).collect();
        Self {
            id: UnitId(0),
            p: p.into(),
            text: text.into(),
            code: code.into(),
            memo: String::new(),
            flags,
            labels,
            tn: false,
            all_agree: Agreement::None,
            ignored: false,
            reporting_status: ReportingStatus::Unknown,
        }
    }

    /// Create an injected true-negative unit (`code="None"`, no flags).
    pub fn true_negative(
        p: impl Into<String>,
        text: impl Into<String>,
        registry: &CoderRegistry,
    ) -> Self {
        let mut unit = Self::new(p, text, "None", registry);
        unit.tn = true;
        unit
    }

    /// Set a coder's presence flag and record the applied code as their label.
    pub fn mark_coded(&mut self, coder: &str) {
        if let Some(flag) = self.flags.get_mut(coder) {
            *flag = true;
        }
        if let Some(label) = self.labels.get_mut(coder) {
            *label = Some(self.code.clone());
        }
    }

    /// Number of coders whose flag is set.
    pub fn active_count(&self) -> usize {
        self.flags.values().filter(|f| **f).count()
    }

    /// The category prefix of the code (`Emotions:Joy` → `Emotions`).
    /// Flat codes are their own category.
    pub fn category(&self) -> &str {
        self.code.split(':').next().unwrap_or(&self.code).trim()
    }

    /// Append a memo fragment unless it is empty or already present.
    pub fn merge_memo(&mut self, other: &str) {
        let other = other.trim();
        if other.is_empty() || self.memo.contains(other) {
            return;
        }
        if self.memo.is_empty() {
            self.memo = other.to_string();
        } else {
            self.memo = format!("{}; {}", self.memo, other);
        }
    }
}

/// Re-densify unit ids to `1..=N` after a structural pass.
pub fn renumber(units: &mut [Unit]) {
    for (i, unit) in units.iter_mut().enumerate() {
        unit.id = UnitId(i as u32 + 1);
    }
}
