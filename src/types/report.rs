//! Agreement report types and metric sentinels.
//!
//! Every chance-corrected metric can be mathematically undefined on
//! degenerate input. `MetricValue` keeps "undefined" distinguishable from a
//! genuine 0.0 and carries a human-readable reason for the report.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::config::{AgreementMode, StrijbosMethod};

/// Why a metric could not be computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UndefinedReason {
    /// Expected agreement Pe = 1: perfect chance agreement, Kappa divides
    /// by zero.
    PerfectChanceAgreement,
    /// Expected disagreement De = 0: no variance in judgments.
    NoVariance,
    /// Fewer than two coders; pairwise metrics do not apply.
    SingleCoder,
    /// More than two coders; this metric is defined pairwise only.
    PairwiseOnly,
    /// The analyzed subset is empty.
    NoData,
}

impl UndefinedReason {
    /// Short explanation for report rendering.
    pub fn explanation(&self) -> &'static str {
        match self {
            Self::PerfectChanceAgreement => "Pe=1, perfect chance agreement",
            Self::NoVariance => "De=0, no variance in judgments",
            Self::SingleCoder => "requires at least 2 coders",
            Self::PairwiseOnly => "defined for exactly 2 coders",
            Self::NoData => "no data to analyze",
        }
    }
}

/// A metric value that degrades explicitly instead of raising.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MetricValue {
    /// A computed value.
    Defined(f64),
    /// Not applicable, with the reason.
    Undefined(UndefinedReason),
}

impl MetricValue {
    /// The value, if defined.
    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Defined(v) => Some(*v),
            Self::Undefined(_) => None,
        }
    }

    /// True when the metric was computable.
    pub fn is_defined(&self) -> bool {
        matches!(self, Self::Defined(_))
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Defined(v) => write!(f, "{v:.4}"),
            Self::Undefined(_) => write!(f, "N/A"),
        }
    }
}

/// Per-code reliability metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeMetrics {
    /// The code value.
    pub code: String,
    /// Number of units restricted to this code.
    pub n: usize,
    /// Binary F1 between the first two coders on this subset.
    pub f1: MetricValue,
    /// Two-coder Kappa on this subset, label space forced to {0, 1}.
    pub kappa: MetricValue,
}

/// Where the true-negative count came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TnSource {
    /// No true negatives available.
    #[default]
    None,
    /// Counted from rows injected by the True-Negative Injector.
    Injected,
    /// Estimated from transcript word counts.
    EstimatedFromTranscripts,
}

impl fmt::Display for TnSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Injected => write!(f, "Injected from Master List"),
            Self::EstimatedFromTranscripts => write!(f, "Estimated from Transcripts"),
        }
    }
}

/// Final dataset-level agreement report. Read-only once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgreementReport {
    /// Strijbos method used to form the universe.
    pub method: StrijbosMethod,
    /// Exact or weighted agreement mode.
    pub mode: AgreementMode,
    /// Jaccard threshold used for fuzzy matching.
    pub overlap_threshold: f64,
    /// Coders in the registry, sorted.
    pub coders: Vec<String>,
    /// Rows loaded before method filtering.
    pub initial_segments: usize,
    /// Rows dropped by method rules.
    pub excluded_segments: usize,
    /// Rows in the analyzed subset.
    pub analyzed_segments: usize,
    /// Exact row matches (or label matches in multi-class mode).
    pub agreements: usize,
    /// Analyzed minus agreements.
    pub disagreements: usize,
    /// True-negative count used or ignored by the method.
    pub estimated_tn: usize,
    /// Provenance of `estimated_tn`.
    pub tn_source: TnSource,
    /// Percentage of units that carry any coding, when known.
    pub prevalence: Option<f64>,
    /// Percent agreement over the analyzed subset.
    pub percent_agreement: MetricValue,
    /// F1 (Dice) between the first two coders.
    pub f1: MetricValue,
    /// Cohen's Kappa (raw).
    pub kappa: MetricValue,
    /// Kappa recomputed with synthetic true-negative rows, when applicable.
    pub adjusted_kappa: Option<MetricValue>,
    /// Krippendorff's Alpha (nominal).
    pub krippendorff_alpha: MetricValue,
    /// Macro-averaged F1 over codes.
    pub macro_f1: MetricValue,
    /// Macro-averaged Kappa over codes.
    pub macro_kappa: MetricValue,
    /// Per-code breakdown.
    pub per_code: Vec<CodeMetrics>,
    /// Whether multi-class label statistics were used.
    pub multi_class: bool,
    /// Whether the run degraded to single-coder mode.
    pub single_coder: bool,
}

/// Qualitative interpretation of a Kappa (or Alpha) score.
pub fn interpret_kappa(value: MetricValue) -> &'static str {
    let Some(k) = value.value() else {
        return "Not applicable";
    };
    if k < 0.0 {
        "Poor agreement"
    } else if k <= 0.20 {
        "Slight agreement"
    } else if k <= 0.40 {
        "Fair agreement"
    } else if k <= 0.60 {
        "Moderate agreement"
    } else if k <= 0.80 {
        "Substantial agreement"
    } else if k < 1.00 {
        "Almost perfect agreement"
    } else {
        "Perfect agreement"
    }
}

/// Qualitative interpretation of an F1 score.
pub fn interpret_f1(value: MetricValue) -> &'static str {
    let Some(f1) = value.value() else {
        return "Not applicable";
    };
    if f1 >= 0.8 {
        "Strong/Excellent agreement"
    } else if f1 >= 0.6 {
        "Good/Substantial agreement"
    } else if f1 >= 0.4 {
        "Moderate agreement"
    } else {
        "Weak/Poor agreement"
    }
}
