//! # agreement-kernel
//!
//! Deterministic inter-rater reliability computation for qualitative coding.
//!
//! The Agreement Kernel answers one question:
//!
//! > Given several coders' independent annotations of the same material,
//! > **how reliably do they agree**, and on what?
//!
//! ## Core Contract
//!
//! 1. Resolve raw coding events into a unit matrix (one row per
//!    participant + text + code)
//! 2. Reconcile near-duplicate segments by Jaccard token overlap
//! 3. Classify every unit and compute the reliability statistics
//!    (percent agreement, F1/Dice, Cohen's Kappa, Krippendorff's Alpha)
//!
//! ## Architecture
//!
//! ```text
//! SourceTable → RatingEvent → Unit matrix → TN Injector → Fuzzy Merge
//!                                  ↓
//!                 TN Pruner → Classifier → Statistics → Reports
//! ```
//!
//! ## Determinism Guarantees
//!
//! - Same inputs + same config → byte-identical unit table and dataset hash
//! - All grouping structures are BTreeMap/BTreeSet; iteration order is stable
//! - Merge candidate order is descending text length with original-index
//!   tie-break

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod builder;
pub mod canonical;
pub mod classify;
pub mod export;
pub mod ingest;
pub mod merge;
pub mod negatives;
pub mod notes;
pub mod pipeline;
pub mod stats;
pub mod text;
pub mod tokens;
pub mod types;

// Re-exports
pub use types::{
    normalize_participant, Agreement, AgreementMode, AgreementReport, CodeMetrics,
    CoderRegistry, ColumnSpec, ConfigError, MethodConfig, MetricValue, RatingEvent,
    ReportingStatus, StrijbosMethod, TnSource, UndefinedReason, Unit, UnitId,
};
pub use types::{interpret_f1, interpret_kappa, renumber};

pub use builder::build_units;
pub use canonical::{canonical_hash_hex, dataset_hash, to_canonical_bytes};
pub use classify::classify_units;
pub use export::{render_csv, write_csv, write_notes, ExportError};
pub use ingest::{resolve_events, IngestError, SourceTable};
pub use merge::{align_across_codes, consolidate, MergeLog};
pub use negatives::{
    inject_true_negatives, prune_true_negatives, Transcript, TranscriptSet,
};
pub use pipeline::{AgreementPipeline, PipelineError, PipelineOutput};
pub use stats::compute_report;
pub use text::{clean_text, count_words, split_sentences};
pub use tokens::{jaccard, tokenize, TokenSet};

/// Schema version for all exported agreement types.
/// Increment on breaking changes to any schema type.
pub const AGREEMENT_SCHEMA_VERSION: &str = "1.0.0";
