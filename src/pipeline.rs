//! Stage orchestration.
//!
//! The full run is a fixed sequence: ingest, build, inject negatives,
//! align across codes, consolidate, prune negatives, classify, compute
//! statistics, render reports, hash. Each stage logs its effect so a
//! reviewer can reconstruct what happened to the dataset.

use chrono::Local;

use crate::builder::build_units;
use crate::canonical::dataset_hash;
use crate::classify::classify_units;
use crate::export::ExportError;
use crate::ingest::{resolve_events, IngestError, SourceTable};
use crate::merge::{align_across_codes, consolidate, MergeLog};
use crate::negatives::{inject_true_negatives, prune_true_negatives, TranscriptSet};
use crate::notes;
use crate::stats::compute_report;
use crate::types::{
    AgreementReport, CoderRegistry, ColumnSpec, ConfigError, MethodConfig, Unit,
};

/// Anything that can abort a run. Per-row and per-file problems are
/// logged and skipped inside the stages; only structural failures
/// surface here.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The configuration is internally inconsistent.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Source tables could not be resolved into rating events.
    #[error(transparent)]
    Ingest(#[from] IngestError),
    /// An output artifact could not be written.
    #[error(transparent)]
    Write(#[from] ExportError),
}

/// Everything a run produces.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// The final classified unit table.
    pub units: Vec<Unit>,
    /// Coders observed in the input.
    pub coders: CoderRegistry,
    /// Consolidation statistics.
    pub merge_log: MergeLog,
    /// Dataset-level and per-code metrics.
    pub report: AgreementReport,
    /// The rendered notes file (merge notes plus the reliability report).
    pub notes: String,
    /// SHA-256 over the canonical unit table and config.
    pub dataset_hash: String,
}

/// The agreement computation pipeline, configured once and run over any
/// number of datasets.
#[derive(Debug, Clone)]
pub struct AgreementPipeline {
    config: MethodConfig,
    columns: ColumnSpec,
}

impl AgreementPipeline {
    /// Validate the config and build a pipeline.
    pub fn new(config: MethodConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self {
            config,
            columns: ColumnSpec::default(),
        })
    }

    /// Override the source column names.
    pub fn with_columns(mut self, columns: ColumnSpec) -> Self {
        self.columns = columns;
        self
    }

    /// The active configuration.
    pub fn config(&self) -> &MethodConfig {
        &self.config
    }

    /// Run the full pipeline over pre-parsed source tables.
    pub fn run(
        &self,
        sources: &[SourceTable],
        transcripts: &TranscriptSet,
    ) -> Result<PipelineOutput, PipelineError> {
        let (events, coders) = resolve_events(sources, &self.columns)?;
        let mut units = build_units(&events, &coders);

        inject_true_negatives(&mut units, transcripts, &coders);
        align_across_codes(&mut units, &self.config);
        let merge_log = consolidate(&mut units, &self.config);
        prune_true_negatives(&mut units, &self.config);
        classify_units(&mut units, &coders, &self.config);

        let transcript_words = if transcripts.is_empty() {
            None
        } else {
            Some(transcripts.total_words())
        };
        let report = compute_report(&units, &coders, &self.config, transcript_words);

        let mut rendered = notes::notes_header(Local::now());
        rendered.push_str(&notes::exact_match_summary(&events, &units));
        rendered.push('\n');
        rendered.push_str(&notes::merge_phase_block(&merge_log));
        rendered.push('\n');
        rendered.push_str(&notes::agreement_report_text(&report));
        rendered.push('\n');

        let hash = dataset_hash(&units, &self.config);
        tracing::info!(dataset_hash = %hash, "pipeline complete");

        Ok(PipelineOutput {
            units,
            coders,
            merge_log,
            report,
            notes: rendered,
            dataset_hash: hash,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StrijbosMethod;

    #[test]
    fn rejects_invalid_threshold() {
        let config = MethodConfig {
            overlap_threshold: 1.5,
            ..MethodConfig::default()
        };
        assert!(AgreementPipeline::new(config).is_err());
    }

    #[test]
    fn rejects_empty_input() {
        let pipeline = AgreementPipeline::new(MethodConfig {
            method: StrijbosMethod::MethodC,
            ..MethodConfig::default()
        })
        .expect("valid config");
        let err = pipeline
            .run(&[], &TranscriptSet::from_transcripts(Vec::new()))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Ingest(_)));
    }
}
