//! End-to-end tests for the agreement pipeline.
//!
//! These tests verify determinism and correctness of the full run:
//! ingest through statistics and the rendered reports.

use agreement_kernel::{
    AgreementMode, AgreementPipeline, MethodConfig, MetricValue, ReportingStatus,
    SourceTable, StrijbosMethod, Transcript, TranscriptSet,
};

// ─────────────────────────────────────────────────────────────────────────────
// Test Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn header() -> Vec<String> {
    ["File", "Coder", "Coded", "Codename", "Coded_Memo"]
        .map(String::from)
        .to_vec()
}

fn row(file: &str, coder: &str, text: &str, code: &str) -> Vec<String> {
    [file, coder, text, code, ""].map(String::from).to_vec()
}

/// Two coders over one participant: two exact agreements, one
/// disagreement where only alice coded.
fn basic_sources() -> Vec<SourceTable> {
    let alice = SourceTable {
        header: header(),
        rows: vec![
            row("p07-answers.docx", "alice", "The cat sat on the mat.", "Animals"),
            row("p07-answers.docx", "alice", "Dogs chase the postman.", "Animals"),
            row("p07-answers.docx", "alice", "It rained all afternoon.", "Weather"),
        ],
    };
    let bob = SourceTable {
        header: header(),
        rows: vec![
            row("p07-answers.docx", "bob", "The cat sat on the mat.", "Animals"),
            row("p07-answers.docx", "bob", "Dogs chase the postman.", "Animals"),
        ],
    };
    vec![alice, bob]
}

fn no_transcripts() -> TranscriptSet {
    TranscriptSet::from_transcripts(Vec::new())
}

fn pipeline(method: StrijbosMethod) -> AgreementPipeline {
    AgreementPipeline::new(MethodConfig {
        method,
        ..MethodConfig::default()
    })
    .expect("valid config")
}

// ─────────────────────────────────────────────────────────────────────────────
// Full-run behavior
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn full_method_counts_every_coded_segment() {
    let output = pipeline(StrijbosMethod::MethodC)
        .run(&basic_sources(), &no_transcripts())
        .expect("pipeline runs");

    assert_eq!(output.coders.names(), ["alice", "bob"]);
    assert_eq!(output.units.len(), 3);
    assert_eq!(output.report.analyzed_segments, 3);
    assert_eq!(output.report.agreements, 2);
    assert_eq!(output.report.disagreements, 1);

    let statuses: Vec<ReportingStatus> =
        output.units.iter().map(|u| u.reporting_status).collect();
    assert_eq!(
        statuses.iter().filter(|s| **s == ReportingStatus::Agree).count(),
        2
    );
}

#[test]
fn intersection_method_drops_omissions() {
    let output = pipeline(StrijbosMethod::MethodA)
        .run(&basic_sources(), &no_transcripts())
        .expect("pipeline runs");

    // The weather segment exists only for alice.
    assert_eq!(output.report.analyzed_segments, 2);
    assert_eq!(output.report.excluded_segments, 1);
    assert_eq!(output.report.agreements, 2);

    let weather = output
        .units
        .iter()
        .find(|u| u.code == "Weather")
        .expect("weather unit kept in the audit table");
    assert_eq!(weather.reporting_status, ReportingStatus::IgnoredOmission);
}

#[test]
fn participant_id_is_normalized_from_file_name() {
    let output = pipeline(StrijbosMethod::MethodC)
        .run(&basic_sources(), &no_transcripts())
        .expect("pipeline runs");
    assert!(output.units.iter().all(|u| u.p == "p07-answers"));
}

#[test]
fn transcripts_inject_true_negatives() {
    let transcripts = TranscriptSet::from_transcripts(vec![Transcript {
        participant: "p07-answers".into(),
        content: "The cat sat on the mat. Dogs chase the postman. \
                  It rained all afternoon. Nobody coded this sentence at all."
            .into(),
    }]);

    let output = pipeline(StrijbosMethod::MethodC)
        .run(&basic_sources(), &transcripts)
        .expect("pipeline runs");

    let negatives: Vec<_> = output.units.iter().filter(|u| u.tn).collect();
    assert_eq!(negatives.len(), 1);
    assert_eq!(negatives[0].code, "None");
    assert_eq!(negatives[0].reporting_status, ReportingStatus::TrueNegative);
    assert_eq!(output.report.tn_source.to_string(), "Injected from Master List");
}

#[test]
fn fuzzy_threshold_merges_near_duplicates() {
    let alice = SourceTable {
        header: header(),
        rows: vec![row(
            "p01.docx",
            "alice",
            "The quick brown fox jumps over the lazy dog",
            "Animals",
        )],
    };
    let bob = SourceTable {
        header: header(),
        rows: vec![row(
            "p01.docx",
            "bob",
            "quick brown fox jumps over the lazy dog",
            "Animals",
        )],
    };

    let config = MethodConfig {
        overlap_threshold: 0.8,
        ..MethodConfig::default()
    };
    let output = AgreementPipeline::new(config)
        .expect("valid config")
        .run(&[alice, bob], &no_transcripts())
        .expect("pipeline runs");

    assert_eq!(output.merge_log.dropped, 1);
    assert_eq!(output.units.len(), 1);
    let unit = &output.units[0];
    // The survivor keeps the longer text and both coders' flags.
    assert_eq!(unit.text, "The quick brown fox jumps over the lazy dog");
    assert!(unit.flags.values().all(|f| *f));
    assert_eq!(output.report.agreements, 1);
}

#[test]
fn weighted_mode_treats_sibling_codes_as_partial_agreement() {
    let alice = SourceTable {
        header: header(),
        rows: vec![row("p01.docx", "alice", "I felt great about it.", "Emotions:Joy")],
    };
    let bob = SourceTable {
        header: header(),
        rows: vec![row("p01.docx", "bob", "I felt great about it.", "Emotions:Relief")],
    };

    let config = MethodConfig {
        mode: AgreementMode::Weighted,
        ..MethodConfig::default()
    };
    let output = AgreementPipeline::new(config)
        .expect("valid config")
        .run(&[alice, bob], &no_transcripts())
        .expect("pipeline runs");

    assert!(output
        .units
        .iter()
        .all(|u| u.reporting_status == ReportingStatus::PartialAgree));
    assert_eq!(output.report.agreements, 1);
    assert_eq!(output.report.analyzed_segments, 1);
}

#[test]
fn single_source_runs_in_single_coder_mode() {
    let only = SourceTable {
        header: header(),
        rows: vec![
            row("p01.docx", "alice", "Something happened here.", "X"),
            row("p01.docx", "alice", "Something else entirely.", "Y"),
        ],
    };
    let output = pipeline(StrijbosMethod::MethodC)
        .run(&[only], &no_transcripts())
        .expect("pipeline runs");

    assert!(output.report.single_coder);
    assert_eq!(output.report.percent_agreement, MetricValue::Defined(100.0));
    assert!(!output.report.kappa.is_defined());
}

// ─────────────────────────────────────────────────────────────────────────────
// Determinism and rendered artifacts
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn repeated_runs_produce_identical_hashes() {
    let transcripts = TranscriptSet::from_transcripts(vec![Transcript {
        participant: "p07-answers".into(),
        content: "The cat sat on the mat. An uncoded sentence lives here.".into(),
    }]);
    let first = pipeline(StrijbosMethod::MethodC)
        .run(&basic_sources(), &transcripts)
        .expect("first run");
    let second = pipeline(StrijbosMethod::MethodC)
        .run(&basic_sources(), &transcripts)
        .expect("second run");

    assert_eq!(first.dataset_hash, second.dataset_hash);
    assert_eq!(first.units, second.units);
}

#[test]
fn notes_contain_the_contract_lines() {
    let output = pipeline(StrijbosMethod::MethodC)
        .run(&basic_sources(), &no_transcripts())
        .expect("pipeline runs");

    assert!(output
        .notes
        .contains(&format!("   - {:<20} : {} segments", "alice", 3)));
    assert!(output
        .notes
        .contains(&format!("   - {:<20} : {} segments", "bob", 2)));
    assert!(output.notes.contains("FUZZY MATCH MERGE PHASE"));
    assert!(output.notes.contains("INTER-RATER RELIABILITY REPORT"));
    assert!(output.notes.contains("METHODOLOGY USED: METHOD_C"));
}

#[test]
fn all_rows_dropped_yields_empty_units_and_not_applicable_metrics() {
    // Tables are present but every row is incomplete, so ingest drops
    // them all. The run must still complete with an empty unit table.
    let sparse = SourceTable {
        header: header(),
        rows: vec![
            row("p01.docx", "", "some text", "X"),
            row("", "alice", "some text", "X"),
            row("p01.docx", "alice", "", "X"),
        ],
    };
    let output = pipeline(StrijbosMethod::MethodC)
        .run(&[sparse], &no_transcripts())
        .expect("pipeline runs");

    assert!(output.units.is_empty());
    assert_eq!(output.report.analyzed_segments, 0);
    assert!(!output.report.percent_agreement.is_defined());
    assert!(!output.report.kappa.is_defined());
    assert!(!output.report.krippendorff_alpha.is_defined());
}

#[test]
fn missing_column_is_a_structural_error() {
    let bad = SourceTable {
        header: ["File", "Coder", "Coded"].map(String::from).to_vec(),
        rows: vec![],
    };
    let err = pipeline(StrijbosMethod::MethodC)
        .run(&[bad], &no_transcripts())
        .unwrap_err();
    assert!(err.to_string().contains("Codename"));
}
