//! Fixed-format text reports.
//!
//! The merge-notes block is a downstream contract: the presentation layer
//! parses lines like `   - <coder> : <N> segments` with regexes, so the
//! literal layout here must not change.

use std::collections::BTreeMap;

use chrono::{DateTime, Local};

use crate::merge::MergeLog;
use crate::types::{
    interpret_f1, interpret_kappa, Agreement, AgreementReport, MetricValue, RatingEvent,
    StrijbosMethod, TnSource, Unit,
};

/// Notes file header with a generation timestamp.
pub fn notes_header(generated: DateTime<Local>) -> String {
    let mut out = String::new();
    out.push_str("IRR Calculation Notes\n");
    out.push_str(&format!(
        "Generated on: {}\n",
        generated.format("%Y-%m-%d %H:%M:%S")
    ));
    out.push_str(&"=".repeat(90));
    out.push_str("\n\n");
    out
}

/// The exact-match merge summary: raw coding events per coder, what the
/// grouping pass did, and the resulting unit table.
pub fn exact_match_summary(events: &[RatingEvent], units: &[Unit]) -> String {
    let mut by_coder: BTreeMap<&str, usize> = BTreeMap::new();
    for event in events {
        *by_coder.entry(event.coder.as_str()).or_default() += 1;
    }
    // Busiest coder first; name order breaks ties deterministically.
    let mut sorted: Vec<(&str, usize)> = by_coder.into_iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    let total_raw = events.len();

    let total_rows = units.len();
    let agree_count = units
        .iter()
        .filter(|u| u.all_agree == Agreement::Exact)
        .count();
    let disagree_count = total_rows - agree_count;
    let pct = |count: usize| {
        if total_rows > 0 {
            count as f64 / total_rows as f64 * 100.0
        } else {
            0.0
        }
    };

    let mut lines = Vec::new();
    lines.push(format!("\n{}", "=".repeat(90)));
    lines.push(format!("{:^90}", "EXACT MATCH MERGE SUMMARY"));
    lines.push("=".repeat(90));

    lines.push("1. RAW INPUT DATA (Coding Events)".to_string());
    lines.push("-".repeat(60));
    for (coder, count) in &sorted {
        lines.push(format!("   - {coder:<20} : {count} segments"));
    }
    lines.push(format!("   TOTAL CODING EVENTS    : {total_raw}"));

    lines.push("\n2. EXACT MATCH PROCESSING".to_string());
    lines.push("-".repeat(60));
    lines.push(format!(
        "   The script grouped the {total_raw} raw events by [Participant + Text + Code]."
    ));
    lines.push("   If both coders marked the EXACT same text, it becomes 1 row.".to_string());
    lines.push("   If they marked different text, they remain separate rows (for now).".to_string());

    lines.push("\n3. RESULTING DATASET (Units of Analysis)".to_string());
    lines.push("-".repeat(60));
    lines.push(format!("   Total Unique Rows      : {total_rows}"));
    lines.push(format!(
        "   - Full Agreements      : {agree_count:<6} ({:.1}%)",
        pct(agree_count)
    ));
    lines.push(format!(
        "   - Disagreements        : {disagree_count:<6} ({:.1}%)",
        pct(disagree_count)
    ));
    lines.push(format!("{}\n", "-".repeat(60)));
    lines.join("\n")
}

/// The fuzzy merge phase block appended after consolidation.
pub fn merge_phase_block(log: &MergeLog) -> String {
    let mut lines = Vec::new();
    lines.push(format!("\n{}", "=".repeat(40)));
    lines.push("      FUZZY MATCH MERGE PHASE".to_string());
    lines.push("=".repeat(40));
    lines.push(format!("Overlap Threshold : {}%", log.threshold * 100.0));
    lines.push("-".repeat(40));
    lines.push(format!("{:<25} : {}", "Initial Segments", log.initial));
    lines.push(format!("{:<25} : -{}", "Merged/Dropped", log.dropped));
    lines.push(format!("{:<25} : {}", "Final Segments", log.final_count));
    lines.push(format!("{}\n", "-".repeat(40)));
    lines.join("\n")
}

fn metric_cell(value: MetricValue) -> String {
    match value.value() {
        Some(v) => format!("{v:<10.4}"),
        None => format!("{:<10}", "N/A"),
    }
}

/// The full inter-rater reliability report: methodology, dataset summary,
/// metrics table, per-code breakdown, and the reference guidelines.
pub fn agreement_report_text(report: &AgreementReport) -> String {
    let mut lines = Vec::new();
    lines.push("=".repeat(90));
    lines.push(format!("{:^90}", "INTER-RATER RELIABILITY REPORT"));
    lines.push("=".repeat(90));

    lines.push(format!("\nMETHODOLOGY USED: {}", report.method));
    lines.push(format!("Description: {}", report.method.description()));

    lines.push("\n1. DATASET SUMMARY".to_string());
    lines.push("-".repeat(30));
    lines.push(format!("{:<25} : {}", "Coders", report.coders.join(", ")));
    let threshold_note = if report.overlap_threshold == 1.0 {
        "(Exact Match used instead of Fuzzy-Match)".to_string()
    } else {
        format!("{}% Words Overlap", report.overlap_threshold * 100.0)
    };
    lines.push(format!(
        "{:<25} : {:.2} (Jaccard) {}",
        "Fuzzy-Match Threshold", report.overlap_threshold, threshold_note
    ));
    lines.push(format!(
        "{:<25} : {}",
        "Initial Loaded Segments", report.initial_segments
    ));
    lines.push(format!(
        "{:<25} : -{} (Rows dropped by Method rules)",
        "Excluded Segments", report.excluded_segments
    ));
    lines.push(format!(
        "{:<25} : {}",
        "Final Analyzed Segments", report.analyzed_segments
    ));
    lines.push(format!("{:<25} : {}", "Perfect Agreement", report.agreements));
    lines.push(format!("{:<25} : {}", "Disagreements", report.disagreements));

    let tn_note = if report.adjusted_kappa.is_some()
        && report.tn_source == TnSource::EstimatedFromTranscripts
    {
        Some("(derived from transcripts)")
    } else if report.tn_source == TnSource::Injected
        && report.method == StrijbosMethod::MethodC
    {
        Some("(included in dataset)")
    } else if report.method != StrijbosMethod::MethodC {
        Some("(Ignored by Method)")
    } else {
        None
    };
    if let Some(note) = tn_note {
        lines.push(format!(
            "{:<25} : {} {note}",
            "Est. True Negatives", report.estimated_tn
        ));
    }

    match report.prevalence {
        Some(p) => lines.push(format!("{:<25} : {p:.2}%", "Code Prevalence")),
        None => lines.push(format!("{:<25} : N/A", "Code Prevalence")),
    }

    lines.push("\n2. RELIABILITY METRICS".to_string());
    lines.push("-".repeat(60));
    lines.push(format!("{:<27} | {:<10} | {}", "Metric", "Value", "Interpretation"));
    lines.push("-".repeat(60));

    lines.push(format!(
        "{:<27} | {} | {}",
        "F1-Score (Dice)",
        metric_cell(report.f1),
        interpret_f1(report.f1)
    ));
    match report.percent_agreement.value() {
        Some(p) => lines.push(format!("{:<27} | {p:<9.2}% | -", "Percent Agreement")),
        None => lines.push(format!("{:<27} | {:<10} | -", "Percent Agreement", "N/A")),
    }

    let (kappa_name, kappa_value) = match report.adjusted_kappa {
        Some(adjusted) => ("Cohen's Kappa (Pooled, Adj)", adjusted),
        None if report.tn_source == TnSource::None => {
            ("Cohen's Kappa (Pooled, Raw)", report.kappa)
        }
        None => ("Cohen's Kappa (Pooled)", report.kappa),
    };
    lines.push(format!(
        "{:<27} | {} | {}",
        kappa_name,
        metric_cell(kappa_value),
        interpret_kappa(kappa_value)
    ));
    lines.push(format!(
        "{:<27} | {} | {}",
        "Krippendorff's Alpha",
        metric_cell(report.krippendorff_alpha),
        interpret_kappa(report.krippendorff_alpha)
    ));

    lines.push("-".repeat(60));
    lines.push(format!("{:^60}", "MACRO-AVERAGE (Mean of all codes)"));
    lines.push("-".repeat(60));
    lines.push(format!(
        "{:<27} | {} | {}",
        "Average F1-Score",
        metric_cell(report.macro_f1),
        interpret_f1(report.macro_f1)
    ));
    lines.push(format!(
        "{:<27} | {} | {}",
        "Average Kappa",
        metric_cell(report.macro_kappa),
        interpret_kappa(report.macro_kappa)
    ));
    lines.push("-".repeat(60));

    if !report.per_code.is_empty() {
        lines.push("\n3. PER-CODE BREAKDOWN".to_string());
        lines.push("-".repeat(60));
        lines.push(format!(
            "{:<30} | {:<5} | {:<10} | {:<10}",
            "Code", "N", "F1", "Kappa"
        ));
        lines.push("-".repeat(60));
        for metrics in &report.per_code {
            lines.push(format!(
                "{:<30} | {:<5} | {} | {}",
                metrics.code,
                metrics.n,
                metric_cell(metrics.f1),
                metric_cell(metrics.kappa)
            ));
        }
        lines.push("-".repeat(60));
    }

    lines.push(format!("\n{}", "=".repeat(90)));
    lines.push(format!("{:^90}", "REFERENCE GUIDELINES"));
    lines.push("=".repeat(90));
    lines.push("F1-Score (Dice):".to_string());
    lines.push("  > 0.80 : Strong/Excellent".to_string());
    lines.push("  > 0.60 : Good/Substantial".to_string());
    lines.push("  > 0.40 : Moderate".to_string());
    lines.push("  < 0.40 : Weak/Poor".to_string());
    lines.push("\nKappa (κ) & Alpha (α):".to_string());
    lines.push("  > 0.80 : Almost Perfect".to_string());
    lines.push("  > 0.60 : Substantial".to_string());
    lines.push("  > 0.40 : Moderate".to_string());
    lines.push("  > 0.20 : Fair".to_string());
    lines.push("  < 0.20 : Slight/Poor".to_string());
    lines.push("\nTECHNICAL NOTES:".to_string());
    lines.push(
        "  * Kappa = N/A   : Mathematical artifact. Usually means 'Perfect Agreement'".to_string(),
    );
    lines.push(
        "                    (Both coders selected this code for every item in this subset)."
            .to_string(),
    );
    lines.push("  * Kappa < 0     : Disagreement is worse than random chance.".to_string());
    lines.push(
        "  * Verdict       : Based on F1-Score (Dice), which is generally more reliable"
            .to_string(),
    );
    lines.push("                    for rare codes than Kappa.".to_string());
    lines.push("=".repeat(90));

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CoderRegistry, Unit};

    fn event(coder: &str) -> RatingEvent {
        RatingEvent {
            file: "p01-answers.docx".into(),
            coder: coder.into(),
            text: "some segment text".into(),
            code: "X".into(),
            memo: None,
        }
    }

    #[test]
    fn coder_lines_match_downstream_contract() {
        let reg = CoderRegistry::from_names(["alice", "bob"]);
        let events = vec![event("alice"), event("alice"), event("bob")];
        let mut unit = Unit::new("p01", "some segment text", "X", &reg);
        unit.mark_coded("alice");
        unit.mark_coded("bob");
        unit.all_agree = Agreement::Exact;
        let summary = exact_match_summary(&events, &[unit]);

        assert!(summary.contains(&format!("   - {:<20} : {} segments", "alice", 2)));
        assert!(summary.contains(&format!("   - {:<20} : {} segments", "bob", 1)));
        assert!(summary.contains("   TOTAL CODING EVENTS    : 3"));
        assert!(summary.contains(&format!(
            "   - Full Agreements      : {:<6} ({:.1}%)",
            1, 100.0
        )));
    }

    #[test]
    fn merge_block_has_fixed_width_labels() {
        let log = MergeLog {
            threshold: 0.5,
            initial: 100,
            dropped: 12,
            final_count: 88,
        };
        let block = merge_phase_block(&log);
        assert!(block.contains("      FUZZY MATCH MERGE PHASE"));
        assert!(block.contains("Overlap Threshold : 50%"));
        assert!(block.contains(&format!("{:<25} : {}", "Initial Segments", 100)));
        assert!(block.contains(&format!("{:<25} : -{}", "Merged/Dropped", 12)));
        assert!(block.contains(&format!("{:<25} : {}", "Final Segments", 88)));
    }

    #[test]
    fn report_text_shows_undefined_metrics_as_na() {
        use crate::types::{
            AgreementMode, MetricValue, StrijbosMethod, UndefinedReason,
        };
        let report = AgreementReport {
            method: StrijbosMethod::MethodB,
            mode: AgreementMode::Exact,
            overlap_threshold: 1.0,
            coders: vec!["alice".into(), "bob".into()],
            initial_segments: 5,
            excluded_segments: 1,
            analyzed_segments: 4,
            agreements: 4,
            disagreements: 0,
            estimated_tn: 0,
            tn_source: TnSource::None,
            prevalence: None,
            percent_agreement: MetricValue::Defined(100.0),
            f1: MetricValue::Defined(1.0),
            kappa: MetricValue::Defined(1.0),
            adjusted_kappa: None,
            krippendorff_alpha: MetricValue::Undefined(UndefinedReason::NoVariance),
            macro_f1: MetricValue::Defined(1.0),
            macro_kappa: MetricValue::Undefined(UndefinedReason::NoData),
            per_code: Vec::new(),
            multi_class: true,
            single_coder: false,
        };
        let text = agreement_report_text(&report);
        assert!(text.contains("METHODOLOGY USED: METHOD_B"));
        assert!(text.contains("Cohen's Kappa (Pooled, Raw)"));
        assert!(text.contains(&format!("{:<27} | {:<10} |", "Krippendorff's Alpha", "N/A")));
        assert!(text.contains("(Exact Match used instead of Fuzzy-Match)"));
        assert!(text.contains("(Ignored by Method)"));
        assert!(text.contains("REFERENCE GUIDELINES"));
    }
}
