//! Statistics Engine: dataset-level and per-code reliability metrics.
//!
//! Consumes the classified unit matrix and produces an [`AgreementReport`].
//! Every division-by-zero case degrades to an explicit
//! [`MetricValue::Undefined`] with a reason; nothing in this module panics
//! on degenerate input.
//!
//! The engine works on a private working copy of the rows: the Strijbos
//! filter, the weighted-mode category collapse, and the
//! mutual-segments-only imputation all mutate the copy, never the audit
//! units.

use std::collections::{BTreeMap, BTreeSet};

use crate::classify::omission_subset_rows;
use crate::text::count_words;
use crate::types::{
    AgreementMode, AgreementReport, CodeMetrics, CoderRegistry, MethodConfig, MetricValue,
    StrijbosMethod, TnSource, UndefinedReason, Unit,
};

/// One row of the statistics working copy. Flags and labels are ordered
/// by the coder registry.
#[derive(Debug, Clone)]
struct WorkRow {
    p: String,
    text: String,
    code: String,
    flags: Vec<bool>,
    labels: Vec<Option<String>>,
    tn: bool,
}

impl WorkRow {
    fn from_unit(unit: &Unit, registry: &CoderRegistry) -> Self {
        let flags = registry
            .names()
            .iter()
            .map(|c| unit.flags.get(c).copied().unwrap_or(false))
            .collect();
        let labels = registry
            .names()
            .iter()
            .map(|c| unit.labels.get(c).cloned().flatten())
            .collect();
        Self {
            p: unit.p.clone(),
            text: unit.text.clone(),
            code: unit.code.clone(),
            flags,
            labels,
            tn: unit.tn,
        }
    }

    fn all_flags(&self) -> bool {
        self.flags.iter().all(|f| *f)
    }

    fn any_flag(&self) -> bool {
        self.flags.iter().any(|f| *f)
    }
}

/// Compute the full agreement report.
///
/// `transcript_words` feeds the true-negative estimation fallback for
/// datasets without injected negatives.
pub fn compute_report(
    units: &[Unit],
    registry: &CoderRegistry,
    config: &MethodConfig,
    transcript_words: Option<usize>,
) -> AgreementReport {
    let n_coders = registry.len();
    let mut rows: Vec<WorkRow> = units
        .iter()
        .map(|u| WorkRow::from_unit(u, registry))
        .collect();

    // True negatives present in the raw dataset, before any filtering.
    let injected_tn = units.iter().filter(|u| u.tn).count();
    let has_injected = injected_tn > 0;
    let mut estimated_tn = injected_tn;
    let mut tn_source = if has_injected {
        TnSource::Injected
    } else {
        TnSource::None
    };
    let mut prevalence = if has_injected && !units.is_empty() {
        Some((units.len() - injected_tn) as f64 / units.len() as f64 * 100.0)
    } else {
        None
    };

    if config.mode == AgreementMode::Weighted {
        rows = collapse_to_categories(rows);
        tracing::info!(rows = rows.len(), "collapsed codes to categories for weighted mode");
    }
    let initial_segments = rows.len();

    rows = apply_strijbos_filter(rows, config.method);
    if config.mutual_segments_only {
        impute_omissions(&mut rows, units, registry, config);
    }
    let excluded_segments = initial_segments - rows.len();

    // Single-coder mode: internal consistency is trivially perfect.
    if n_coders < 2 {
        return trivial_report(
            registry,
            config,
            initial_segments,
            excluded_segments,
            rows.len(),
            UndefinedReason::SingleCoder,
        );
    }
    if rows.is_empty() {
        return trivial_report(
            registry,
            config,
            initial_segments,
            excluded_segments,
            0,
            UndefinedReason::NoData,
        );
    }

    // Multi-class statistics need exactly two coders and intact labels
    // (the weighted collapse discards them).
    let multi_class = n_coders == 2 && config.mode == AgreementMode::Exact;

    let mut analyzed = rows.len();
    let agreements;
    let mut kappa;
    let mut alpha_pairs: Vec<(String, String)>;

    if multi_class {
        let mc = collapse_multi_class(&rows, config.method);
        analyzed = mc.len();
        agreements = mc.iter().filter(|(a, b)| a == b).count();
        let pairs: Vec<(String, String)> = mc;
        kappa = kappa_from_pairs(&pairs);
        if !kappa.is_defined() && !pairs.is_empty() && pairs.iter().all(|(a, b)| a == b) {
            // Perfect agreement on a single label: a mathematical
            // artifact, reported as 1.0.
            kappa = MetricValue::Defined(1.0);
        }
        alpha_pairs = pairs;
    } else {
        agreements = rows
            .iter()
            .filter(|r| r.flags.iter().all(|f| *f == r.flags[0]))
            .count();
        kappa = if n_coders == 2 {
            let mut k = kappa_binary(&rows);
            if !k.is_defined()
                && rows
                    .iter()
                    .all(|r| r.flags[0] == r.flags[1])
            {
                k = MetricValue::Defined(1.0);
            }
            k
        } else {
            MetricValue::Undefined(UndefinedReason::PairwiseOnly)
        };
        alpha_pairs = Vec::new();
    }

    if analyzed == 0 {
        return trivial_report(
            registry,
            config,
            initial_segments,
            excluded_segments,
            0,
            UndefinedReason::NoData,
        );
    }

    // F1: binary presence between the first two coders, or weighted
    // multi-class over applied code strings.
    let f1 = if multi_class && !alpha_pairs.is_empty() {
        f1_weighted(&alpha_pairs)
    } else {
        f1_binary(&rows)
    };

    // Krippendorff's Alpha over the long-format judgment table.
    if alpha_pairs.is_empty() {
        alpha_pairs = rows
            .iter()
            .map(|r| (flag_str(r.flags[0]), flag_str(r.flags[1])))
            .collect();
    }
    let krippendorff_alpha = krippendorff_nominal(&alpha_pairs);

    // Per-code breakdown and macro averages (binary flags, forced {0,1}
    // label space so constant subsets stay well defined).
    let per_code = per_code_metrics(&rows);
    let macro_f1 = macro_average(per_code.iter().map(|m| m.f1));
    let macro_kappa = macro_average(per_code.iter().map(|m| m.kappa));

    // Adjusted Kappa: synthetic (0,0) rows for the silence the method
    // stripped, unless the working set already physically contains them.
    let mut adjusted_kappa = None;
    let should_inject_virtual = config.method == StrijbosMethod::MethodC;
    let current_zero_rows = rows.iter().filter(|r| !r.any_flag()).count();

    if has_injected {
        if current_zero_rows > 0 {
            // Already counted; a virtual injection would double count.
        } else if should_inject_virtual {
            adjusted_kappa = Some(kappa_with_virtual_negatives(&rows, estimated_tn));
        } else {
            tracing::info!(
                method = %config.method,
                estimated_tn,
                "method ignores injected true negatives"
            );
        }
    } else if let Some(total_words) = transcript_words {
        if let Some(estimate) = estimate_tn_from_words(&rows, total_words, config) {
            estimated_tn = estimate;
            tn_source = TnSource::EstimatedFromTranscripts;
            if should_inject_virtual {
                adjusted_kappa = Some(kappa_with_virtual_negatives(&rows, estimated_tn));
                let universe = analyzed + estimated_tn;
                prevalence = Some(analyzed as f64 / universe as f64 * 100.0);
            }
        }
    }

    if prevalence.is_none() && current_zero_rows > 0 {
        let coding_rows = rows.iter().filter(|r| r.any_flag()).count();
        prevalence = Some(coding_rows as f64 / rows.len() as f64 * 100.0);
    }

    let percent_agreement =
        MetricValue::Defined(agreements as f64 / analyzed as f64 * 100.0);

    AgreementReport {
        method: config.method,
        mode: config.mode,
        overlap_threshold: config.overlap_threshold,
        coders: registry.names().to_vec(),
        initial_segments,
        excluded_segments,
        analyzed_segments: analyzed,
        agreements,
        disagreements: analyzed - agreements,
        estimated_tn,
        tn_source,
        prevalence,
        percent_agreement,
        f1,
        kappa,
        adjusted_kappa,
        krippendorff_alpha,
        macro_f1,
        macro_kappa,
        per_code,
        multi_class,
        single_coder: false,
    }
}

fn flag_str(flag: bool) -> String {
    if flag { "1" } else { "0" }.to_string()
}

fn trivial_report(
    registry: &CoderRegistry,
    config: &MethodConfig,
    initial: usize,
    excluded: usize,
    analyzed: usize,
    reason: UndefinedReason,
) -> AgreementReport {
    let undefined = MetricValue::Undefined(reason);
    let single = reason == UndefinedReason::SingleCoder;
    let percent = if single && analyzed > 0 {
        MetricValue::Defined(100.0)
    } else if analyzed == 0 {
        MetricValue::Undefined(UndefinedReason::NoData)
    } else {
        undefined
    };
    AgreementReport {
        method: config.method,
        mode: config.mode,
        overlap_threshold: config.overlap_threshold,
        coders: registry.names().to_vec(),
        initial_segments: initial,
        excluded_segments: excluded,
        analyzed_segments: analyzed,
        agreements: if single { analyzed } else { 0 },
        disagreements: 0,
        estimated_tn: 0,
        tn_source: TnSource::None,
        prevalence: None,
        percent_agreement: percent,
        f1: undefined,
        kappa: undefined,
        adjusted_kappa: None,
        krippendorff_alpha: undefined,
        macro_f1: undefined,
        macro_kappa: undefined,
        per_code: Vec::new(),
        multi_class: false,
        single_coder: single,
    }
}

/// Weighted-mode pre-pass: collapse `Category:Code` rows to one row per
/// (participant, text, category) with per-coder max flags. Labels do not
/// survive; statistics become binary afterwards.
fn collapse_to_categories(rows: Vec<WorkRow>) -> Vec<WorkRow> {
    let mut groups: BTreeMap<(String, String, String), WorkRow> = BTreeMap::new();
    let mut order: Vec<(String, String, String)> = Vec::new();

    for row in rows {
        let category = row
            .code
            .split(':')
            .next()
            .unwrap_or(&row.code)
            .trim()
            .to_string();
        let key = (row.p.clone(), row.text.clone(), category.clone());
        match groups.get_mut(&key) {
            Some(existing) => {
                for (acc, flag) in existing.flags.iter_mut().zip(&row.flags) {
                    *acc = *acc || *flag;
                }
                existing.tn = existing.tn || row.tn;
            }
            None => {
                let mut collapsed = row;
                collapsed.code = category;
                collapsed.labels.iter_mut().for_each(|l| *l = None);
                order.push(key.clone());
                groups.insert(key, collapsed);
            }
        }
    }

    order
        .into_iter()
        .filter_map(|key| groups.remove(&key))
        .collect()
}

/// Unit-level Strijbos filter over (participant, text) segment masks.
fn apply_strijbos_filter(rows: Vec<WorkRow>, method: StrijbosMethod) -> Vec<WorkRow> {
    if method == StrijbosMethod::MethodC {
        return rows;
    }

    // Did coder k code anything on this (p, text) segment?
    let mut segment_coded: BTreeMap<(String, String), Vec<bool>> = BTreeMap::new();
    for row in &rows {
        let entry = segment_coded
            .entry((row.p.clone(), row.text.clone()))
            .or_insert_with(|| vec![false; row.flags.len()]);
        for (acc, flag) in entry.iter_mut().zip(&row.flags) {
            *acc = *acc || *flag;
        }
    }

    rows.into_iter()
        .filter(|row| {
            if row.tn {
                return false;
            }
            let mask = &segment_coded[&(row.p.clone(), row.text.clone())];
            match method {
                StrijbosMethod::MethodA => mask.iter().all(|m| *m),
                StrijbosMethod::MethodB => mask.iter().any(|m| *m),
                StrijbosMethod::MethodC => true,
            }
        })
        .collect()
}

/// Mutual-segments-only: impute full flags on omission-subset rows so
/// misses count as statistical agreement. Conflicts stay disagreements.
/// Only the working copy changes; the audit units keep their real flags.
fn impute_omissions(
    rows: &mut [WorkRow],
    units: &[Unit],
    registry: &CoderRegistry,
    config: &MethodConfig,
) {
    if config.mode == AgreementMode::Weighted {
        // After the category collapse the audit-unit omission map no
        // longer lines up row-for-row; recompute subset logic in place.
        impute_from_rows(rows);
        return;
    }

    let omissions = omission_subset_rows(units, registry);
    let by_key: BTreeMap<(String, String, String), bool> = units
        .iter()
        .zip(&omissions)
        .map(|(u, o)| ((u.p.clone(), u.text.clone(), u.code.clone()), *o))
        .collect();

    let mut imputed = 0usize;
    for row in rows.iter_mut() {
        let key = (row.p.clone(), row.text.clone(), row.code.clone());
        if by_key.get(&key).copied().unwrap_or(false) {
            row.flags.iter_mut().for_each(|f| *f = true);
            imputed += 1;
        }
    }
    if imputed > 0 {
        tracing::info!(imputed, "imputed omission rows as agreements");
    }
}

/// Subset-based omission imputation computed directly on working rows.
fn impute_from_rows(rows: &mut [WorkRow]) {
    let n = rows.first().map(|r| r.flags.len()).unwrap_or(0);
    let mut code_sets: BTreeMap<(String, String), Vec<BTreeSet<String>>> = BTreeMap::new();
    for row in rows.iter() {
        let entry = code_sets
            .entry((row.p.clone(), row.text.clone()))
            .or_insert_with(|| vec![BTreeSet::new(); n]);
        for (k, flag) in row.flags.iter().enumerate() {
            if *flag {
                entry[k].insert(row.code.clone());
            }
        }
    }

    for row in rows.iter_mut() {
        if row.tn || row.all_flags() || !row.any_flag() {
            continue;
        }
        let sets = &code_sets[&(row.p.clone(), row.text.clone())];
        let conflict = row.flags.iter().enumerate().any(|(k, flag)| {
            if *flag {
                return false;
            }
            let mine = &sets[k];
            let others: BTreeSet<&String> = sets
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != k)
                .flat_map(|(_, s)| s.iter())
                .collect();
            mine.iter().any(|code| !others.contains(code))
        });
        if !conflict {
            row.flags.iter_mut().for_each(|f| *f = true);
        }
    }
}

/// Collapse the working set to one (label, label) pair per (p, text)
/// segment, with method-dependent handling of missing labels.
fn collapse_multi_class(rows: &[WorkRow], method: StrijbosMethod) -> Vec<(String, String)> {
    #[derive(Default)]
    struct Seg {
        a: Option<String>,
        b: Option<String>,
        any_flag: bool,
    }

    let mut segs: BTreeMap<(String, String), Seg> = BTreeMap::new();
    let mut order: Vec<(String, String)> = Vec::new();
    for row in rows {
        let key = (row.p.clone(), row.text.clone());
        if !segs.contains_key(&key) {
            order.push(key.clone());
        }
        let seg = segs.entry(key).or_default();
        if seg.a.is_none() {
            seg.a = row.labels[0].clone();
        }
        if seg.b.is_none() {
            seg.b = row.labels[1].clone();
        }
        seg.any_flag |= row.any_flag();
    }

    let no_code = || "No Code".to_string();
    order
        .into_iter()
        .filter_map(|key| segs.remove(&key))
        .filter_map(|seg| match method {
            StrijbosMethod::MethodA => match (seg.a, seg.b) {
                (Some(a), Some(b)) => Some((a, b)),
                _ => None,
            },
            StrijbosMethod::MethodB => {
                if seg.any_flag {
                    Some((seg.a.unwrap_or_else(no_code), seg.b.unwrap_or_else(no_code)))
                } else {
                    None
                }
            }
            StrijbosMethod::MethodC => {
                Some((seg.a.unwrap_or_else(no_code), seg.b.unwrap_or_else(no_code)))
            }
        })
        .collect()
}

/// Cohen's Kappa over label pairs: Po/Pe from the marginals.
fn kappa_from_pairs(pairs: &[(String, String)]) -> MetricValue {
    if pairs.is_empty() {
        return MetricValue::Undefined(UndefinedReason::NoData);
    }
    let n = pairs.len() as f64;
    let matches = pairs.iter().filter(|(a, b)| a == b).count() as f64;
    let po = matches / n;

    let mut counts_a: BTreeMap<&str, usize> = BTreeMap::new();
    let mut counts_b: BTreeMap<&str, usize> = BTreeMap::new();
    for (a, b) in pairs {
        *counts_a.entry(a.as_str()).or_default() += 1;
        *counts_b.entry(b.as_str()).or_default() += 1;
    }
    let labels: BTreeSet<&str> = counts_a.keys().chain(counts_b.keys()).copied().collect();
    let pe: f64 = labels
        .iter()
        .map(|l| {
            let pa = *counts_a.get(l).unwrap_or(&0) as f64 / n;
            let pb = *counts_b.get(l).unwrap_or(&0) as f64 / n;
            pa * pb
        })
        .sum();

    if (1.0 - pe).abs() < 1e-12 {
        MetricValue::Undefined(UndefinedReason::PerfectChanceAgreement)
    } else {
        MetricValue::Defined((po - pe) / (1.0 - pe))
    }
}

/// Binary Kappa between the first two coders, label space {0, 1}.
fn kappa_binary(rows: &[WorkRow]) -> MetricValue {
    let pairs: Vec<(String, String)> = rows
        .iter()
        .map(|r| (flag_str(r.flags[0]), flag_str(r.flags[1])))
        .collect();
    kappa_from_pairs(&pairs)
}

/// Kappa with `extra` synthetic (0, 0) rows appended.
fn kappa_with_virtual_negatives(rows: &[WorkRow], extra: usize) -> MetricValue {
    let mut pairs: Vec<(String, String)> = rows
        .iter()
        .map(|r| (flag_str(r.flags[0]), flag_str(r.flags[1])))
        .collect();
    pairs.extend(std::iter::repeat(("0".to_string(), "0".to_string())).take(extra));
    kappa_from_pairs(&pairs)
}

/// Binary F1 (Dice) between the first two coders: 2TP / (2TP + FP + FN).
fn f1_binary(rows: &[WorkRow]) -> MetricValue {
    let mut tp = 0usize;
    let mut fp = 0usize;
    let mut fnn = 0usize;
    for row in rows {
        match (row.flags[0], row.flags[1]) {
            (true, true) => tp += 1,
            (true, false) => fnn += 1,
            (false, true) => fp += 1,
            (false, false) => {}
        }
    }
    let denom = 2 * tp + fp + fnn;
    if denom == 0 {
        MetricValue::Defined(0.0)
    } else {
        MetricValue::Defined(2.0 * tp as f64 / denom as f64)
    }
}

/// Weighted multi-class F1 over label pairs, support taken from the first
/// coder's labels; labels with zero denominator contribute 0.
fn f1_weighted(pairs: &[(String, String)]) -> MetricValue {
    if pairs.is_empty() {
        return MetricValue::Undefined(UndefinedReason::NoData);
    }
    let labels: BTreeSet<&str> = pairs
        .iter()
        .flat_map(|(a, b)| [a.as_str(), b.as_str()])
        .collect();
    let n = pairs.len() as f64;

    let mut weighted_sum = 0.0;
    for label in labels {
        let tp = pairs.iter().filter(|(a, b)| a == label && b == label).count() as f64;
        let fp = pairs.iter().filter(|(a, b)| a != label && b == label).count() as f64;
        let fnn = pairs.iter().filter(|(a, b)| a == label && b != label).count() as f64;
        let support = tp + fnn;
        let denom = 2.0 * tp + fp + fnn;
        let f1 = if denom > 0.0 { 2.0 * tp / denom } else { 0.0 };
        weighted_sum += f1 * support;
    }
    MetricValue::Defined(weighted_sum / n)
}

/// Krippendorff's Alpha, nominal metric, from two-coder judgment pairs:
/// `alpha = 1 - Do/De`, `De = Σ nc(N − nc) / (N(N − 1))`.
fn krippendorff_nominal(pairs: &[(String, String)]) -> MetricValue {
    let units = pairs.len();
    if units == 0 {
        return MetricValue::Undefined(UndefinedReason::NoData);
    }
    let total = 2 * units;
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for (a, b) in pairs {
        *counts.entry(a.as_str()).or_default() += 1;
        *counts.entry(b.as_str()).or_default() += 1;
    }

    let disagreements = pairs.iter().filter(|(a, b)| a != b).count();
    let d_o = disagreements as f64 / units as f64;

    let numerator: usize = counts.values().map(|&c| c * (total - c)).sum();
    let denominator = if total > 1 { total * (total - 1) } else { 1 };
    let d_e = numerator as f64 / denominator as f64;

    if d_e == 0.0 {
        MetricValue::Undefined(UndefinedReason::NoVariance)
    } else {
        MetricValue::Defined(1.0 - d_o / d_e)
    }
}

/// Per-code F1 and Kappa, in order of first appearance.
fn per_code_metrics(rows: &[WorkRow]) -> Vec<CodeMetrics> {
    let mut order: Vec<&str> = Vec::new();
    let mut seen: BTreeSet<&str> = BTreeSet::new();
    for row in rows {
        if seen.insert(row.code.as_str()) {
            order.push(row.code.as_str());
        }
    }

    order
        .into_iter()
        .map(|code| {
            let subset: Vec<&WorkRow> = rows.iter().filter(|r| r.code == code).collect();
            let owned: Vec<WorkRow> = subset.iter().map(|r| (*r).clone()).collect();
            let f1 = if owned[0].flags.len() >= 2 {
                f1_binary(&owned)
            } else {
                MetricValue::Undefined(UndefinedReason::SingleCoder)
            };
            let kappa = if owned[0].flags.len() == 2 {
                kappa_binary(&owned)
            } else {
                MetricValue::Undefined(UndefinedReason::PairwiseOnly)
            };
            CodeMetrics {
                code: code.to_string(),
                n: owned.len(),
                f1,
                kappa,
            }
        })
        .collect()
}

/// Mean of the defined values, undefined when none are.
fn macro_average(values: impl Iterator<Item = MetricValue>) -> MetricValue {
    let defined: Vec<f64> = values.filter_map(|v| v.value()).collect();
    if defined.is_empty() {
        MetricValue::Undefined(UndefinedReason::NoData)
    } else {
        MetricValue::Defined(defined.iter().sum::<f64>() / defined.len() as f64)
    }
}

/// Estimate the true-negative count from transcript volume: uncoded words
/// divided by the average coded segment length, after deducting the
/// non-codable margin.
fn estimate_tn_from_words(
    rows: &[WorkRow],
    total_source_words: usize,
    config: &MethodConfig,
) -> Option<usize> {
    let unique_texts: BTreeSet<&str> = rows.iter().map(|r| r.text.as_str()).collect();
    if unique_texts.is_empty() {
        return None;
    }
    let coded_words: usize = unique_texts.iter().map(|t| count_words(t)).sum();
    let avg_segment_len = coded_words / unique_texts.len();

    let deduction = (total_source_words as f64 * config.non_codable_margin) as usize;
    let adjusted_source = total_source_words.saturating_sub(deduction);
    if config.non_codable_margin > 0.0 {
        tracing::info!(
            margin = config.non_codable_margin,
            adjusted_source,
            "applied non-codable margin to transcript volume"
        );
    }

    let uncoded = adjusted_source.saturating_sub(coded_words);
    if uncoded == 0 || avg_segment_len == 0 {
        tracing::warn!("coded volume exceeds source volume, cannot estimate true negatives");
        return None;
    }
    Some(uncoded / avg_segment_len)
}
