//! Fuzzy Merge Engine: reconciling near-duplicate units.
//!
//! Different coders select slightly different spans of the same passage
//! (a sentence vs. the surrounding paragraph). Two passes repair that:
//!
//! 1. **Cross-code alignment** (optional): rows of the same participant
//!    with different codes whose token overlap reaches the threshold get
//!    their texts unified to the longer span, so the same physical segment
//!    classifies consistently later. No rows are deleted.
//! 2. **Same-code consolidation** (always): rows in the same
//!    (participant, code) group that overlap are merged into one, unioning
//!    coder flags and memos.
//!
//! Pass 2 is greedy and order dependent: groups scan in descending text
//! length (ties by original index), and a survivor's token cache is
//! refreshed immediately after each merge, so later pairs compare against
//! the updated text and can chain into looser matches. This matches the
//! reference behavior that existing reports depend on; a union-find over
//! the original token sets would be cleaner but changes results.

use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};

use crate::tokens::{jaccard, tokenize, TokenSet};
use crate::types::{renumber, MethodConfig, Unit};

/// Audit log of a consolidation pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MergeLog {
    /// Jaccard threshold used.
    pub threshold: f64,
    /// Row count before merging.
    pub initial: usize,
    /// Rows merged into a survivor and dropped.
    pub dropped: usize,
    /// Row count after merging.
    pub final_count: usize,
}

/// Pick the surviving text of a merge: strictly the longer of the two.
/// Stitching fragments together tends to mangle grammar; keeping the
/// longer span preserves readability. The first argument wins ties.
fn stitch_text<'a>(a: &'a str, b: &'a str) -> &'a str {
    if a.len() >= b.len() {
        a
    } else {
        b
    }
}

/// Group order: descending text length, ties by original row index.
fn ordered(indices: &[usize], units: &[Unit]) -> Vec<usize> {
    let mut sorted = indices.to_vec();
    sorted.sort_by_key(|&i| (Reverse(units[i].text.len()), i));
    sorted
}

/// Pass 1: unify text boundaries across different codes of the same
/// participant. Gated on `config.align_across_codes`.
pub fn align_across_codes(units: &mut [Unit], config: &MethodConfig) {
    if !config.align_across_codes {
        return;
    }
    tracing::info!("aligning text segments across codes");

    let mut tokens: Vec<TokenSet> = units.iter().map(|u| tokenize(&u.text)).collect();

    let mut by_participant: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (i, unit) in units.iter().enumerate() {
        by_participant.entry(unit.p.clone()).or_default().push(i);
    }

    for indices in by_participant.values() {
        if indices.len() < 2 {
            continue;
        }
        let order = ordered(indices, units);

        for a in 0..order.len() {
            for b in (a + 1)..order.len() {
                let (i, j) = (order[a], order[b]);
                // Rows of the same code merge in pass 2 instead.
                if units[i].code == units[j].code {
                    continue;
                }
                if jaccard(&tokens[i], &tokens[j]) < config.overlap_threshold {
                    continue;
                }
                if units[i].text == units[j].text {
                    continue;
                }
                let stitched = stitch_text(&units[i].text, &units[j].text).to_string();
                let fresh = tokenize(&stitched);
                units[i].text = stitched.clone();
                units[j].text = stitched;
                tokens[i] = fresh.clone();
                tokens[j] = fresh;
            }
        }
    }
}

/// Pass 2: merge near-duplicate rows within each (participant, code)
/// group. Always runs; at threshold 1.0 only identical token sets merge.
pub fn consolidate(units: &mut Vec<Unit>, config: &MethodConfig) -> MergeLog {
    let initial = units.len();
    let mut tokens: Vec<TokenSet> = units.iter().map(|u| tokenize(&u.text)).collect();

    let mut by_group: BTreeMap<(String, String), Vec<usize>> = BTreeMap::new();
    for (i, unit) in units.iter().enumerate() {
        by_group
            .entry((unit.p.clone(), unit.code.clone()))
            .or_default()
            .push(i);
    }

    let mut dropped: BTreeSet<usize> = BTreeSet::new();

    for indices in by_group.values() {
        if indices.len() < 2 {
            continue;
        }
        let order = ordered(indices, units);

        for a in 0..order.len() {
            for b in (a + 1)..order.len() {
                let (survivor, loser) = (order[a], order[b]);
                if dropped.contains(&survivor) || dropped.contains(&loser) {
                    continue;
                }
                if jaccard(&tokens[survivor], &tokens[loser]) < config.overlap_threshold {
                    continue;
                }

                merge_into(units, survivor, loser);
                // Refresh immediately so later pairs chain against the
                // stitched text (order-dependent drift, see module docs).
                tokens[survivor] = tokenize(&units[survivor].text);
                dropped.insert(loser);
            }
        }
    }

    if !dropped.is_empty() {
        let mut idx = 0;
        units.retain(|_| {
            let keep = !dropped.contains(&idx);
            idx += 1;
            keep
        });
        renumber(units);
    }

    let log = MergeLog {
        threshold: config.overlap_threshold,
        initial,
        dropped: dropped.len(),
        final_count: units.len(),
    };
    tracing::info!(
        initial = log.initial,
        dropped = log.dropped,
        final_count = log.final_count,
        "fuzzy merge complete"
    );
    log
}

/// Fold the loser row into the survivor: text, flags, labels, TN, memo.
fn merge_into(units: &mut [Unit], survivor: usize, loser: usize) {
    let stitched = stitch_text(&units[survivor].text, &units[loser].text).to_string();
    let loser_unit = units[loser].clone();
    let unit = &mut units[survivor];

    unit.text = stitched;
    for (coder, flag) in &loser_unit.flags {
        if *flag {
            unit.flags.insert(coder.clone(), true);
            let label = unit.labels.entry(coder.clone()).or_insert(None);
            if label.is_none() {
                *label = loser_unit.labels.get(coder).cloned().flatten();
            }
        }
    }
    // A coded row absorbs a negative one, never the other way around.
    if !unit.tn || !loser_unit.tn {
        unit.tn = false;
    }
    unit.merge_memo(&loser_unit.memo);
}
