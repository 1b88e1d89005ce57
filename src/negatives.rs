//! True negatives: injecting uncoded transcript sentences and pruning
//! redundant ones after merging.
//!
//! Chance-corrected statistics need "nothing was coded here" units to be
//! valid. The injector sentence-splits each participant transcript and adds
//! a zero-flag unit for every sentence no coder touched. After the fuzzy
//! merge has stitched texts, the pruner removes injected negatives that now
//! overlap real coded text.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use crate::text::{clean_text, count_words, split_sentences};
use crate::tokens::{jaccard, tokenize};
use crate::types::{normalize_participant, renumber, CoderRegistry, MethodConfig, Unit};

/// A participant's transcript content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    /// Normalized participant id.
    pub participant: String,
    /// Raw transcript text.
    pub content: String,
}

/// The transcript corpus for a run.
#[derive(Debug, Clone, Default)]
pub struct TranscriptSet {
    transcripts: Vec<Transcript>,
}

impl TranscriptSet {
    /// Build from in-memory transcripts (tests, embedding callers).
    pub fn from_transcripts(transcripts: Vec<Transcript>) -> Self {
        Self { transcripts }
    }

    /// Load every `.txt` file from a directory.
    ///
    /// A missing directory is created and logged, yielding an empty set;
    /// unreadable files are logged and skipped. Neither aborts the run.
    pub fn load_dir(dir: &Path) -> Self {
        if !dir.exists() {
            tracing::info!(dir = %dir.display(), "transcript directory not found, creating it");
            if let Err(e) = fs::create_dir_all(dir) {
                tracing::warn!(dir = %dir.display(), error = %e, "could not create transcript directory");
            }
            return Self::default();
        }

        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "could not read transcript directory");
                return Self::default();
            }
        };

        let mut paths: Vec<_> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().map(|ext| ext == "txt").unwrap_or(false))
            .collect();
        paths.sort();

        let mut transcripts = Vec::new();
        for path in paths {
            let stem = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(normalize_participant)
                .unwrap_or_default();
            match fs::read_to_string(&path) {
                Ok(content) => transcripts.push(Transcript {
                    participant: stem,
                    content: strip_bom(content),
                }),
                Err(e) => {
                    tracing::warn!(file = %path.display(), error = %e, "skipping unreadable transcript");
                }
            }
        }

        if transcripts.is_empty() {
            tracing::info!(dir = %dir.display(), "no .txt transcripts found");
        }
        Self { transcripts }
    }

    /// Transcripts in filename order.
    pub fn transcripts(&self) -> &[Transcript] {
        &self.transcripts
    }

    /// True when no transcript was loaded.
    pub fn is_empty(&self) -> bool {
        self.transcripts.is_empty()
    }

    /// Total word count across all transcripts, for true-negative
    /// estimation when no negatives were injected.
    pub fn total_words(&self) -> usize {
        self.transcripts.iter().map(|t| count_words(&t.content)).sum()
    }
}

fn strip_bom(content: String) -> String {
    content.strip_prefix('\u{feff}').map(str::to_string).unwrap_or(content)
}

/// Inject a true-negative unit for every transcript sentence not covered
/// by a coded unit of the same participant.
///
/// Coverage is a case-insensitive substring match in either direction
/// (coders often select part of a sentence, or span several). Returns the
/// number of injected units.
pub fn inject_true_negatives(
    units: &mut Vec<Unit>,
    transcripts: &TranscriptSet,
    registry: &CoderRegistry,
) -> usize {
    if transcripts.is_empty() {
        tracing::info!("no transcripts available, skipping true-negative injection");
        return 0;
    }

    // participant -> lowercased coded texts
    let mut coded_texts: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for unit in units.iter() {
        coded_texts
            .entry(unit.p.as_str())
            .or_default()
            .push(unit.text.to_lowercase());
    }

    let mut fresh: Vec<Unit> = Vec::new();
    for transcript in transcripts.transcripts() {
        let existing = coded_texts
            .get(transcript.participant.as_str())
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        for sentence in split_sentences(&transcript.content) {
            let clean = clean_text(&sentence);
            if clean.is_empty() {
                continue;
            }
            let norm = clean.to_lowercase();
            let covered = existing
                .iter()
                .any(|coded| coded.contains(&norm) || norm.contains(coded.as_str()));
            if !covered {
                fresh.push(Unit::true_negative(
                    transcript.participant.clone(),
                    clean,
                    registry,
                ));
            }
        }
    }

    let injected = fresh.len();
    units.extend(fresh);
    renumber(units);
    tracing::info!(injected, "injected true-negative units from transcripts");
    injected
}

/// Map each participant id to its shortest prefix-match root.
///
/// `p07-answers` maps to `p07` when both appear, so negatives injected
/// under one file variant can be compared against codes from another.
fn root_id_map(units: &[Unit]) -> BTreeMap<String, String> {
    let ids: BTreeSet<&str> = units.iter().map(|u| u.p.as_str()).collect();
    let mut by_length: Vec<&str> = ids.iter().copied().collect();
    by_length.sort_by_key(|id| (id.len(), *id));

    let mut map = BTreeMap::new();
    for id in &ids {
        let lowered = id.to_lowercase();
        let root = by_length
            .iter()
            .find(|short| **short != *id && lowered.starts_with(&short.to_lowercase()))
            .copied()
            .unwrap_or(id);
        map.insert(id.to_string(), root.to_string());
    }
    map
}

/// Drop true-negative units whose token overlap with any coded unit in the
/// same root-id cluster reaches the threshold. Returns the number pruned.
pub fn prune_true_negatives(units: &mut Vec<Unit>, config: &MethodConfig) -> usize {
    if !units.iter().any(|u| u.tn) {
        return 0;
    }

    let roots = root_id_map(units);
    let tokens: Vec<_> = units.iter().map(|u| tokenize(&u.text)).collect();

    // root id -> (tn indices, coded indices)
    let mut clusters: BTreeMap<&str, (Vec<usize>, Vec<usize>)> = BTreeMap::new();
    for (i, unit) in units.iter().enumerate() {
        let root = roots.get(&unit.p).map(String::as_str).unwrap_or(&unit.p);
        let entry = clusters.entry(root).or_default();
        if unit.tn {
            entry.0.push(i);
        } else {
            entry.1.push(i);
        }
    }

    let mut to_drop = BTreeSet::new();
    for (tn_indices, coded_indices) in clusters.values() {
        if tn_indices.is_empty() || coded_indices.is_empty() {
            continue;
        }
        for &tn_idx in tn_indices {
            if tokens[tn_idx].is_empty() {
                continue;
            }
            let covered = coded_indices.iter().any(|&coded_idx| {
                jaccard(&tokens[tn_idx], &tokens[coded_idx]) >= config.overlap_threshold
            });
            if covered {
                to_drop.insert(tn_idx);
            }
        }
    }

    if to_drop.is_empty() {
        return 0;
    }
    let pruned = to_drop.len();
    let mut idx = 0;
    units.retain(|_| {
        let keep = !to_drop.contains(&idx);
        idx += 1;
        keep
    });
    renumber(units);
    tracing::info!(pruned, "pruned true negatives overlapping coded segments");
    pruned
}
