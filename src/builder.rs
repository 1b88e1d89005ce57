//! Segment Builder: raw rating events → wide unit matrix.
//!
//! Events are grouped by (normalized text, participant); within each group
//! every distinct code becomes one unit whose coder flags record who
//! applied that code to that text. Groups iterate in sorted order so the
//! resulting matrix is deterministic.

use std::collections::{BTreeMap, BTreeSet};

use crate::types::{renumber, CoderRegistry, RatingEvent, Unit};

/// Build the unit matrix from rating events.
///
/// Returns units with dense ids `1..=N`, flags and labels populated, and
/// `tn=false` everywhere. Memo values for a (text, code) pair are
/// deduplicated and joined with `"; "`. An empty event set yields an
/// empty matrix; downstream statistics degrade to not-applicable rather
/// than aborting the run.
pub fn build_units(events: &[RatingEvent], registry: &CoderRegistry) -> Vec<Unit> {
    // (text, participant) -> events of that segment.
    let mut groups: BTreeMap<(String, String), Vec<&RatingEvent>> = BTreeMap::new();
    for event in events {
        groups
            .entry((event.text.clone(), event.participant()))
            .or_default()
            .push(event);
    }

    let mut units = Vec::new();
    for ((text, p), group) in &groups {
        let codes: BTreeSet<&str> = group.iter().map(|e| e.code.as_str()).collect();

        for code in codes {
            let mut unit = Unit::new(p.clone(), text.clone(), code, registry);

            let mut seen_memos = BTreeSet::new();
            for event in group.iter().filter(|e| e.code == code) {
                unit.mark_coded(&event.coder);
                if let Some(memo) = &event.memo {
                    if seen_memos.insert(memo.clone()) {
                        unit.merge_memo(memo);
                    }
                }
            }
            units.push(unit);
        }
    }

    renumber(&mut units);
    tracing::info!(
        events = events.len(),
        units = units.len(),
        "built unit matrix"
    );
    units
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(file: &str, coder: &str, text: &str, code: &str, memo: Option<&str>) -> RatingEvent {
        RatingEvent {
            file: file.to_string(),
            coder: coder.to_string(),
            text: text.to_string(),
            code: code.to_string(),
            memo: memo.map(|m| m.to_string()),
        }
    }

    #[test]
    fn same_text_same_code_becomes_one_unit() {
        let registry = CoderRegistry::from_names(["alice", "bob"]);
        let events = vec![
            event("P01.txt", "alice", "shared span", "X", None),
            event("P01.txt", "bob", "shared span", "X", None),
        ];
        let units = build_units(&events, &registry);
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].active_count(), 2);
        assert_eq!(units[0].p, "p01");
    }

    #[test]
    fn distinct_codes_on_same_text_become_distinct_units() {
        let registry = CoderRegistry::from_names(["alice", "bob"]);
        let events = vec![
            event("P01.txt", "alice", "shared span", "X", None),
            event("P01.txt", "bob", "shared span", "Y", None),
        ];
        let units = build_units(&events, &registry);
        assert_eq!(units.len(), 2);
        let x = units.iter().find(|u| u.code == "X").expect("unit X");
        assert!(x.flags["alice"]);
        assert!(!x.flags["bob"]);
        assert_eq!(x.labels["alice"].as_deref(), Some("X"));
        assert!(x.labels["bob"].is_none());
    }

    #[test]
    fn memos_are_deduplicated_and_joined() {
        let registry = CoderRegistry::from_names(["alice", "bob"]);
        let events = vec![
            event("P01.txt", "alice", "span", "X", Some("first")),
            event("P01.txt", "bob", "span", "X", Some("first")),
            event("P01.txt", "bob", "span", "X", Some("second")),
        ];
        let units = build_units(&events, &registry);
        assert_eq!(units[0].memo, "first; second");
    }

    #[test]
    fn ids_are_dense_from_one() {
        let registry = CoderRegistry::from_names(["alice"]);
        let events = vec![
            event("P01.txt", "alice", "a", "X", None),
            event("P02.txt", "alice", "b", "Y", None),
        ];
        let units = build_units(&events, &registry);
        let ids: Vec<u32> = units.iter().map(|u| u.id.0).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn empty_events_yield_an_empty_matrix() {
        let registry = CoderRegistry::from_names(["alice"]);
        assert!(build_units(&[], &registry).is_empty());
    }
}
