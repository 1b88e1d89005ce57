//! Agreement Classifier: `all_agree`, `ignored`, and the per-row
//! reporting status.
//!
//! Classification is context sensitive: whether a `1 vs 0` row is a
//! conflict or a mere omission depends on what the silent coder did
//! *elsewhere on the same text*. The classifier therefore works over
//! (participant, text) groups, building per-coder code sets before
//! deciding each row.

use std::collections::{BTreeMap, BTreeSet};

use crate::types::{
    Agreement, AgreementMode, CoderRegistry, MethodConfig, ReportingStatus, StrijbosMethod, Unit,
};

/// Key of a physical text segment.
type SegmentKey = (String, String);

/// The set of codes each coder applied to each (participant, text) segment.
fn coder_code_sets(
    units: &[Unit],
    registry: &CoderRegistry,
) -> BTreeMap<SegmentKey, BTreeMap<String, BTreeSet<String>>> {
    let mut map: BTreeMap<SegmentKey, BTreeMap<String, BTreeSet<String>>> = BTreeMap::new();
    for unit in units {
        let entry = map
            .entry((unit.p.clone(), unit.text.clone()))
            .or_insert_with(|| {
                registry
                    .names()
                    .iter()
                    .map(|c| (c.clone(), BTreeSet::new()))
                    .collect()
            });
        for (coder, flag) in &unit.flags {
            if *flag {
                entry
                    .entry(coder.clone())
                    .or_default()
                    .insert(unit.code.clone());
            }
        }
    }
    map
}

/// For each unit, whether it is a partial-coverage row where every silent
/// coder's codes-on-this-text are a subset of the other coders' codes:
/// an omission (a miss), not a conflict (a different choice).
///
/// Shared by the classifier (Method A) and the statistics engine
/// (mutual-segments-only imputation).
pub fn omission_subset_rows(units: &[Unit], registry: &CoderRegistry) -> Vec<bool> {
    let code_sets = coder_code_sets(units, registry);
    let total = registry.len();

    units
        .iter()
        .map(|unit| {
            let active = unit.active_count();
            if unit.tn || active == 0 || active == total {
                return false;
            }
            let Some(sets) = code_sets.get(&(unit.p.clone(), unit.text.clone())) else {
                return false;
            };
            let is_conflict = unit.flags.iter().any(|(coder, flag)| {
                if *flag {
                    return false;
                }
                let mine = sets.get(coder).cloned().unwrap_or_default();
                let mut others: BTreeSet<&String> = BTreeSet::new();
                for (other, codes) in sets {
                    if other != coder {
                        others.extend(codes.iter());
                    }
                }
                // A code nobody else used means the silent coder chose
                // something different: a conflict.
                mine.iter().any(|code| !others.contains(code))
            });
            !is_conflict
        })
        .collect()
}

/// Recompute `all_agree` for every unit and re-enforce TN consistency.
fn mark_agreement(units: &mut [Unit], registry: &CoderRegistry, config: &MethodConfig) {
    let total = registry.len();

    for unit in units.iter_mut() {
        let active = unit.active_count();
        unit.all_agree = if total > 0 && active == total {
            Agreement::Exact
        } else {
            Agreement::None
        };
    }

    if config.mode == AgreementMode::Weighted {
        // (participant, text, category) -> coders active anywhere in the group.
        let mut category_presence: BTreeMap<(String, String, String), BTreeSet<String>> =
            BTreeMap::new();
        for unit in units.iter() {
            let key = (
                unit.p.clone(),
                unit.text.clone(),
                unit.category().to_string(),
            );
            let entry = category_presence.entry(key).or_default();
            for (coder, flag) in &unit.flags {
                if *flag {
                    entry.insert(coder.clone());
                }
            }
        }

        let mut partials = 0usize;
        for unit in units.iter_mut() {
            if unit.all_agree == Agreement::Exact || unit.tn {
                continue;
            }
            let key = (
                unit.p.clone(),
                unit.text.clone(),
                unit.category().to_string(),
            );
            let everyone_in_category = category_presence
                .get(&key)
                .map(|coders| coders.len() == total)
                .unwrap_or(false);
            if everyone_in_category {
                unit.all_agree = Agreement::Partial;
                partials += 1;
            }
        }
        if partials > 0 {
            tracing::info!(partials, "found category-level partial agreements");
        }
    }

    // TN must mirror the flags: silence is a negative, any flag is not.
    for unit in units.iter_mut() {
        let active = unit.active_count();
        unit.tn = active == 0;
        if unit.tn {
            // A negative can never carry an agreement flag.
            unit.all_agree = Agreement::None;
        }
    }
}

/// Classify every unit: `all_agree`, `reporting_status`, `ignored`.
pub fn classify_units(units: &mut [Unit], registry: &CoderRegistry, config: &MethodConfig) {
    mark_agreement(units, registry, config);

    let omissions = omission_subset_rows(units, registry);
    let total = registry.len();

    for (i, unit) in units.iter_mut().enumerate() {
        let active = unit.active_count();

        let status = if unit.tn || active == 0 {
            match config.method {
                StrijbosMethod::MethodC => ReportingStatus::TrueNegative,
                _ => ReportingStatus::IgnoredTn,
            }
        } else if active == total {
            match unit.all_agree {
                Agreement::Exact => ReportingStatus::Agree,
                Agreement::Partial => ReportingStatus::PartialAgree,
                Agreement::None => ReportingStatus::Disagree,
            }
        } else {
            // Partial coverage: some coders silent on this specific code.
            if config.mode == AgreementMode::Weighted && unit.all_agree == Agreement::Partial {
                ReportingStatus::PartialAgree
            } else {
                match config.method {
                    StrijbosMethod::MethodA => {
                        if omissions[i] {
                            ReportingStatus::IgnoredOmission
                        } else {
                            ReportingStatus::Disagree
                        }
                    }
                    // No omission concept under Union/Full.
                    _ => ReportingStatus::Disagree,
                }
            }
        };

        unit.reporting_status = status;
        unit.ignored = status == ReportingStatus::IgnoredTn
            || (config.mutual_segments_only && omissions[i]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::renumber;

    fn registry() -> CoderRegistry {
        CoderRegistry::from_names(["alice", "bob"])
    }

    fn unit(p: &str, text: &str, code: &str, coders: &[&str], reg: &CoderRegistry) -> Unit {
        let mut u = Unit::new(p, text, code, reg);
        for c in coders {
            u.mark_coded(c);
        }
        u
    }

    fn config(method: StrijbosMethod) -> MethodConfig {
        MethodConfig {
            method,
            ..MethodConfig::default()
        }
    }

    #[test]
    fn full_agreement_is_agree() {
        let reg = registry();
        let mut units = vec![unit("p01", "t", "X", &["alice", "bob"], &reg)];
        classify_units(&mut units, &reg, &config(StrijbosMethod::MethodC));
        assert_eq!(units[0].all_agree, Agreement::Exact);
        assert_eq!(units[0].reporting_status, ReportingStatus::Agree);
        assert!(!units[0].ignored);
    }

    #[test]
    fn method_a_conflict_vs_omission() {
        let reg = registry();
        // A coded text T as X; B coded the same T as Y. On the X row, B is
        // silent but chose Y elsewhere -> conflict.
        let mut conflict = vec![
            unit("p01", "T", "X", &["alice"], &reg),
            unit("p01", "T", "Y", &["bob"], &reg),
        ];
        renumber(&mut conflict);
        classify_units(&mut conflict, &reg, &config(StrijbosMethod::MethodA));
        assert_eq!(conflict[0].reporting_status, ReportingStatus::Disagree);
        assert_eq!(conflict[1].reporting_status, ReportingStatus::Disagree);

        // B applied no code at all to T: {} is a subset of {X} -> omission.
        let mut omission = vec![unit("p01", "T", "X", &["alice"], &reg)];
        classify_units(&mut omission, &reg, &config(StrijbosMethod::MethodA));
        assert_eq!(
            omission[0].reporting_status,
            ReportingStatus::IgnoredOmission
        );
    }

    #[test]
    fn omission_is_a_plain_disagreement_under_b_and_c() {
        let reg = registry();
        for method in [StrijbosMethod::MethodB, StrijbosMethod::MethodC] {
            let mut units = vec![unit("p01", "T", "X", &["alice"], &reg)];
            classify_units(&mut units, &reg, &config(method));
            assert_eq!(units[0].reporting_status, ReportingStatus::Disagree);
        }
    }

    #[test]
    fn true_negative_status_depends_on_method() {
        let reg = registry();
        let mut units = vec![Unit::true_negative("p01", "silence", &reg)];
        classify_units(&mut units, &reg, &config(StrijbosMethod::MethodC));
        assert_eq!(units[0].reporting_status, ReportingStatus::TrueNegative);
        assert!(!units[0].ignored);

        classify_units(&mut units, &reg, &config(StrijbosMethod::MethodA));
        assert_eq!(units[0].reporting_status, ReportingStatus::IgnoredTn);
        assert!(units[0].ignored);
    }

    #[test]
    fn weighted_mode_marks_category_partials() {
        let reg = registry();
        let mut units = vec![
            unit("p01", "T", "Emotions:Joy", &["alice"], &reg),
            unit("p01", "T", "Emotions:Happy", &["bob"], &reg),
        ];
        renumber(&mut units);
        let cfg = MethodConfig {
            mode: AgreementMode::Weighted,
            method: StrijbosMethod::MethodA,
            ..MethodConfig::default()
        };
        classify_units(&mut units, &reg, &cfg);
        assert_eq!(units[0].all_agree, Agreement::Partial);
        assert_eq!(units[0].reporting_status, ReportingStatus::PartialAgree);
        assert_eq!(units[1].reporting_status, ReportingStatus::PartialAgree);
    }

    #[test]
    fn exact_mode_treats_sibling_codes_as_conflict() {
        let reg = registry();
        let mut units = vec![
            unit("p01", "T", "Emotions:Joy", &["alice"], &reg),
            unit("p01", "T", "Emotions:Happy", &["bob"], &reg),
        ];
        renumber(&mut units);
        classify_units(&mut units, &reg, &config(StrijbosMethod::MethodA));
        assert_eq!(units[0].all_agree, Agreement::None);
        assert_eq!(units[0].reporting_status, ReportingStatus::Disagree);
    }

    #[test]
    fn tn_consistency_is_reenforced() {
        let reg = registry();
        // Flag set but tn accidentally true upstream: flags win.
        let mut stale = unit("p01", "t", "X", &["alice", "bob"], &reg);
        stale.tn = true;
        let mut units = vec![stale];
        classify_units(&mut units, &reg, &config(StrijbosMethod::MethodC));
        assert!(!units[0].tn);
        assert_eq!(units[0].all_agree, Agreement::Exact);
    }

    #[test]
    fn mutual_only_marks_omissions_ignored() {
        let reg = registry();
        let mut units = vec![unit("p01", "T", "X", &["alice"], &reg)];
        let cfg = MethodConfig {
            method: StrijbosMethod::MethodB,
            mutual_segments_only: true,
            ..MethodConfig::default()
        };
        classify_units(&mut units, &reg, &cfg);
        assert!(units[0].ignored);
        // Audit flags untouched.
        assert!(!units[0].flags["bob"]);
    }
}
