//! Feature Diff Engine
//!
//! Compares two feature snapshots and produces the raw change set:
//! additions, removals and per-field modifications. Renames and splits are
//! not detected here; the reconciler rewrites Removed/Added pairs later.
//!
//! Every optional field goes through the same four-way transition table
//! (unset/unset, unset/set, set/unset, set/set). Browser implementations
//! get one exception, the quiet rollout: a slot that appears as bare
//! `unavailable` is a schema backfill and is never reported.

use crate::models::diff::{
    Change, ChangeReason, FeatureAdded, FeatureDiff, FeatureModified, FeatureRemoved, QueryMatch,
};
use crate::models::feature::{
    BaselineState, BrowserImplementations, BrowserKey, BrowserState, Docs, Feature, FeatureMap,
};
use crate::optional::OptionallySet;
use std::collections::BTreeMap;
use tracing::debug;

/// The diff engine that compares feature snapshots
pub struct DiffEngine;

impl DiffEngine {
    /// Compare two snapshots and return the raw (unreconciled) diff
    pub fn calculate_diff(old: &FeatureMap, new: &FeatureMap) -> FeatureDiff {
        let mut diff = FeatureDiff::new();

        // Detect added features
        for (id, feature) in new {
            if !old.contains_key(id) {
                diff.added.push(FeatureAdded {
                    id: id.clone(),
                    name: feature.display_name(),
                    reason: ChangeReason::NewMatch,
                    docs: feature.docs.value().cloned(),
                    query_match: QueryMatch::Match,
                });
            }
        }

        for (id, old_feature) in old {
            match new.get(id) {
                // Detect modified features
                Some(new_feature) => {
                    let (modified, changed) = Self::compare_feature(old_feature, new_feature);
                    if changed {
                        diff.modified.push(modified);
                    }
                }
                // Detect removed features
                None => diff.removed.push(FeatureRemoved {
                    id: id.clone(),
                    name: old_feature.display_name(),
                    reason: ChangeReason::Unmatched,
                    diff: None,
                }),
            }
        }

        debug!(
            "Calculated feature diff: {} added, {} removed, {} modified",
            diff.added.len(),
            diff.removed.len(),
            diff.modified.len()
        );

        diff
    }

    /// Compare two versions of one feature.
    ///
    /// Returns the modification record and whether it counts as a change.
    /// A docs change is recorded in the returned record but never makes
    /// `changed` true on its own.
    pub fn compare_feature(old: &Feature, new: &Feature) -> (FeatureModified, bool) {
        let mut modified = FeatureModified {
            id: new.id.clone(),
            name: new.display_name(),
            docs: new.docs.value().cloned(),
            ..Default::default()
        };
        let mut changed = false;

        if let Some(change) = Self::compare_name(&old.name, &new.name) {
            modified.name_change = Some(change);
            changed = true;
        }

        if let Some(change) = Self::compare_baseline(&old.baseline_status, &new.baseline_status) {
            modified.baseline_change = Some(change);
            changed = true;
        }

        let browser_changes = Self::compare_browser_impls(&old.browser_impls, &new.browser_impls);
        if !browser_changes.is_empty() {
            modified.browser_changes = browser_changes;
            changed = true;
        }

        // Informational only
        modified.docs_change = Self::compare_docs(&old.docs, &new.docs);

        (modified, changed)
    }

    fn compare_name(
        old: &OptionallySet<String>,
        new: &OptionallySet<String>,
    ) -> Option<Change<String>> {
        if old.is_unset() && new.is_unset() {
            return None;
        }
        let (from, to) = (old.value_or_default(), new.value_or_default());
        (from != to).then(|| Change::new(from, to))
    }

    fn compare_baseline(
        old: &OptionallySet<BaselineState>,
        new: &OptionallySet<BaselineState>,
    ) -> Option<Change<BaselineState>> {
        if old.is_unset() && new.is_unset() {
            return None;
        }
        let (from, to) = (old.value_or_default(), new.value_or_default());

        // Only the status is compared; a status appearing or disappearing
        // is a change like any other.
        let status_changed = match (from.status.value(), to.status.value()) {
            (None, None) => false,
            (Some(a), Some(b)) => a != b,
            _ => true,
        };
        status_changed.then(|| Change::new(from, to))
    }

    fn compare_browser_impls(
        old: &OptionallySet<BrowserImplementations>,
        new: &OptionallySet<BrowserImplementations>,
    ) -> BTreeMap<BrowserKey, Change<BrowserState>> {
        let mut changes = BTreeMap::new();
        if old.is_unset() && new.is_unset() {
            return changes;
        }

        // A parent that is missing on one side has every slot unset, so the
        // per-slot quiet rollout also covers a whole record appearing.
        let (from, to) = (old.value_or_default(), new.value_or_default());
        for key in BrowserKey::ALL {
            if let Some(change) = Self::compare_browser_state(from.slot(key), to.slot(key)) {
                changes.insert(key, change);
            }
        }
        changes
    }

    fn compare_browser_state(
        old: &OptionallySet<BrowserState>,
        new: &OptionallySet<BrowserState>,
    ) -> Option<Change<BrowserState>> {
        match (old.value(), new.value()) {
            (None, None) => None,
            (None, Some(to)) if to.is_bare_unavailable() => None,
            // An empty slot resolves to the zero value on both sides
            (None, Some(to)) if *to == BrowserState::default() => None,
            (Some(from), None) if *from == BrowserState::default() => None,
            (None, Some(to)) => Some(Change::new(BrowserState::default(), to.clone())),
            (Some(from), None) => Some(Change::new(from.clone(), BrowserState::default())),
            (Some(from), Some(to)) => (from != to).then(|| Change::new(from.clone(), to.clone())),
        }
    }

    fn compare_docs(old: &OptionallySet<Docs>, new: &OptionallySet<Docs>) -> Option<Change<Docs>> {
        if old.is_unset() && new.is_unset() {
            return None;
        }
        let (from, to) = (old.value_or_default(), new.value_or_default());
        (from.sorted_urls() != to.sorted_urls()).then(|| Change::new(from, to))
    }
}
