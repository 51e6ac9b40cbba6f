//! Feature diff aggregate
//!
//! The change set produced by the comparator and rewritten by the
//! reconciler. Collections are plain vectors; [`FeatureDiff::sort`] puts
//! them in canonical order so equivalent diffs compare (and serialize)
//! equal regardless of map iteration order.

use crate::models::feature::{BaselineState, BrowserKey, BrowserState, Docs};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Whether an entity falls inside the query that produced the snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QueryMatch {
    Match,
    NoMatch,
}

/// Why a feature entered or left the result set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeReason {
    /// Newly matches the query
    NewMatch,
    /// Still exists but no longer matches the query
    Unmatched,
    /// Gone from the live store
    Deleted,
}

/// Before/after pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change<T> {
    pub from: T,
    pub to: T,
}

impl<T> Change<T> {
    pub fn new(from: T, to: T) -> Self {
        Self { from, to }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureAdded {
    pub id: String,
    pub name: String,
    pub reason: ChangeReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docs: Option<Docs>,
    pub query_match: QueryMatch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureRemoved {
    pub id: String,
    pub name: String,
    pub reason: ChangeReason,
    /// What changed on the live feature while it dropped out of the query
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<FeatureModified>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureDeleted {
    pub id: String,
    pub name: String,
    pub reason: ChangeReason,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureModified {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docs: Option<Docs>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_change: Option<Change<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline_change: Option<Change<BaselineState>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub browser_changes: BTreeMap<BrowserKey, Change<BrowserState>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docs_change: Option<Change<Docs>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureMoved {
    pub from_id: String,
    pub from_name: String,
    pub to_id: String,
    pub to_name: String,
    pub query_match: QueryMatch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureSplit {
    pub from_id: String,
    pub from_name: String,
    pub to: Vec<FeatureAdded>,
}

/// Complete change set between two snapshots
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureDiff {
    /// Set by the caller when the tracked query itself changed
    #[serde(default)]
    pub query_changed: bool,
    #[serde(default)]
    pub added: Vec<FeatureAdded>,
    #[serde(default)]
    pub removed: Vec<FeatureRemoved>,
    #[serde(default)]
    pub deleted: Vec<FeatureDeleted>,
    #[serde(default)]
    pub modified: Vec<FeatureModified>,
    #[serde(default)]
    pub moves: Vec<FeatureMoved>,
    #[serde(default)]
    pub splits: Vec<FeatureSplit>,
}

/// Summary statistics for the diff
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffSummary {
    pub query_changed: bool,
    pub added: usize,
    pub removed: usize,
    pub deleted: usize,
    pub modified: usize,
    pub moved: usize,
    pub split: usize,
    pub name_changes: usize,
    pub baseline_changes: usize,
    pub browser_changes: usize,
    pub docs_changes: usize,
    pub total_changes: usize,
}

impl FeatureDiff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canonical ordering: (name, id) for entry lists, from-id for moves and
    /// splits, name (then id) inside each split.
    pub fn sort(&mut self) {
        self.added
            .sort_by(|a, b| (&a.name, &a.id).cmp(&(&b.name, &b.id)));
        self.removed
            .sort_by(|a, b| (&a.name, &a.id).cmp(&(&b.name, &b.id)));
        self.deleted
            .sort_by(|a, b| (&a.name, &a.id).cmp(&(&b.name, &b.id)));
        self.modified
            .sort_by(|a, b| (&a.name, &a.id).cmp(&(&b.name, &b.id)));
        self.moves.sort_by(|a, b| a.from_id.cmp(&b.from_id));
        self.splits.sort_by(|a, b| a.from_id.cmp(&b.from_id));
        for split in &mut self.splits {
            split
                .to
                .sort_by(|a, b| (&a.name, &a.id).cmp(&(&b.name, &b.id)));
        }
    }

    /// Consume and return the canonically sorted diff
    pub fn into_sorted(mut self) -> Self {
        self.sort();
        self
    }

    pub fn has_changes(&self) -> bool {
        self.query_changed
            || !self.added.is_empty()
            || !self.removed.is_empty()
            || !self.deleted.is_empty()
            || !self.modified.is_empty()
            || !self.moves.is_empty()
            || !self.splits.is_empty()
    }

    pub fn summary(&self) -> DiffSummary {
        let mut summary = DiffSummary {
            query_changed: self.query_changed,
            added: self.added.len(),
            removed: self.removed.len(),
            deleted: self.deleted.len(),
            modified: self.modified.len(),
            moved: self.moves.len(),
            split: self.splits.len(),
            ..Default::default()
        };

        for m in &self.modified {
            if m.name_change.is_some() {
                summary.name_changes += 1;
            }
            if m.baseline_change.is_some() {
                summary.baseline_changes += 1;
            }
            summary.browser_changes += m.browser_changes.len();
            if m.docs_change.is_some() {
                summary.docs_changes += 1;
            }
        }

        summary.total_changes = summary.added
            + summary.removed
            + summary.deleted
            + summary.modified
            + summary.moved
            + summary.split;
        summary
    }

    /// Short human-readable description, one line per non-empty category
    pub fn render_summary(&self) -> String {
        if !self.has_changes() {
            return "No changes".to_string();
        }

        let s = self.summary();
        let mut lines = Vec::new();
        if s.query_changed {
            lines.push("Search query changed".to_string());
        }
        let counts = [
            (s.added, "added"),
            (s.removed, "removed"),
            (s.deleted, "deleted"),
            (s.modified, "modified"),
            (s.moved, "moved"),
            (s.split, "split"),
        ];
        for (count, label) in counts {
            if count > 0 {
                let noun = if count == 1 { "feature" } else { "features" };
                lines.push(format!("{} {} {}", count, noun, label));
            }
        }
        lines.join("\n")
    }
}
