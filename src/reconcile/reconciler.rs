//! History reconciler
//!
//! Rewrites the comparator's raw diff using the live store:
//!
//! 1. Investigation: every removed id is looked up. Ids the store no longer
//!    knows become `deleted`; ids that still exist stay `removed` (with a
//!    modification record if the live feature changed); moved and split ids
//!    become candidates.
//! 2. Correlation: candidates are matched against `added`. Matched entries
//!    are consumed and the pair becomes a move or a split.
//!
//! Investigation runs concurrently but finishes completely before
//! correlation starts. The input diff is consumed and a new one returned,
//! so a failed run never leaves a half-rewritten diff behind.

use crate::error::{DiffError, DiffResult};
use crate::models::diff::{
    ChangeReason, FeatureAdded, FeatureDeleted, FeatureDiff, FeatureMoved, FeatureRemoved,
    FeatureSplit, QueryMatch,
};
use crate::models::feature::{Feature, FeatureMap};
use crate::reconcile::fetcher::{FeatureFetcher, FeatureLookup};
use crate::snapshot::diff::DiffEngine;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, info_span, warn, Instrument};

/// Default number of concurrent live lookups
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Outcome of investigating one removed id
#[derive(Debug)]
enum Investigation {
    Deleted,
    Regular(Feature),
    Moved(String),
    Split(Vec<String>),
}

impl From<FeatureLookup> for Investigation {
    fn from(lookup: FeatureLookup) -> Self {
        match lookup {
            FeatureLookup::Regular(feature) => Investigation::Regular(feature),
            FeatureLookup::Moved { new_id } => Investigation::Moved(new_id),
            FeatureLookup::Split { new_ids } => Investigation::Split(new_ids),
        }
    }
}

pub struct Reconciler {
    fetcher: Arc<dyn FeatureFetcher>,
    concurrency: usize,
}

impl Reconciler {
    pub fn new(fetcher: Arc<dyn FeatureFetcher>) -> Self {
        Self {
            fetcher,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Cap the number of in-flight lookups (at least one)
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Reconcile a comparator diff against the live store.
    ///
    /// Any lookup error other than "does not exist" aborts the run and is
    /// returned unchanged. Dropping the returned future cancels every
    /// outstanding lookup.
    pub async fn reconcile_history(
        &self,
        diff: FeatureDiff,
        old: &FeatureMap,
        new: &FeatureMap,
    ) -> DiffResult<FeatureDiff> {
        let span = info_span!("reconcile_history", removed = diff.removed.len());
        self.reconcile_inner(diff, old, new).instrument(span).await
    }

    async fn reconcile_inner(
        &self,
        diff: FeatureDiff,
        old: &FeatureMap,
        new: &FeatureMap,
    ) -> DiffResult<FeatureDiff> {
        let ids: Vec<String> = diff.removed.iter().map(|r| r.id.clone()).collect();
        let mut investigations = self.investigate(ids).await?;

        let FeatureDiff {
            query_changed,
            added,
            removed,
            deleted,
            modified,
            moves,
            splits,
        } = diff;
        let mut next = FeatureDiff {
            query_changed,
            added,
            removed: Vec::new(),
            deleted,
            modified,
            moves,
            splits,
        };

        let mut move_candidates: Vec<(FeatureRemoved, String)> = Vec::new();
        let mut split_candidates: Vec<(FeatureRemoved, Vec<String>)> = Vec::new();

        for (index, mut entry) in removed.into_iter().enumerate() {
            let investigation = investigations.remove(&index).ok_or_else(|| {
                DiffError::Task(format!("no lookup result for feature {}", entry.id))
            })?;

            match investigation {
                Investigation::Deleted => {
                    debug!(feature_id = %entry.id, "Feature no longer exists");
                    next.deleted.push(FeatureDeleted {
                        id: entry.id,
                        name: entry.name,
                        reason: ChangeReason::Deleted,
                    });
                }
                Investigation::Regular(live) => {
                    if let Some(previous) = old.get(&entry.id) {
                        let (modified, changed) = DiffEngine::compare_feature(previous, &live);
                        if changed {
                            entry.diff = Some(modified);
                        }
                    }
                    next.removed.push(entry);
                }
                Investigation::Moved(new_id) => move_candidates.push((entry, new_id)),
                Investigation::Split(new_ids) => split_candidates.push((entry, new_ids)),
            }
        }

        if !move_candidates.is_empty() || !split_candidates.is_empty() {
            self.correlate(&mut next, move_candidates, split_candidates, new)
                .await?;
        }

        info!(
            "Reconciled feature diff: {} removed, {} deleted, {} moves, {} splits",
            next.removed.len(),
            next.deleted.len(),
            next.moves.len(),
            next.splits.len()
        );

        Ok(next)
    }

    /// Look up every id concurrently. Results are keyed by input position.
    async fn investigate(&self, ids: Vec<String>) -> DiffResult<BTreeMap<usize, Investigation>> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut join_set = JoinSet::new();

        for (index, id) in ids.into_iter().enumerate() {
            let fetcher = self.fetcher.clone();
            let semaphore = semaphore.clone();

            join_set.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return Err(DiffError::Task("lookup semaphore closed".to_string())),
                };

                debug!(feature_id = %id, "Investigating removed feature");
                match fetcher.get_feature(&id).await {
                    Ok(lookup) => Ok((index, Investigation::from(lookup))),
                    Err(err) if err.is_not_found() => Ok((index, Investigation::Deleted)),
                    Err(err) => Err(err),
                }
            });
        }

        let mut results = BTreeMap::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(Ok((index, investigation))) => {
                    results.insert(index, investigation);
                }
                Ok(Err(err)) => {
                    join_set.abort_all();
                    return Err(err);
                }
                Err(err) => {
                    join_set.abort_all();
                    return Err(DiffError::Task(format!("lookup task join error: {}", err)));
                }
            }
        }

        Ok(results)
    }

    async fn correlate(
        &self,
        diff: &mut FeatureDiff,
        move_candidates: Vec<(FeatureRemoved, String)>,
        split_candidates: Vec<(FeatureRemoved, Vec<String>)>,
        new: &FeatureMap,
    ) -> DiffResult<()> {
        for (source, new_id) in move_candidates {
            let target = self.resolve_target(&new_id, &mut diff.added, new).await?;
            diff.moves.push(FeatureMoved {
                from_id: source.id,
                from_name: source.name,
                to_id: target.id,
                to_name: target.name,
                query_match: target.query_match,
            });
        }

        for (source, new_ids) in split_candidates {
            let mut to = Vec::with_capacity(new_ids.len());
            for new_id in &new_ids {
                to.push(self.resolve_target(new_id, &mut diff.added, new).await?);
            }
            diff.splits.push(FeatureSplit {
                from_id: source.id,
                from_name: source.name,
                to,
            });
        }

        Ok(())
    }

    /// Find a move/split destination: consume it from `added` if present,
    /// else take it from the new snapshot, else ask the live store.
    async fn resolve_target(
        &self,
        target_id: &str,
        added: &mut Vec<FeatureAdded>,
        new: &FeatureMap,
    ) -> DiffResult<FeatureAdded> {
        if let Some(position) = added.iter().position(|a| a.id == target_id) {
            let found = added.remove(position);
            return Ok(FeatureAdded {
                reason: ChangeReason::NewMatch,
                query_match: QueryMatch::Match,
                ..found
            });
        }

        if let Some(feature) = new.get(target_id) {
            return Ok(FeatureAdded {
                id: target_id.to_string(),
                name: feature.display_name(),
                reason: ChangeReason::Unmatched,
                docs: feature.docs.value().cloned(),
                query_match: QueryMatch::Match,
            });
        }

        warn!(feature_id = %target_id, "Target outside query scope, resolving from live store");
        let (name, docs) = match self.fetcher.get_feature(target_id).await {
            Ok(FeatureLookup::Regular(feature)) => {
                (feature.display_name(), feature.docs.value().cloned())
            }
            // Chained moves are not followed
            Ok(_) => (target_id.to_string(), None),
            Err(err) if err.is_not_found() => (target_id.to_string(), None),
            Err(err) => return Err(err),
        };

        Ok(FeatureAdded {
            id: target_id.to_string(),
            name,
            reason: ChangeReason::Unmatched,
            docs,
            query_match: QueryMatch::NoMatch,
        })
    }
}
