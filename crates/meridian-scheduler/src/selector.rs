//! Store selection for balancing.
//!
//! A balancer moves load from the most loaded up store (the source) to the
//! least loaded eligible store (the target). Scores are plain load figures:
//! leader count for leader balancing, used ratio for storage balancing.
//! Ties are broken by the lowest store ID so results are deterministic.

use std::sync::Arc;

use meridian_cluster::StoreInfo;

pub type ScoreFn = fn(&StoreInfo) -> f64;

pub fn leader_score(store: &StoreInfo) -> f64 {
    store.stats.leader_count as f64
}

pub fn storage_score(store: &StoreInfo) -> f64 {
    store.stats.used_ratio
}

/// The up store with the highest score.
pub fn select_source<'a>(
    stores: impl IntoIterator<Item = &'a Arc<StoreInfo>>,
    score: ScoreFn,
) -> Option<&'a Arc<StoreInfo>> {
    stores
        .into_iter()
        .filter(|s| s.is_up())
        .fold(None, |best: Option<&Arc<StoreInfo>>, s| match best {
            Some(b) if score(b) > score(s) || (score(b) == score(s) && b.id < s.id) => Some(b),
            _ => Some(s),
        })
}

/// The up store with the lowest score.
pub fn select_target<'a>(
    stores: impl IntoIterator<Item = &'a Arc<StoreInfo>>,
    score: ScoreFn,
) -> Option<&'a Arc<StoreInfo>> {
    stores
        .into_iter()
        .filter(|s| s.is_up())
        .fold(None, |best: Option<&Arc<StoreInfo>>, s| match best {
            Some(b) if score(b) < score(s) || (score(b) == score(s) && b.id < s.id) => Some(b),
            _ => Some(s),
        })
}

/// Relative gap between source and target, `0.0` when the source is idle.
pub fn imbalance_ratio(source: f64, target: f64) -> f64 {
    if source <= 0.0 {
        return 0.0;
    }
    (source - target) / source
}
