use std::collections::{HashMap, HashSet};

use chrono::{Duration, NaiveDate};
use tracing::info;

use discovery_common::{Category, DiscoveryError, Release, Result};

use crate::traits::CacheStore;

/// Output of the release filter.
#[derive(Debug, Clone, Default)]
pub struct ReleaseCandidates {
    /// Releases that are new and already out. Committed to the cache after the crawl.
    pub to_cache: Vec<Release>,
    /// Subset that should be fetched, classified and dispatched.
    pub to_dispatch: Vec<Release>,
}

pub struct ReleaseFilter {
    lookback_days: Option<u32>,
}

impl ReleaseFilter {
    pub fn new(lookback_days: Option<u32>) -> Self {
        Self { lookback_days }
    }

    /// Run every filtering stage against the durable cache.
    pub async fn candidates(
        &self,
        store: &dyn CacheStore,
        releases: Vec<Release>,
        today: NaiveDate,
    ) -> Result<ReleaseCandidates> {
        let fetched = releases.len();
        let cached_ids = store.cached_release_ids().await?;
        let non_cached = filter_cached(releases, &cached_ids);
        let released = filter_future(non_cached, today);
        let to_cache = released.clone();

        let recent = filter_lookback(released, today, self.lookback_days);
        let cached_names = store.cached_release_names().await?;
        let to_dispatch = filter_simultaneous_duplicates(recent, &cached_names);

        info!(
            fetched,
            new = to_cache.len(),
            dispatchable = to_dispatch.len(),
            "Filtered releases"
        );
        Ok(ReleaseCandidates {
            to_cache,
            to_dispatch,
        })
    }
}

/// Drop releases whose id is cached and collapse repeated ids within the batch.
/// A release listed under several followed artists keeps its first
/// non-appears-on listing.
pub fn filter_cached(releases: Vec<Release>, cached_ids: &HashSet<String>) -> Vec<Release> {
    let mut kept: Vec<Release> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for release in releases {
        if cached_ids.contains(&release.id) {
            continue;
        }
        match index.get(&release.id) {
            Some(&i) => {
                if kept[i].category == Category::AppearsOn
                    && release.category != Category::AppearsOn
                {
                    kept[i] = release;
                }
            }
            None => {
                index.insert(release.id.clone(), kept.len());
                kept.push(release);
            }
        }
    }
    kept
}

/// Drop releases dated strictly after `today`.
pub fn filter_future(releases: Vec<Release>, today: NaiveDate) -> Vec<Release> {
    releases
        .into_iter()
        .filter(|r| r.release_date <= today)
        .collect()
}

/// Drop releases older than the lookback window. `None` disables the window.
pub fn filter_lookback(
    releases: Vec<Release>,
    today: NaiveDate,
    lookback_days: Option<u32>,
) -> Vec<Release> {
    let Some(days) = lookback_days else {
        return releases;
    };
    let oldest = today - Duration::days(i64::from(days));
    releases
        .into_iter()
        .filter(|r| r.release_date >= oldest)
        .collect()
}

/// Keep only the earliest of releases sharing a name signature, and drop
/// signatures that were already handled in an earlier crawl.
pub fn filter_simultaneous_duplicates(
    releases: Vec<Release>,
    cached_names: &HashSet<String>,
) -> Vec<Release> {
    let mut earliest: HashMap<String, usize> = HashMap::new();
    for (i, release) in releases.iter().enumerate() {
        let signature = release.name_signature();
        if cached_names.contains(&signature) {
            continue;
        }
        match earliest.get(&signature) {
            Some(&j) if releases[j].release_date <= release.release_date => {}
            _ => {
                earliest.insert(signature, i);
            }
        }
    }
    let keep: HashSet<usize> = earliest.into_values().collect();
    releases
        .into_iter()
        .enumerate()
        .filter(|(i, _)| keep.contains(i))
        .map(|(_, r)| r)
        .collect()
}

/// Persist ids and name signatures. Failures surface as `CacheCommit`.
pub async fn commit(store: &dyn CacheStore, releases: &[Release]) -> Result<()> {
    if releases.is_empty() {
        return Ok(());
    }
    let ids: Vec<String> = releases.iter().map(|r| r.id.clone()).collect();
    let names: Vec<String> = releases.iter().map(Release::name_signature).collect();
    store
        .append_release_ids(&ids)
        .await
        .map_err(|e| DiscoveryError::CacheCommit(format!("release ids: {e}")))?;
    store
        .append_release_names(&names)
        .await
        .map_err(|e| DiscoveryError::CacheCommit(format!("release names: {e}")))?;
    Ok(())
}
