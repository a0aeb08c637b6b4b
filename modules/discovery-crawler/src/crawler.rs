// Crawl orchestration.
//
// Phase 0 resolves followed artists, phase 1 lists and filters their releases,
// phase 2 fetches tracks and decides target stores, phase 3 inserts, marks and
// reports. Every phase short-circuits on empty input. Releases that passed the
// identifier and future filters are committed to the cache whatever happens in
// phases 2 and 3.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use discovery_common::{
    AlbumTrackPair, ArtistId, Category, Config, DiscoveryError, Release, Result,
};

use crate::cache::artist::{ArtistCache, ArtistSnapshot};
use crate::cache::release::{self, ReleaseFilter};
use crate::dispatch::TargetMapper;
use crate::executor::BoundedExecutor;
use crate::notifier::Notifier;
use crate::remap::{filter_appears_on, RemappingEngine};
use crate::report::CrawlReport;
use crate::targets::TargetStores;
use crate::traits::{CacheStore, MusicCatalog, ResultRelay};

/// Non-blocking Idle/Running flag.
#[derive(Debug, Default)]
pub struct CrawlLock {
    running: AtomicBool,
}

/// Holds the lock; dropping it returns the lock to Idle.
pub struct CrawlGuard<'a> {
    lock: &'a CrawlLock,
}

impl CrawlLock {
    pub fn try_acquire(&self) -> Option<CrawlGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| CrawlGuard { lock: self })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl Drop for CrawlGuard<'_> {
    fn drop(&mut self) {
        self.lock.running.store(false, Ordering::Release);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlOutcome {
    /// Another crawl is in progress.
    Unavailable,
    Completed(CrawlReport),
}

pub struct Crawler {
    catalog: Arc<dyn MusicCatalog>,
    store: Arc<dyn CacheStore>,
    relay: Arc<dyn ResultRelay>,
    artists: ArtistCache,
    releases: ReleaseFilter,
    remapping: RemappingEngine,
    mapper: TargetMapper,
    targets: TargetStores,
    notifier: Notifier,
    executor: BoundedExecutor,
    lock: CrawlLock,
}

impl Crawler {
    pub fn new(
        config: &Config,
        catalog: Arc<dyn MusicCatalog>,
        store: Arc<dyn CacheStore>,
        relay: Arc<dyn ResultRelay>,
    ) -> Self {
        let executor = BoundedExecutor::new(config.max_concurrency);
        Self {
            notifier: Notifier::new(
                catalog.clone(),
                executor,
                &config.policy,
                config.markers_enabled,
            ),
            catalog,
            store,
            relay,
            artists: ArtistCache::new(config.policy.artist_cache_ttl),
            releases: ReleaseFilter::new(config.lookback_days),
            remapping: RemappingEngine::new(&config.policy),
            mapper: TargetMapper::new(config.keep_source_copy, config.blacklist.clone()),
            targets: TargetStores::new(&config.collection_ids),
            executor,
            lock: CrawlLock::default(),
        }
    }

    pub fn targets(&self) -> &TargetStores {
        &self.targets
    }

    pub fn artist_cache(&self) -> &ArtistCache {
        &self.artists
    }

    pub fn is_running(&self) -> bool {
        self.lock.is_running()
    }

    /// Startup checks: every configured collection must resolve, and markers
    /// from earlier runs are restored. Runs whether or not a crawl follows.
    pub async fn prepare(&self) -> Result<()> {
        self.verify_collections().await?;
        self.notifier.restore_markers(&self.targets).await;
        Ok(())
    }

    /// `prepare`, then a regular crawl.
    pub async fn initial_crawl(&self) -> Result<CrawlOutcome> {
        self.prepare().await?;
        self.try_crawl().await
    }

    async fn verify_collections(&self) -> Result<()> {
        for store in self.targets.enabled() {
            let Some(collection_id) = store.collection_id() else {
                continue;
            };
            if let Err(e) = self.catalog.collection(collection_id).await {
                return Err(DiscoveryError::Config(format!(
                    "PLAYLIST_{} ({collection_id}) is not accessible: {e}",
                    store.category().env_key()
                )));
            }
        }
        info!(
            collections = self.targets.enabled().count(),
            "Verified target collections"
        );
        Ok(())
    }

    pub async fn try_crawl(&self) -> Result<CrawlOutcome> {
        self.try_crawl_at(Utc::now()).await
    }

    /// Crawl unless another crawl holds the lock.
    pub async fn try_crawl_at(&self, now: DateTime<Utc>) -> Result<CrawlOutcome> {
        let Some(_guard) = self.lock.try_acquire() else {
            info!("Crawl already in progress, skipping");
            return Ok(CrawlOutcome::Unavailable);
        };
        let run_id = Uuid::new_v4();
        let span = info_span!("crawl", run_id = %run_id);
        let report = self.crawl(now).instrument(span).await?;
        Ok(CrawlOutcome::Completed(report))
    }

    /// Clear stale "new" markers. Does not take the crawl lock.
    pub async fn clear_obsolete_notifiers(&self, now: DateTime<Utc>) -> bool {
        self.notifier.clear_obsolete(&self.targets, now).await
    }

    async fn crawl(&self, now: DateTime<Utc>) -> Result<CrawlReport> {
        let today = now.date_naive();

        // Phase 0: artists
        let snapshot = self
            .artists
            .followed_artists(self.store.as_ref(), self.catalog.as_ref(), now)
            .await?;
        if snapshot.is_empty() {
            info!("No followed artists to crawl");
            return Ok(CrawlReport::default());
        }
        if !snapshot.new.is_empty() {
            self.initialize_album_cache(&snapshot.new, today).await?;
        }
        let established = established_artists(&snapshot);
        if established.is_empty() {
            info!("Only newly followed artists, nothing to dispatch");
            return Ok(CrawlReport::default());
        }

        // Phase 1: releases
        let listed = self.list_releases(&established).await?;
        let candidates = self
            .releases
            .candidates(self.store.as_ref(), listed, today)
            .await?;
        if candidates.to_cache.is_empty() {
            info!("No new releases");
            return Ok(CrawlReport::default());
        }

        let outcome = self.dispatch(candidates.to_dispatch, &snapshot, now).await;

        // Post: commit
        match release::commit(self.store.as_ref(), &candidates.to_cache).await {
            Ok(()) => info!(releases = candidates.to_cache.len(), "Committed release cache"),
            Err(e) => warn!(error = %e, "Release cache commit failed"),
        }

        outcome
    }

    async fn list_releases(&self, artists: &[ArtistId]) -> Result<Vec<Release>> {
        let tasks = artists
            .iter()
            .map(|artist| self.catalog.artist_releases(artist));
        self.executor.execute("artist_releases", tasks).await
    }

    /// Cache the existing catalog of newly followed artists without dispatching it.
    async fn initialize_album_cache(&self, new: &[ArtistId], today: NaiveDate) -> Result<()> {
        let listed = self.list_releases(new).await?;
        let cached = self.store.cached_release_ids().await?;
        let releases = release::filter_future(release::filter_cached(listed, &cached), today);
        match release::commit(self.store.as_ref(), &releases).await {
            Ok(()) => info!(
                artists = new.len(),
                releases = releases.len(),
                "Initialized album cache for new artists"
            ),
            Err(e) => warn!(error = %e, "Album cache initialization failed"),
        }
        Ok(())
    }

    /// Phases 2 and 3.
    async fn dispatch(
        &self,
        releases: Vec<Release>,
        snapshot: &ArtistSnapshot,
        now: DateTime<Utc>,
    ) -> Result<CrawlReport> {
        if releases.is_empty() {
            return Ok(CrawlReport::default());
        }

        // Phase 2: tracks, classification, target mapping
        let tasks = releases.into_iter().map(|release| async move {
            let tracks = self.catalog.release_tracks(&release).await?;
            Ok::<_, DiscoveryError>(vec![AlbumTrackPair::new(release, tracks)])
        });
        let pairs: Vec<AlbumTrackPair> = self
            .executor
            .execute("release_tracks", tasks)
            .await?
            .into_iter()
            .filter(|p| !p.tracks.is_empty())
            .collect();
        if pairs.is_empty() {
            return Ok(CrawlReport::default());
        }

        let followed: HashSet<ArtistId> = snapshot.all.iter().cloned().collect();
        let classified = filter_appears_on(self.remapping.classify(pairs), &followed);
        let mapped = self.mapper.map(classified, &self.targets);
        if mapped.is_empty() {
            info!("No releases left after target mapping");
            return Ok(CrawlReport::default());
        }

        // Phase 3: insertion, notifiers, report
        let inserted = self.insert(&mapped).await?;
        let mapped: BTreeMap<Category, Vec<AlbumTrackPair>> = mapped
            .into_iter()
            .filter(|(category, _)| inserted.contains(category))
            .collect();
        let report = CrawlReport::from_dispatch(&mapped);
        if report.is_empty() {
            return Ok(report);
        }

        self.notifier.show(&self.targets, &inserted, now).await?;
        self.spawn_relay(&report);
        info!(total = report.total(), "{report}");
        Ok(report)
    }

    /// Add each store's tracks to its collection. Returns the categories that succeeded.
    async fn insert(
        &self,
        mapped: &BTreeMap<Category, Vec<AlbumTrackPair>>,
    ) -> Result<Vec<Category>> {
        let tasks = mapped.iter().filter_map(|(category, pairs)| {
            let collection_id = self.targets.get(*category).collection_id()?;
            let track_ids: Vec<String> = pairs
                .iter()
                .flat_map(|p| p.track_ids().map(str::to_string))
                .collect();
            Some(async move {
                self.catalog.add_tracks(collection_id, &track_ids).await?;
                info!(%category, tracks = track_ids.len(), "Added tracks");
                Ok::<_, DiscoveryError>(vec![*category])
            })
        });
        let mut inserted = self.executor.execute("add_tracks", tasks).await?;
        inserted.sort();
        Ok(inserted)
    }

    fn spawn_relay(&self, report: &CrawlReport) {
        let relay = self.relay.clone();
        let report = report.clone();
        tokio::spawn(async move {
            if let Err(e) = relay.relay(&report).await {
                warn!(error = %e, "Failed to relay crawl report");
            }
        });
    }
}

fn established_artists(snapshot: &ArtistSnapshot) -> Vec<ArtistId> {
    let new: HashSet<&str> = snapshot.new.iter().map(String::as_str).collect();
    snapshot
        .all
        .iter()
        .filter(|id| !new.contains(id.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_is_exclusive_until_guard_drops() {
        let lock = CrawlLock::default();
        let guard = lock.try_acquire();
        assert!(guard.is_some());
        assert!(lock.is_running());
        assert!(lock.try_acquire().is_none());

        drop(guard);
        assert!(!lock.is_running());
        assert!(lock.try_acquire().is_some());
    }

    #[test]
    fn new_artists_are_not_established() {
        let snapshot = ArtistSnapshot {
            all: vec!["a".into(), "b".into(), "c".into()],
            new: vec!["b".into()],
        };
        assert_eq!(
            established_artists(&snapshot),
            vec!["a".to_string(), "c".to_string()]
        );
    }
}
