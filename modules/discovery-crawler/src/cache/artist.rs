use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use discovery_common::{ArtistId, DiscoveryError, Result};

use crate::traits::{CacheStore, MusicCatalog};

/// Followed artists for one crawl. `new` is the subset that was not cached before.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtistSnapshot {
    pub all: Vec<ArtistId>,
    pub new: Vec<ArtistId>,
}

impl ArtistSnapshot {
    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }
}

/// Followed-artist cache. Once populated the durable list is served verbatim;
/// an empty list is re-fetched from the catalog at most once per `ttl`.
pub struct ArtistCache {
    ttl: Duration,
    last_refreshed_at: Mutex<Option<DateTime<Utc>>>,
}

impl ArtistCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            last_refreshed_at: Mutex::new(None),
        }
    }

    pub fn last_refreshed_at(&self) -> Option<DateTime<Utc>> {
        *self
            .last_refreshed_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_last_refreshed_at(&self, at: Option<DateTime<Utc>>) {
        *self
            .last_refreshed_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = at;
    }

    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.last_refreshed_at() {
            None => true,
            Some(last) => now - last > self.ttl,
        }
    }

    pub async fn followed_artists(
        &self,
        store: &dyn CacheStore,
        catalog: &dyn MusicCatalog,
        now: DateTime<Utc>,
    ) -> Result<ArtistSnapshot> {
        let cached = clean_ids(store.cached_artist_ids().await?);
        if !cached.is_empty() {
            return Ok(ArtistSnapshot {
                all: cached,
                new: Vec::new(),
            });
        }

        if !self.is_expired(now) {
            debug!("Artist cache empty but refreshed recently, deferring fetch");
            return Ok(ArtistSnapshot::default());
        }

        let fresh = clean_ids(catalog.followed_artists().await?);
        if fresh.is_empty() {
            return Err(DiscoveryError::Config("No followed artists found".to_string()));
        }
        store.append_artist_ids(&fresh).await?;
        self.set_last_refreshed_at(Some(now));

        let previously: HashSet<&str> = cached.iter().map(String::as_str).collect();
        let new: Vec<ArtistId> = fresh
            .iter()
            .filter(|id| !previously.contains(id.as_str()))
            .cloned()
            .collect();
        info!(total = fresh.len(), new = new.len(), "Refreshed followed artists");

        Ok(ArtistSnapshot { all: fresh, new })
    }
}

/// Drop blanks, literal "null" ids and duplicates, keeping first-seen order.
fn clean_ids(ids: Vec<ArtistId>) -> Vec<ArtistId> {
    let mut seen = HashSet::new();
    ids.into_iter()
        .filter(|id| !id.is_empty() && !id.eq_ignore_ascii_case("null"))
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockCacheStore, MockCatalog};

    fn now() -> DateTime<Utc> {
        "2024-06-01T12:00:00Z".parse().unwrap()
    }

    #[tokio::test]
    async fn non_empty_cache_is_returned_without_delta() {
        let store = MockCacheStore::new().with_artists(&["a", "b"]);
        let catalog = MockCatalog::new().with_followed(&["a", "b", "c"]);
        let cache = ArtistCache::new(Duration::hours(24));

        let snapshot = cache.followed_artists(&store, &catalog, now()).await.unwrap();

        assert_eq!(snapshot.all, vec!["a".to_string(), "b".to_string()]);
        assert!(snapshot.new.is_empty());
        assert_eq!(catalog.followed_calls(), 0);
    }

    #[tokio::test]
    async fn expired_empty_cache_fetches_and_marks_everything_new() {
        let store = MockCacheStore::new();
        let catalog = MockCatalog::new().with_followed(&["a", "b"]);
        let cache = ArtistCache::new(Duration::hours(24));
        cache.set_last_refreshed_at(Some(now() - Duration::hours(25)));

        let snapshot = cache.followed_artists(&store, &catalog, now()).await.unwrap();

        assert_eq!(snapshot.all, snapshot.new);
        assert_eq!(snapshot.all.len(), 2);
        assert_eq!(store.artist_ids(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(cache.last_refreshed_at(), Some(now()));
    }

    #[tokio::test]
    async fn never_refreshed_counts_as_expired() {
        let store = MockCacheStore::new();
        let catalog = MockCatalog::new().with_followed(&["a"]);
        let cache = ArtistCache::new(Duration::hours(24));

        let snapshot = cache.followed_artists(&store, &catalog, now()).await.unwrap();

        assert_eq!(snapshot.new, vec!["a".to_string()]);
        assert_eq!(catalog.followed_calls(), 1);
    }

    #[tokio::test]
    async fn empty_cache_within_window_skips_remote_call() {
        let store = MockCacheStore::new();
        let catalog = MockCatalog::new().with_followed(&["a"]);
        let cache = ArtistCache::new(Duration::hours(24));
        cache.set_last_refreshed_at(Some(now() - Duration::hours(23)));

        let snapshot = cache.followed_artists(&store, &catalog, now()).await.unwrap();

        assert!(snapshot.is_empty());
        assert_eq!(catalog.followed_calls(), 0);
    }

    #[tokio::test]
    async fn exactly_ttl_old_refresh_is_still_within_window() {
        let store = MockCacheStore::new();
        let catalog = MockCatalog::new().with_followed(&["a"]);
        let cache = ArtistCache::new(Duration::hours(24));
        cache.set_last_refreshed_at(Some(now() - Duration::hours(24)));

        let snapshot = cache.followed_artists(&store, &catalog, now()).await.unwrap();

        assert!(snapshot.is_empty());
        assert_eq!(catalog.followed_calls(), 0);
    }

    #[tokio::test]
    async fn zero_followed_artists_is_a_configuration_error() {
        let store = MockCacheStore::new();
        let catalog = MockCatalog::new();
        let cache = ArtistCache::new(Duration::hours(24));

        let err = cache
            .followed_artists(&store, &catalog, now())
            .await
            .unwrap_err();

        assert!(matches!(err, DiscoveryError::Config(_)));
        assert_eq!(cache.last_refreshed_at(), None);
    }

    #[test]
    fn null_and_duplicate_ids_are_dropped() {
        let ids = vec!["a".into(), "null".into(), "".into(), "a".into(), "b".into()];
        assert_eq!(clean_ids(ids), vec!["a".to_string(), "b".to_string()]);
    }
}
