// Test mocks for the discovery pipeline.
//
// Three mocks matching the three trait boundaries:
// - MockCatalog (MusicCatalog): in-memory artists, releases, collections, player
// - MockCacheStore (CacheStore): in-memory append-only sets
// - RecordingRelay (ResultRelay): keeps every report it receives
//
// Plus helpers for constructing releases, tracks and album/track pairs.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;

use discovery_common::{
    AlbumTrackPair, ArtistId, Category, CollectionDetails, CollectionUpdate, DiscoveryError,
    RecentItem, Release, Result, Track,
};

use crate::report::CrawlReport;
use crate::traits::{CacheStore, MusicCatalog, ResultRelay};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Release dated 2024-05-01.
pub fn release(id: &str, title: &str, category: Category, artists: &[&str]) -> Release {
    release_on(id, title, category, artists, "2024-05-01")
}

pub fn release_on(
    id: &str,
    title: &str,
    category: Category,
    artists: &[&str],
    date: &str,
) -> Release {
    Release {
        id: id.to_string(),
        title: title.to_string(),
        category,
        artist_ids: artists.iter().map(|a| a.to_string()).collect(),
        release_date: date.parse::<NaiveDate>().unwrap(),
        track_count: 0,
        listed_by: artists.first().map(|a| a.to_string()).unwrap_or_default(),
    }
}

/// Tracks of 3.5 minutes each.
pub fn tracks_named(release_id: &str, names: &[&str]) -> Vec<Track> {
    names
        .iter()
        .enumerate()
        .map(|(i, name)| Track {
            id: format!("{release_id}-t{}", i + 1),
            name: name.to_string(),
            release_id: release_id.to_string(),
            duration_ms: 210_000,
        })
        .collect()
}

pub fn tracks_with_minutes(release_id: &str, minutes: &[u32]) -> Vec<Track> {
    minutes
        .iter()
        .enumerate()
        .map(|(i, m)| Track {
            id: format!("{release_id}-t{}", i + 1),
            name: format!("Track {}", i + 1),
            release_id: release_id.to_string(),
            duration_ms: m * 60_000,
        })
        .collect()
}

/// Pair with `n` plainly named tracks ("Track 1", "Track 2", ...).
pub fn pair(mut release: Release, n: usize) -> AlbumTrackPair {
    let names: Vec<String> = (1..=n).map(|i| format!("Track {i}")).collect();
    let names: Vec<&str> = names.iter().map(String::as_str).collect();
    release.track_count = n as u32;
    let tracks = tracks_named(&release.id, &names);
    AlbumTrackPair::new(release, tracks)
}

pub fn pair_with_names(mut release: Release, names: &[&str]) -> AlbumTrackPair {
    release.track_count = names.len() as u32;
    let tracks = tracks_named(&release.id, names);
    AlbumTrackPair::new(release, tracks)
}

// ---------------------------------------------------------------------------
// MockCatalog
// ---------------------------------------------------------------------------

/// In-memory music catalog. Unknown collections fail with a remote error.
/// Builder pattern: `.with_followed()`, `.with_releases()`, `.with_collection()`, ...
pub struct MockCatalog {
    followed: Vec<ArtistId>,
    failing_followed: bool,
    releases: HashMap<ArtistId, Vec<Release>>,
    tracks: HashMap<String, Vec<Track>>,
    failing_artists: HashSet<ArtistId>,
    release_delay: Option<Duration>,
    collections: Mutex<HashMap<String, CollectionDetails>>,
    recent: HashMap<String, Vec<RecentItem>>,
    playing: Option<String>,
    failing_playback: bool,
    added: Mutex<HashMap<String, Vec<String>>>,
    followed_calls: AtomicUsize,
    release_calls: AtomicUsize,
    recent_items_calls: AtomicUsize,
}

impl Default for MockCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCatalog {
    pub fn new() -> Self {
        Self {
            followed: Vec::new(),
            failing_followed: false,
            releases: HashMap::new(),
            tracks: HashMap::new(),
            failing_artists: HashSet::new(),
            release_delay: None,
            collections: Mutex::new(HashMap::new()),
            recent: HashMap::new(),
            playing: None,
            failing_playback: false,
            added: Mutex::new(HashMap::new()),
            followed_calls: AtomicUsize::new(0),
            release_calls: AtomicUsize::new(0),
            recent_items_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_followed(mut self, artists: &[&str]) -> Self {
        self.followed = artists.iter().map(|a| a.to_string()).collect();
        self
    }

    /// Fetching followed artists fails with a remote error.
    pub fn failing_followed(mut self) -> Self {
        self.failing_followed = true;
        self
    }

    /// List `pairs` under `artist` and serve their tracks. Listed releases
    /// report `artist` as `listed_by`.
    pub fn with_releases(mut self, artist: &str, pairs: Vec<AlbumTrackPair>) -> Self {
        for p in pairs {
            self.tracks.insert(p.release.id.clone(), p.tracks);
            self.releases
                .entry(artist.to_string())
                .or_default()
                .push(p.release);
        }
        self
    }

    /// Listing this artist's releases fails with a remote error.
    pub fn failing_artist(mut self, artist: &str) -> Self {
        self.failing_artists.insert(artist.to_string());
        self
    }

    /// Delay every release listing, to keep a crawl in flight.
    pub fn with_release_delay(mut self, delay: Duration) -> Self {
        self.release_delay = Some(delay);
        self
    }

    pub fn with_collection(self, id: &str, title: &str, description: &str) -> Self {
        self.collections.lock().unwrap().insert(
            id.to_string(),
            CollectionDetails {
                title: title.to_string(),
                description: description.to_string(),
            },
        );
        self
    }

    pub fn with_recent_items(mut self, collection_id: &str, items: Vec<RecentItem>) -> Self {
        self.recent.insert(collection_id.to_string(), items);
        self
    }

    pub fn with_currently_playing(mut self, track_id: &str) -> Self {
        self.playing = Some(track_id.to_string());
        self
    }

    pub fn failing_playback(mut self) -> Self {
        self.failing_playback = true;
        self
    }

    pub fn collection_details(&self, id: &str) -> Option<CollectionDetails> {
        self.collections.lock().unwrap().get(id).cloned()
    }

    /// Track ids inserted into a collection, in insertion order.
    pub fn added_tracks(&self, collection_id: &str) -> Vec<String> {
        self.added
            .lock()
            .unwrap()
            .get(collection_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn followed_calls(&self) -> usize {
        self.followed_calls.load(Ordering::SeqCst)
    }

    pub fn release_calls(&self) -> usize {
        self.release_calls.load(Ordering::SeqCst)
    }

    pub fn recent_items_calls(&self) -> usize {
        self.recent_items_calls.load(Ordering::SeqCst)
    }

    fn unknown(what: &str, id: &str) -> DiscoveryError {
        DiscoveryError::Remote(format!("MockCatalog: no {what} registered for {id}"))
    }
}

#[async_trait]
impl MusicCatalog for MockCatalog {
    async fn followed_artists(&self) -> Result<Vec<ArtistId>> {
        self.followed_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_followed {
            return Err(DiscoveryError::Remote("MockCatalog: followed artists unavailable".into()));
        }
        Ok(self.followed.clone())
    }

    async fn artist_releases(&self, artist_id: &str) -> Result<Vec<Release>> {
        self.release_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.release_delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing_artists.contains(artist_id) {
            return Err(Self::unknown("releases", artist_id));
        }
        let mut releases = self.releases.get(artist_id).cloned().unwrap_or_default();
        for release in &mut releases {
            release.listed_by = artist_id.to_string();
        }
        Ok(releases)
    }

    async fn release_tracks(&self, release: &Release) -> Result<Vec<Track>> {
        Ok(self.tracks.get(&release.id).cloned().unwrap_or_default())
    }

    async fn collection(&self, collection_id: &str) -> Result<CollectionDetails> {
        self.collection_details(collection_id)
            .ok_or_else(|| Self::unknown("collection", collection_id))
    }

    async fn update_collection(
        &self,
        collection_id: &str,
        update: &CollectionUpdate,
    ) -> Result<()> {
        let mut collections = self.collections.lock().unwrap();
        let details = collections
            .get_mut(collection_id)
            .ok_or_else(|| Self::unknown("collection", collection_id))?;
        if let Some(title) = &update.title {
            details.title = title.clone();
        }
        if let Some(description) = &update.description {
            details.description = description.clone();
        }
        Ok(())
    }

    async fn add_tracks(&self, collection_id: &str, track_ids: &[String]) -> Result<()> {
        if self.collection_details(collection_id).is_none() {
            return Err(Self::unknown("collection", collection_id));
        }
        self.added
            .lock()
            .unwrap()
            .entry(collection_id.to_string())
            .or_default()
            .extend(track_ids.iter().cloned());
        Ok(())
    }

    async fn recent_items(&self, collection_id: &str, limit: u32) -> Result<Vec<RecentItem>> {
        self.recent_items_calls.fetch_add(1, Ordering::SeqCst);
        let mut items = self.recent.get(collection_id).cloned().unwrap_or_default();
        items.truncate(limit as usize);
        Ok(items)
    }

    async fn currently_playing(&self) -> Result<Option<String>> {
        if self.failing_playback {
            return Err(DiscoveryError::Remote("MockCatalog: player unavailable".into()));
        }
        Ok(self.playing.clone())
    }
}

// ---------------------------------------------------------------------------
// MockCacheStore
// ---------------------------------------------------------------------------

/// In-memory cache store. `.failing_writes()` makes every append fail.
#[derive(Default)]
pub struct MockCacheStore {
    artists: Mutex<Vec<ArtistId>>,
    release_ids: Mutex<HashSet<String>>,
    release_names: Mutex<HashSet<String>>,
    failing_writes: bool,
}

impl MockCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_artists(self, artists: &[&str]) -> Self {
        self.artists
            .lock()
            .unwrap()
            .extend(artists.iter().map(|a| a.to_string()));
        self
    }

    pub fn with_releases(self, releases: &[&Release]) -> Self {
        for r in releases {
            self.release_ids.lock().unwrap().insert(r.id.clone());
            self.release_names.lock().unwrap().insert(r.name_signature());
        }
        self
    }

    pub fn failing_writes(mut self) -> Self {
        self.failing_writes = true;
        self
    }

    pub fn artist_ids(&self) -> Vec<ArtistId> {
        self.artists.lock().unwrap().clone()
    }

    pub fn release_ids(&self) -> HashSet<String> {
        self.release_ids.lock().unwrap().clone()
    }

    pub fn release_names(&self) -> HashSet<String> {
        self.release_names.lock().unwrap().clone()
    }

    fn check_writable(&self) -> Result<()> {
        if self.failing_writes {
            return Err(DiscoveryError::Other(anyhow::anyhow!(
                "MockCacheStore: writes disabled"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl CacheStore for MockCacheStore {
    async fn cached_artist_ids(&self) -> Result<Vec<ArtistId>> {
        Ok(self.artist_ids())
    }

    async fn cached_release_ids(&self) -> Result<HashSet<String>> {
        Ok(self.release_ids())
    }

    async fn cached_release_names(&self) -> Result<HashSet<String>> {
        Ok(self.release_names())
    }

    async fn append_artist_ids(&self, ids: &[ArtistId]) -> Result<()> {
        self.check_writable()?;
        let mut artists = self.artists.lock().unwrap();
        for id in ids {
            if !artists.contains(id) {
                artists.push(id.clone());
            }
        }
        Ok(())
    }

    async fn append_release_ids(&self, ids: &[String]) -> Result<()> {
        self.check_writable()?;
        self.release_ids.lock().unwrap().extend(ids.iter().cloned());
        Ok(())
    }

    async fn append_release_names(&self, names: &[String]) -> Result<()> {
        self.check_writable()?;
        self.release_names
            .lock()
            .unwrap()
            .extend(names.iter().cloned());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RecordingRelay
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingRelay {
    reports: Mutex<Vec<CrawlReport>>,
}

impl RecordingRelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<CrawlReport> {
        self.reports.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResultRelay for RecordingRelay {
    async fn relay(&self, report: &CrawlReport) -> anyhow::Result<()> {
        self.reports.lock().unwrap().push(report.clone());
        Ok(())
    }
}
