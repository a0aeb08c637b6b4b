// Trait boundaries of the discovery pipeline.
//
// MusicCatalog: every remote call the crawl makes (catalog reads, playlist writes, player).
// CacheStore: durable, append-only memory of artists and releases already handled.
// ResultRelay: fire-and-forget sink for the per-category crawl report.
//
// Mocks for all three live in `testing` so the pipeline runs without network or database.

use std::collections::HashSet;

use async_trait::async_trait;
use tracing::debug;

use discovery_common::{
    ArtistId, Category, CollectionDetails, CollectionUpdate, DiscoveryError, RecentItem, Release,
    Result, Track,
};
use spotify_client::{ChangePlaylistDetails, SimplifiedAlbum, SpotifyClient, SpotifyError};

use crate::report::CrawlReport;

// ---------------------------------------------------------------------------
// MusicCatalog
// ---------------------------------------------------------------------------

#[async_trait]
pub trait MusicCatalog: Send + Sync {
    /// Ids of all artists the user follows.
    async fn followed_artists(&self) -> Result<Vec<ArtistId>>;

    /// Every release listed for an artist, including appears-on credits.
    async fn artist_releases(&self, artist_id: &str) -> Result<Vec<Release>>;

    async fn release_tracks(&self, release: &Release) -> Result<Vec<Track>>;

    async fn collection(&self, collection_id: &str) -> Result<CollectionDetails>;

    async fn update_collection(&self, collection_id: &str, update: &CollectionUpdate)
        -> Result<()>;

    /// Insert tracks at the top of a collection, keeping the given order.
    async fn add_tracks(&self, collection_id: &str, track_ids: &[String]) -> Result<()>;

    /// The `limit` most recently added items of a collection.
    async fn recent_items(&self, collection_id: &str, limit: u32) -> Result<Vec<RecentItem>>;

    /// Id of the track currently playing for the user, if any.
    async fn currently_playing(&self) -> Result<Option<String>>;
}

/// A rejected token fails every later call too, so it aborts the crawl
/// instead of degrading one release at a time.
fn catalog_error(err: SpotifyError) -> DiscoveryError {
    match err {
        SpotifyError::Unauthorized(_) => DiscoveryError::Config(err.to_string()),
        _ => DiscoveryError::Remote(err.to_string()),
    }
}

fn to_release(album: SimplifiedAlbum, listed_by: &str) -> Option<Release> {
    let group = album.album_group.as_deref().unwrap_or(&album.album_type);
    let Some(category) = Category::from_source(group) else {
        debug!(album_id = album.id.as_str(), group, "Skipping album with unknown group");
        return None;
    };
    let Some(release_date) = album.parsed_release_date() else {
        debug!(
            album_id = album.id.as_str(),
            raw = album.release_date.as_str(),
            "Skipping album with unparsable release date"
        );
        return None;
    };
    Some(Release {
        id: album.id,
        title: album.name,
        category,
        artist_ids: album.artists.into_iter().filter_map(|a| a.id).collect(),
        release_date,
        track_count: album.total_tracks,
        listed_by: listed_by.to_string(),
    })
}

#[async_trait]
impl MusicCatalog for SpotifyClient {
    async fn followed_artists(&self) -> Result<Vec<ArtistId>> {
        let artists = SpotifyClient::followed_artists(self).await.map_err(catalog_error)?;
        Ok(artists
            .into_iter()
            .filter_map(|a| a.id)
            .filter(|id| !id.is_empty() && !id.eq_ignore_ascii_case("null"))
            .collect())
    }

    async fn artist_releases(&self, artist_id: &str) -> Result<Vec<Release>> {
        let albums = self.artist_albums(artist_id).await.map_err(catalog_error)?;
        Ok(albums
            .into_iter()
            .filter_map(|album| to_release(album, artist_id))
            .collect())
    }

    async fn release_tracks(&self, release: &Release) -> Result<Vec<Track>> {
        let tracks = self.album_tracks(&release.id).await.map_err(catalog_error)?;
        Ok(tracks
            .into_iter()
            .filter_map(|t| {
                Some(Track {
                    id: t.id?,
                    name: t.name,
                    release_id: release.id.clone(),
                    duration_ms: t.duration_ms,
                })
            })
            .collect())
    }

    async fn collection(&self, collection_id: &str) -> Result<CollectionDetails> {
        let playlist = self.playlist(collection_id).await.map_err(catalog_error)?;
        Ok(CollectionDetails {
            title: playlist.name,
            description: playlist.description.unwrap_or_default(),
        })
    }

    async fn update_collection(
        &self,
        collection_id: &str,
        update: &CollectionUpdate,
    ) -> Result<()> {
        let details = ChangePlaylistDetails {
            name: update.title.clone(),
            description: update.description.clone(),
        };
        self.change_playlist_details(collection_id, &details)
            .await
            .map_err(catalog_error)
    }

    async fn add_tracks(&self, collection_id: &str, track_ids: &[String]) -> Result<()> {
        self.add_tracks_to_top(collection_id, track_ids)
            .await
            .map_err(catalog_error)
    }

    async fn recent_items(&self, collection_id: &str, limit: u32) -> Result<Vec<RecentItem>> {
        let items = self
            .playlist_items(collection_id, limit)
            .await
            .map_err(catalog_error)?;
        Ok(items
            .into_iter()
            .filter_map(|item| {
                Some(RecentItem {
                    item_id: item.track?.id?,
                    added_at: item.added_at?,
                })
            })
            .collect())
    }

    async fn currently_playing(&self) -> Result<Option<String>> {
        let playing = SpotifyClient::currently_playing(self).await.map_err(catalog_error)?;
        Ok(playing
            .and_then(|p| p.item)
            .filter(|item| item.item_type == "track")
            .and_then(|item| item.id))
    }
}

// ---------------------------------------------------------------------------
// CacheStore
// ---------------------------------------------------------------------------

#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn cached_artist_ids(&self) -> Result<Vec<ArtistId>>;

    async fn cached_release_ids(&self) -> Result<HashSet<String>>;

    /// Name signatures (see `Release::name_signature`) of handled releases.
    async fn cached_release_names(&self) -> Result<HashSet<String>>;

    async fn append_artist_ids(&self, ids: &[ArtistId]) -> Result<()>;

    async fn append_release_ids(&self, ids: &[String]) -> Result<()>;

    async fn append_release_names(&self, names: &[String]) -> Result<()>;
}

// ---------------------------------------------------------------------------
// ResultRelay
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ResultRelay: Send + Sync {
    async fn relay(&self, report: &CrawlReport) -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_token_is_not_recoverable() {
        let err = catalog_error(SpotifyError::from_status(401, "token expired".into()));
        assert!(matches!(err, DiscoveryError::Config(_)));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn other_catalog_failures_are_recoverable() {
        let err = catalog_error(SpotifyError::from_status(503, "unavailable".into()));
        assert!(matches!(err, DiscoveryError::Remote(_)));
        assert!(err.is_recoverable());
    }
}
