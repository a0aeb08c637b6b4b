pub mod error;
pub mod types;

pub use error::{Result, SpotifyError};
pub use types::{
    AddItemsRequest, Artist, ChangePlaylistDetails, CurrentlyPlaying, FollowedArtistsResponse,
    Page, PlayableItem, PlaylistDetails, PlaylistItem, SimplifiedAlbum, SimplifiedTrack,
};

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;

const BASE_URL: &str = "https://api.spotify.com/v1";

/// Largest page size the API accepts for the endpoints used here.
const PAGE_LIMIT: u32 = 50;

/// Maximum number of URIs per "add items to playlist" request.
const MAX_ADD_BATCH: usize = 100;

const ALBUM_GROUPS: &str = "album,single,compilation,appears_on";

/// Thin REST client. Token acquisition and refresh live outside this crate;
/// the caller hands in a valid bearer token.
pub struct SpotifyClient {
    client: reqwest::Client,
    token: String,
    base_url: String,
}

impl SpotifyClient {
    pub fn new(token: String) -> Self {
        Self::with_base_url(token, BASE_URL.to_string())
    }

    pub fn with_base_url(token: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
            base_url,
        }
    }

    /// All artists the current user follows.
    pub async fn followed_artists(&self) -> Result<Vec<Artist>> {
        let mut artists = Vec::new();
        let mut url = Some(format!(
            "{}/me/following?type=artist&limit={}",
            self.base_url, PAGE_LIMIT
        ));
        while let Some(next) = url {
            let page: FollowedArtistsResponse = self.get_json(&next).await?;
            artists.extend(page.artists.items);
            url = page.artists.next;
        }
        tracing::debug!(count = artists.len(), "Fetched followed artists");
        Ok(artists)
    }

    /// Every album listing of an artist across all album groups.
    pub async fn artist_albums(&self, artist_id: &str) -> Result<Vec<SimplifiedAlbum>> {
        let url = format!(
            "{}/artists/{}/albums?include_groups={}&limit={}",
            self.base_url, artist_id, ALBUM_GROUPS, PAGE_LIMIT
        );
        self.get_all_pages(url).await
    }

    pub async fn album_tracks(&self, album_id: &str) -> Result<Vec<SimplifiedTrack>> {
        let url = format!(
            "{}/albums/{}/tracks?limit={}",
            self.base_url, album_id, PAGE_LIMIT
        );
        self.get_all_pages(url).await
    }

    pub async fn playlist(&self, playlist_id: &str) -> Result<PlaylistDetails> {
        let url = format!(
            "{}/playlists/{}?fields=name,description",
            self.base_url, playlist_id
        );
        self.get_json(&url).await
    }

    pub async fn change_playlist_details(
        &self,
        playlist_id: &str,
        details: &ChangePlaylistDetails,
    ) -> Result<()> {
        let url = format!("{}/playlists/{}", self.base_url, playlist_id);
        let resp = self
            .client
            .put(&url)
            .bearer_auth(&self.token)
            .json(details)
            .send()
            .await?;
        check_status(resp).await.map(|_| ())
    }

    /// Insert tracks at the top of a playlist, preserving the given order.
    /// Batches are sent last-first so each lands above the previous one.
    pub async fn add_tracks_to_top(&self, playlist_id: &str, track_ids: &[String]) -> Result<()> {
        let uris: Vec<String> = track_ids
            .iter()
            .map(|id| format!("spotify:track:{id}"))
            .collect();
        for batch in uris.chunks(MAX_ADD_BATCH).rev() {
            let body = AddItemsRequest {
                uris: batch.to_vec(),
                position: 0,
            };
            self.post_json(&format!("{}/playlists/{}/tracks", self.base_url, playlist_id), &body)
                .await?;
        }
        tracing::debug!(playlist_id, count = track_ids.len(), "Added tracks to playlist");
        Ok(())
    }

    /// The topmost `limit` playlist items (most recently added, since new
    /// tracks are always inserted at the top).
    pub async fn playlist_items(&self, playlist_id: &str, limit: u32) -> Result<Vec<PlaylistItem>> {
        let url = format!(
            "{}/playlists/{}/tracks?limit={}",
            self.base_url,
            playlist_id,
            limit.min(PAGE_LIMIT)
        );
        let page: Page<PlaylistItem> = self.get_json(&url).await?;
        Ok(page.items)
    }

    /// `None` when nothing is playing (the API answers 204 No Content).
    pub async fn currently_playing(&self) -> Result<Option<CurrentlyPlaying>> {
        let url = format!("{}/me/player/currently-playing", self.base_url);
        let resp = self.client.get(&url).bearer_auth(&self.token).send().await?;
        if resp.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let resp = check_status(resp).await?;
        let body = resp.text().await?;
        if body.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&body)?))
    }

    async fn get_all_pages<T: DeserializeOwned>(&self, first: String) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut url = Some(first);
        while let Some(next) = url {
            let page: Page<T> = self.get_json(&next).await?;
            items.extend(page.items);
            url = page.next;
        }
        Ok(items)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let resp = self.client.get(url).bearer_auth(&self.token).send().await?;
        let resp = check_status(resp).await?;
        Ok(resp.json().await?)
    }

    async fn post_json<B: Serialize>(&self, url: &str, body: &B) -> Result<()> {
        let resp = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;
        check_status(resp).await.map(|_| ())
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(SpotifyError::from_status(status.as_u16(), body));
    }
    Ok(resp)
}
