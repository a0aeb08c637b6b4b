use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// --- Paging envelopes ---

/// A page of results. Offset and cursor paging both expose the follow-up
/// request as a ready-made `next` URL.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FollowedArtistsResponse {
    pub artists: Page<Artist>,
}

// --- Catalog objects ---

#[derive(Debug, Clone, Deserialize)]
pub struct Artist {
    pub id: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimplifiedAlbum {
    pub id: String,
    pub name: String,
    /// Relation of the album to the queried artist (`album`, `single`,
    /// `compilation`, `appears_on`). Only present on artist album listings.
    pub album_group: Option<String>,
    pub album_type: String,
    pub artists: Vec<Artist>,
    pub release_date: String,
    pub release_date_precision: String,
    pub total_tracks: u32,
}

impl SimplifiedAlbum {
    /// Release date with missing month/day filled with the first of the period.
    pub fn parsed_release_date(&self) -> Option<NaiveDate> {
        parse_release_date(&self.release_date, &self.release_date_precision)
    }
}

pub fn parse_release_date(raw: &str, precision: &str) -> Option<NaiveDate> {
    match precision {
        "year" => raw
            .parse::<i32>()
            .ok()
            .and_then(|y| NaiveDate::from_ymd_opt(y, 1, 1)),
        "month" => NaiveDate::parse_from_str(&format!("{raw}-01"), "%Y-%m-%d").ok(),
        _ => NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok(),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimplifiedTrack {
    pub id: Option<String>,
    pub name: String,
    pub duration_ms: u32,
}

// --- Playlists ---

#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistDetails {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ChangePlaylistDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AddItemsRequest {
    pub uris: Vec<String>,
    pub position: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistItem {
    pub added_at: Option<DateTime<Utc>>,
    pub track: Option<PlayableItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlayableItem {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub item_type: String,
}

// --- Player ---

#[derive(Debug, Clone, Deserialize)]
pub struct CurrentlyPlaying {
    pub item: Option<PlayableItem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_dates_fill_missing_precision() {
        assert_eq!(
            parse_release_date("2019", "year"),
            NaiveDate::from_ymd_opt(2019, 1, 1)
        );
        assert_eq!(
            parse_release_date("2019-07", "month"),
            NaiveDate::from_ymd_opt(2019, 7, 1)
        );
        assert_eq!(
            parse_release_date("2019-07-12", "day"),
            NaiveDate::from_ymd_opt(2019, 7, 12)
        );
        assert_eq!(parse_release_date("soon", "day"), None);
    }

    #[test]
    fn playlist_item_tolerates_missing_track() {
        let item: PlaylistItem =
            serde_json::from_str(r#"{"added_at": "2024-03-01T10:00:00Z", "track": null}"#)
                .unwrap();
        assert!(item.track.is_none());
        assert!(item.added_at.is_some());
    }

    #[test]
    fn change_details_omits_unset_fields() {
        let body = ChangePlaylistDetails {
            name: Some("⚪ New Albums".into()),
            description: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json, serde_json::json!({"name": "⚪ New Albums"}));
    }
}
