use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub type ArtistId = String;

// --- Categories ---

/// Release category. The derive order is the display/processing order of
/// target stores: Album < Single < EP < Remix < Live < Compilation < AppearsOn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Album,
    Single,
    Ep,
    Remix,
    Live,
    Compilation,
    AppearsOn,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Album,
        Category::Single,
        Category::Ep,
        Category::Remix,
        Category::Live,
        Category::Compilation,
        Category::AppearsOn,
    ];

    /// Categories that only exist through remapping; the catalog never reports them.
    pub fn is_extended(self) -> bool {
        matches!(self, Category::Ep | Category::Remix | Category::Live)
    }

    /// Config key suffix, e.g. `PLAYLIST_APPEARS_ON`.
    pub fn env_key(self) -> &'static str {
        match self {
            Category::Album => "ALBUM",
            Category::Single => "SINGLE",
            Category::Ep => "EP",
            Category::Remix => "REMIX",
            Category::Live => "LIVE",
            Category::Compilation => "COMPILATION",
            Category::AppearsOn => "APPEARS_ON",
        }
    }

    /// Parse the catalog's `album_group` / `album_type` string.
    pub fn from_source(raw: &str) -> Option<Category> {
        match raw.to_ascii_lowercase().as_str() {
            "album" => Some(Category::Album),
            "single" => Some(Category::Single),
            "compilation" => Some(Category::Compilation),
            "appears_on" => Some(Category::AppearsOn),
            _ => None,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::Album => write!(f, "Album"),
            Category::Single => write!(f, "Single"),
            Category::Ep => write!(f, "EP"),
            Category::Remix => write!(f, "Remix"),
            Category::Live => write!(f, "Live"),
            Category::Compilation => write!(f, "Compilation"),
            Category::AppearsOn => write!(f, "Appears On"),
        }
    }
}

// --- Catalog entities ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub id: String,
    pub title: String,
    /// Category as reported by the catalog. Never an extended category.
    pub category: Category,
    pub artist_ids: Vec<ArtistId>,
    pub release_date: NaiveDate,
    pub track_count: u32,
    /// Followed artist whose catalog listed this release. For appears-on
    /// credits this differs from the primary artist.
    #[serde(default)]
    pub listed_by: ArtistId,
}

impl Release {
    pub fn primary_artist(&self) -> Option<&str> {
        self.artist_ids.first().map(String::as_str)
    }

    /// Identity of a release across regional re-issues: same artist set, same
    /// title modulo case and surrounding whitespace.
    pub fn name_signature(&self) -> String {
        let mut artists: Vec<&str> = self.artist_ids.iter().map(String::as_str).collect();
        artists.sort_unstable();
        artists.dedup();
        format!("{}|{}", artists.join(","), self.title.trim().to_lowercase())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub name: String,
    pub release_id: String,
    pub duration_ms: u32,
}

/// A release together with its tracks; the unit passed through remapping and dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumTrackPair {
    pub release: Release,
    pub tracks: Vec<Track>,
}

impl AlbumTrackPair {
    pub fn new(release: Release, tracks: Vec<Track>) -> Self {
        debug_assert!(tracks.iter().all(|t| t.release_id == release.id));
        Self { release, tracks }
    }

    pub fn track_ids(&self) -> impl Iterator<Item = &str> {
        self.tracks.iter().map(|t| t.id.as_str())
    }

    /// Insertion order within a collection: oldest release first, then title.
    pub fn cmp_for_insertion(&self, other: &Self) -> std::cmp::Ordering {
        self.release
            .release_date
            .cmp(&other.release.release_date)
            .then_with(|| self.release.title.cmp(&other.release.title))
    }
}

// --- Collections ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionDetails {
    pub title: String,
    pub description: String,
}

/// Partial update of a collection. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
}

impl CollectionUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentItem {
    pub item_id: String,
    pub added_at: chrono::DateTime<chrono::Utc>,
}
