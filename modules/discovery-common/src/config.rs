use std::collections::{BTreeMap, HashMap, HashSet};
use std::env;
use std::path::Path;
use std::str::FromStr;

use chrono::Duration;

use crate::error::{DiscoveryError, Result};
use crate::types::{ArtistId, Category};

/// Ratio thresholds for pattern-based remappers. Both are strict-greater.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatioThresholds {
    /// Required share of matching track names when the title itself matches.
    pub title_match: f64,
    /// Required share of matching track names when the title does not match.
    pub title_mismatch: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpThresholds {
    pub min_tracks: usize,
    pub min_tracks_lesser: usize,
    /// Total runtime required when only `min_tracks_lesser` is met.
    pub min_duration_lesser: Duration,
}

/// Tunable policy values. Product decisions, not structural invariants.
#[derive(Debug, Clone, PartialEq)]
pub struct Policy {
    /// How long an empty artist cache waits before re-fetching followed artists.
    pub artist_cache_ttl: Duration,
    /// Age after which a "new" marker is considered read.
    pub notifier_timeout: Duration,
    /// How many recently added collection items are inspected when clearing markers.
    pub recent_items_limit: u32,
    pub remix: RatioThresholds,
    pub live: RatioThresholds,
    pub ep: EpThresholds,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            artist_cache_ttl: Duration::hours(24),
            notifier_timeout: Duration::days(31),
            recent_items_limit: 50,
            remix: RatioThresholds {
                title_match: 0.2,
                title_mismatch: 0.65,
            },
            live: RatioThresholds {
                title_match: 0.5,
                title_mismatch: 0.65,
            },
            ep: EpThresholds {
                min_tracks: 5,
                min_tracks_lesser: 3,
                min_duration_lesser: Duration::minutes(20),
            },
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Remote catalog
    pub spotify_access_token: String,

    // Durable cache
    pub database_url: String,

    // Target collections. Categories without an entry are disabled.
    pub collection_ids: BTreeMap<Category, String>,
    pub blacklist: HashMap<ArtistId, HashSet<Category>>,

    // Crawl behaviour
    pub max_concurrency: usize,
    pub crawl_interval_secs: u64,
    pub notifier_interval_secs: u64,
    pub lookback_days: Option<u32>,
    pub keep_source_copy: bool,
    pub markers_enabled: bool,

    // Reporting
    pub relay_url: Option<String>,

    pub policy: Policy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            spotify_access_token: String::new(),
            database_url: String::new(),
            collection_ids: BTreeMap::new(),
            blacklist: HashMap::new(),
            max_concurrency: 10,
            crawl_interval_secs: 30 * 60,
            notifier_interval_secs: 60,
            lookback_days: None,
            keep_source_copy: false,
            markers_enabled: true,
            relay_url: None,
            policy: Policy::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let mut collection_ids = BTreeMap::new();
        for category in Category::ALL {
            let key = format!("PLAYLIST_{}", category.env_key());
            if let Some(id) = optional_env(&key) {
                collection_ids.insert(category, id);
            }
        }

        let blacklist = match optional_env("ARTIST_BLACKLIST_FILE") {
            Some(path) => load_blacklist(Path::new(&path))?,
            None => HashMap::new(),
        };

        let mut policy = Policy::default();
        if let Some(hours) = parse_env::<i64>("ARTIST_CACHE_TTL_HOURS")? {
            policy.artist_cache_ttl = Duration::hours(hours);
        }
        if let Some(days) = parse_env::<i64>("NOTIFIER_TIMEOUT_DAYS")? {
            policy.notifier_timeout = Duration::days(days);
        }

        let config = Self {
            spotify_access_token: required_env("SPOTIFY_ACCESS_TOKEN")?,
            database_url: required_env("DATABASE_URL")?,
            collection_ids,
            blacklist,
            max_concurrency: parse_env("MAX_CONCURRENCY")?.unwrap_or(defaults.max_concurrency),
            crawl_interval_secs: parse_env("CRAWL_INTERVAL_SECS")?
                .unwrap_or(defaults.crawl_interval_secs),
            notifier_interval_secs: parse_env("NOTIFIER_INTERVAL_SECS")?
                .unwrap_or(defaults.notifier_interval_secs),
            lookback_days: parse_env("LOOKBACK_DAYS")?,
            keep_source_copy: parse_env("KEEP_SOURCE_COPY")?.unwrap_or(defaults.keep_source_copy),
            markers_enabled: parse_env("MARKERS_ENABLED")?.unwrap_or(defaults.markers_enabled),
            relay_url: optional_env("RELAY_URL"),
            policy,
        };

        if config.max_concurrency == 0 {
            return Err(DiscoveryError::Config(
                "MAX_CONCURRENCY must be at least 1".to_string(),
            ));
        }

        Ok(config)
    }

    /// Log the loaded configuration without leaking secrets.
    pub fn log_redacted(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  SPOTIFY_ACCESS_TOKEN: {}", preview(&self.spotify_access_token));
        tracing::info!("  DATABASE_URL: {}", preview(&self.database_url));
        for category in Category::ALL {
            match self.collection_ids.get(&category) {
                Some(id) => tracing::info!("  PLAYLIST_{}: {}", category.env_key(), id),
                None => tracing::warn!("  PLAYLIST_{}: <disabled>", category.env_key()),
            }
        }
        tracing::info!(
            max_concurrency = self.max_concurrency,
            crawl_interval_secs = self.crawl_interval_secs,
            notifier_interval_secs = self.notifier_interval_secs,
            lookback_days = ?self.lookback_days,
            keep_source_copy = self.keep_source_copy,
            markers_enabled = self.markers_enabled,
            blacklisted_artists = self.blacklist.len(),
            relay = self.relay_url.is_some(),
            "Crawl settings"
        );
    }
}

/// First few characters of a secret plus its length, safe to log.
fn preview(val: &str) -> String {
    let head: String = val.chars().take(5).collect();
    format!("{head}...({} chars)", val.chars().count())
}

/// Parse a JSON blacklist of the form `{"<artist id>": ["single", "appears_on"]}`.
pub fn load_blacklist(path: &Path) -> Result<HashMap<ArtistId, HashSet<Category>>> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        DiscoveryError::Config(format!("Failed to read blacklist {}: {e}", path.display()))
    })?;
    parse_blacklist(&raw)
        .map_err(|e| DiscoveryError::Config(format!("Invalid blacklist {}: {e}", path.display())))
}

pub fn parse_blacklist(raw: &str) -> serde_json::Result<HashMap<ArtistId, HashSet<Category>>> {
    serde_json::from_str(raw)
}

fn required_env(key: &str) -> Result<String> {
    optional_env(key)
        .ok_or_else(|| DiscoveryError::Config(format!("{key} environment variable is required")))
}

fn optional_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env<T: FromStr>(key: &str) -> Result<Option<T>> {
    match optional_env(key) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| DiscoveryError::Config(format!("{key} has an invalid value: {raw}"))),
        None => Ok(None),
    }
}
