use std::collections::BTreeMap;

use serde::Serialize;

use discovery_common::{AlbumTrackPair, Category};

/// Tracks added per category by one crawl. Empty when nothing new was found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrawlReport {
    pub added: BTreeMap<Category, usize>,
}

impl CrawlReport {
    pub fn from_dispatch(dispatch: &BTreeMap<Category, Vec<AlbumTrackPair>>) -> Self {
        let added = dispatch
            .iter()
            .map(|(category, pairs)| (*category, pairs.iter().map(|p| p.tracks.len()).sum()))
            .collect();
        Self { added }
    }

    pub fn total(&self) -> usize {
        self.added.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn count(&self, category: Category) -> usize {
        self.added.get(&category).copied().unwrap_or(0)
    }
}

impl std::fmt::Display for CrawlReport {
    /// `"12 new songs added! [10 Album / 2 Single]"`, or nothing for an empty report.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let total = self.total();
        if total == 0 {
            return Ok(());
        }
        let parts: Vec<String> = self
            .added
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(category, count)| format!("{count} {category}"))
            .collect();
        write!(
            f,
            "{} new song{} added! [{}]",
            total,
            if total > 1 { "s" } else { "" },
            parts.join(" / ")
        )
    }
}
