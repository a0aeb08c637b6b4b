// Release-type reclassification.
//
// The catalog only knows album / single / compilation / appears-on. Remappers
// look at titles and track lists and move releases into the finer EP, Remix
// and Live categories. Chain order is priority order; first match wins.

pub mod ep;
pub mod live;
pub mod remix;

use std::collections::{BTreeMap, HashSet};

use regex::Regex;
use tracing::debug;

use discovery_common::{AlbumTrackPair, ArtistId, Category, Policy, Track};

pub use ep::EpRemapper;
pub use live::LiveRemapper;
pub use remix::RemixRemapper;

pub trait Remapper: Send + Sync {
    /// Category a qualifying release is moved into.
    fn category(&self) -> Category;

    /// Whether releases currently in `category` may be remapped by this remapper.
    fn applies_to(&self, category: Category) -> bool;

    fn qualifies(&self, title: &str, tracks: &[Track]) -> bool;
}

/// A release after classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedPair {
    pub pair: AlbumTrackPair,
    /// Category reported by the catalog.
    pub source: Category,
    /// Category after remapping; equals `source` when no remapper matched.
    pub category: Category,
}

impl ClassifiedPair {
    pub fn is_remapped(&self) -> bool {
        self.source != self.category
    }
}

pub struct RemappingEngine {
    remappers: Vec<Box<dyn Remapper>>,
}

impl RemappingEngine {
    /// The default chain: Remix, then Live, then EP.
    pub fn new(policy: &Policy) -> Self {
        Self::with_remappers(vec![
            Box::new(RemixRemapper::new(policy.remix)),
            Box::new(LiveRemapper::new(policy.live)),
            Box::new(EpRemapper::new(policy.ep)),
        ])
    }

    pub fn with_remappers(remappers: Vec<Box<dyn Remapper>>) -> Self {
        Self { remappers }
    }

    /// Target category of the first eligible remapper that qualifies, if any.
    pub fn remap(&self, current: Category, pair: &AlbumTrackPair) -> Option<Category> {
        if current.is_extended() {
            return None;
        }
        self.remappers
            .iter()
            .filter(|r| r.applies_to(current))
            .find(|r| r.qualifies(&pair.release.title, &pair.tracks))
            .map(|r| r.category())
    }

    /// Group by source category, then remap each group.
    pub fn classify(&self, pairs: Vec<AlbumTrackPair>) -> Vec<ClassifiedPair> {
        let mut classified = Vec::with_capacity(pairs.len());
        for (source, group) in group_by_category(pairs) {
            for pair in group {
                let category = self.remap(source, &pair).unwrap_or(source);
                if category != source {
                    debug!(
                        release = pair.release.title.as_str(),
                        from = %source,
                        to = %category,
                        "Remapped release"
                    );
                }
                classified.push(ClassifiedPair {
                    pair,
                    source,
                    category,
                });
            }
        }
        classified
    }
}

pub fn group_by_category(pairs: Vec<AlbumTrackPair>) -> BTreeMap<Category, Vec<AlbumTrackPair>> {
    let mut grouped: BTreeMap<Category, Vec<AlbumTrackPair>> = BTreeMap::new();
    for pair in pairs {
        grouped.entry(pair.release.category).or_default().push(pair);
    }
    grouped
}

/// Drop appears-on credits on releases whose primary artist is followed:
/// those releases already arrive through that artist's own catalog.
pub fn filter_appears_on(
    classified: Vec<ClassifiedPair>,
    followed: &HashSet<ArtistId>,
) -> Vec<ClassifiedPair> {
    classified
        .into_iter()
        .filter(|c| {
            c.source != Category::AppearsOn
                || !c
                    .pair
                    .release
                    .primary_artist()
                    .is_some_and(|artist| followed.contains(artist))
        })
        .collect()
}

/// Share of track names matching `pattern`. `None` for an empty track list.
pub(crate) fn matching_ratio(pattern: &Regex, tracks: &[Track]) -> Option<f64> {
    if tracks.is_empty() {
        return None;
    }
    let matching = tracks.iter().filter(|t| pattern.is_match(&t.name)).count();
    Some(matching as f64 / tracks.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{pair, pair_with_names, release};

    #[test]
    fn unmatched_releases_keep_their_category() {
        let engine = RemappingEngine::new(&Policy::default());
        let classified = engine.classify(vec![pair_with_names(
            release("r1", "Mathematik", Category::Single, &["a"]),
            &["Mathematik"],
        )]);
        assert_eq!(classified.len(), 1);
        assert_eq!(classified[0].category, Category::Single);
        assert!(!classified[0].is_remapped());
    }

    #[test]
    fn concert_album_is_remapped_to_live() {
        let engine = RemappingEngine::new(&Policy::default());
        let names: Vec<String> = (1..=10)
            .map(|i| {
                if i <= 8 {
                    format!("Song {i} - Live")
                } else {
                    format!("Song {i}")
                }
            })
            .collect();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        let classified = engine.classify(vec![pair_with_names(
            release("wembley", "Concert Live at Wembley", Category::Album, &["a"]),
            &names,
        )]);
        assert_eq!(classified[0].source, Category::Album);
        assert_eq!(classified[0].category, Category::Live);
    }

    #[test]
    fn first_qualifying_remapper_wins() {
        // Five remix tracks on a single qualify for both Remix and EP.
        let engine = RemappingEngine::new(&Policy::default());
        let classified = engine.classify(vec![pair_with_names(
            release("r1", "Auslaender (Remixes)", Category::Single, &["a"]),
            &["A (RMX)", "B Remix", "C Remix", "D Remix", "E Remix"],
        )]);
        assert_eq!(classified[0].category, Category::Remix);
    }

    #[test]
    fn extended_categories_are_never_remapped_again() {
        let engine = RemappingEngine::new(&Policy::default());
        let p = pair(release("r1", "Remixes", Category::Live, &["a"]), 4);
        assert_eq!(engine.remap(Category::Live, &p), None);
    }

    #[test]
    fn empty_chain_changes_nothing() {
        let engine = RemappingEngine::with_remappers(Vec::new());
        let p = pair_with_names(
            release("r1", "Remixes", Category::Album, &["a"]),
            &["x Remix"],
        );
        assert_eq!(engine.remap(Category::Album, &p), None);
    }

    #[test]
    fn appears_on_credits_on_followed_artists_releases_are_dropped() {
        let engine = RemappingEngine::new(&Policy::default());
        let followed: HashSet<ArtistId> = ["a".to_string(), "b".to_string()].into();
        let classified = engine.classify(vec![
            pair(release("collab", "Split", Category::AppearsOn, &["b", "a"]), 3),
            pair(release("guest", "Guest Spot", Category::AppearsOn, &["x", "a"]), 3),
            pair(release("own", "Own Album", Category::Album, &["a"]), 3),
        ]);

        let kept = filter_appears_on(classified, &followed);
        let ids: Vec<&str> = kept.iter().map(|c| c.pair.release.id.as_str()).collect();
        assert_eq!(ids, vec!["own", "guest"]);
    }

    #[test]
    fn ratio_of_empty_track_list_is_undefined() {
        let re = Regex::new("x").unwrap();
        assert_eq!(matching_ratio(&re, &[]), None);
    }
}
