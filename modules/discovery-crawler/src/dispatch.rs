use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::debug;

use discovery_common::{AlbumTrackPair, ArtistId, Category};

use crate::remap::ClassifiedPair;
use crate::targets::TargetStores;

/// Decides which target stores receive each classified release.
pub struct TargetMapper {
    keep_source_copy: bool,
    blacklist: HashMap<ArtistId, HashSet<Category>>,
}

impl TargetMapper {
    pub fn new(keep_source_copy: bool, blacklist: HashMap<ArtistId, HashSet<Category>>) -> Self {
        Self {
            keep_source_copy,
            blacklist,
        }
    }

    /// Store categories a release goes to, before disabled stores and
    /// blacklists are applied.
    fn destinations(&self, classified: &ClassifiedPair, stores: &TargetStores) -> Vec<Category> {
        if !classified.is_remapped() {
            return vec![classified.source];
        }
        if !stores.is_enabled(classified.category) {
            return vec![classified.source];
        }
        if self.keep_source_copy {
            vec![classified.category, classified.source]
        } else {
            vec![classified.category]
        }
    }

    /// Keyed on the followed artist whose catalog listed the release, so an
    /// `appears_on` entry blocks that artist's guest credits.
    fn is_blacklisted(&self, pair: &AlbumTrackPair, category: Category) -> bool {
        self.blacklist
            .get(&pair.release.listed_by)
            .is_some_and(|blocked| blocked.contains(&category))
    }

    /// Group releases by destination store, each list in insertion order.
    pub fn map(
        &self,
        classified: Vec<ClassifiedPair>,
        stores: &TargetStores,
    ) -> BTreeMap<Category, Vec<AlbumTrackPair>> {
        let mut mapped: BTreeMap<Category, Vec<AlbumTrackPair>> = BTreeMap::new();
        for c in classified {
            for category in self.destinations(&c, stores) {
                if !stores.is_enabled(category) {
                    continue;
                }
                if self.is_blacklisted(&c.pair, category) {
                    debug!(
                        release = c.pair.release.title.as_str(),
                        %category,
                        "Skipping blacklisted release"
                    );
                    continue;
                }
                mapped.entry(category).or_default().push(c.pair.clone());
            }
        }
        for pairs in mapped.values_mut() {
            pairs.sort_by(AlbumTrackPair::cmp_for_insertion);
        }
        mapped.retain(|_, pairs| !pairs.is_empty());
        mapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{pair, release, release_on};

    fn stores(enabled: &[Category]) -> TargetStores {
        let ids: BTreeMap<Category, String> = enabled
            .iter()
            .map(|c| (*c, format!("pl-{}", c.env_key().to_lowercase())))
            .collect();
        TargetStores::new(&ids)
    }

    fn classified(id: &str, source: Category, category: Category) -> ClassifiedPair {
        ClassifiedPair {
            pair: pair(release(id, id, source, &["a"]), 2),
            source,
            category,
        }
    }

    fn ids(mapped: &BTreeMap<Category, Vec<AlbumTrackPair>>, c: Category) -> Vec<&str> {
        mapped
            .get(&c)
            .map(|pairs| pairs.iter().map(|p| p.release.id.as_str()).collect())
            .unwrap_or_default()
    }

    #[test]
    fn remapped_release_goes_to_extended_store_only() {
        let mapper = TargetMapper::new(false, HashMap::new());
        let mapped = mapper.map(
            vec![classified("r1", Category::Single, Category::Ep)],
            &stores(&[Category::Single, Category::Ep]),
        );
        assert_eq!(ids(&mapped, Category::Ep), vec!["r1"]);
        assert!(!mapped.contains_key(&Category::Single));
    }

    #[test]
    fn source_copy_is_kept_when_configured() {
        let mapper = TargetMapper::new(true, HashMap::new());
        let mapped = mapper.map(
            vec![classified("r1", Category::Album, Category::Live)],
            &stores(&[Category::Album, Category::Live]),
        );
        assert_eq!(ids(&mapped, Category::Live), vec!["r1"]);
        assert_eq!(ids(&mapped, Category::Album), vec!["r1"]);
    }

    #[test]
    fn disabled_extended_store_falls_back_to_source() {
        let mapper = TargetMapper::new(false, HashMap::new());
        let mapped = mapper.map(
            vec![classified("r1", Category::Album, Category::Remix)],
            &stores(&[Category::Album]),
        );
        assert_eq!(ids(&mapped, Category::Album), vec!["r1"]);
        assert_eq!(mapped.len(), 1);
    }

    #[test]
    fn disabled_stores_are_dropped() {
        let mapper = TargetMapper::new(false, HashMap::new());
        let mapped = mapper.map(
            vec![
                classified("r1", Category::Compilation, Category::Compilation),
                classified("r2", Category::Album, Category::Album),
            ],
            &stores(&[Category::Album]),
        );
        assert_eq!(mapped.keys().copied().collect::<Vec<_>>(), vec![Category::Album]);
    }

    #[test]
    fn blacklist_applies_to_destination_category() {
        let mut blacklist = HashMap::new();
        blacklist.insert("a".to_string(), HashSet::from([Category::Single]));
        let mapper = TargetMapper::new(true, blacklist);
        let mapped = mapper.map(
            vec![
                classified("r1", Category::Single, Category::Single),
                classified("r2", Category::Single, Category::Ep),
            ],
            &stores(&[Category::Single, Category::Ep]),
        );
        assert_eq!(ids(&mapped, Category::Ep), vec!["r2"]);
        assert!(!mapped.contains_key(&Category::Single));
    }

    #[test]
    fn appears_on_blacklist_uses_the_listing_artist() {
        let mut blacklist = HashMap::new();
        blacklist.insert("a".to_string(), HashSet::from([Category::AppearsOn]));
        let mapper = TargetMapper::new(false, blacklist);

        let mut guest = release("guest", "Guest Spot", Category::AppearsOn, &["x", "a"]);
        guest.listed_by = "a".to_string();
        let mut other = release("other", "Other Spot", Category::AppearsOn, &["a", "y"]);
        other.listed_by = "y".to_string();

        let mapped = mapper.map(
            vec![
                ClassifiedPair {
                    pair: pair(guest, 3),
                    source: Category::AppearsOn,
                    category: Category::AppearsOn,
                },
                ClassifiedPair {
                    pair: pair(other, 2),
                    source: Category::AppearsOn,
                    category: Category::AppearsOn,
                },
            ],
            &stores(&[Category::AppearsOn]),
        );

        assert_eq!(ids(&mapped, Category::AppearsOn), vec!["other"]);
    }

    #[test]
    fn pairs_are_ordered_by_release_date_then_title() {
        let mapper = TargetMapper::new(false, HashMap::new());
        let make = |id: &str, title: &str, date: &str| ClassifiedPair {
            pair: pair(release_on(id, title, Category::Album, &["a"], date), 1),
            source: Category::Album,
            category: Category::Album,
        };
        let mapped = mapper.map(
            vec![
                make("late", "A", "2024-05-03"),
                make("b", "B", "2024-05-01"),
                make("a", "A", "2024-05-01"),
            ],
            &stores(&[Category::Album]),
        );
        assert_eq!(ids(&mapped, Category::Album), vec!["a", "b", "late"]);
    }
}
