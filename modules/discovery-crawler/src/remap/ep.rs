use std::sync::LazyLock;

use regex::Regex;

use discovery_common::{Category, EpThresholds, Track};

use super::Remapper;

static EP_MATCHER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bEP\b").unwrap());

/// Singles that are really EPs: either labelled as such, or too long to be a single.
pub struct EpRemapper {
    thresholds: EpThresholds,
}

impl EpRemapper {
    pub fn new(thresholds: EpThresholds) -> Self {
        Self { thresholds }
    }
}

impl Remapper for EpRemapper {
    fn category(&self) -> Category {
        Category::Ep
    }

    /// The catalog files EPs as singles.
    fn applies_to(&self, category: Category) -> bool {
        category == Category::Single
    }

    fn qualifies(&self, title: &str, tracks: &[Track]) -> bool {
        if tracks.is_empty() {
            return false;
        }
        if EP_MATCHER.is_match(title) {
            return true;
        }
        let count = tracks.len();
        let total_ms: u64 = tracks.iter().map(|t| u64::from(t.duration_ms)).sum();
        let lesser_ms = self
            .thresholds
            .min_duration_lesser
            .num_milliseconds()
            .max(0) as u64;
        count >= self.thresholds.min_tracks
            || (count >= self.thresholds.min_tracks_lesser && total_ms >= lesser_ms)
    }
}

#[cfg(test)]
mod tests {
    use discovery_common::Policy;

    use super::*;
    use crate::testing::tracks_with_minutes;

    fn remapper() -> EpRemapper {
        EpRemapper::new(Policy::default().ep)
    }

    #[test]
    fn ep_in_title_qualifies() {
        let tracks = tracks_with_minutes("r", &[4, 4]);
        assert!(remapper().qualifies("Black Carpet EP", &tracks));
    }

    #[test]
    fn five_tracks_make_an_ep() {
        let tracks = tracks_with_minutes("r", &[3, 3, 3, 3, 3]);
        assert!(remapper().qualifies("The Resurrection", &tracks));
    }

    #[test]
    fn three_long_tracks_make_an_ep() {
        let tracks = tracks_with_minutes("r", &[8, 7, 6]);
        assert!(remapper().qualifies("Lumina Aurea", &tracks));
    }

    #[test]
    fn short_singles_stay_singles() {
        assert!(!remapper().qualifies("Harvest", &tracks_with_minutes("r", &[4, 5, 3])));
        assert!(!remapper().qualifies("Drei Mann - Zwei Songs", &tracks_with_minutes("r", &[3, 3])));
        assert!(!remapper().qualifies("Oh Yeah!", &tracks_with_minutes("r", &[3])));
    }

    #[test]
    fn word_boundary_prevents_false_positives() {
        assert!(!remapper().qualifies("Deep Sleep", &tracks_with_minutes("r", &[4])));
    }

    #[test]
    fn only_singles_are_eligible() {
        assert!(remapper().applies_to(Category::Single));
        assert!(!remapper().applies_to(Category::Album));
        assert!(!remapper().applies_to(Category::AppearsOn));
    }
}
