use std::sync::LazyLock;

use regex::Regex;

use discovery_common::{Category, RatioThresholds, Track};

use super::{matching_ratio, Remapper};

static LIVE_MATCHER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bLIVE\b").unwrap());

/// Live recordings, recognised the same way as remixes but with a stricter
/// bar for titled releases ("Live or Die" is a studio album).
pub struct LiveRemapper {
    thresholds: RatioThresholds,
}

impl LiveRemapper {
    pub fn new(thresholds: RatioThresholds) -> Self {
        Self { thresholds }
    }
}

impl Remapper for LiveRemapper {
    fn category(&self) -> Category {
        Category::Live
    }

    fn applies_to(&self, category: Category) -> bool {
        matches!(
            category,
            Category::Album | Category::Single | Category::Compilation
        )
    }

    fn qualifies(&self, title: &str, tracks: &[Track]) -> bool {
        let Some(ratio) = matching_ratio(&LIVE_MATCHER, tracks) else {
            return false;
        };
        if LIVE_MATCHER.is_match(title) {
            ratio > self.thresholds.title_match
        } else {
            ratio > self.thresholds.title_mismatch
        }
    }
}

#[cfg(test)]
mod tests {
    use discovery_common::Policy;

    use super::*;
    use crate::testing::tracks_named;

    fn remapper() -> LiveRemapper {
        LiveRemapper::new(Policy::default().live)
    }

    #[test]
    fn live_album_with_live_tracks_qualifies() {
        let tracks = tracks_named(
            "r",
            &[
                "Intro - Live",
                "March of Time - Live in Madrid",
                "Eagle Fly Free (Live)",
                "Outro",
            ],
        );
        assert!(remapper().qualifies("United Alive in Madrid (Live)", &tracks));
    }

    #[test]
    fn live_single_qualifies() {
        let tracks = tracks_named("r", &["Hold on to Memories (Live)"]);
        assert!(remapper().qualifies("Hold on to Memories (Live)", &tracks));
    }

    #[test]
    fn untitled_live_album_needs_most_tracks_live() {
        let tracks = tracks_named("r", &["Nil - Live", "Atlas - Live", "Veil - Live"]);
        assert!(remapper().qualifies("L+1VE", &tracks));
    }

    #[test]
    fn live_in_title_only_does_not_qualify() {
        let tracks = tracks_named("r", &["Live or Die", "Dead Man's Eyes", "Ruins"]);
        assert!(!remapper().qualifies("Live or Die", &tracks));
    }

    #[test]
    fn half_live_tracks_is_not_enough() {
        let tracks = tracks_named("r", &["A - Live", "B - Live", "C", "D"]);
        assert!(!remapper().qualifies("Alive at Last (Live)", &tracks));
    }

    #[test]
    fn appears_on_is_not_eligible() {
        assert!(!remapper().applies_to(Category::AppearsOn));
        assert!(remapper().applies_to(Category::Album));
    }
}
