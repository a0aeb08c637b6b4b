use std::sync::LazyLock;

use regex::Regex;

use discovery_common::{Category, RatioThresholds, Track};

use super::{matching_ratio, Remapper};

static REMIX_MATCHER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(RMX|REMIX|REMIXES)\b").unwrap());

/// Remix collections: either the title says so and a fair share of tracks
/// agree, or most track names are remixes on their own.
pub struct RemixRemapper {
    thresholds: RatioThresholds,
}

impl RemixRemapper {
    pub fn new(thresholds: RatioThresholds) -> Self {
        Self { thresholds }
    }
}

impl Remapper for RemixRemapper {
    fn category(&self) -> Category {
        Category::Remix
    }

    /// Any catalog-reported category.
    fn applies_to(&self, category: Category) -> bool {
        !category.is_extended()
    }

    fn qualifies(&self, title: &str, tracks: &[Track]) -> bool {
        let Some(ratio) = matching_ratio(&REMIX_MATCHER, tracks) else {
            return false;
        };
        if REMIX_MATCHER.is_match(title) {
            ratio > self.thresholds.title_match
        } else {
            ratio > self.thresholds.title_mismatch
        }
    }
}
