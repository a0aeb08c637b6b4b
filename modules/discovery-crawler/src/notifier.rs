// "New content" markers on target collections.
//
// A store is CLEAR (title carries OFF_GLYPH, no marked_at) or MARKED (title
// carries NEW_GLYPH, marked_at set). Crawls mark the stores they inserted
// into; the periodic sweep clears markers the listener has caught up with.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use tracing::{debug, info, warn};

use discovery_common::{Category, CollectionUpdate, DiscoveryError, Policy, Result};

use crate::executor::BoundedExecutor;
use crate::targets::{TargetStore, TargetStores};
use crate::traits::MusicCatalog;

pub const OFF_GLYPH: &str = "\u{26AB}";
pub const NEW_GLYPH: &str = "\u{26AA}";

const DESCRIPTION_PREFIX: &str = "Last Discovery: ";
const DESCRIPTION_TIME_FORMAT: &str = "%B %-d, %Y \u{2014} %H:%M";

pub fn discovery_description(at: DateTime<Utc>) -> String {
    format!("{DESCRIPTION_PREFIX}{}", at.format(DESCRIPTION_TIME_FORMAT))
}

/// Inverse of `discovery_description`, at minute precision.
pub fn parse_discovery_description(description: &str) -> Option<DateTime<Utc>> {
    let raw = description.trim().strip_prefix(DESCRIPTION_PREFIX)?;
    NaiveDateTime::parse_from_str(raw.trim(), DESCRIPTION_TIME_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

pub struct Notifier {
    catalog: Arc<dyn MusicCatalog>,
    executor: BoundedExecutor,
    timeout: Duration,
    recent_items_limit: u32,
    enabled: bool,
}

impl Notifier {
    pub fn new(
        catalog: Arc<dyn MusicCatalog>,
        executor: BoundedExecutor,
        policy: &Policy,
        enabled: bool,
    ) -> Self {
        Self {
            catalog,
            executor,
            timeout: policy.notifier_timeout,
            recent_items_limit: policy.recent_items_limit,
            enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Mark every enabled store in `categories` as holding new content.
    pub async fn show(
        &self,
        stores: &TargetStores,
        categories: &[Category],
        now: DateTime<Utc>,
    ) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let tasks = categories
            .iter()
            .map(|c| stores.get(*c))
            .filter_map(|store| Some((store, store.collection_id()?)))
            .map(|(store, collection_id)| async move {
                let details = self.catalog.collection(collection_id).await?;
                let update = CollectionUpdate {
                    title: Some(details.title.replace(OFF_GLYPH, NEW_GLYPH)),
                    description: Some(discovery_description(now)),
                };
                self.catalog.update_collection(collection_id, &update).await?;
                store.mark(now);
                debug!(category = %store.category(), "Marked collection as new");
                Ok::<_, DiscoveryError>(())
            });
        self.executor.execute_void("show_notifiers", tasks).await
    }

    /// Clear markers that are no longer needed. Returns whether any title changed.
    /// Never fails: problems are logged and the marker is left as is.
    pub async fn clear_obsolete(&self, stores: &TargetStores, now: DateTime<Utc>) -> bool {
        if !self.enabled {
            return false;
        }
        let tasks = stores.enabled().map(|store| async move {
            if !self.is_obsolete(store, now).await {
                return Ok(Vec::new());
            }
            Ok::<_, DiscoveryError>(vec![self.clear(store).await])
        });
        match self.executor.execute("clear_notifiers", tasks).await {
            Ok(changed) => changed.into_iter().any(|c| c),
            Err(e) => {
                warn!(error = %e, "Clearing notifiers failed");
                false
            }
        }
    }

    async fn is_obsolete(&self, store: &TargetStore, now: DateTime<Utc>) -> bool {
        let Some(marked_at) = store.marked_at() else {
            return true;
        };
        if now - marked_at > self.timeout {
            return true;
        }
        let Some(collection_id) = store.collection_id() else {
            return false;
        };

        let recent = match self
            .catalog
            .recent_items(collection_id, self.recent_items_limit)
            .await
        {
            Ok(items) => items,
            Err(e) => {
                warn!(category = %store.category(), error = %e, "Failed to read recent items");
                return false;
            }
        };
        let fresh: HashSet<String> = recent
            .into_iter()
            .filter(|item| now - item.added_at <= self.timeout)
            .map(|item| item.item_id)
            .collect();
        if fresh.is_empty() {
            return true;
        }

        match self.catalog.currently_playing().await {
            Ok(Some(playing)) => fresh.contains(&playing),
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, "Failed to read playback state");
                false
            }
        }
    }

    /// Rename NEW to OFF and drop `marked_at`. Returns whether the title changed.
    async fn clear(&self, store: &TargetStore) -> bool {
        store.unmark();
        let Some(collection_id) = store.collection_id() else {
            return false;
        };
        let details = match self.catalog.collection(collection_id).await {
            Ok(d) => d,
            Err(e) => {
                warn!(category = %store.category(), error = %e, "Failed to read collection");
                return false;
            }
        };
        if !details.title.contains(NEW_GLYPH) {
            return false;
        }
        let update = CollectionUpdate {
            title: Some(details.title.replace(NEW_GLYPH, OFF_GLYPH)),
            description: None,
        };
        match self.catalog.update_collection(collection_id, &update).await {
            Ok(()) => {
                info!(category = %store.category(), "Cleared new-content marker");
                true
            }
            Err(e) => {
                warn!(category = %store.category(), error = %e, "Failed to rename collection");
                false
            }
        }
    }

    /// Restore `marked_at` from collection descriptions written by earlier runs.
    pub async fn restore_markers(&self, stores: &TargetStores) {
        if !self.enabled {
            return;
        }
        let tasks = stores.enabled().map(|store| async move {
            let Some(collection_id) = store.collection_id() else {
                return Ok(());
            };
            let details = self.catalog.collection(collection_id).await?;
            match parse_discovery_description(&details.description) {
                Some(at) if details.title.contains(NEW_GLYPH) => store.mark(at),
                Some(_) => {}
                None => debug!(
                    category = %store.category(),
                    description = details.description.as_str(),
                    "No discovery timestamp in description"
                ),
            }
            Ok::<_, DiscoveryError>(())
        });
        if let Err(e) = self.executor.execute_void("restore_markers", tasks).await {
            warn!(error = %e, "Restoring markers failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use discovery_common::RecentItem;

    use super::*;
    use crate::testing::MockCatalog;

    fn now() -> DateTime<Utc> {
        "2024-06-01T12:00:00Z".parse().unwrap()
    }

    fn stores() -> TargetStores {
        let ids = BTreeMap::from([(Category::Album, "pl-album".to_string())]);
        TargetStores::new(&ids)
    }

    fn notifier(catalog: MockCatalog) -> (Notifier, Arc<MockCatalog>) {
        let catalog = Arc::new(catalog);
        let notifier = Notifier::new(
            catalog.clone(),
            BoundedExecutor::new(2),
            &Policy::default(),
            true,
        );
        (notifier, catalog)
    }

    fn recent(id: &str, age: Duration) -> RecentItem {
        RecentItem {
            item_id: id.to_string(),
            added_at: now() - age,
        }
    }

    #[test]
    fn description_roundtrips_at_minute_precision() {
        let at: DateTime<Utc> = "2024-03-05T09:07:41Z".parse().unwrap();
        let description = discovery_description(at);
        assert_eq!(description, "Last Discovery: March 5, 2024 \u{2014} 09:07");
        assert_eq!(
            parse_discovery_description(&description),
            Some("2024-03-05T09:07:00Z".parse().unwrap())
        );
        assert_eq!(parse_discovery_description("My favourite songs"), None);
    }

    #[tokio::test]
    async fn show_renames_and_marks() {
        let (notifier, catalog) =
            notifier(MockCatalog::new().with_collection("pl-album", "\u{26AB} Albums", ""));
        let stores = stores();

        notifier.show(&stores, &[Category::Album], now()).await.unwrap();

        let details = catalog.collection_details("pl-album").unwrap();
        assert_eq!(details.title, "\u{26AA} Albums");
        assert_eq!(details.description, discovery_description(now()));
        assert_eq!(stores.get(Category::Album).marked_at(), Some(now()));
    }

    #[tokio::test]
    async fn unset_marker_always_clears() {
        let (notifier, catalog) =
            notifier(MockCatalog::new().with_collection("pl-album", "\u{26AA} Albums", ""));
        let stores = stores();

        assert!(notifier.clear_obsolete(&stores, now()).await);
        assert_eq!(catalog.collection_details("pl-album").unwrap().title, "\u{26AB} Albums");
        assert_eq!(catalog.recent_items_calls(), 0);
    }

    #[tokio::test]
    async fn timed_out_marker_is_cleared() {
        let (notifier, catalog) =
            notifier(MockCatalog::new().with_collection("pl-album", "\u{26AA} Albums", ""));
        let stores = stores();
        stores.get(Category::Album).mark(now() - Duration::days(32));

        assert!(notifier.clear_obsolete(&stores, now()).await);
        assert_eq!(stores.get(Category::Album).marked_at(), None);
        assert_eq!(catalog.recent_items_calls(), 0);
    }

    #[tokio::test]
    async fn only_stale_items_clears() {
        let (notifier, _) = notifier(
            MockCatalog::new()
                .with_collection("pl-album", "\u{26AA} Albums", "")
                .with_recent_items("pl-album", vec![recent("t1", Duration::days(40))]),
        );
        let stores = stores();
        stores.get(Category::Album).mark(now() - Duration::days(1));

        assert!(notifier.clear_obsolete(&stores, now()).await);
    }

    #[tokio::test]
    async fn listening_to_new_item_clears() {
        let (notifier, _) = notifier(
            MockCatalog::new()
                .with_collection("pl-album", "\u{26AA} Albums", "")
                .with_recent_items("pl-album", vec![recent("t1", Duration::hours(2))])
                .with_currently_playing("t1"),
        );
        let stores = stores();
        stores.get(Category::Album).mark(now() - Duration::hours(2));

        assert!(notifier.clear_obsolete(&stores, now()).await);
        assert_eq!(stores.get(Category::Album).marked_at(), None);
    }

    #[tokio::test]
    async fn unheard_new_items_stay_marked() {
        let (notifier, catalog) = notifier(
            MockCatalog::new()
                .with_collection("pl-album", "\u{26AA} Albums", "")
                .with_recent_items("pl-album", vec![recent("t1", Duration::hours(2))])
                .with_currently_playing("something-else"),
        );
        let stores = stores();
        stores.get(Category::Album).mark(now() - Duration::hours(2));

        assert!(!notifier.clear_obsolete(&stores, now()).await);
        assert_eq!(
            stores.get(Category::Album).marked_at(),
            Some(now() - Duration::hours(2))
        );
        assert_eq!(catalog.collection_details("pl-album").unwrap().title, "\u{26AA} Albums");
    }

    #[tokio::test]
    async fn playback_errors_keep_the_marker() {
        let (notifier, _) = notifier(
            MockCatalog::new()
                .with_collection("pl-album", "\u{26AA} Albums", "")
                .with_recent_items("pl-album", vec![recent("t1", Duration::hours(2))])
                .failing_playback(),
        );
        let stores = stores();
        stores.get(Category::Album).mark(now() - Duration::hours(2));

        assert!(!notifier.clear_obsolete(&stores, now()).await);
        assert!(stores.get(Category::Album).marked_at().is_some());
    }

    #[tokio::test]
    async fn markers_are_restored_from_descriptions() {
        let at: DateTime<Utc> = "2024-05-30T08:15:00Z".parse().unwrap();
        let (notifier, _) = notifier(MockCatalog::new().with_collection(
            "pl-album",
            "\u{26AA} Albums",
            &discovery_description(at),
        ));
        let stores = stores();

        notifier.restore_markers(&stores).await;

        assert_eq!(stores.get(Category::Album).marked_at(), Some(at));
    }

    #[tokio::test]
    async fn disabled_notifier_does_nothing() {
        let catalog = Arc::new(MockCatalog::new().with_collection("pl-album", "\u{26AA} Albums", ""));
        let notifier = Notifier::new(
            catalog.clone(),
            BoundedExecutor::new(2),
            &Policy::default(),
            false,
        );
        let stores = stores();

        assert!(!notifier.clear_obsolete(&stores, now()).await);
        notifier.show(&stores, &[Category::Album], now()).await.unwrap();

        assert_eq!(catalog.collection_details("pl-album").unwrap().title, "\u{26AA} Albums");
        assert_eq!(stores.get(Category::Album).marked_at(), None);
    }
}
