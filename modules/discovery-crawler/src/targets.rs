use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};

use discovery_common::Category;

/// One target collection per category. A store without a collection id is disabled.
#[derive(Debug)]
pub struct TargetStore {
    category: Category,
    collection_id: Option<String>,
    marked_at: Mutex<Option<DateTime<Utc>>>,
}

impl TargetStore {
    fn new(category: Category, collection_id: Option<String>) -> Self {
        Self {
            category,
            collection_id,
            marked_at: Mutex::new(None),
        }
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn collection_id(&self) -> Option<&str> {
        self.collection_id.as_deref()
    }

    pub fn is_enabled(&self) -> bool {
        self.collection_id.is_some()
    }

    /// When the "new" marker was last shown. `None` means cleared.
    pub fn marked_at(&self) -> Option<DateTime<Utc>> {
        *self.marked_at.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn mark(&self, at: DateTime<Utc>) {
        *self.marked_at.lock().unwrap_or_else(PoisonError::into_inner) = Some(at);
    }

    pub fn unmark(&self) {
        *self.marked_at.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// Registry of all target stores, created once at startup.
#[derive(Debug)]
pub struct TargetStores {
    stores: [TargetStore; 7],
}

impl TargetStores {
    pub fn new(collection_ids: &BTreeMap<Category, String>) -> Self {
        Self {
            stores: Category::ALL.map(|c| TargetStore::new(c, collection_ids.get(&c).cloned())),
        }
    }

    pub fn get(&self, category: Category) -> &TargetStore {
        &self.stores[category as usize]
    }

    pub fn is_enabled(&self, category: Category) -> bool {
        self.get(category).is_enabled()
    }

    /// Enabled stores in category order.
    pub fn enabled(&self) -> impl Iterator<Item = &TargetStore> {
        self.stores.iter().filter(|s| s.is_enabled())
    }
}
