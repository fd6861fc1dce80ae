//! Bulk-loaded favorites, keyed by item identity.

use std::collections::BTreeMap;

use crate::state::data::{Item, ItemKey};

/// Favorites as last reported by the server, plus local toggles since.
///
/// The materialized list is the local pagination source. It is built once
/// per session so offsets stay stable; toggles update membership but not
/// the materialized order until the next reload.
#[derive(Debug, Clone, Default)]
pub struct FavoritesCache {
    entries: BTreeMap<ItemKey, Item>,
    materialized: Option<Vec<Item>>,
    loaded: bool,
}

impl FavoritesCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the contents with a fresh bulk load
    pub fn replace(&mut self, items: Vec<Item>) {
        self.entries = items.into_iter().map(|item| (item.key.clone(), item)).collect();
        self.materialized = None;
        self.loaded = true;
    }

    /// Forget everything; the next local page reloads from the server
    pub fn invalidate(&mut self) {
        self.entries.clear();
        self.materialized = None;
        self.loaded = false;
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn contains(&self, key: &ItemKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn insert(&mut self, item: Item) {
        self.entries.insert(item.key.clone(), item);
    }

    pub fn remove(&mut self, key: &ItemKey) -> Option<Item> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Session-stable ordering of the cached favorites: numeric ids ascending, then the rest
    pub fn materialize(&mut self) -> &[Item] {
        let entries = &self.entries;
        self.materialized.get_or_insert_with(|| entries.values().cloned().collect())
    }
}
