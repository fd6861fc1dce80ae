//! The ordered, deduplicated list of materialized items.

use std::collections::HashMap;

use crate::state::data::{Item, ItemKey};

#[derive(Debug, Clone, Default)]
pub struct RenderList {
    items: Vec<Item>,
    index: HashMap<ItemKey, usize>,
}

impl RenderList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append in source order, skipping identities already present.
    /// Returns how many items were added.
    pub fn append(&mut self, items: impl IntoIterator<Item = Item>) -> usize {
        let before = self.items.len();
        for item in items {
            if self.index.contains_key(&item.key) {
                continue;
            }
            self.index.insert(item.key.clone(), self.items.len());
            self.items.push(item);
        }
        self.items.len() - before
    }

    /// The last `count` items, i.e. what the latest append added
    pub fn tail(&self, count: usize) -> &[Item] {
        &self.items[self.items.len().saturating_sub(count)..]
    }

    pub fn get(&self, key: &ItemKey) -> Option<&Item> {
        self.index.get(key).map(|&position| &self.items[position])
    }

    pub fn contains(&self, key: &ItemKey) -> bool {
        self.index.contains_key(key)
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.index.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Item> {
        self.items.iter()
    }
}
