//! In-process implementation of the repository contract.
//!
//! Backs tests and previews: same semantics as the durable stores, no I/O.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::StatusRepository;
use crate::error::RepositoryError;
use crate::model::{Collection, Item, ItemStatus};

#[derive(Default)]
struct State {
    items: HashMap<String, Item>,
    collections: HashMap<String, Collection>,
}

/// Map-backed [`StatusRepository`] fake.
pub struct MemoryStatusStore {
    state: Mutex<State>,
    private_collection: String,
}

impl MemoryStatusStore {
    pub fn new(private_collection: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(State::default()),
            private_collection: private_collection.into(),
        }
    }

    /// Full collection record, for assertions on timestamps and ordering.
    pub async fn collection(&self, name: &str) -> Collection {
        let mut state = self.state.lock().await;
        state
            .collections
            .entry(name.to_string())
            .or_insert_with(|| Collection::new(name))
            .clone()
    }

    /// Seed an item record directly, bypassing the timestamp stamping of
    /// `set_status`. Intended for test setup.
    pub async fn insert_item(&self, item: Item) {
        let mut state = self.state.lock().await;
        state.items.insert(item.id.clone(), item);
    }
}

impl Default for MemoryStatusStore {
    fn default() -> Self {
        Self::new("private")
    }
}

#[async_trait]
impl StatusRepository for MemoryStatusStore {
    async fn get_status(&self, id: &str) -> Result<ItemStatus, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .items
            .get(id)
            .map(|i| i.status)
            .unwrap_or(ItemStatus::Unprocessed))
    }

    async fn get_item(&self, id: &str) -> Result<Item, RepositoryError> {
        let mut state = self.state.lock().await;
        Ok(state
            .items
            .entry(id.to_string())
            .or_insert_with(|| Item::new(id))
            .clone())
    }

    async fn set_status(&self, id: &str, new_status: ItemStatus) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        match state.items.get_mut(id) {
            Some(item) => item.set_status(new_status),
            None => {
                let mut item = Item::new(id);
                item.set_status(new_status);
                state.items.insert(id.to_string(), item);
            }
        }
        if new_status == ItemStatus::Saved {
            let name = self.private_collection.clone();
            state
                .collections
                .entry(name.clone())
                .or_insert_with(|| Collection::new(&name))
                .add_member(id);
        }
        Ok(())
    }

    async fn list_by_status(&self, status: ItemStatus) -> Result<Vec<Item>, RepositoryError> {
        let state = self.state.lock().await;
        let mut items: Vec<Item> = state
            .items
            .values()
            .filter(|i| i.status == status)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.date_added.cmp(&b.date_added).then(a.id.cmp(&b.id)));
        Ok(items)
    }

    async fn add_to_collection(&self, collection: &str, id: &str) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        state
            .collections
            .entry(collection.to_string())
            .or_insert_with(|| Collection::new(collection))
            .add_member(id);
        Ok(())
    }

    async fn remove_from_collection(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        if let Some(record) = state.collections.get_mut(collection) {
            record.remove_member(id);
        }
        Ok(())
    }

    async fn collection_members(&self, collection: &str) -> Result<Vec<String>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .collections
            .get(collection)
            .map(|c| c.member_ids.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn behaves_like_the_contract() {
        let store = MemoryStatusStore::default();
        assert_eq!(
            store.get_status("a").await.unwrap(),
            ItemStatus::Unprocessed
        );

        store.set_status("a", ItemStatus::Saved).await.unwrap();
        assert_eq!(store.get_status("a").await.unwrap(), ItemStatus::Saved);
        assert_eq!(store.collection_members("private").await.unwrap(), vec!["a"]);

        let stamped = store.collection("private").await.last_modified;
        store.add_to_collection("private", "a").await.unwrap();
        assert_eq!(store.collection("private").await.last_modified, stamped);
    }
}
