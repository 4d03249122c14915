//! On-device status store.
//!
//! Persists a map of id -> status record under the logical key `status_map`
//! and one ordered collection per well-known name under `collection.<name>`.
//! Every write is verified with a synchronous read-back; a mismatch surfaces
//! as `SaveFailed`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{IdLocks, StatusRepository};
use crate::error::{CoreError, RepositoryError};
use crate::model::{Collection, Item, ItemStatus};
use crate::storage::{data_dir, Database};

const STATUS_MAP_KEY: &str = "status_map";

/// Persisted per-item record. The id lives in the map key.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredRecord {
    status: ItemStatus,
    date_added: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_modified: Option<DateTime<Utc>>,
}

impl StoredRecord {
    fn into_item(self, id: &str) -> Item {
        Item {
            id: id.to_string(),
            status: self.status,
            date_added: self.date_added,
            last_modified: self.last_modified,
        }
    }
}

/// Durable local implementation of [`StatusRepository`].
pub struct LocalStatusStore {
    db: Database,
    private_collection: String,
    locks: IdLocks,
}

impl LocalStatusStore {
    /// Open the store at `~/.config/swipestream/swipestream.db`.
    ///
    /// # Errors
    /// Returns an error if the data directory or database cannot be opened.
    pub fn open(private_collection: impl Into<String>) -> Result<Self, CoreError> {
        let path = data_dir()?.join("swipestream.db");
        let db = Database::open(path).map_err(RepositoryError::from)?;
        Ok(Self::with_database(db, private_collection))
    }

    /// Build the store over an existing database. Lets tests use an
    /// in-memory database.
    pub fn with_database(db: Database, private_collection: impl Into<String>) -> Self {
        Self {
            db,
            private_collection: private_collection.into(),
            locks: IdLocks::new(),
        }
    }

    /// Full collection record, created empty on first access.
    pub fn collection(&self, name: &str) -> Result<Collection, RepositoryError> {
        self.load_collection(name)
    }

    fn collection_key(name: &str) -> String {
        format!("collection.{name}")
    }

    /// Write then read back; anything other than an exact echo is a failed
    /// save.
    fn write_verified(&self, key: &str, value: &str) -> Result<(), RepositoryError> {
        self.db.kv_set(key, value)?;
        match self.db.kv_get(key)? {
            Some(read_back) if read_back == value => Ok(()),
            _ => Err(RepositoryError::SaveFailed),
        }
    }

    fn load_status_map(&self) -> Result<HashMap<String, StoredRecord>, RepositoryError> {
        match self.db.kv_get(STATUS_MAP_KEY)? {
            Some(raw) => {
                serde_json::from_str(&raw).map_err(|e| RepositoryError::Storage(e.to_string()))
            }
            None => Ok(HashMap::new()),
        }
    }

    fn store_status_map(&self, map: &HashMap<String, StoredRecord>) -> Result<(), RepositoryError> {
        let raw = serde_json::to_string(map).map_err(|e| RepositoryError::Storage(e.to_string()))?;
        self.write_verified(STATUS_MAP_KEY, &raw)
    }

    fn load_collection(&self, name: &str) -> Result<Collection, RepositoryError> {
        match self.db.kv_get(&Self::collection_key(name))? {
            Some(raw) => {
                serde_json::from_str(&raw).map_err(|e| RepositoryError::Storage(e.to_string()))
            }
            None => Ok(Collection::new(name)),
        }
    }

    fn store_collection(&self, collection: &Collection) -> Result<(), RepositoryError> {
        let raw = serde_json::to_string(collection)
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;
        self.write_verified(&Self::collection_key(&collection.name), &raw)
    }

    /// Read-modify-write of the status map, serialized at the map level so
    /// concurrent writes for different ids cannot lose each other.
    async fn update_record(
        &self,
        id: &str,
        new_status: ItemStatus,
    ) -> Result<(), RepositoryError> {
        let map_lock = self.locks.lock_for(STATUS_MAP_KEY);
        let _guard = map_lock.lock().await;

        let mut map = self.load_status_map()?;
        match map.get_mut(id) {
            Some(record) => {
                record.status = new_status;
                record.last_modified = Some(Utc::now());
            }
            None => {
                map.insert(
                    id.to_string(),
                    StoredRecord {
                        status: new_status,
                        date_added: Utc::now(),
                        last_modified: Some(Utc::now()),
                    },
                );
            }
        }
        self.store_status_map(&map)
    }

    async fn add_member_locked(&self, collection: &str, id: &str) -> Result<(), RepositoryError> {
        let key = Self::collection_key(collection);
        let lock = self.locks.lock_for(&key);
        let _guard = lock.lock().await;

        let mut record = self.load_collection(collection)?;
        if record.add_member(id) {
            self.store_collection(&record)?;
        }
        Ok(())
    }
}

#[async_trait]
impl StatusRepository for LocalStatusStore {
    async fn get_status(&self, id: &str) -> Result<ItemStatus, RepositoryError> {
        let map = self.load_status_map()?;
        Ok(map.get(id).map(|r| r.status).unwrap_or(ItemStatus::Unprocessed))
    }

    async fn get_item(&self, id: &str) -> Result<Item, RepositoryError> {
        if let Some(record) = self.load_status_map()?.get(id) {
            return Ok(record.clone().into_item(id));
        }

        // First lookup materializes the record so date_added stays stable.
        let map_lock = self.locks.lock_for(STATUS_MAP_KEY);
        let _guard = map_lock.lock().await;
        let mut map = self.load_status_map()?;
        let record = map.entry(id.to_string()).or_insert(StoredRecord {
            status: ItemStatus::Unprocessed,
            date_added: Utc::now(),
            last_modified: None,
        });
        let item = record.clone().into_item(id);
        self.store_status_map(&map)?;
        Ok(item)
    }

    async fn set_status(&self, id: &str, new_status: ItemStatus) -> Result<(), RepositoryError> {
        // Writes for one id are serialized; a second writer waits here.
        let id_lock = self.locks.lock_for(id);
        let _guard = id_lock.lock().await;

        self.update_record(id, new_status).await?;

        if new_status == ItemStatus::Saved {
            let private = self.private_collection.clone();
            self.add_member_locked(&private, id).await?;
        }
        Ok(())
    }

    async fn list_by_status(&self, status: ItemStatus) -> Result<Vec<Item>, RepositoryError> {
        let map = self.load_status_map()?;
        let mut items: Vec<Item> = map
            .iter()
            .filter(|(_, record)| record.status == status)
            .map(|(id, record)| record.clone().into_item(id))
            .collect();
        items.sort_by(|a, b| a.date_added.cmp(&b.date_added).then(a.id.cmp(&b.id)));
        Ok(items)
    }

    async fn add_to_collection(&self, collection: &str, id: &str) -> Result<(), RepositoryError> {
        self.add_member_locked(collection, id).await
    }

    async fn remove_from_collection(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<(), RepositoryError> {
        let key = Self::collection_key(collection);
        let lock = self.locks.lock_for(&key);
        let _guard = lock.lock().await;

        let mut record = self.load_collection(collection)?;
        if record.remove_member(id) {
            self.store_collection(&record)?;
        }
        Ok(())
    }

    async fn collection_members(&self, collection: &str) -> Result<Vec<String>, RepositoryError> {
        Ok(self.load_collection(collection)?.member_ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn store() -> LocalStatusStore {
        LocalStatusStore::with_database(Database::open_memory().unwrap(), "private")
    }

    #[tokio::test]
    async fn unknown_id_defaults_to_unprocessed() {
        let store = store();
        assert_eq!(
            store.get_status("nowhere").await.unwrap(),
            ItemStatus::Unprocessed
        );
    }

    #[tokio::test]
    async fn lazy_record_keeps_its_date_added() {
        let store = store();
        let first = store.get_item("a").await.unwrap();
        let second = store.get_item("a").await.unwrap();
        assert_eq!(first.date_added, second.date_added);
        assert_eq!(first.status, ItemStatus::Unprocessed);
        assert!(first.last_modified.is_none());
    }

    #[tokio::test]
    async fn saved_status_implies_private_membership() {
        let store = store();
        store.set_status("a", ItemStatus::Saved).await.unwrap();
        assert_eq!(store.get_status("a").await.unwrap(), ItemStatus::Saved);
        assert_eq!(store.collection_members("private").await.unwrap(), vec!["a"]);
    }

    #[tokio::test]
    async fn uploaded_with_no_prior_record() {
        let store = store();
        store.set_status("x", ItemStatus::Uploaded).await.unwrap();

        let item = store.get_item("x").await.unwrap();
        assert_eq!(item.status, ItemStatus::Uploaded);
        assert!(item.last_modified.is_some());
        assert!(store.collection_members("private").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn double_add_is_idempotent_and_keeps_timestamp() {
        let store = store();
        store.add_to_collection("private", "a").await.unwrap();
        let stamped = store.collection("private").unwrap().last_modified;

        store.add_to_collection("private", "a").await.unwrap();
        let collection = store.collection("private").unwrap();
        assert_eq!(collection.member_ids.len(), 1);
        assert_eq!(collection.last_modified, stamped);
    }

    #[tokio::test]
    async fn list_by_status_only_returns_known_records() {
        let store = store();
        store.set_status("a", ItemStatus::Ignored).await.unwrap();
        store.set_status("b", ItemStatus::Saved).await.unwrap();
        store.set_status("c", ItemStatus::Ignored).await.unwrap();

        let ignored = store.list_by_status(ItemStatus::Ignored).await.unwrap();
        let ids: Vec<_> = ignored.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert!(store
            .list_by_status(ItemStatus::Uploaded)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_writes_for_one_id_do_not_corrupt() {
        let store = Arc::new(store());

        let first = {
            let store = store.clone();
            tokio::spawn(async move { store.set_status("z", ItemStatus::Saved).await })
        };
        let second = {
            let store = store.clone();
            tokio::spawn(async move { store.set_status("z", ItemStatus::Ignored).await })
        };
        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();

        let status = store.get_status("z").await.unwrap();
        assert!(status == ItemStatus::Saved || status == ItemStatus::Ignored);
    }
}
