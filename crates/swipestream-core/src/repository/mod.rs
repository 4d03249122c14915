//! Per-item status persistence behind a uniform contract.
//!
//! Presentation code holds `Arc<dyn StatusRepository>` only, never a concrete
//! store, so the local, remote, and in-memory implementations stay
//! interchangeable.

mod local;
mod memory;
mod remote;

pub use local::LocalStatusStore;
pub use memory::MemoryStatusStore;
pub use remote::{ApiClient, RemoteStatusStore};

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::RepositoryError;
use crate::model::{Item, ItemStatus};

/// Uniform persistence contract for item status and collection membership.
///
/// Implementations guarantee that a `Saved` status implies membership of the
/// item in the canonical private collection.
#[async_trait]
pub trait StatusRepository: Send + Sync {
    /// Status for `id`; `Unprocessed` when no record exists.
    async fn get_status(&self, id: &str) -> Result<ItemStatus, RepositoryError>;

    /// Full item record, created lazily with `Unprocessed` if absent.
    async fn get_item(&self, id: &str) -> Result<Item, RepositoryError>;

    /// Persist a new status, stamping the modification timestamp.
    ///
    /// # Errors
    /// `SaveFailed` when the write cannot be verified as durable.
    async fn set_status(&self, id: &str, new_status: ItemStatus) -> Result<(), RepositoryError>;

    /// All known items with the given status.
    async fn list_by_status(&self, status: ItemStatus) -> Result<Vec<Item>, RepositoryError>;

    /// Add `id` to a collection. Adding an already-present id is a true
    /// no-op: no membership change, no timestamp change.
    async fn add_to_collection(&self, collection: &str, id: &str) -> Result<(), RepositoryError>;

    /// Remove `id` from a collection. Idempotent.
    async fn remove_from_collection(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<(), RepositoryError>;

    /// Ordered member ids of a collection.
    async fn collection_members(&self, collection: &str) -> Result<Vec<String>, RepositoryError>;

    /// Reconciliation hook. Stores with nothing to reconcile keep the
    /// default no-op; cross-store reconciliation lives in `SyncCoordinator`.
    async fn sync(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

/// Per-key async locks, used to serialize status writes for a given id: a
/// second write for the same id waits for the first to complete or fail.
pub(crate) struct IdLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl IdLocks {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// The lock guarding writes for `key`, created on first use.
    pub fn lock_for(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap();
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_key_yields_same_lock() {
        let locks = IdLocks::new();
        let a = locks.lock_for("x");
        let b = locks.lock_for("x");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &locks.lock_for("y")));
    }
}
