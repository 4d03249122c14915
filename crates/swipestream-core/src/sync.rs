//! Reconciliation between the local and remote status stores.
//!
//! Pulls remote records, resolves divergence with last-writer-wins by
//! modification timestamp, and pushes local-only decisions the remote store
//! has never seen. Reconciliation is best-effort per id: one failing id
//! never aborts the rest, failures are reported in the [`SyncReport`].

use std::sync::Arc;

use crate::error::RepositoryError;
use crate::model::{Item, ItemStatus};
use crate::repository::StatusRepository;

/// Merge decision for one id present in both stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeDecision {
    UseLocal,
    UseRemote,
}

/// Last-writer-wins by `last_modified`. When a timestamp is absent on either
/// side the local record wins: the local store is the authoritative cache of
/// user intent, since it is always available.
pub fn decide_merge(local: &Item, remote: &Item) -> MergeDecision {
    match (local.last_modified, remote.last_modified) {
        (Some(local_ts), Some(remote_ts)) if remote_ts > local_ts => MergeDecision::UseRemote,
        _ => MergeDecision::UseLocal,
    }
}

/// Outcome of one reconciliation run.
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Ids pushed to the remote store.
    pub pushed: Vec<String>,
    /// Ids whose local record was updated from the remote store.
    pub pulled: Vec<String>,
    /// Ids (or endpoints) that failed, with the classified error.
    pub failed: Vec<(String, RepositoryError)>,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Reconciles a local and a remote [`StatusRepository`].
pub struct SyncCoordinator {
    local: Arc<dyn StatusRepository>,
    remote: Arc<dyn StatusRepository>,
    private_collection: String,
}

impl SyncCoordinator {
    pub fn new(
        local: Arc<dyn StatusRepository>,
        remote: Arc<dyn StatusRepository>,
        private_collection: impl Into<String>,
    ) -> Self {
        Self {
            local,
            remote,
            private_collection: private_collection.into(),
        }
    }

    /// Run one full reconciliation pass.
    pub async fn sync(&self) -> SyncReport {
        let mut report = SyncReport::default();

        // Pull: remote saved records are the only remotely enumerable set.
        let remote_saved = match self.remote.list_by_status(ItemStatus::Saved).await {
            Ok(items) => items,
            Err(err) => {
                log::warn!("failed to enumerate remote collection: {err}");
                report.failed.push(("collections/private".to_string(), err));
                Vec::new()
            }
        };

        let remote_ids: Vec<String> = remote_saved.iter().map(|i| i.id.clone()).collect();
        for remote_item in remote_saved {
            let id = remote_item.id.clone();
            match self.reconcile_remote(&remote_item).await {
                Ok(true) => report.pulled.push(id),
                Ok(false) => {}
                Err(err) => {
                    log::warn!("failed to reconcile {id}: {err}");
                    report.failed.push((id, err));
                }
            }
        }

        // Push: local decisions the remote store has never seen.
        for status in [ItemStatus::Ignored, ItemStatus::Saved, ItemStatus::Uploaded] {
            let local_items = match self.local.list_by_status(status).await {
                Ok(items) => items,
                Err(err) => {
                    report.failed.push((format!("local:{}", status.as_str()), err));
                    continue;
                }
            };
            for item in local_items {
                if remote_ids.contains(&item.id) {
                    continue;
                }
                match self.push(&item).await {
                    Ok(()) => report.pushed.push(item.id),
                    Err(err) => {
                        log::warn!("failed to push {}: {err}", item.id);
                        report.failed.push((item.id, err));
                    }
                }
            }
        }

        log::debug!(
            "sync finished: {} pushed, {} pulled, {} failed",
            report.pushed.len(),
            report.pulled.len(),
            report.failed.len()
        );
        report
    }

    /// Apply one remote record locally when it wins. Returns whether the
    /// local store changed.
    async fn reconcile_remote(&self, remote_item: &Item) -> Result<bool, RepositoryError> {
        let local_item = self.local.get_item(&remote_item.id).await?;
        if local_item.status == remote_item.status {
            return Ok(false);
        }

        // An undecided local record is not a conflict; just take the remote
        // decision. Otherwise last-writer-wins.
        let apply_remote = !local_item.status.is_processed()
            || decide_merge(&local_item, remote_item) == MergeDecision::UseRemote;
        if !apply_remote {
            return Ok(false);
        }

        self.local
            .set_status(&remote_item.id, remote_item.status)
            .await?;
        if remote_item.status == ItemStatus::Saved {
            self.local
                .add_to_collection(&self.private_collection, &remote_item.id)
                .await?;
        }
        Ok(true)
    }

    async fn push(&self, item: &Item) -> Result<(), RepositoryError> {
        self.remote.set_status(&item.id, item.status).await?;
        if item.status == ItemStatus::Saved {
            self.remote
                .add_to_collection(&self.private_collection, &item.id)
                .await?;
        }
        Ok(())
    }
}
