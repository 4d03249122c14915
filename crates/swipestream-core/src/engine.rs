//! Decision engine: maps a user decision onto a status transition.
//!
//! ## State transitions
//!
//! ```text
//! Unprocessed -> Ignored   (discard)
//! Unprocessed -> Saved     (keep, + private collection membership)
//! Unprocessed -> Uploaded  (publish, + hand-off to the upload pipeline)
//! ```
//!
//! The three decided statuses are terminal; a decision on an already
//! processed item changes nothing.
//!
//! After committing a transition the engine advances the selection buffer
//! unconditionally -- even when persistence failed -- so the current item is
//! never re-offered in the same pass and the user is never stuck. Failures
//! are reported through [`DecisionOutcome`] instead of blocking the stream.

use std::sync::Arc;

use crate::buffer::SelectionBuffer;
use crate::error::{CoreError, RepositoryError};
use crate::model::ItemStatus;
use crate::repository::StatusRepository;
use crate::source::{IdentifierSource, UploadPipeline};

/// One of the three user decisions for the current item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Discard,
    Keep,
    Publish,
}

impl Decision {
    /// Status recorded for this decision.
    pub fn target_status(self) -> ItemStatus {
        match self {
            Decision::Discard => ItemStatus::Ignored,
            Decision::Keep => ItemStatus::Saved,
            Decision::Publish => ItemStatus::Uploaded,
        }
    }
}

/// What happened while committing one decision.
#[derive(Debug)]
pub struct DecisionOutcome {
    pub item_id: String,
    /// Status on record after the decision.
    pub status: ItemStatus,
    /// Persistence failure, if any. The stream advanced regardless.
    pub persist_error: Option<RepositoryError>,
    /// Upload hand-off failure, if any. The status stays `Uploaded`.
    pub upload_error: Option<RepositoryError>,
}

impl DecisionOutcome {
    pub fn is_clean(&self) -> bool {
        self.persist_error.is_none() && self.upload_error.is_none()
    }
}

/// Ties a user decision to a status transition, a repository commit, and
/// buffer advancement.
pub struct DecisionEngine {
    buffer: Arc<SelectionBuffer>,
    repository: Arc<dyn StatusRepository>,
    source: Arc<dyn IdentifierSource>,
    pipeline: Option<Arc<dyn UploadPipeline>>,
    private_collection: String,
}

impl DecisionEngine {
    pub fn new(
        buffer: Arc<SelectionBuffer>,
        repository: Arc<dyn StatusRepository>,
        source: Arc<dyn IdentifierSource>,
        pipeline: Option<Arc<dyn UploadPipeline>>,
        private_collection: impl Into<String>,
    ) -> Self {
        Self {
            buffer,
            repository,
            source,
            pipeline,
            private_collection: private_collection.into(),
        }
    }

    /// Commit `decision` for the current item and advance the stream.
    ///
    /// # Errors
    /// Only fails when there is no current item, which cannot happen for a
    /// successfully constructed buffer.
    pub async fn decide(&self, decision: Decision) -> Result<DecisionOutcome, CoreError> {
        let id = self.buffer.current()?;
        let outcome = self.commit(&id, decision).await;
        // The current item must never be re-offered in this pass, persistence
        // failure included.
        self.buffer.advance();
        if let Some(err) = &outcome.persist_error {
            log::warn!("failed to persist decision for {id}: {err}");
        }
        Ok(outcome)
    }

    async fn commit(&self, id: &str, decision: Decision) -> DecisionOutcome {
        // Terminal statuses are never overwritten.
        if let Ok(existing) = self.repository.get_status(id).await {
            if existing.is_processed() {
                log::warn!("item {id} already has status {}, skipping", existing.as_str());
                return DecisionOutcome {
                    item_id: id.to_string(),
                    status: existing,
                    persist_error: None,
                    upload_error: None,
                };
            }
        }

        let new_status = decision.target_status();
        let mut persist_error = self.repository.set_status(id, new_status).await.err();

        if decision == Decision::Keep && persist_error.is_none() {
            persist_error = self
                .repository
                .add_to_collection(&self.private_collection, id)
                .await
                .err();
        }

        let upload_error = if decision == Decision::Publish {
            self.hand_off_upload(id).await.err()
        } else {
            None
        };

        DecisionOutcome {
            item_id: id.to_string(),
            status: new_status,
            persist_error,
            upload_error,
        }
    }

    /// Optimistic hand-off: the `Uploaded` status is already on record, only
    /// the upload itself is reported here.
    async fn hand_off_upload(&self, id: &str) -> Result<(), RepositoryError> {
        let Some(pipeline) = &self.pipeline else {
            log::debug!("no upload pipeline configured, skipping hand-off for {id}");
            return Ok(());
        };
        let data = self.source.fetch(id).await?;
        let creation_date = self.source.creation_date(id).await.unwrap_or(None);
        pipeline.upload(id, creation_date, data).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    use crate::model::Item;
    use crate::repository::MemoryStatusStore;
    use crate::source::SortKey;

    struct StubSource;

    #[async_trait]
    impl IdentifierSource for StubSource {
        async fn list_all(&self, _sort: SortKey) -> Result<Vec<String>, RepositoryError> {
            Ok(vec!["a".into(), "b".into(), "c".into()])
        }

        async fn fetch(&self, id: &str) -> Result<Vec<u8>, RepositoryError> {
            Ok(id.as_bytes().to_vec())
        }
    }

    struct FailingPipeline;

    #[async_trait]
    impl UploadPipeline for FailingPipeline {
        async fn upload(
            &self,
            _id: &str,
            _creation_date: Option<DateTime<Utc>>,
            _data: Vec<u8>,
        ) -> Result<(), RepositoryError> {
            Err(RepositoryError::Server("feed is down".into()))
        }
    }

    struct FailingRepo;

    #[async_trait]
    impl StatusRepository for FailingRepo {
        async fn get_status(&self, _id: &str) -> Result<ItemStatus, RepositoryError> {
            Ok(ItemStatus::Unprocessed)
        }

        async fn get_item(&self, id: &str) -> Result<Item, RepositoryError> {
            Ok(Item::new(id))
        }

        async fn set_status(
            &self,
            _id: &str,
            _new_status: ItemStatus,
        ) -> Result<(), RepositoryError> {
            Err(RepositoryError::SaveFailed)
        }

        async fn list_by_status(&self, _status: ItemStatus) -> Result<Vec<Item>, RepositoryError> {
            Ok(Vec::new())
        }

        async fn add_to_collection(
            &self,
            _collection: &str,
            _id: &str,
        ) -> Result<(), RepositoryError> {
            Err(RepositoryError::SaveFailed)
        }

        async fn remove_from_collection(
            &self,
            _collection: &str,
            _id: &str,
        ) -> Result<(), RepositoryError> {
            Ok(())
        }

        async fn collection_members(
            &self,
            _collection: &str,
        ) -> Result<Vec<String>, RepositoryError> {
            Ok(Vec::new())
        }
    }

    fn engine_with(
        repository: Arc<dyn StatusRepository>,
        pipeline: Option<Arc<dyn UploadPipeline>>,
    ) -> DecisionEngine {
        let ids = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let buffer = Arc::new(SelectionBuffer::with_seed(ids, 2, 11).unwrap());
        DecisionEngine::new(buffer, repository, Arc::new(StubSource), pipeline, "private")
    }

    #[tokio::test]
    async fn discard_records_ignored_and_advances() {
        let repo = Arc::new(MemoryStatusStore::default());
        let engine = engine_with(repo.clone(), None);

        let before = engine.buffer.current().unwrap();
        let outcome = engine.decide(Decision::Discard).await.unwrap();
        assert!(outcome.is_clean());
        assert_eq!(outcome.item_id, before);
        assert_eq!(
            repo.get_status(&before).await.unwrap(),
            ItemStatus::Ignored
        );
        assert_ne!(engine.buffer.current().unwrap(), before);
    }

    #[tokio::test]
    async fn keep_adds_private_membership() {
        let repo = Arc::new(MemoryStatusStore::default());
        let engine = engine_with(repo.clone(), None);

        let id = engine.buffer.current().unwrap();
        engine.decide(Decision::Keep).await.unwrap();
        assert_eq!(repo.get_status(&id).await.unwrap(), ItemStatus::Saved);
        assert_eq!(repo.collection_members("private").await.unwrap(), vec![id]);
    }

    #[tokio::test]
    async fn publish_stays_uploaded_when_the_pipeline_fails() {
        let repo = Arc::new(MemoryStatusStore::default());
        let engine = engine_with(repo.clone(), Some(Arc::new(FailingPipeline)));

        let id = engine.buffer.current().unwrap();
        let outcome = engine.decide(Decision::Publish).await.unwrap();
        assert!(outcome.persist_error.is_none());
        assert!(matches!(
            outcome.upload_error,
            Some(RepositoryError::Server(_))
        ));
        assert_eq!(repo.get_status(&id).await.unwrap(), ItemStatus::Uploaded);
        assert_ne!(engine.buffer.current().unwrap(), id);
    }

    #[tokio::test]
    async fn persistence_failure_still_advances_the_stream() {
        let engine = engine_with(Arc::new(FailingRepo), None);

        let before = engine.buffer.current().unwrap();
        let outcome = engine.decide(Decision::Keep).await.unwrap();
        assert!(matches!(
            outcome.persist_error,
            Some(RepositoryError::SaveFailed)
        ));
        assert_ne!(engine.buffer.current().unwrap(), before);
    }

    #[tokio::test]
    async fn processed_items_are_never_overwritten() {
        let repo = Arc::new(MemoryStatusStore::default());
        let engine = engine_with(repo.clone(), None);

        let id = engine.buffer.current().unwrap();
        repo.set_status(&id, ItemStatus::Saved).await.unwrap();

        let outcome = engine.decide(Decision::Discard).await.unwrap();
        assert_eq!(outcome.status, ItemStatus::Saved);
        assert_eq!(repo.get_status(&id).await.unwrap(), ItemStatus::Saved);
        assert_ne!(engine.buffer.current().unwrap(), id);
    }
}
