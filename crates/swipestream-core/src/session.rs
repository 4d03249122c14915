//! Triage session: explicit wiring of the core components for one caller.
//!
//! There is no ambient global state. Everything a session needs -- the
//! identifier source, the repository, the optional upload pipeline, and the
//! configuration -- is passed in at construction and owned by the session
//! value.

use std::sync::Arc;

use crate::buffer::SelectionBuffer;
use crate::engine::{Decision, DecisionEngine, DecisionOutcome};
use crate::error::{CoreError, Result};
use crate::prefetch::{PrefetchHandle, Prefetcher};
use crate::repository::StatusRepository;
use crate::source::{IdentifierSource, SortKey, UploadPipeline};
use crate::storage::Config;

/// One user-facing triage run over the media library.
pub struct TriageSession {
    buffer: Arc<SelectionBuffer>,
    engine: DecisionEngine,
    prefetcher: Prefetcher,
}

impl TriageSession {
    /// Enumerate the library and build the session.
    ///
    /// # Errors
    /// Fails if enumeration fails or yields no identifiers; there is no
    /// recovery without a non-empty candidate set.
    pub async fn start(
        config: &Config,
        source: Arc<dyn IdentifierSource>,
        repository: Arc<dyn StatusRepository>,
        pipeline: Option<Arc<dyn UploadPipeline>>,
    ) -> Result<Self> {
        let candidates = source
            .list_all(SortKey::CreationDateDescending)
            .await
            .map_err(CoreError::Repository)?;
        let buffer = Arc::new(SelectionBuffer::new(candidates, config.pool_size)?);
        let engine = DecisionEngine::new(
            buffer.clone(),
            repository,
            source.clone(),
            pipeline,
            config.private_collection.clone(),
        );
        let prefetcher = Prefetcher::new(source);

        let session = Self {
            buffer,
            engine,
            prefetcher,
        };
        session.refresh_prefetch();
        Ok(session)
    }

    /// Identifier of the item currently offered to the user.
    pub fn current(&self) -> Result<String> {
        Ok(self.buffer.current()?)
    }

    /// Upcoming identifiers, head first.
    pub fn lookahead(&self) -> Vec<String> {
        self.buffer.lookahead()
    }

    /// Commit a decision for the current item and move the stream forward,
    /// keeping the pre-fetch window in step with the pool.
    pub async fn decide(&self, decision: Decision) -> Result<DecisionOutcome> {
        let outcome = self.engine.decide(decision).await?;
        self.refresh_prefetch();
        Ok(outcome)
    }

    /// Asset bytes for an id, shared with any fetch already in flight.
    pub fn asset(&self, id: &str) -> PrefetchHandle {
        self.prefetcher.request(id)
    }

    /// Start fetches for every pooled id and cancel fetches for ids that
    /// left the pool.
    fn refresh_prefetch(&self) {
        let pool = self.buffer.lookahead();
        self.prefetcher.retain(&pool);
        for id in &pool {
            let _ = self.prefetcher.request(id);
        }
    }
}
