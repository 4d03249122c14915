//! # Swipestream Core Library
//!
//! Core business logic for Swipestream: a de-duplicated, randomized stream
//! of media items the user classifies with one of three decisions (discard,
//! keep, publish), with the decision durably recorded so an item is never
//! re-offered with an unknown status. Rendering, gestures, authentication,
//! and image decoding live in the presentation layer and are reached through
//! the traits in [`source`].
//!
//! ## Key Components
//!
//! - [`SelectionBuffer`]: non-repeating randomized id stream with a bounded
//!   lookahead pool
//! - [`StatusRepository`]: uniform persistence contract with local
//!   (SQLite-backed), remote (HTTP), and in-memory implementations
//! - [`DecisionEngine`]: decision -> status transition -> commit -> advance
//! - [`SyncCoordinator`]: last-writer-wins reconciliation between stores
//! - [`TriageSession`]: explicit wiring of the above for one caller

pub mod buffer;
pub mod engine;
pub mod error;
pub mod model;
pub mod prefetch;
pub mod repository;
pub mod session;
pub mod source;
pub mod storage;
pub mod sync;

pub use buffer::{SelectionBuffer, DEFAULT_POOL_SIZE};
pub use engine::{Decision, DecisionEngine, DecisionOutcome};
pub use error::{BufferError, ConfigError, CoreError, RepositoryError};
pub use model::{Collection, Item, ItemStatus};
pub use prefetch::{PrefetchError, PrefetchHandle, Prefetcher};
pub use repository::{
    ApiClient, LocalStatusStore, MemoryStatusStore, RemoteStatusStore, StatusRepository,
};
pub use session::TriageSession;
pub use source::{IdentifierSource, SortKey, TokenProvider, UploadPipeline};
pub use storage::{ApiConfig, Config, Database};
pub use sync::{decide_merge, MergeDecision, SyncCoordinator, SyncReport};
