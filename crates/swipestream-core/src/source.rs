//! Seams for the external collaborators this core depends on.
//!
//! The device media library, the auth service, and the upload pipeline all
//! live outside this crate; the core talks to them through these traits and
//! nothing else.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::RepositoryError;

/// Ordering applied to the identifier enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    CreationDateAscending,
    CreationDateDescending,
}

/// Read-only enumeration and retrieval of media assets.
#[async_trait]
pub trait IdentifierSource: Send + Sync {
    /// All available item identifiers, in the requested order.
    async fn list_all(&self, sort: SortKey) -> Result<Vec<String>, RepositoryError>;

    /// Encoded asset bytes for one item.
    async fn fetch(&self, id: &str) -> Result<Vec<u8>, RepositoryError>;

    /// Creation timestamp of the underlying asset, when the library knows it.
    async fn creation_date(&self, _id: &str) -> Result<Option<DateTime<Utc>>, RepositoryError> {
        Ok(None)
    }
}

/// Bearer credential lookup, provided by the external auth collaborator.
///
/// A missing credential is not fatal: remote calls proceed unauthenticated
/// and the server is expected to answer with `Unauthorized`.
pub trait TokenProvider: Send + Sync {
    fn bearer_token(&self) -> Option<String>;
}

/// Provider that never has a credential. Useful before sign-in and in tests.
pub struct NoToken;

impl TokenProvider for NoToken {
    fn bearer_token(&self) -> Option<String> {
        None
    }
}

/// Destination for published items.
#[async_trait]
pub trait UploadPipeline: Send + Sync {
    /// Upload one item's bytes. Failure here does not undo the `Uploaded`
    /// status; the decision engine records it optimistically and reports the
    /// upload failure separately.
    async fn upload(
        &self,
        id: &str,
        creation_date: Option<DateTime<Utc>>,
        data: Vec<u8>,
    ) -> Result<(), RepositoryError>;
}
