//! De-duplicated pre-fetch of asset bytes for pooled items.
//!
//! One outstanding fetch per id: a second request for an id already in
//! flight attaches to the same shared future instead of issuing a new fetch.
//! The future resolves exactly once by construction -- no manually tracked
//! guard flag. Cancellation is explicit and only affects waiters of the
//! cancelled id; buffer and repository state are untouched.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use thiserror::Error;
use tokio::task::AbortHandle;

use crate::error::RepositoryError;
use crate::source::IdentifierSource;

/// Shared asset bytes, cheap to hand to every waiter.
pub type AssetBytes = Arc<Vec<u8>>;

/// Handle to an in-flight (or completed) fetch. Await it to get the bytes;
/// clones share the same resolution.
pub type PrefetchHandle = Shared<BoxFuture<'static, Result<AssetBytes, PrefetchError>>>;

/// Pre-fetch errors. Clonable so every attached waiter sees the outcome.
#[derive(Error, Debug, Clone)]
pub enum PrefetchError {
    /// The fetch was cancelled because the item left the pool.
    #[error("prefetch was cancelled")]
    Cancelled,

    /// The underlying fetch failed.
    #[error("prefetch failed: {0}")]
    Failed(Arc<RepositoryError>),
}

struct Entry {
    abort: AbortHandle,
    handle: PrefetchHandle,
}

/// Pre-fetcher over an [`IdentifierSource`].
///
/// Completed fetches stay in the table until evicted by `cancel` or
/// `retain`, so re-requesting a finished id resolves immediately.
pub struct Prefetcher {
    source: Arc<dyn IdentifierSource>,
    inflight: Mutex<HashMap<String, Entry>>,
}

impl Prefetcher {
    pub fn new(source: Arc<dyn IdentifierSource>) -> Self {
        Self {
            source,
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Start fetching `id`, or attach to the fetch already in flight.
    ///
    /// The fetch runs on the current tokio runtime whether or not the
    /// returned handle is awaited.
    pub fn request(&self, id: &str) -> PrefetchHandle {
        let mut inflight = self.inflight.lock().unwrap();
        if let Some(entry) = inflight.get(id) {
            return entry.handle.clone();
        }

        let source = self.source.clone();
        let owned_id = id.to_string();
        let task = tokio::spawn(async move { source.fetch(&owned_id).await.map(Arc::new) });
        let abort = task.abort_handle();

        let handle: PrefetchHandle = async move {
            match task.await {
                Ok(Ok(bytes)) => Ok(bytes),
                Ok(Err(e)) => Err(PrefetchError::Failed(Arc::new(e))),
                Err(join) if join.is_cancelled() => Err(PrefetchError::Cancelled),
                Err(_) => Err(PrefetchError::Failed(Arc::new(RepositoryError::Unknown))),
            }
        }
        .boxed()
        .shared();

        inflight.insert(
            id.to_string(),
            Entry {
                abort,
                handle: handle.clone(),
            },
        );
        handle
    }

    /// Cancel the fetch for `id`, if any. Waiters observe `Cancelled`.
    pub fn cancel(&self, id: &str) {
        if let Some(entry) = self.inflight.lock().unwrap().remove(id) {
            entry.abort.abort();
            log::debug!("cancelled prefetch for {id}");
        }
    }

    /// Cancel every fetch whose id is not in `keep`. Called after the pool
    /// advances so fetches for departed items stop consuming resources.
    pub fn retain(&self, keep: &[String]) {
        let mut inflight = self.inflight.lock().unwrap();
        inflight.retain(|id, entry| {
            if keep.iter().any(|k| k == id) {
                true
            } else {
                entry.abort.abort();
                false
            }
        });
    }

    /// Number of tracked fetches, in flight or completed.
    pub fn tracked(&self) -> usize {
        self.inflight.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use crate::source::SortKey;

    struct CountingSource {
        fetches: AtomicUsize,
        delay: Duration,
    }

    impl CountingSource {
        fn new(delay: Duration) -> Self {
            Self {
                fetches: AtomicUsize::new(0),
                delay,
            }
        }
    }

    #[async_trait]
    impl IdentifierSource for CountingSource {
        async fn list_all(&self, _sort: SortKey) -> Result<Vec<String>, RepositoryError> {
            Ok(Vec::new())
        }

        async fn fetch(&self, id: &str) -> Result<Vec<u8>, RepositoryError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(id.as_bytes().to_vec())
        }
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_fetch() {
        let source = Arc::new(CountingSource::new(Duration::from_millis(20)));
        let prefetcher = Prefetcher::new(source.clone());

        let first = prefetcher.request("a");
        let second = prefetcher.request("a");
        let (left, right) = tokio::join!(first, second);
        assert_eq!(left.unwrap().as_slice(), b"a");
        assert_eq!(right.unwrap().as_slice(), b"a");
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn completed_fetch_resolves_again_without_refetching() {
        let source = Arc::new(CountingSource::new(Duration::ZERO));
        let prefetcher = Prefetcher::new(source.clone());

        prefetcher.request("a").await.unwrap();
        prefetcher.request("a").await.unwrap();
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancellation_surfaces_to_waiters() {
        let source = Arc::new(CountingSource::new(Duration::from_secs(30)));
        let prefetcher = Prefetcher::new(source);

        let handle = prefetcher.request("a");
        prefetcher.cancel("a");
        assert!(matches!(handle.await, Err(PrefetchError::Cancelled)));
        assert_eq!(prefetcher.tracked(), 0);
    }

    #[tokio::test]
    async fn retain_drops_everything_outside_the_pool() {
        let source = Arc::new(CountingSource::new(Duration::from_secs(30)));
        let prefetcher = Prefetcher::new(source);

        let doomed = prefetcher.request("gone");
        let _kept = prefetcher.request("kept");
        prefetcher.retain(&["kept".to_string()]);

        assert_eq!(prefetcher.tracked(), 1);
        assert!(matches!(doomed.await, Err(PrefetchError::Cancelled)));
    }
}
