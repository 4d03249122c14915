//! Networked status store.
//!
//! Wraps the remote API behind the same [`StatusRepository`] contract as the
//! local store. The backend only supports a subset of the contract today;
//! unsupported operations are documented no-ops rather than errors, so the
//! two stores stay interchangeable.
//!
//! Every call carries a bearer credential when the external auth
//! collaborator has one. A missing credential is not fatal -- the request
//! goes out unauthenticated and the server answers `Unauthorized`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use url::Url;

use super::StatusRepository;
use crate::error::{ConfigError, CoreError, RepositoryError};
use crate::model::{Item, ItemStatus};
use crate::source::{TokenProvider, UploadPipeline};

const PRIVATE_COLLECTION_PATH: &str = "collections/private";
const PRIVATE_ADD_PATH: &str = "collections/private/add";
const PUBLIC_FEED_PATH: &str = "photos/public";

/// Thin async client over the remote API.
pub struct ApiClient {
    http: Client,
    base: Url,
    tokens: Arc<dyn TokenProvider>,
}

impl ApiClient {
    /// Build a client for `base_url` with a per-request timeout.
    ///
    /// # Errors
    /// Returns an error if the base URL does not parse or the HTTP client
    /// cannot be constructed.
    pub fn new(
        base_url: &str,
        timeout: Duration,
        tokens: Arc<dyn TokenProvider>,
    ) -> Result<Self, CoreError> {
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        let base = Url::parse(&normalized).map_err(|e| ConfigError::InvalidValue {
            key: "api.base_url".to_string(),
            message: e.to_string(),
        })?;
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(RepositoryError::from)?;
        Ok(Self {
            http,
            base,
            tokens,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, RepositoryError> {
        self.base
            .join(path)
            .map_err(|e| RepositoryError::Server(format!("invalid endpoint '{path}': {e}")))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.tokens.bearer_token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, RepositoryError> {
        let request = self.authorize(self.http.get(self.endpoint(path)?));
        let response = request.send().await.map_err(RepositoryError::from)?;
        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status, response.text().await.ok()));
        }
        response
            .json()
            .await
            .map_err(|e| RepositoryError::Server(format!("invalid response format: {e}")))
    }

    async fn post_json(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<(), RepositoryError> {
        let request = self.authorize(self.http.post(self.endpoint(path)?).json(body));
        let response = request.send().await.map_err(RepositoryError::from)?;
        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status, response.text().await.ok()));
        }
        Ok(())
    }

    /// Multipart upload: one binary part plus the item metadata fields.
    async fn upload_multipart(
        &self,
        path: &str,
        data: Vec<u8>,
        photo_id: &str,
        creation_date: Option<DateTime<Utc>>,
    ) -> Result<(), RepositoryError> {
        let part = Part::bytes(data)
            .file_name("photo.jpg")
            .mime_str("image/jpeg")
            .map_err(RepositoryError::from)?;
        let form = Form::new()
            .part("photo", part)
            .text("photoId", photo_id.to_string())
            .text(
                "creationDate",
                creation_date.map(|d| d.timestamp()).unwrap_or(0).to_string(),
            );

        let request = self.authorize(self.http.post(self.endpoint(path)?).multipart(form));
        let response = request.send().await.map_err(RepositoryError::from)?;
        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status, response.text().await.ok()));
        }
        Ok(())
    }
}

/// Map an HTTP status onto the shared error taxonomy. Raw transport errors
/// never leak to callers.
fn classify_status(status: StatusCode, body: Option<String>) -> RepositoryError {
    match status {
        StatusCode::UNAUTHORIZED => RepositoryError::Unauthorized,
        StatusCode::FORBIDDEN => RepositoryError::PermissionDenied,
        StatusCode::NOT_FOUND => RepositoryError::NotFound,
        StatusCode::REQUEST_TIMEOUT => RepositoryError::Timeout,
        s if s.is_server_error() => {
            let message = body.filter(|b| !b.is_empty()).unwrap_or_else(|| s.to_string());
            RepositoryError::Server(message)
        }
        _ => RepositoryError::Unknown,
    }
}

#[derive(Debug, Deserialize)]
struct PrivateCollectionResponse {
    #[serde(rename = "photoIds")]
    photo_ids: Vec<String>,
}

/// Remote implementation of [`StatusRepository`].
///
/// Also caches asset bytes it has handled (`id -> bytes`). The cache has no
/// eviction policy; callers must not assume LRU semantics.
pub struct RemoteStatusStore {
    api: ApiClient,
    private_collection: String,
    asset_cache: Mutex<HashMap<String, Arc<Vec<u8>>>>,
}

impl RemoteStatusStore {
    pub fn new(api: ApiClient, private_collection: impl Into<String>) -> Self {
        Self {
            api,
            private_collection: private_collection.into(),
            asset_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Bytes previously handled for `id`, if still cached.
    pub fn cached_asset(&self, id: &str) -> Option<Arc<Vec<u8>>> {
        self.asset_cache.lock().unwrap().get(id).cloned()
    }

    fn cache_asset(&self, id: &str, data: &[u8]) {
        self.asset_cache
            .lock()
            .unwrap()
            .insert(id.to_string(), Arc::new(data.to_vec()));
    }

    async fn fetch_private_ids(&self) -> Result<Vec<String>, RepositoryError> {
        let response: PrivateCollectionResponse =
            self.api.get_json(PRIVATE_COLLECTION_PATH).await?;
        Ok(response.photo_ids)
    }
}

#[async_trait]
impl StatusRepository for RemoteStatusStore {
    /// The backend has no per-id status endpoint; every id reads as
    /// `Unprocessed` here.
    async fn get_status(&self, _id: &str) -> Result<ItemStatus, RepositoryError> {
        Ok(ItemStatus::Unprocessed)
    }

    /// Ephemeral record; the remote store persists nothing per id.
    async fn get_item(&self, id: &str) -> Result<Item, RepositoryError> {
        Ok(Item::new(id))
    }

    async fn set_status(&self, id: &str, new_status: ItemStatus) -> Result<(), RepositoryError> {
        match new_status {
            ItemStatus::Saved => {
                self.api
                    .post_json(PRIVATE_ADD_PATH, &json!({ "photoId": id }))
                    .await
            }
            // No remote action for these; uploads go through the pipeline.
            ItemStatus::Ignored | ItemStatus::Uploaded | ItemStatus::Unprocessed => Ok(()),
        }
    }

    /// Only the private collection is enumerable remotely.
    async fn list_by_status(&self, status: ItemStatus) -> Result<Vec<Item>, RepositoryError> {
        if status != ItemStatus::Saved {
            return Ok(Vec::new());
        }
        let ids = self.fetch_private_ids().await?;
        Ok(ids
            .into_iter()
            .map(|id| Item::with_status(id, ItemStatus::Saved))
            .collect())
    }

    async fn add_to_collection(&self, collection: &str, id: &str) -> Result<(), RepositoryError> {
        if collection != self.private_collection {
            log::debug!("remote backend only supports the private collection, ignoring add to '{collection}'");
            return Ok(());
        }
        self.api
            .post_json(PRIVATE_ADD_PATH, &json!({ "photoId": id }))
            .await
    }

    /// The backend does not support removal yet.
    async fn remove_from_collection(
        &self,
        _collection: &str,
        _id: &str,
    ) -> Result<(), RepositoryError> {
        Ok(())
    }

    async fn collection_members(&self, collection: &str) -> Result<Vec<String>, RepositoryError> {
        if collection != self.private_collection {
            return Ok(Vec::new());
        }
        self.fetch_private_ids().await
    }
}

#[async_trait]
impl UploadPipeline for RemoteStatusStore {
    async fn upload(
        &self,
        id: &str,
        creation_date: Option<DateTime<Utc>>,
        data: Vec<u8>,
    ) -> Result<(), RepositoryError> {
        self.cache_asset(id, &data);
        self.api
            .upload_multipart(PUBLIC_FEED_PATH, data, id, creation_date)
            .await
    }
}
