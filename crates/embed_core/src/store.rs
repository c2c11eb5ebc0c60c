//! Store abstraction the load controller fetches memos through.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use shared::{
    domain::MemoId,
    error::{ApiError, ErrorCode},
    protocol::Memo,
};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;
use url::Url;

/// Failure reported by a [`MemoStore`]. The nested `body.message` is the text
/// shown to users.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("memo store request failed: {}", .body.message)]
pub struct StoreError {
    pub status: Option<u16>,
    pub body: ApiError,
}

impl StoreError {
    pub fn new(status: Option<u16>, body: ApiError) -> Self {
        Self { status, body }
    }

    pub fn message(&self) -> &str {
        &self.body.message
    }

    pub fn code(&self) -> ErrorCode {
        self.body.code
    }
}

impl From<ApiError> for StoreError {
    fn from(body: ApiError) -> Self {
        Self { status: None, body }
    }
}

#[async_trait]
pub trait MemoStore: Send + Sync {
    async fn fetch_memo_by_id(&self, memo_id: MemoId) -> Result<Memo, StoreError>;
}

/// Fetches memos from a memo server over `GET {base}/api/memo/{id}`.
pub struct HttpMemoStore {
    http: Client,
    base_url: Url,
}

impl HttpMemoStore {
    pub fn new(server_url: &str) -> Result<Self, url::ParseError> {
        Self::with_client(Client::new(), server_url)
    }

    pub fn with_client(http: Client, server_url: &str) -> Result<Self, url::ParseError> {
        let mut base_url = Url::parse(server_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { http, base_url })
    }

    pub fn memo_url(&self, memo_id: MemoId) -> Result<Url, url::ParseError> {
        self.base_url.join(&format!("api/memo/{}", memo_id.0))
    }
}

#[async_trait]
impl MemoStore for HttpMemoStore {
    async fn fetch_memo_by_id(&self, memo_id: MemoId) -> Result<Memo, StoreError> {
        let url = self
            .memo_url(memo_id)
            .map_err(|e| StoreError::from(ApiError::internal(format!("invalid memo url: {e}"))))?;
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| StoreError::from(ApiError::internal(e.to_string())))?;

        let status = response.status();
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            return Err(error_from_response(status, &raw));
        }

        response.json::<Memo>().await.map_err(|e| {
            StoreError::new(
                Some(status.as_u16()),
                ApiError::internal(format!("invalid memo payload from server: {e}")),
            )
        })
    }
}

fn error_from_response(status: StatusCode, raw_body: &str) -> StoreError {
    let body = serde_json::from_str::<ApiError>(raw_body).unwrap_or_else(|_| {
        let message = status
            .canonical_reason()
            .map(str::to_string)
            .unwrap_or_else(|| format!("request failed with status {}", status.as_u16()));
        ApiError::new(code_for_status(status), message)
    });
    StoreError::new(Some(status.as_u16()), body)
}

fn code_for_status(status: StatusCode) -> ErrorCode {
    match status {
        StatusCode::UNAUTHORIZED => ErrorCode::Unauthorized,
        StatusCode::FORBIDDEN => ErrorCode::Forbidden,
        StatusCode::NOT_FOUND => ErrorCode::NotFound,
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => ErrorCode::Validation,
        _ => ErrorCode::Internal,
    }
}

/// Keeps successfully fetched memos by id. Failures pass through uncached.
pub struct CachedMemoStore<S> {
    inner: S,
    cache: RwLock<HashMap<MemoId, Memo>>,
}

impl<S: MemoStore> CachedMemoStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub async fn cached(&self, memo_id: MemoId) -> Option<Memo> {
        self.cache.read().await.get(&memo_id).cloned()
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: MemoStore> MemoStore for CachedMemoStore<S> {
    async fn fetch_memo_by_id(&self, memo_id: MemoId) -> Result<Memo, StoreError> {
        if let Some(memo) = self.cached(memo_id).await {
            debug!(memo_id = memo_id.0, "memo served from cache");
            return Ok(memo);
        }

        let memo = self.inner.fetch_memo_by_id(memo_id).await?;
        self.cache.write().await.insert(memo_id, memo.clone());
        Ok(memo)
    }
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
