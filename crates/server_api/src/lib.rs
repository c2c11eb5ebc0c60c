use async_trait::async_trait;
use embed_core::{MemoStore, StoreError};
use shared::{
    domain::{MemoId, RowStatus, UserId, Visibility},
    error::{ApiError, ErrorCode},
    protocol::{Memo, Resource},
};
use storage::{Storage, StoredMemo, StoredResource};
use tracing::debug;

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
}

pub fn memo_route() -> &'static str {
    "/api/memo/:memo_id"
}

pub fn embed_route() -> &'static str {
    "/m/:memo_id/embed"
}

pub fn explore_feed_route() -> &'static str {
    "/explore/rss.xml"
}

pub fn user_feed_route() -> &'static str {
    "/u/:user_id/rss.xml"
}

/// Feeds never carry more items than this.
pub const MAX_FEED_ITEMS: i64 = 100;

/// Loads a memo with its resources, applying visibility rules for `viewer`.
pub async fn get_memo(
    ctx: &ApiContext,
    viewer: Option<UserId>,
    memo_id: MemoId,
) -> Result<Memo, ApiError> {
    let memo = ctx
        .storage
        .find_memo(memo_id)
        .await
        .map_err(internal)?
        .filter(|memo| memo.row_status == RowStatus::Normal)
        .ok_or_else(|| ApiError::not_found(format!("Memo not found: {}", memo_id.0)))?;

    ensure_visible(&memo, viewer)?;

    let resources = ctx
        .storage
        .list_resources_for_memo(memo_id)
        .await
        .map_err(internal)?;
    debug!(memo_id = memo_id.0, resources = resources.len(), "memo resolved");

    Ok(memo_payload(memo, resources))
}

/// Public, non-archived memos for a feed, newest first. A creator filter
/// must name an existing user.
pub async fn list_feed_memos(
    ctx: &ApiContext,
    creator_id: Option<UserId>,
) -> Result<Vec<Memo>, ApiError> {
    if let Some(creator_id) = creator_id {
        ctx.storage
            .username_for_user(creator_id)
            .await
            .map_err(internal)?
            .ok_or_else(|| ApiError::not_found(format!("User not found: {}", creator_id.0)))?;
    }

    let memos = ctx
        .storage
        .list_public_memos(creator_id, MAX_FEED_ITEMS)
        .await
        .map_err(internal)?;

    let mut feed = Vec::with_capacity(memos.len());
    for memo in memos {
        let resources = ctx
            .storage
            .list_resources_for_memo(memo.memo_id)
            .await
            .map_err(internal)?;
        feed.push(memo_payload(memo, resources));
    }
    debug!(creator_id = ?creator_id.map(|id| id.0), items = feed.len(), "feed memos listed");
    Ok(feed)
}

fn ensure_visible(memo: &StoredMemo, viewer: Option<UserId>) -> Result<(), ApiError> {
    match (memo.visibility, viewer) {
        (Visibility::Public, _) => Ok(()),
        (Visibility::Protected, Some(_)) => Ok(()),
        (Visibility::Protected, None) => Err(ApiError::new(
            ErrorCode::Unauthorized,
            "this memo is protected, missing user in session",
        )),
        (Visibility::Private, Some(viewer)) if viewer == memo.creator_id => Ok(()),
        (Visibility::Private, _) => Err(ApiError::new(
            ErrorCode::Forbidden,
            "this memo is private only",
        )),
    }
}

fn memo_payload(memo: StoredMemo, resources: Vec<StoredResource>) -> Memo {
    Memo {
        id: memo.memo_id,
        created_ts: memo.created_ts,
        updated_ts: memo.updated_ts,
        creator_id: memo.creator_id,
        creator_name: memo.creator_name,
        content: memo.content,
        visibility: memo.visibility,
        row_status: memo.row_status,
        pinned: memo.pinned,
        resource_list: resources
            .into_iter()
            .map(|resource| Resource {
                id: resource.resource_id,
                public_id: resource.public_id,
                filename: resource.filename,
                external_link: resource.external_link,
                mime_type: resource.mime_type,
                size: resource.size,
            })
            .collect(),
    }
}

pub fn status_code_for(code: ErrorCode) -> u16 {
    match code {
        ErrorCode::Unauthorized => 401,
        ErrorCode::Forbidden => 403,
        ErrorCode::NotFound => 404,
        ErrorCode::Validation => 400,
        ErrorCode::Internal => 500,
    }
}

/// [`MemoStore`] that reads straight from storage, for server-side embeds.
#[derive(Clone)]
pub struct LocalMemoStore {
    ctx: ApiContext,
    viewer: Option<UserId>,
}

impl LocalMemoStore {
    pub fn new(ctx: ApiContext, viewer: Option<UserId>) -> Self {
        Self { ctx, viewer }
    }
}

#[async_trait]
impl MemoStore for LocalMemoStore {
    async fn fetch_memo_by_id(&self, memo_id: MemoId) -> Result<Memo, StoreError> {
        get_memo(&self.ctx, self.viewer, memo_id)
            .await
            .map_err(|body| StoreError::new(Some(status_code_for(body.code)), body))
    }
}

fn internal(err: anyhow::Error) -> ApiError {
    ApiError::internal(err.to_string())
}
