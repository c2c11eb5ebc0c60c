use std::{net::SocketAddr, sync::Arc};

use anyhow::anyhow;
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use embed_core::{ChronoTimestamps, RenderGate};
use serde::Deserialize;
use server_api::{
    embed_route, explore_feed_route, get_memo, list_feed_memos, memo_route, status_code_for,
    user_feed_route, ApiContext,
};
use shared::{
    domain::{MemoId, UserId},
    error::{ApiError, ErrorCode},
    protocol::Memo,
};
use storage::Storage;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod app_state;
mod config;
mod embed;
mod feed;

use app_state::AppState;
use config::{load_settings, prepare_database_url};

#[derive(Debug, Default, Deserialize)]
struct ViewerQuery {
    user_id: Option<String>,
}

impl ViewerQuery {
    /// A `user_id` that is not a number is treated as an anonymous viewer.
    fn viewer(&self) -> Option<UserId> {
        self.user_id
            .as_deref()
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .map(UserId)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = load_settings();
    info!(mode = settings.mode.as_str(), dev = settings.mode.is_dev(), "settings loaded");

    let database_url = prepare_database_url(&settings.database_url())?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;

    let timestamps = ChronoTimestamps::with_utc_offset_minutes(settings.utc_offset_minutes)
        .ok_or_else(|| anyhow!("utc offset out of range: {} minutes", settings.utc_offset_minutes))?;
    let gate = RenderGate::new()
        .with_timestamp_formatter(timestamps)
        .with_failure_policy(settings.embed_failure_policy);

    let state = AppState {
        api: ApiContext { storage },
        gate,
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route(memo_route(), get(http_get_memo))
        .route(embed_route(), get(http_embed_memo))
        .route(explore_feed_route(), get(http_explore_feed))
        .route(user_feed_route(), get(http_user_feed))
        .with_state(state)
}

async fn healthz(State(state): State<Arc<AppState>>) -> (StatusCode, &'static str) {
    match state.api.storage.health_check().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(error) => {
            error!(%error, "health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
        }
    }
}

async fn http_get_memo(
    State(state): State<Arc<AppState>>,
    Path(raw_memo_id): Path<String>,
    Query(q): Query<ViewerQuery>,
) -> Result<Json<Memo>, (StatusCode, Json<ApiError>)> {
    let memo_id = raw_memo_id
        .parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .map(MemoId)
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                Json(ApiError::new(
                    ErrorCode::Validation,
                    format!("ID is not a number: {raw_memo_id}"),
                )),
            )
        })?;

    let memo = get_memo(&state.api, q.viewer(), memo_id)
        .await
        .map_err(|e| (http_status(e.code), Json(e)))?;
    Ok(Json(memo))
}

async fn http_embed_memo(
    State(state): State<Arc<AppState>>,
    Path(raw_memo_id): Path<String>,
    q: Option<Query<ViewerQuery>>,
) -> Html<String> {
    let viewer = q.and_then(|Query(q)| q.viewer());
    Html(embed::render_embed_page(&state, &raw_memo_id, viewer).await)
}

async fn http_explore_feed(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    feed_response(&state, &headers, None).await
}

async fn http_user_feed(
    State(state): State<Arc<AppState>>,
    Path(raw_user_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let Ok(user_id) = raw_user_id.parse::<i64>() else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiError::new(ErrorCode::Validation, "User id is not a number")),
        )
            .into_response();
    };
    feed_response(&state, &headers, Some(UserId(user_id))).await
}

async fn feed_response(state: &AppState, headers: &HeaderMap, creator: Option<UserId>) -> Response {
    match list_feed_memos(&state.api, creator).await {
        Ok(memos) => {
            let channel = feed::build_channel(&feed::base_url(headers), &memos);
            ([(header::CONTENT_TYPE, feed::CONTENT_TYPE)], channel.to_string()).into_response()
        }
        Err(e) => (http_status(e.code), Json(e)).into_response(),
    }
}

fn http_status(code: ErrorCode) -> StatusCode {
    StatusCode::from_u16(status_code_for(code)).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
