//! Server-side rendering of the memo embed page.

use std::sync::Arc;

use embed_core::{escape_html, EmbedMount, Notification, NotificationLevel, ToastBuffer};
use server_api::LocalMemoStore;
use shared::domain::UserId;

use crate::app_state::AppState;

/// Runs one embed mount to completion and wraps its markup in a document.
pub(crate) async fn render_embed_page(
    state: &AppState,
    raw_memo_id: &str,
    viewer: Option<UserId>,
) -> String {
    let toasts = Arc::new(ToastBuffer::new());
    let store = Arc::new(LocalMemoStore::new(state.api.clone(), viewer));
    let mount = EmbedMount::new(store, toasts.clone());

    mount.load(Some(raw_memo_id)).await;
    let body = mount.render(&state.gate).await;
    page_document(&body, &toasts.drain())
}

fn page_document(body: &str, toasts: &[Notification]) -> String {
    format!(
        concat!(
            "<!DOCTYPE html>",
            r#"<html lang="en"><head><meta charset="utf-8">"#,
            r#"<meta name="viewport" content="width=device-width, initial-scale=1">"#,
            "<title>memos</title></head><body>{body}{toasts}</body></html>"
        ),
        body = body,
        toasts = toaster(toasts),
    )
}

fn toaster(toasts: &[Notification]) -> String {
    if toasts.is_empty() {
        return String::new();
    }

    let mut html = String::from(r#"<div class="toaster" aria-live="polite">"#);
    for toast in toasts {
        let level = match toast.level {
            NotificationLevel::Info => "info",
            NotificationLevel::Error => "error",
        };
        html.push_str(&format!(
            r#"<div class="toast toast-{level}" role="status" data-ttl-ms="{}">{}</div>"#,
            toast.ttl_ms,
            escape_html(&toast.message)
        ));
    }
    html.push_str("</div>");
    html
}
