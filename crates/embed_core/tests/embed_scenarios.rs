use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use embed_core::{
    empty_container, EmbedMount, FailurePolicy, LoadPhase, MemoStore, Notification, RenderGate,
    StoreError, ToastBuffer, ViewState,
};
use shared::{
    domain::{MemoId, RowStatus, UserId, Visibility},
    error::{ApiError, ErrorCode},
    protocol::Memo,
};

/// Answers from a fixed table and records every id it is asked for.
struct TableStore {
    memos: Vec<Memo>,
    calls: Mutex<Vec<MemoId>>,
}

impl TableStore {
    fn new(memos: Vec<Memo>) -> Arc<Self> {
        Arc::new(Self {
            memos,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<MemoId> {
        self.calls.lock().expect("calls lock").clone()
    }
}

#[async_trait]
impl MemoStore for TableStore {
    async fn fetch_memo_by_id(&self, memo_id: MemoId) -> Result<Memo, StoreError> {
        self.calls.lock().expect("calls lock").push(memo_id);
        self.memos
            .iter()
            .find(|memo| memo.id == memo_id)
            .cloned()
            .ok_or_else(|| {
                StoreError::new(Some(404), ApiError::new(ErrorCode::NotFound, "not found"))
            })
    }
}

fn alice_memo() -> Memo {
    Memo {
        id: MemoId(42),
        created_ts: 1_700_000_000,
        updated_ts: 1_700_000_000,
        creator_id: UserId(7),
        creator_name: "alice".into(),
        content: "hello".into(),
        visibility: Visibility::Public,
        row_status: RowStatus::Normal,
        pinned: false,
        resource_list: Vec::new(),
    }
}

async fn render_embed(
    store: Arc<TableStore>,
    raw_memo_id: &str,
    gate: &RenderGate,
) -> (String, ViewState, Vec<Notification>) {
    let toasts = Arc::new(ToastBuffer::new());
    let mount = EmbedMount::new(store, toasts.clone());
    let state = mount.load(Some(raw_memo_id)).await;
    let html = mount.render(gate).await;
    (html, state, toasts.drain())
}

#[tokio::test]
async fn loaded_memo_renders_time_creator_and_content() {
    let store = TableStore::new(vec![alice_memo()]);
    let (html, state, toasts) = render_embed(store.clone(), "42", &RenderGate::new()).await;

    assert_eq!(state.phase(), LoadPhase::Finished);
    assert!(html.contains("2023/11/14 22:13:20"));
    assert!(html.contains(r#"href="/u/7""#));
    assert!(html.contains("@alice"));
    assert!(html.contains("<p>hello</p>"));
    assert!(toasts.is_empty());
    assert_eq!(store.calls(), vec![MemoId(42)]);
}

#[tokio::test]
async fn non_numeric_route_renders_empty_container_without_fetching() {
    let store = TableStore::new(vec![alice_memo()]);
    let (html, state, toasts) = render_embed(store.clone(), "abc", &RenderGate::new()).await;

    assert_eq!(html, empty_container());
    assert_eq!(state, ViewState::Pending);
    assert!(toasts.is_empty());
    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn failed_fetch_notifies_and_stays_empty() {
    let store = TableStore::new(Vec::new());
    let (html, state, toasts) = render_embed(store.clone(), "9", &RenderGate::new()).await;

    assert_eq!(html, empty_container());
    assert_eq!(state.phase(), LoadPhase::Pending);
    assert_eq!(toasts, vec![Notification::error("not found")]);
    assert_eq!(store.calls(), vec![MemoId(9)]);
}

#[tokio::test]
async fn failed_fetch_can_render_an_error_state() {
    let store = TableStore::new(Vec::new());
    let gate = RenderGate::new().with_failure_policy(FailurePolicy::ShowError);
    let (html, _, toasts) = render_embed(store, "9", &gate).await;

    assert!(html.contains("not found"));
    assert_ne!(html, empty_container());
    assert_eq!(toasts.len(), 1);
}
