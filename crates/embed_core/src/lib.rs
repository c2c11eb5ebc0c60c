//! Read-only memo embed: route id resolution, a one-shot load lifecycle and
//! a render gate over the loaded memo.

pub mod controller;
pub mod notify;
pub mod render;
pub mod resolver;
pub mod store;

pub use controller::{Activation, EmbedMount, LoadPhase, ViewState};
pub use notify::{BroadcastNotifier, Notification, NotificationLevel, Notifier, ToastBuffer};
pub use render::{
    empty_container, escape_html, ChronoTimestamps, ContentRenderer, FailurePolicy, LinkClicks,
    LinkedResourceList, MarkdownLinkContent, RenderGate, ResourceListRenderer, TimestampFormatter,
};
pub use resolver::resolve_memo_id;
pub use store::{CachedMemoStore, HttpMemoStore, MemoStore, StoreError};
