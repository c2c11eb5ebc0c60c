//! Render gate: turns a [`ViewState`] into embed markup.
//!
//! Nothing but the empty container is produced until a memo is loaded. Memo
//! content, attachments and timestamps go through pluggable collaborators.

use chrono::{DateTime, FixedOffset, Offset, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use shared::protocol::{Memo, Resource};

use crate::controller::ViewState;

const EMPTY_CONTAINER: &str = r#"<section class="embed-memo"></section>"#;

static MARKDOWN_LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]+)\]\(([^)\s]+)\)").expect("valid link regex"));

/// What happens when a reader clicks a link inside memo content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkClicks {
    Navigate,
    Suppress,
}

impl LinkClicks {
    fn as_str(self) -> &'static str {
        match self {
            Self::Navigate => "navigate",
            Self::Suppress => "suppress",
        }
    }
}

/// How a failed load is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Keep the embed blank; the failure is only visible as a toast.
    #[default]
    Conceal,
    /// Replace the embed with an error panel carrying the message.
    ShowError,
}

pub trait ContentRenderer: Send + Sync {
    fn render(&self, content: &str, link_clicks: LinkClicks) -> String;
}

pub trait ResourceListRenderer: Send + Sync {
    fn render(&self, resources: &[Resource]) -> String;
}

pub trait TimestampFormatter: Send + Sync {
    fn format(&self, unix_seconds: i64) -> String;
}

pub struct RenderGate {
    content: Box<dyn ContentRenderer>,
    resources: Box<dyn ResourceListRenderer>,
    timestamps: Box<dyn TimestampFormatter>,
    failure_policy: FailurePolicy,
}

impl Default for RenderGate {
    fn default() -> Self {
        Self {
            content: Box::new(MarkdownLinkContent),
            resources: Box::new(LinkedResourceList),
            timestamps: Box::new(ChronoTimestamps::utc()),
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl RenderGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_content_renderer(mut self, renderer: impl ContentRenderer + 'static) -> Self {
        self.content = Box::new(renderer);
        self
    }

    pub fn with_resource_list_renderer(
        mut self,
        renderer: impl ResourceListRenderer + 'static,
    ) -> Self {
        self.resources = Box::new(renderer);
        self
    }

    pub fn with_timestamp_formatter(mut self, formatter: impl TimestampFormatter + 'static) -> Self {
        self.timestamps = Box::new(formatter);
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }

    pub fn render(&self, state: &ViewState) -> String {
        match state {
            ViewState::Pending => empty_container().to_string(),
            ViewState::Loaded(memo) => self.render_memo(memo),
            ViewState::Failed(message) => match self.failure_policy {
                FailurePolicy::Conceal => empty_container().to_string(),
                FailurePolicy::ShowError => format!(
                    r#"<section class="embed-memo"><main class="embed-memo-card embed-memo-error" role="alert"><p>{}</p></main></section>"#,
                    escape_html(message)
                ),
            },
        }
    }

    fn render_memo(&self, memo: &Memo) -> String {
        format!(
            concat!(
                r#"<section class="embed-memo"><main class="embed-memo-card">"#,
                r#"<div class="embed-memo-header">"#,
                r#"<span class="embed-memo-time">{time}</span>"#,
                r#"<a class="embed-memo-creator" href="/u/{creator_id}">@{creator_name}</a>"#,
                r#"</div>{content}{resources}</main></section>"#
            ),
            time = escape_html(&self.timestamps.format(memo.created_ts)),
            creator_id = memo.creator_id.0,
            creator_name = escape_html(&memo.creator_name),
            // Embedded pages must not navigate away from the host page.
            content = self.content.render(&memo.content, LinkClicks::Suppress),
            resources = self.resources.render(&memo.resource_list),
        )
    }
}

pub fn empty_container() -> &'static str {
    EMPTY_CONTAINER
}

/// Plain text with `[label](url)` links, one paragraph per line.
pub struct MarkdownLinkContent;

impl ContentRenderer for MarkdownLinkContent {
    fn render(&self, content: &str, link_clicks: LinkClicks) -> String {
        let mut html = format!(
            r#"<div class="memo-content" data-link-clicks="{}">"#,
            link_clicks.as_str()
        );
        for line in content.lines() {
            html.push_str("<p>");
            html.push_str(&render_line(line, link_clicks));
            html.push_str("</p>");
        }
        html.push_str("</div>");
        html
    }
}

fn render_line(line: &str, link_clicks: LinkClicks) -> String {
    let mut out = String::with_capacity(line.len());
    let mut last = 0;
    for caps in MARKDOWN_LINK_RE.captures_iter(line) {
        let (Some(whole), Some(label), Some(href)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        out.push_str(&escape_html(&line[last..whole.start()]));
        let label = escape_html(label.as_str());
        let href = href.as_str();
        if !is_safe_href(href) {
            out.push_str(&label);
        } else {
            match link_clicks {
                LinkClicks::Navigate => out.push_str(&format!(
                    r#"<a class="memo-link" href="{}" target="_blank" rel="noopener noreferrer">{label}</a>"#,
                    escape_html(href)
                )),
                LinkClicks::Suppress => out.push_str(&format!(
                    r#"<span class="memo-link" data-href="{}">{label}</span>"#,
                    escape_html(href)
                )),
            }
        }
        last = whole.end();
    }
    out.push_str(&escape_html(&line[last..]));
    out
}

fn is_safe_href(href: &str) -> bool {
    let lower = href.to_ascii_lowercase();
    lower.starts_with("http://")
        || lower.starts_with("https://")
        || lower.starts_with("mailto:")
        || lower.starts_with('/')
        || lower.starts_with('#')
}

/// Images inline, everything else as a download link.
pub struct LinkedResourceList;

impl ResourceListRenderer for LinkedResourceList {
    fn render(&self, resources: &[Resource]) -> String {
        if resources.is_empty() {
            return String::new();
        }

        let mut html = String::from(r#"<div class="resource-list">"#);
        for resource in resources {
            let url = escape_html(&resource.public_url());
            let filename = escape_html(&resource.filename);
            if resource.mime_type.starts_with("image/") {
                html.push_str(&format!(
                    r#"<img class="resource-image" src="{url}" alt="{filename}">"#
                ));
            } else {
                html.push_str(&format!(
                    r#"<a class="resource-file" href="{url}" target="_blank" rel="noopener noreferrer">{filename}</a>"#
                ));
            }
        }
        html.push_str("</div>");
        html
    }
}

pub struct ChronoTimestamps {
    offset: FixedOffset,
}

impl ChronoTimestamps {
    pub const FORMAT: &'static str = "%Y/%m/%d %H:%M:%S";

    pub fn utc() -> Self {
        Self {
            offset: Utc.fix(),
        }
    }

    /// `None` when the offset is a day or more away from UTC.
    pub fn with_utc_offset_minutes(minutes: i32) -> Option<Self> {
        let offset = FixedOffset::east_opt(minutes.checked_mul(60)?)?;
        Some(Self { offset })
    }
}

impl TimestampFormatter for ChronoTimestamps {
    fn format(&self, unix_seconds: i64) -> String {
        match DateTime::from_timestamp(unix_seconds, 0) {
            Some(utc) => utc.with_timezone(&self.offset).format(Self::FORMAT).to_string(),
            None => unix_seconds.to_string(),
        }
    }
}

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod tests;
