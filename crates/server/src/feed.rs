//! RSS feeds of public memos.

use axum::http::{header, HeaderMap};
use chrono::DateTime;
use embed_core::{ContentRenderer, LinkClicks, MarkdownLinkContent};
use rss::{Channel, ChannelBuilder, EnclosureBuilder, GuidBuilder, Item, ItemBuilder};
use shared::protocol::{Memo, Resource};

pub(crate) const CONTENT_TYPE: &str = "application/xml; charset=UTF-8";

const FEED_TITLE: &str = "memos";
const MAX_ITEM_TITLE_CHARS: usize = 100;

/// Absolute origin the request was addressed to.
pub(crate) fn base_url(headers: &HeaderMap) -> String {
    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .filter(|host| !host.is_empty())
        .unwrap_or("localhost");
    format!("http://{host}")
}

pub(crate) fn build_channel(base_url: &str, memos: &[Memo]) -> Channel {
    let items: Vec<Item> = memos.iter().map(|memo| feed_item(base_url, memo)).collect();
    ChannelBuilder::default()
        .title(FEED_TITLE)
        .link(base_url)
        .description("")
        .items(items)
        .build()
}

fn feed_item(base_url: &str, memo: &Memo) -> Item {
    let link = format!("{base_url}/m/{}/embed", memo.id.0);
    let (title, body) = split_title(&memo.content);
    let description = MarkdownLinkContent.render(body, LinkClicks::Navigate);
    let pub_date = DateTime::from_timestamp(memo.created_ts, 0).map(|at| at.to_rfc2822());
    let guid = GuidBuilder::default().value(link.clone()).permalink(true).build();

    ItemBuilder::default()
        .title(Some(title))
        .link(Some(link))
        .guid(Some(guid))
        .description(Some(description))
        .pub_date(pub_date)
        .enclosure(memo.resource_list.first().map(|resource| enclosure(base_url, resource)))
        .build()
}

fn enclosure(base_url: &str, resource: &Resource) -> rss::Enclosure {
    let url = if resource.external_link.is_empty() {
        format!("{base_url}{}", resource.public_url())
    } else {
        resource.public_url()
    };
    EnclosureBuilder::default()
        .url(url)
        .length(resource.size.to_string())
        .mime_type(resource.mime_type.clone())
        .build()
}

/// A leading `# ` line titles the item and is left out of its body. Otherwise
/// the first line, shortened, is the title and the whole memo is the body.
fn split_title(content: &str) -> (String, &str) {
    let (first_line, rest) = content.split_once('\n').unwrap_or((content, ""));
    let first_line = first_line.trim_end_matches('\r');

    if let Some(heading) = first_line.strip_prefix("# ") {
        return (heading.to_string(), rest.trim_matches(' '));
    }

    let title = match first_line.char_indices().nth(MAX_ITEM_TITLE_CHARS) {
        Some((cut, _)) => format!("{}...", &first_line[..cut]),
        None => first_line.to_string(),
    };
    (title, content)
}
