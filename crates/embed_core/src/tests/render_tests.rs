use super::*;
use shared::domain::{MemoId, ResourceId, RowStatus, UserId, Visibility};

fn memo(content: &str, resource_list: Vec<Resource>) -> Memo {
    Memo {
        id: MemoId(42),
        created_ts: 1_700_000_000,
        updated_ts: 1_700_000_000,
        creator_id: UserId(7),
        creator_name: "alice".into(),
        content: content.into(),
        visibility: Visibility::Public,
        row_status: RowStatus::Normal,
        pinned: false,
        resource_list,
    }
}

fn resource(id: i64, filename: &str, mime_type: &str) -> Resource {
    Resource {
        id: ResourceId(id),
        public_id: format!("pub-{id}"),
        filename: filename.into(),
        external_link: String::new(),
        mime_type: mime_type.into(),
        size: 1,
    }
}

#[test]
fn pending_renders_empty_container() {
    assert_eq!(
        RenderGate::new().render(&ViewState::Pending),
        r#"<section class="embed-memo"></section>"#
    );
}

#[test]
fn loaded_memo_renders_header_content_and_creator_link() {
    let html = RenderGate::new().render(&ViewState::Loaded(memo("hello", Vec::new())));

    assert!(html.contains(r#"<span class="embed-memo-time">2023/11/14 22:13:20</span>"#));
    assert!(html.contains(r#"<a class="embed-memo-creator" href="/u/7">@alice</a>"#));
    assert!(html.contains(r#"<div class="memo-content" data-link-clicks="suppress"><p>hello</p></div>"#));
    assert!(!html.contains("resource-list"));
}

#[test]
fn failed_load_is_concealed_by_default() {
    let gate = RenderGate::new();
    assert_eq!(gate.failure_policy(), FailurePolicy::Conceal);
    assert_eq!(
        gate.render(&ViewState::Failed("not found".into())),
        empty_container()
    );
}

#[test]
fn failed_load_can_show_an_error_panel() {
    let gate = RenderGate::new().with_failure_policy(FailurePolicy::ShowError);
    let html = gate.render(&ViewState::Failed("<not> found".into()));
    assert!(html.contains(r#"role="alert""#));
    assert!(html.contains("<p>&lt;not&gt; found</p>"));
    assert_eq!(gate.render(&ViewState::Pending), empty_container());
}

#[test]
fn user_text_is_escaped() {
    let mut hostile = memo("<script>alert(1)</script>", Vec::new());
    hostile.creator_name = "\"eve\"".into();
    let html = RenderGate::new().render(&ViewState::Loaded(hostile));

    assert!(!html.contains("<script>"));
    assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
    assert!(html.contains("@&quot;eve&quot;"));
}

#[test]
fn embedded_links_do_not_navigate() {
    let html = MarkdownLinkContent.render(
        "see [docs](https://example.com/a?b=1&c=2) now",
        LinkClicks::Suppress,
    );
    assert_eq!(
        html,
        concat!(
            r#"<div class="memo-content" data-link-clicks="suppress"><p>see "#,
            r#"<span class="memo-link" data-href="https://example.com/a?b=1&amp;c=2">docs</span>"#,
            r#" now</p></div>"#
        )
    );
}

#[test]
fn navigable_links_render_as_anchors() {
    let html = MarkdownLinkContent.render("[home](/)", LinkClicks::Navigate);
    assert!(html.contains(
        r#"<a class="memo-link" href="/" target="_blank" rel="noopener noreferrer">home</a>"#
    ));
}

#[test]
fn script_links_keep_only_their_label() {
    let html = MarkdownLinkContent.render("[click](javascript:void)", LinkClicks::Navigate);
    assert!(!html.contains("javascript"));
    assert!(html.contains("<p>click</p>"));
}

#[test]
fn each_line_becomes_a_paragraph() {
    let html = MarkdownLinkContent.render("one\n\ntwo", LinkClicks::Suppress);
    assert!(html.ends_with("<p>one</p><p></p><p>two</p></div>"));
}

#[test]
fn resources_render_images_inline_and_files_as_links() {
    let mut external = resource(2, "report.pdf", "application/pdf");
    external.external_link = "https://cdn.example.com/report.pdf".into();
    let html = LinkedResourceList.render(&[resource(1, "cat.png", "image/png"), external]);

    assert_eq!(
        html,
        concat!(
            r#"<div class="resource-list">"#,
            r#"<img class="resource-image" src="/o/r/1/pub-1/cat.png" alt="cat.png">"#,
            r#"<a class="resource-file" href="https://cdn.example.com/report.pdf" target="_blank" rel="noopener noreferrer">report.pdf</a>"#,
            r#"</div>"#
        )
    );
}

#[test]
fn loaded_memo_includes_resource_list() {
    let html = RenderGate::new().render(&ViewState::Loaded(memo(
        "with file",
        vec![resource(1, "notes.txt", "text/plain")],
    )));
    assert!(html.contains(r#"href="/o/r/1/pub-1/notes.txt""#));
}

#[test]
fn timestamps_honour_utc_offset() {
    let formatter = ChronoTimestamps::with_utc_offset_minutes(8 * 60).expect("offset");
    assert_eq!(formatter.format(1_700_000_000), "2023/11/15 06:13:20");
    assert!(ChronoTimestamps::with_utc_offset_minutes(24 * 60).is_none());
}

#[test]
fn custom_collaborators_are_used() {
    struct Upper;
    impl ContentRenderer for Upper {
        fn render(&self, content: &str, link_clicks: LinkClicks) -> String {
            assert_eq!(link_clicks, LinkClicks::Suppress);
            content.to_uppercase()
        }
    }
    struct Epoch;
    impl TimestampFormatter for Epoch {
        fn format(&self, unix_seconds: i64) -> String {
            format!("t={unix_seconds}")
        }
    }

    let html = RenderGate::new()
        .with_content_renderer(Upper)
        .with_timestamp_formatter(Epoch)
        .render(&ViewState::Loaded(memo("hello", Vec::new())));
    assert!(html.contains("HELLO"));
    assert!(html.contains("t=1700000000"));
}
