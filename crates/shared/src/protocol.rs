use serde::{Deserialize, Serialize};

use crate::domain::{MemoId, ResourceId, RowStatus, UserId, Visibility};

/// A user-authored note as served by `GET /api/memo/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Memo {
    pub id: MemoId,
    /// Unix seconds.
    pub created_ts: i64,
    #[serde(default)]
    pub updated_ts: i64,
    pub creator_id: UserId,
    pub creator_name: String,
    pub content: String,
    #[serde(default = "default_visibility")]
    pub visibility: Visibility,
    #[serde(default = "default_row_status")]
    pub row_status: RowStatus,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub resource_list: Vec<Resource>,
}

/// File attached to a memo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: ResourceId,
    pub public_id: String,
    pub filename: String,
    #[serde(default)]
    pub external_link: String,
    #[serde(rename = "type", default)]
    pub mime_type: String,
    #[serde(default)]
    pub size: u64,
}

impl Resource {
    /// Externally hosted resources link out directly; local blobs are served
    /// from `/o/r/{id}/{publicId}/{filename}`.
    pub fn public_url(&self) -> String {
        if !self.external_link.is_empty() {
            return self.external_link.clone();
        }
        format!("/o/r/{}/{}/{}", self.id.0, self.public_id, self.filename)
    }
}

fn default_visibility() -> Visibility {
    Visibility::Public
}

fn default_row_status() -> RowStatus {
    RowStatus::Normal
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memo_decodes_from_minimal_camel_case_payload() {
        let memo: Memo = serde_json::from_str(
            r#"{"id":42,"createdTs":1700000000,"creatorId":7,"creatorName":"alice","content":"hello","resourceList":[]}"#,
        )
        .expect("memo json");
        assert_eq!(memo.id, MemoId(42));
        assert_eq!(memo.creator_id, UserId(7));
        assert_eq!(memo.visibility, Visibility::Public);
        assert_eq!(memo.row_status, RowStatus::Normal);
        assert!(memo.resource_list.is_empty());
    }

    #[test]
    fn resource_url_prefers_external_link() {
        let mut resource = Resource {
            id: ResourceId(3),
            public_id: "abc".into(),
            filename: "photo.png".into(),
            external_link: String::new(),
            mime_type: "image/png".into(),
            size: 10,
        };
        assert_eq!(resource.public_url(), "/o/r/3/abc/photo.png");

        resource.external_link = "https://cdn.example.com/photo.png".into();
        assert_eq!(resource.public_url(), "https://cdn.example.com/photo.png");
    }
}
