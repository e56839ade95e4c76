//! Drive object-store surface.
//!
//! Nodes are addressed by opaque id. Folders are nodes whose MIME type is
//! [`FOLDER_MIME_TYPE`]; names are not unique within a parent.

pub mod http;
pub mod memory;
pub mod query;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use query::Query;

/// MIME type that marks a node as a folder.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Alias the drive accepts for the root folder's id.
pub const ROOT_ID: &str = "root";

/// Fields requested for every node.
pub const NODE_FIELDS: &str =
    "id, name, kind, parents, createdTime, modifiedTime, mimeType, md5Checksum, size, contentRestrictions";

/// A single drive entry, file or folder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteNode {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md5_checksum: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "size_string")]
    pub size: Option<u64>,
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default)]
    pub content_restrictions: Vec<ContentRestriction>,
}

impl RemoteNode {
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }

    pub fn is_read_only(&self) -> bool {
        self.content_restrictions.iter().any(|r| r.read_only)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRestriction {
    #[serde(default)]
    pub read_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// One page of a file listing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileList {
    #[serde(default)]
    pub files: Vec<RemoteNode>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ListRequest {
    pub query: Query,
    pub page_size: Option<u32>,
    pub page_token: Option<String>,
    /// Partial-response selector, e.g. `nextPageToken, files(id)`.
    pub fields: String,
}

impl ListRequest {
    /// Listing that returns full node metadata.
    pub fn nodes(query: Query, page_size: u32) -> Self {
        Self {
            query,
            page_size: Some(page_size),
            page_token: None,
            fields: format!("nextPageToken, files({NODE_FIELDS})"),
        }
    }
}

/// Metadata for a node to be created.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNode {
    pub name: String,
    pub mime_type: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<String>,
}

/// Partial update of a node. Unset fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Sent as a query parameter, not in the body.
    #[serde(skip)]
    pub add_parents: Option<String>,
    #[serde(skip)]
    pub remove_parents: Option<String>,
}

impl NodePatch {
    pub fn moves_parent(&self) -> bool {
        self.add_parents.is_some() || self.remove_parents.is_some()
    }
}

/// File content sent with a create or update.
#[derive(Debug, Clone)]
pub struct Upload {
    pub mime_type: String,
    pub content: Vec<u8>,
}

/// Calls the translator makes against the drive.
#[async_trait]
pub trait DriveApi: Send + Sync {
    async fn list(&self, request: &ListRequest) -> Result<FileList>;

    async fn get(&self, id: &str) -> Result<RemoteNode>;

    async fn download(&self, id: &str) -> Result<Vec<u8>>;

    async fn create(&self, node: &NewNode, upload: Option<Upload>) -> Result<RemoteNode>;

    async fn update(&self, id: &str, patch: &NodePatch, upload: Option<Upload>)
        -> Result<RemoteNode>;

    async fn delete(&self, id: &str) -> Result<()>;
}

#[async_trait]
impl<T: DriveApi + ?Sized> DriveApi for Arc<T> {
    async fn list(&self, request: &ListRequest) -> Result<FileList> {
        (**self).list(request).await
    }

    async fn get(&self, id: &str) -> Result<RemoteNode> {
        (**self).get(id).await
    }

    async fn download(&self, id: &str) -> Result<Vec<u8>> {
        (**self).download(id).await
    }

    async fn create(&self, node: &NewNode, upload: Option<Upload>) -> Result<RemoteNode> {
        (**self).create(node, upload).await
    }

    async fn update(
        &self,
        id: &str,
        patch: &NodePatch,
        upload: Option<Upload>,
    ) -> Result<RemoteNode> {
        (**self).update(id, patch, upload).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        (**self).delete(id).await
    }
}

/// The drive encodes `size` (an int64) as a JSON string.
mod size_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<u64>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(n) => s.serialize_str(&n.to_string()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(u64),
        }

        match Option::<Raw>::deserialize(d)? {
            None => Ok(None),
            Some(Raw::Number(n)) => Ok(Some(n)),
            Some(Raw::Text(s)) => s.parse().map(Some).map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_drive_file() {
        let json = r#"{
            "kind": "drive#file",
            "id": "1AbC",
            "name": "b.txt",
            "mimeType": "text/plain",
            "parents": ["0Folder"],
            "createdTime": "2024-03-01T10:15:30.123Z",
            "modifiedTime": "2024-03-02T08:00:00.000Z",
            "md5Checksum": "49f68a5c8493ec2c0bf489821c21fc3b",
            "size": "2",
            "contentRestrictions": [{"readOnly": false}]
        }"#;
        let node: RemoteNode = serde_json::from_str(json).unwrap();
        assert_eq!(node.id, "1AbC");
        assert_eq!(node.size, Some(2));
        assert_eq!(node.parents, vec!["0Folder".to_string()]);
        assert!(!node.is_folder());
        assert!(!node.is_read_only());
        assert_eq!(
            node.created_time.unwrap().to_rfc3339(),
            "2024-03-01T10:15:30.123+00:00"
        );
    }

    #[test]
    fn deserialize_folder_without_optional_fields() {
        let json = r#"{"id": "f", "name": "A", "mimeType": "application/vnd.google-apps.folder",
                       "contentRestrictions": [{"readOnly": true, "reason": "locked"}]}"#;
        let node: RemoteNode = serde_json::from_str(json).unwrap();
        assert!(node.is_folder());
        assert!(node.is_read_only());
        assert_eq!(node.size, None);
        assert!(node.parents.is_empty());
    }

    #[test]
    fn size_round_trips_as_string() {
        let node = RemoteNode {
            size: Some(1500),
            ..RemoteNode::default()
        };
        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(value["size"], "1500");
    }

    #[test]
    fn patch_body_omits_parent_moves() {
        let patch = NodePatch {
            name: Some("new.txt".into()),
            add_parents: Some("p2".into()),
            remove_parents: Some("p1".into()),
            ..NodePatch::default()
        };
        assert!(patch.moves_parent());
        let body = serde_json::to_value(&patch).unwrap();
        assert_eq!(body, serde_json::json!({ "name": "new.txt" }));
    }

    #[test]
    fn file_list_page() {
        let json = r#"{"nextPageToken": "t2", "files": [{"id": "a", "name": "x"}]}"#;
        let page: FileList = serde_json::from_str(json).unwrap();
        assert_eq!(page.files.len(), 1);
        assert_eq!(page.next_page_token.as_deref(), Some("t2"));
    }
}
