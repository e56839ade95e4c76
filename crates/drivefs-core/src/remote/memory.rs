//! In-process drive used by tests and offline tooling.
//!
//! Follows the remote store's rules rather than a filesystem's: names are not
//! unique, deleting a folder deletes its descendants, listings are paged with
//! an opaque continuation token.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::{DriveFsError, Result};
use crate::remote::{
    DriveApi, FileList, ListRequest, NewNode, NodePatch, RemoteNode, Upload, FOLDER_MIME_TYPE,
    ROOT_ID,
};

/// Number of calls made per operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub list: usize,
    pub get: usize,
    pub download: usize,
    pub create: usize,
    pub update: usize,
    pub delete: usize,
}

pub struct MemoryDrive {
    inner: Mutex<DriveState>,
    max_page_size: usize,
}

#[derive(Default)]
struct DriveState {
    // Keyed by zero-padded sequence ids, so iteration follows creation order.
    nodes: BTreeMap<String, RemoteNode>,
    content: HashMap<String, Vec<u8>>,
    next_id: u64,
    calls: CallCounts,
    updates: Vec<(String, NodePatch)>,
    unavailable: bool,
}

impl DriveState {
    fn allocate_id(&mut self) -> String {
        self.next_id += 1;
        format!("node-{:06}", self.next_id)
    }

    fn insert(
        &mut self,
        name: &str,
        mime_type: &str,
        parents: Vec<String>,
        content: Option<Vec<u8>>,
    ) -> RemoteNode {
        let id = self.allocate_id();
        let now = Utc::now();
        let parents = if parents.is_empty() {
            vec![ROOT_ID.to_string()]
        } else {
            parents
        };

        let mut node = RemoteNode {
            id: id.clone(),
            name: name.to_string(),
            kind: Some("drive#file".to_string()),
            mime_type: mime_type.to_string(),
            created_time: Some(now),
            modified_time: Some(now),
            parents,
            ..RemoteNode::default()
        };
        if !node.is_folder() {
            let content = content.unwrap_or_default();
            set_content_metadata(&mut node, &content);
            self.content.insert(id.clone(), content);
        }
        self.nodes.insert(id, node.clone());
        node
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable {
            return Err(DriveFsError::Api {
                status: 503,
                message: "backend unavailable".to_string(),
            });
        }
        Ok(())
    }

    fn node_mut(&mut self, id: &str) -> Result<&mut RemoteNode> {
        self.nodes.get_mut(id).ok_or_else(|| not_found(id))
    }
}

fn not_found(id: &str) -> DriveFsError {
    DriveFsError::Api {
        status: 404,
        message: format!("File not found: {id}"),
    }
}

fn set_content_metadata(node: &mut RemoteNode, content: &[u8]) {
    node.size = Some(content.len() as u64);
    node.md5_checksum = Some(format!("{:x}", md5::compute(content)));
}

impl Default for MemoryDrive {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDrive {
    pub fn new() -> Self {
        Self::with_max_page_size(1000)
    }

    /// Cap page sizes regardless of what the caller asks for.
    pub fn with_max_page_size(max_page_size: usize) -> Self {
        Self {
            inner: Mutex::new(DriveState::default()),
            max_page_size: max_page_size.max(1),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, DriveState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Add a folder directly, bypassing call accounting. Returns its id.
    pub fn seed_folder(&self, name: &str, parent: Option<&str>) -> String {
        let parents = parent.map(|p| vec![p.to_string()]).unwrap_or_default();
        self.state().insert(name, FOLDER_MIME_TYPE, parents, None).id
    }

    /// Add a file directly, bypassing call accounting. Returns its id.
    pub fn seed_file(&self, name: &str, parent: Option<&str>, content: &[u8]) -> String {
        let parents = parent.map(|p| vec![p.to_string()]).unwrap_or_default();
        self.state()
            .insert(name, "text/plain", parents, Some(content.to_vec()))
            .id
    }

    pub fn node(&self, id: &str) -> Option<RemoteNode> {
        self.state().nodes.get(id).cloned()
    }

    pub fn content(&self, id: &str) -> Option<Vec<u8>> {
        self.state().content.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.state().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn calls(&self) -> CallCounts {
        self.state().calls
    }

    pub fn reset_calls(&self) {
        self.state().calls = CallCounts::default();
    }

    /// Every update applied so far, in order.
    pub fn updates(&self) -> Vec<(String, NodePatch)> {
        self.state().updates.clone()
    }

    /// Make every subsequent call fail with a 503.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state().unavailable = unavailable;
    }
}

#[async_trait]
impl DriveApi for MemoryDrive {
    async fn list(&self, request: &ListRequest) -> Result<FileList> {
        let mut state = self.state();
        state.calls.list += 1;
        state.check_available()?;

        let offset = match &request.page_token {
            Some(token) => token.parse::<usize>().map_err(|_| DriveFsError::Api {
                status: 400,
                message: format!("Invalid page token: {token}"),
            })?,
            None => 0,
        };
        let page_size = request
            .page_size
            .map_or(100, |n| n as usize)
            .clamp(1, self.max_page_size);

        let mut matched = state
            .nodes
            .values()
            .filter(|node| request.query.matches(node))
            .skip(offset);
        let files: Vec<RemoteNode> = matched.by_ref().take(page_size).cloned().collect();
        let next_page_token = matched
            .next()
            .map(|_| (offset + files.len()).to_string());

        Ok(FileList {
            files,
            next_page_token,
        })
    }

    async fn get(&self, id: &str) -> Result<RemoteNode> {
        let mut state = self.state();
        state.calls.get += 1;
        state.check_available()?;
        state.nodes.get(id).cloned().ok_or_else(|| not_found(id))
    }

    async fn download(&self, id: &str) -> Result<Vec<u8>> {
        let mut state = self.state();
        state.calls.download += 1;
        state.check_available()?;
        if state.nodes.get(id).is_some_and(|n| n.is_folder()) {
            return Err(DriveFsError::Api {
                status: 403,
                message: "Only files with binary content can be downloaded".to_string(),
            });
        }
        state.content.get(id).cloned().ok_or_else(|| not_found(id))
    }

    async fn create(&self, node: &NewNode, upload: Option<Upload>) -> Result<RemoteNode> {
        let mut state = self.state();
        state.calls.create += 1;
        state.check_available()?;
        for parent in &node.parents {
            if parent != ROOT_ID && !state.nodes.contains_key(parent) {
                return Err(not_found(parent));
            }
        }
        Ok(state.insert(
            &node.name,
            &node.mime_type,
            node.parents.clone(),
            upload.map(|u| u.content),
        ))
    }

    async fn update(
        &self,
        id: &str,
        patch: &NodePatch,
        upload: Option<Upload>,
    ) -> Result<RemoteNode> {
        let mut state = self.state();
        state.calls.update += 1;
        state.check_available()?;
        if let Some(parent) = &patch.add_parents {
            if parent != ROOT_ID && !state.nodes.contains_key(parent) {
                return Err(not_found(parent));
            }
        }

        let node = state.node_mut(id)?;
        if let Some(name) = &patch.name {
            node.name = name.clone();
        }
        if let Some(mime) = &patch.mime_type {
            node.mime_type = mime.clone();
        }
        if let Some(parent) = &patch.remove_parents {
            node.parents.retain(|p| p != parent);
        }
        if let Some(parent) = &patch.add_parents {
            if !node.parents.contains(parent) {
                node.parents.push(parent.clone());
            }
        }
        if let Some(upload) = &upload {
            set_content_metadata(node, &upload.content);
        }
        node.modified_time = Some(Utc::now());
        let updated = node.clone();

        if let Some(upload) = upload {
            state.content.insert(id.to_string(), upload.content);
        }
        state.updates.push((id.to_string(), patch.clone()));
        Ok(updated)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut state = self.state();
        state.calls.delete += 1;
        state.check_available()?;
        if !state.nodes.contains_key(id) {
            return Err(not_found(id));
        }

        // Folder deletion takes every descendant with it.
        let mut pending = vec![id.to_string()];
        while let Some(current) = pending.pop() {
            let children: Vec<String> = state
                .nodes
                .values()
                .filter(|n| n.parents.contains(&current))
                .map(|n| n.id.clone())
                .collect();
            pending.extend(children);
            state.nodes.remove(&current);
            state.content.remove(&current);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::query::Query;

    #[tokio::test]
    async fn paging_follows_tokens() {
        let drive = MemoryDrive::with_max_page_size(2);
        for i in 0..5 {
            drive.seed_file(&format!("f{i}"), None, b"x");
        }

        let mut request = ListRequest::nodes(Query::new().in_parents(ROOT_ID), 10);
        let first = drive.list(&request).await.unwrap();
        assert_eq!(first.files.len(), 2);
        assert_eq!(first.next_page_token.as_deref(), Some("2"));

        request.page_token = Some("4".into());
        let last = drive.list(&request).await.unwrap();
        assert_eq!(last.files.len(), 1);
        assert!(last.next_page_token.is_none());
        assert_eq!(drive.calls().list, 2);
    }

    #[tokio::test]
    async fn exact_page_boundary_has_no_token() {
        let drive = MemoryDrive::with_max_page_size(2);
        drive.seed_file("a", None, b"");
        drive.seed_file("b", None, b"");
        let page = drive
            .list(&ListRequest::nodes(Query::new(), 2))
            .await
            .unwrap();
        assert_eq!(page.files.len(), 2);
        assert!(page.next_page_token.is_none());
    }

    #[tokio::test]
    async fn create_computes_checksum() {
        let drive = MemoryDrive::new();
        let node = drive
            .create(
                &NewNode {
                    name: "b.txt".into(),
                    mime_type: "text/plain".into(),
                    parents: vec![],
                },
                Some(Upload {
                    mime_type: "text/plain".into(),
                    content: b"hi".to_vec(),
                }),
            )
            .await
            .unwrap();
        assert_eq!(node.size, Some(2));
        assert_eq!(
            node.md5_checksum.as_deref(),
            Some("49f68a5c8493ec2c0bf489821c21fc3b")
        );
        assert_eq!(node.parents, vec![ROOT_ID.to_string()]);
        assert_eq!(drive.content(&node.id).unwrap(), b"hi");
    }

    #[tokio::test]
    async fn create_under_missing_parent_fails() {
        let drive = MemoryDrive::new();
        let err = drive
            .create(
                &NewNode {
                    name: "x".into(),
                    mime_type: FOLDER_MIME_TYPE.into(),
                    parents: vec!["nope".into()],
                },
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DriveFsError::Api { status: 404, .. }));
    }

    #[tokio::test]
    async fn delete_folder_removes_descendants() {
        let drive = MemoryDrive::new();
        let a = drive.seed_folder("A", None);
        let b = drive.seed_folder("B", Some(&a));
        drive.seed_file("c.txt", Some(&b), b"c");
        drive.seed_file("keep.txt", None, b"k");

        drive.delete(&a).await.unwrap();
        assert_eq!(drive.len(), 1);
        assert!(drive.node(&b).is_none());
    }

    #[tokio::test]
    async fn unavailable_fails_every_call() {
        let drive = MemoryDrive::new();
        let id = drive.seed_file("a", None, b"");
        drive.set_unavailable(true);
        assert!(drive.get(&id).await.is_err());
        drive.set_unavailable(false);
        assert!(drive.get(&id).await.is_ok());
        assert_eq!(drive.calls().get, 2);
    }
}
