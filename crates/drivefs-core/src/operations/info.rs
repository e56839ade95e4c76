use std::any::Any;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::remote::RemoteNode;
use crate::vfs::{
    join_path, FileHash, FileHashAlgorithm, FileLinkInfo, LinkInfoRef, StructureLinkInfo,
};

/// Drive identity carried by the info types this crate produces.
pub(crate) trait DriveLinkInfo {
    fn drive_id(&self) -> &str;
}

/// Recover the drive id from link info, if this crate produced it.
pub(crate) fn drive_id(info: &dyn StructureLinkInfo) -> Option<&str> {
    let any = info.as_any();
    let identity: &dyn DriveLinkInfo = if let Some(file) = any.downcast_ref::<FileInfo>() {
        file
    } else {
        any.downcast_ref::<DirectoryInfo>()?
    };
    Some(identity.drive_id()).filter(|id| !id.is_empty())
}

/// Wrap a node in the info type matching its kind.
pub(crate) fn link_info(node: RemoteNode, parent_full_name: &str) -> LinkInfoRef {
    if node.is_folder() {
        Arc::new(DirectoryInfo::new(node, parent_full_name))
    } else {
        Arc::new(FileInfo::new(node, parent_full_name))
    }
}

#[derive(Debug, Clone)]
pub(crate) struct FileInfo {
    node: RemoteNode,
    full_name: String,
    hash: FileHash,
}

impl FileInfo {
    pub(crate) fn new(node: RemoteNode, parent_full_name: &str) -> Self {
        let full_name = join_path(parent_full_name, &node.name);
        let hash = FileHash {
            algorithm: FileHashAlgorithm::Md5,
            value: node.md5_checksum.clone(),
        };
        Self {
            node,
            full_name,
            hash,
        }
    }
}

impl DriveLinkInfo for FileInfo {
    fn drive_id(&self) -> &str {
        &self.node.id
    }
}

impl StructureLinkInfo for FileInfo {
    fn full_name(&self) -> &str {
        &self.full_name
    }

    fn exists(&self) -> bool {
        true
    }

    fn is_directory(&self) -> bool {
        false
    }

    fn creation_time(&self) -> Option<DateTime<Utc>> {
        self.node.created_time
    }

    fn last_write_time(&self) -> Option<DateTime<Utc>> {
        self.node.modified_time
    }

    fn is_hidden(&self) -> bool {
        false
    }

    fn is_read_only(&self) -> bool {
        false
    }

    fn as_file(&self) -> Option<&dyn FileLinkInfo> {
        Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl FileLinkInfo for FileInfo {
    fn hash(&self) -> &FileHash {
        &self.hash
    }

    fn length(&self) -> u64 {
        self.node.size.unwrap_or(0)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct DirectoryInfo {
    node: RemoteNode,
    full_name: String,
}

impl DirectoryInfo {
    pub(crate) fn new(node: RemoteNode, parent_full_name: &str) -> Self {
        let full_name = join_path(parent_full_name, &node.name);
        Self { node, full_name }
    }
}

impl DriveLinkInfo for DirectoryInfo {
    fn drive_id(&self) -> &str {
        &self.node.id
    }
}

impl StructureLinkInfo for DirectoryInfo {
    fn full_name(&self) -> &str {
        &self.full_name
    }

    fn exists(&self) -> bool {
        true
    }

    fn is_directory(&self) -> bool {
        true
    }

    fn creation_time(&self) -> Option<DateTime<Utc>> {
        self.node.created_time
    }

    fn last_write_time(&self) -> Option<DateTime<Utc>> {
        self.node.modified_time
    }

    fn is_hidden(&self) -> bool {
        false
    }

    fn is_read_only(&self) -> bool {
        self.node.is_read_only()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
