//! Generic filesystem contract.
//!
//! Links name an entry by its full slash-separated path and optionally carry
//! the [`StructureLinkInfo`] obtained when the entry was last resolved. A
//! backend attaches whatever identity it needs to its own info types; callers
//! only ever see the trait surface.

use std::any::Any;
use std::fmt;
use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::io::AsyncRead;

use crate::error::Result;

/// Shared handle to backend-produced link info.
pub type LinkInfoRef = Arc<dyn StructureLinkInfo>;

/// Snapshot of an entry's state as reported by a backend.
pub trait StructureLinkInfo: fmt::Debug + Send + Sync {
    fn full_name(&self) -> &str;
    fn exists(&self) -> bool;
    fn is_directory(&self) -> bool;
    fn creation_time(&self) -> Option<DateTime<Utc>>;
    fn last_write_time(&self) -> Option<DateTime<Utc>>;
    fn is_hidden(&self) -> bool;
    fn is_read_only(&self) -> bool;

    /// File-specific view, `None` for directories.
    fn as_file(&self) -> Option<&dyn FileLinkInfo> {
        None
    }

    /// Backend hook for recovering its concrete info type.
    fn as_any(&self) -> &dyn Any;
}

/// Link info for a regular file.
pub trait FileLinkInfo: StructureLinkInfo {
    fn hash(&self) -> &FileHash;
    fn length(&self) -> u64;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FileHashAlgorithm {
    Md5,
}

/// Content hash as reported by the backend (hex digest).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileHash {
    pub algorithm: FileHashAlgorithm,
    pub value: Option<String>,
}

/// Serializable summary of any link info, used for display and JSON output.
#[derive(Debug, Clone, Serialize)]
pub struct LinkSummary {
    pub path: String,
    pub is_dir: bool,
    pub size: Option<u64>,
    pub md5: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    pub read_only: bool,
}

impl From<&dyn StructureLinkInfo> for LinkSummary {
    fn from(info: &dyn StructureLinkInfo) -> Self {
        let file = info.as_file();
        Self {
            path: info.full_name().to_string(),
            is_dir: info.is_directory(),
            size: file.map(|f| f.length()),
            md5: file.and_then(|f| f.hash().value.clone()),
            created: info.creation_time(),
            modified: info.last_write_time(),
            read_only: info.is_read_only(),
        }
    }
}

/// Join a parent path and an entry name. The root is the empty path.
pub fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

fn last_segment(full_name: &str) -> &str {
    full_name.rsplit_once('/').map_or(full_name, |(_, name)| name)
}

fn parent_segment(full_name: &str) -> &str {
    full_name.rsplit_once('/').map_or("", |(parent, _)| parent)
}

/// Handle to a directory. The empty path is the drive root.
#[derive(Debug, Clone)]
pub struct DirectoryLink {
    full_name: String,
    parent: Option<Box<DirectoryLink>>,
    info: Option<LinkInfoRef>,
}

impl DirectoryLink {
    pub fn root() -> Self {
        Self {
            full_name: String::new(),
            parent: None,
            info: None,
        }
    }

    pub fn new(
        full_name: impl Into<String>,
        parent: Option<DirectoryLink>,
        info: Option<LinkInfoRef>,
    ) -> Self {
        Self {
            full_name: full_name.into(),
            parent: parent.map(Box::new),
            info,
        }
    }

    /// Link to a child directory, not yet resolved.
    pub fn directory(&self, name: &str) -> DirectoryLink {
        DirectoryLink::new(join_path(&self.full_name, name), Some(self.clone()), None)
    }

    /// Link to a child file, not yet resolved.
    pub fn file(&self, name: &str) -> FileLink {
        FileLink::new(join_path(&self.full_name, name), Some(self.clone()), None)
    }

    pub fn with_info(mut self, info: LinkInfoRef) -> Self {
        self.info = Some(info);
        self
    }

    pub fn is_root(&self) -> bool {
        self.full_name.is_empty()
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn name(&self) -> &str {
        last_segment(&self.full_name)
    }

    pub fn parent_full_name(&self) -> &str {
        parent_segment(&self.full_name)
    }

    pub fn parent(&self) -> Option<&DirectoryLink> {
        self.parent.as_deref()
    }

    pub fn info(&self) -> Option<&LinkInfoRef> {
        self.info.as_ref()
    }
}

/// Handle to a file.
#[derive(Debug, Clone)]
pub struct FileLink {
    full_name: String,
    parent: Option<DirectoryLink>,
    info: Option<LinkInfoRef>,
}

impl FileLink {
    pub fn new(
        full_name: impl Into<String>,
        parent: Option<DirectoryLink>,
        info: Option<LinkInfoRef>,
    ) -> Self {
        Self {
            full_name: full_name.into(),
            parent,
            info,
        }
    }

    pub fn with_info(mut self, info: LinkInfoRef) -> Self {
        self.info = Some(info);
        self
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn name(&self) -> &str {
        last_segment(&self.full_name)
    }

    /// Extension including the leading dot. Dotfiles have none.
    pub fn extension(&self) -> Option<&str> {
        let name = self.name();
        match name.rfind('.') {
            Some(i) if i > 0 && i + 1 < name.len() => Some(&name[i..]),
            _ => None,
        }
    }

    pub fn parent_full_name(&self) -> &str {
        parent_segment(&self.full_name)
    }

    pub fn parent(&self) -> Option<&DirectoryLink> {
        self.parent.as_ref()
    }

    pub fn info(&self) -> Option<&LinkInfoRef> {
        self.info.as_ref()
    }
}

/// Either kind of link, borrowed.
#[derive(Debug, Clone, Copy)]
pub enum LinkRef<'a> {
    File(&'a FileLink),
    Directory(&'a DirectoryLink),
}

impl LinkRef<'_> {
    pub fn full_name(&self) -> &str {
        match self {
            Self::File(f) => f.full_name(),
            Self::Directory(d) => d.full_name(),
        }
    }

    pub fn name(&self) -> &str {
        last_segment(self.full_name())
    }

    pub fn parent_full_name(&self) -> &str {
        parent_segment(self.full_name())
    }

    pub fn info(&self) -> Option<&LinkInfoRef> {
        match self {
            Self::File(f) => f.info(),
            Self::Directory(d) => d.info(),
        }
    }
}

/// Metadata change request.
#[derive(Debug, Clone, Default)]
pub struct LinkMetadata {
    pub is_hidden: Option<bool>,
    pub is_read_only: Option<bool>,
    pub last_write_time: Option<DateTime<Utc>>,
}

/// What a directory listing should return.
#[derive(Debug, Clone)]
pub struct ListingOptions {
    pub search_pattern: Option<String>,
    pub search_for_files: bool,
    pub search_for_directories: bool,
}

impl Default for ListingOptions {
    fn default() -> Self {
        Self {
            search_pattern: None,
            search_for_files: true,
            search_for_directories: true,
        }
    }
}

impl ListingOptions {
    pub fn files_only() -> Self {
        Self {
            search_for_directories: false,
            ..Self::default()
        }
    }

    pub fn directories_only() -> Self {
        Self {
            search_for_files: false,
            ..Self::default()
        }
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.search_pattern = Some(pattern.into());
        self
    }

    pub fn has_search_pattern(&self) -> bool {
        self.search_pattern.as_deref().is_some_and(|p| !p.is_empty())
    }
}

/// Which metadata fields a backend lets callers set.
pub trait MetadataSupport {
    fn supports_is_hidden_metadata(&self) -> bool;
    fn supports_is_read_only_metadata(&self) -> bool;
    fn supports_last_write_time_metadata(&self) -> bool;
}

/// Operations a filesystem backend provides.
#[async_trait]
pub trait FileSystemOperations: MetadataSupport + Send + Sync {
    /// Backend-specific path normalization.
    fn correct_path(&self, path: &str) -> String {
        path.to_string()
    }

    /// Look up an entry by full path. `Ok(None)` when it does not exist.
    async fn get_link_info(&self, full_name: &str) -> Result<Option<LinkInfoRef>>;

    async fn read_file(&self, file: &FileLink) -> Result<Cursor<Vec<u8>>>;

    async fn write_file(
        &self,
        file: &FileLink,
        content: &mut (dyn AsyncRead + Unpin + Send),
        overwrite: bool,
    ) -> Result<LinkInfoRef>;

    async fn move_file(
        &self,
        source: &FileLink,
        destination: &FileLink,
        overwrite: bool,
    ) -> Result<LinkInfoRef>;

    async fn delete_file(&self, file: &FileLink) -> Result<()>;

    async fn create_directory(&self, directory: &DirectoryLink) -> Result<LinkInfoRef>;

    async fn move_directory(
        &self,
        source: &DirectoryLink,
        destination: &DirectoryLink,
    ) -> Result<LinkInfoRef>;

    async fn delete_directory(&self, directory: &DirectoryLink, recursive: bool) -> Result<()>;

    async fn get_links(
        &self,
        directory: &DirectoryLink,
        options: &ListingOptions,
    ) -> Result<Vec<LinkInfoRef>>;

    async fn update_metadata(
        &self,
        link: LinkRef<'_>,
        metadata: &LinkMetadata,
    ) -> Result<Option<LinkInfoRef>>;
}
