//! Filesystem operations translated into drive calls.
//!
//! Every operation acts on the identity already attached to the links it is
//! given (the node id, and the parent's id for creations and moves). Paths are
//! only resolved by [`FileSystemOperations::get_link_info`].

pub(crate) mod info;

use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info};

use crate::config::{DriveConfig, ResolutionErrorPolicy};
use crate::error::{DriveFsError, Result};
use crate::guard;
use crate::remote::http::HttpDriveClient;
use crate::remote::query::Query;
use crate::remote::{
    DriveApi, ListRequest, NewNode, NodePatch, RemoteNode, Upload, FOLDER_MIME_TYPE, ROOT_ID,
};
use crate::resolver::PathResolver;
use crate::vfs::{
    DirectoryLink, FileLink, FileSystemOperations, LinkInfoRef, LinkMetadata, LinkRef,
    ListingOptions, MetadataSupport,
};
use info::{drive_id, link_info, DirectoryInfo, FileInfo};

/// MIME type used when the extension is missing or unknown.
pub const DEFAULT_MIME_TYPE: &str = "text/plain";

/// MIME type for a file extension (with or without the leading dot).
pub fn mime_type_for(extension: Option<&str>) -> String {
    extension
        .map(|ext| ext.trim_start_matches('.'))
        .filter(|ext| !ext.is_empty())
        .and_then(|ext| mime_guess::from_ext(ext).first_raw())
        .unwrap_or(DEFAULT_MIME_TYPE)
        .to_string()
}

fn link_id(info: Option<&LinkInfoRef>) -> Option<&str> {
    info.and_then(|i| drive_id(i.as_ref()))
}

fn require_id<'a>(info: Option<&'a LinkInfoRef>, path: &str) -> Result<&'a str> {
    link_id(info).ok_or_else(|| DriveFsError::MissingIdentity {
        path: path.to_string(),
    })
}

/// Id of a link's parent directory; `None` stands for the drive root.
fn parent_id(parent: Option<&DirectoryLink>) -> Option<&str> {
    parent.and_then(|p| link_id(p.info()))
}

/// Patch that turns (`source_name`, `source_parent`) into the destination's.
fn move_patch(
    source_name: &str,
    source_parent: Option<&str>,
    destination_name: &str,
    destination_parent: Option<&str>,
) -> NodePatch {
    let mut patch = NodePatch::default();
    if source_name != destination_name {
        patch.name = Some(destination_name.to_string());
    }
    if source_parent != destination_parent {
        patch.add_parents = Some(destination_parent.unwrap_or(ROOT_ID).to_string());
        patch.remove_parents = Some(source_parent.unwrap_or(ROOT_ID).to_string());
    }
    patch
}

/// Drive-backed implementation of [`FileSystemOperations`].
pub struct DriveOperations<A = HttpDriveClient> {
    api: A,
    config: DriveConfig,
}

impl DriveOperations<HttpDriveClient> {
    /// Connect to the drive with an API key. Both arguments must be non-blank.
    pub fn new(api_key: &str, application_name: &str) -> Result<Self> {
        Self::from_config(DriveConfig::builder(api_key, application_name)?.build())
    }

    pub fn from_config(config: DriveConfig) -> Result<Self> {
        let api = HttpDriveClient::new(&config)?;
        info!(
            application = %config.application_name,
            api_base = %config.api_base,
            "drive client ready"
        );
        Ok(Self::with_api(api, config))
    }
}

impl<A: DriveApi> DriveOperations<A> {
    pub fn with_api(api: A, config: DriveConfig) -> Self {
        Self { api, config }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn config(&self) -> &DriveConfig {
        &self.config
    }

    pub(crate) fn resolver(&self) -> PathResolver<'_> {
        PathResolver::new(
            &self.api,
            self.config.page_size,
            self.config.resolution_errors,
        )
    }

    /// Resolver for callers about to modify what they find: the first segment
    /// is scoped to the root folder and remote failures are always returned.
    pub(crate) fn strict_resolver(&self) -> PathResolver<'_> {
        PathResolver::new(
            &self.api,
            self.config.page_size,
            ResolutionErrorPolicy::Propagate,
        )
        .rooted()
    }

    /// Re-read a link's metadata from the drive.
    pub async fn refresh(&self, link: LinkRef<'_>) -> Result<LinkInfoRef> {
        let id = require_id(link.info(), link.full_name())?;
        let node = self.api.get(id).await?;
        Ok(link_info(node, link.parent_full_name()))
    }

    async fn move_node(
        &self,
        source: LinkRef<'_>,
        source_parent: Option<&DirectoryLink>,
        destination_name: &str,
        destination_parent: Option<&DirectoryLink>,
    ) -> Result<RemoteNode> {
        let id = require_id(source.info(), source.full_name())?;
        let patch = move_patch(
            source.name(),
            parent_id(source_parent),
            destination_name,
            parent_id(destination_parent),
        );
        debug!(
            from = source.full_name(),
            rename = patch.name.is_some(),
            reparent = patch.moves_parent(),
            "moving node"
        );
        self.api.update(id, &patch, None).await
    }
}

impl<A> MetadataSupport for DriveOperations<A> {
    fn supports_is_hidden_metadata(&self) -> bool {
        false
    }

    fn supports_is_read_only_metadata(&self) -> bool {
        false
    }

    fn supports_last_write_time_metadata(&self) -> bool {
        false
    }
}

#[async_trait]
impl<A: DriveApi> FileSystemOperations for DriveOperations<A> {
    async fn get_link_info(&self, full_name: &str) -> Result<Option<LinkInfoRef>> {
        guard::not_empty(full_name, "full_name")?;
        self.resolver().resolve(full_name).await
    }

    async fn read_file(&self, file: &FileLink) -> Result<Cursor<Vec<u8>>> {
        let id = require_id(file.info(), file.full_name())?;
        debug!(path = file.full_name(), "reading file");
        let content = self.api.download(id).await?;
        Ok(Cursor::new(content))
    }

    async fn write_file(
        &self,
        file: &FileLink,
        content: &mut (dyn AsyncRead + Unpin + Send),
        overwrite: bool,
    ) -> Result<LinkInfoRef> {
        let mut buf = Vec::new();
        content.read_to_end(&mut buf).await?;

        let mime_type = mime_type_for(file.extension());
        let upload = Upload {
            mime_type: mime_type.clone(),
            content: buf,
        };

        let node = match link_id(file.info()) {
            None => {
                let parents = parent_id(file.parent())
                    .map(|id| vec![id.to_string()])
                    .unwrap_or_default();
                debug!(path = file.full_name(), mime = %mime_type, "creating file");
                let new_node = NewNode {
                    name: file.name().to_string(),
                    mime_type,
                    parents,
                };
                self.api.create(&new_node, Some(upload)).await?
            }
            Some(id) => {
                debug!(path = file.full_name(), overwrite, "updating file");
                let patch = NodePatch {
                    name: Some(file.name().to_string()),
                    mime_type: Some(mime_type),
                    ..NodePatch::default()
                };
                self.api.update(id, &patch, Some(upload)).await?
            }
        };

        Ok(Arc::new(FileInfo::new(node, file.parent_full_name())))
    }

    async fn move_file(
        &self,
        source: &FileLink,
        destination: &FileLink,
        overwrite: bool,
    ) -> Result<LinkInfoRef> {
        debug!(to = destination.full_name(), overwrite, "move file");
        let node = self
            .move_node(
                LinkRef::File(source),
                source.parent(),
                destination.name(),
                destination.parent(),
            )
            .await?;
        Ok(Arc::new(FileInfo::new(node, destination.parent_full_name())))
    }

    async fn delete_file(&self, file: &FileLink) -> Result<()> {
        let id = require_id(file.info(), file.full_name())?;
        debug!(path = file.full_name(), "deleting file");
        self.api.delete(id).await
    }

    async fn create_directory(&self, directory: &DirectoryLink) -> Result<LinkInfoRef> {
        let parents = parent_id(directory.parent())
            .map(|id| vec![id.to_string()])
            .unwrap_or_default();
        let new_node = NewNode {
            name: directory.name().to_string(),
            mime_type: FOLDER_MIME_TYPE.to_string(),
            parents,
        };
        debug!(path = directory.full_name(), "creating directory");
        let node = self.api.create(&new_node, None).await?;
        Ok(Arc::new(DirectoryInfo::new(
            node,
            directory.parent_full_name(),
        )))
    }

    async fn move_directory(
        &self,
        source: &DirectoryLink,
        destination: &DirectoryLink,
    ) -> Result<LinkInfoRef> {
        let node = self
            .move_node(
                LinkRef::Directory(source),
                source.parent(),
                destination.name(),
                destination.parent(),
            )
            .await?;
        Ok(Arc::new(DirectoryInfo::new(
            node,
            destination.parent_full_name(),
        )))
    }

    async fn delete_directory(&self, directory: &DirectoryLink, recursive: bool) -> Result<()> {
        let id = require_id(directory.info(), directory.full_name())?;

        if !recursive {
            let probe = ListRequest {
                query: Query::new().in_parents(id),
                page_size: Some(1),
                page_token: None,
                fields: "files(id)".to_string(),
            };
            if !self.api.list(&probe).await?.files.is_empty() {
                return Err(DriveFsError::DirectoryNotEmpty {
                    path: directory.full_name().to_string(),
                });
            }
        }

        debug!(path = directory.full_name(), recursive, "deleting directory");
        self.api.delete(id).await
    }

    async fn get_links(
        &self,
        directory: &DirectoryLink,
        options: &ListingOptions,
    ) -> Result<Vec<LinkInfoRef>> {
        if !options.search_for_files && !options.search_for_directories {
            return Ok(Vec::new());
        }
        if options.has_search_pattern() {
            debug!(
                pattern = ?options.search_pattern,
                "search pattern is not applied by the drive listing"
            );
        }

        let parent = link_id(directory.info()).unwrap_or(ROOT_ID);
        let mut query = Query::new().in_parents(parent);
        if options.search_for_files != options.search_for_directories {
            query = if options.search_for_files {
                query.mime_type_ne(FOLDER_MIME_TYPE)
            } else {
                query.mime_type_eq(FOLDER_MIME_TYPE)
            };
        }

        let mut request = ListRequest::nodes(query, self.config.page_size);
        let mut links = Vec::new();
        let mut pages = 0usize;
        loop {
            let page = self.api.list(&request).await?;
            pages += 1;
            links.extend(
                page.files
                    .into_iter()
                    .map(|node| link_info(node, directory.full_name())),
            );
            match page.next_page_token {
                Some(token) => request.page_token = Some(token),
                None => break,
            }
        }

        debug!(
            path = directory.full_name(),
            entries = links.len(),
            pages,
            "listed directory"
        );
        Ok(links)
    }

    async fn update_metadata(
        &self,
        link: LinkRef<'_>,
        _metadata: &LinkMetadata,
    ) -> Result<Option<LinkInfoRef>> {
        Ok(link.info().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_lookup() {
        assert_eq!(mime_type_for(Some(".txt")), "text/plain");
        assert_eq!(mime_type_for(Some(".json")), "application/json");
        assert_eq!(mime_type_for(Some("png")), "image/png");
        assert_eq!(mime_type_for(Some(".definitely-unknown")), DEFAULT_MIME_TYPE);
        assert_eq!(mime_type_for(None), DEFAULT_MIME_TYPE);
    }

    #[test]
    fn patch_for_rename_only() {
        let patch = move_patch("a.txt", Some("p1"), "b.txt", Some("p1"));
        assert_eq!(patch.name.as_deref(), Some("b.txt"));
        assert!(!patch.moves_parent());
    }

    #[test]
    fn patch_for_reparent_only() {
        let patch = move_patch("a.txt", Some("p1"), "a.txt", Some("p2"));
        assert!(patch.name.is_none());
        assert_eq!(patch.add_parents.as_deref(), Some("p2"));
        assert_eq!(patch.remove_parents.as_deref(), Some("p1"));
    }

    #[test]
    fn patch_from_root_uses_alias() {
        let patch = move_patch("a", None, "b", Some("p2"));
        assert_eq!(patch.name.as_deref(), Some("b"));
        assert_eq!(patch.add_parents.as_deref(), Some("p2"));
        assert_eq!(patch.remove_parents.as_deref(), Some(ROOT_ID));
    }

    #[test]
    fn construction_validates_credentials() {
        assert!(matches!(
            DriveOperations::new("", "app"),
            Err(DriveFsError::InvalidArgument { name: "api_key", .. })
        ));
        assert!(matches!(
            DriveOperations::new("key", " "),
            Err(DriveFsError::InvalidArgument { name: "application_name", .. })
        ));
        let ops = DriveOperations::new("key", "app").unwrap();
        assert!(!ops.supports_is_hidden_metadata());
        assert!(!ops.supports_is_read_only_metadata());
        assert!(!ops.supports_last_write_time_metadata());
    }
}
