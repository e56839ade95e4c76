pub mod config;
pub mod error;
pub mod guard;
pub mod operations;
pub mod remote;
mod resolver;
pub mod vfs;

use tracing::debug;

use config::DriveConfig;
use error::{DriveFsError, Result};
use operations::info::link_info;
use operations::DriveOperations;
use remote::http::HttpDriveClient;
use remote::DriveApi;
use resolver::split_segments;
use vfs::{DirectoryLink, FileLink, FileSystemOperations, LinkInfoRef, ListingOptions};

/// A path being operated on: its resolved parent chain and, if present, the
/// entry itself.
struct Located {
    full_name: String,
    parent: DirectoryLink,
    leaf: Option<LinkInfoRef>,
}

/// Path-addressed filesystem over a drive.
///
/// Resolves path strings to links, then hands the links to
/// [`DriveOperations`]. Every call resolves afresh; nothing is cached.
///
/// Apart from [`stat`](Self::stat) and [`exists`](Self::exists), paths are
/// anchored at the root folder and lookup failures are returned as errors
/// rather than read as "absent".
pub struct DriveFileSystem<A = HttpDriveClient> {
    ops: DriveOperations<A>,
}

impl DriveFileSystem<HttpDriveClient> {
    /// Connect with an API key and application name.
    pub fn create(api_key: &str, application_name: &str) -> Result<Self> {
        Ok(Self {
            ops: DriveOperations::new(api_key, application_name)?,
        })
    }

    pub fn from_config(config: DriveConfig) -> Result<Self> {
        Ok(Self {
            ops: DriveOperations::from_config(config)?,
        })
    }
}

impl<A: DriveApi> DriveFileSystem<A> {
    pub fn with_api(api: A, config: DriveConfig) -> Self {
        Self {
            ops: DriveOperations::with_api(api, config),
        }
    }

    /// Link-level operations, for callers that keep links between calls.
    pub fn operations(&self) -> &DriveOperations<A> {
        &self.ops
    }

    /// Resolve a path. `Ok(None)` if it does not exist.
    pub async fn stat(&self, path: &str) -> Result<Option<LinkInfoRef>> {
        self.ops.get_link_info(path).await
    }

    pub async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.stat(path).await?.is_some())
    }

    async fn locate(&self, path: &str) -> Result<Located> {
        let walk = self.ops.strict_resolver().walk(path).await?;
        let count = walk.segments.len();
        if count == 0 {
            return Err(DriveFsError::InvalidArgument {
                name: "path",
                value: path.to_string(),
            });
        }
        if walk.nodes.len() + 1 < count {
            return Err(DriveFsError::NotFound {
                path: walk.prefix(walk.nodes.len() + 1),
            });
        }

        let mut parent = DirectoryLink::root();
        for (i, node) in walk.nodes.iter().take(count - 1).enumerate() {
            let full_name = walk.prefix(i + 1);
            if !node.is_folder() {
                return Err(DriveFsError::NotADirectory { path: full_name });
            }
            let info = link_info(node.clone(), &walk.prefix(i));
            parent = DirectoryLink::new(full_name, Some(parent), Some(info));
        }

        let leaf = walk
            .nodes
            .get(count - 1)
            .map(|node| link_info(node.clone(), &walk.prefix(count - 1)));

        Ok(Located {
            full_name: walk.prefix(count),
            parent,
            leaf,
        })
    }

    /// Like [`stat`](Self::stat), but anchored at the root folder and strict
    /// about lookup failures.
    pub async fn lookup(&self, path: &str) -> Result<Option<LinkInfoRef>> {
        Ok(self.locate(path).await?.leaf)
    }

    /// Resolved link to an existing directory. Empty path is the root.
    pub async fn directory(&self, path: &str) -> Result<DirectoryLink> {
        if split_segments(path).is_empty() {
            return Ok(DirectoryLink::root());
        }
        let located = self.locate(path).await?;
        match located.leaf {
            Some(info) if info.is_directory() => Ok(DirectoryLink::new(
                located.full_name,
                Some(located.parent),
                Some(info),
            )),
            Some(_) => Err(DriveFsError::NotADirectory {
                path: located.full_name,
            }),
            None => Err(DriveFsError::NotFound {
                path: located.full_name,
            }),
        }
    }

    /// Link to a file whose parent exists. Carries info if the file exists.
    pub async fn file(&self, path: &str) -> Result<FileLink> {
        let located = self.locate(path).await?;
        if located.leaf.as_ref().is_some_and(|info| info.is_directory()) {
            return Err(DriveFsError::NotAFile {
                path: located.full_name,
            });
        }
        Ok(FileLink::new(
            located.full_name,
            Some(located.parent),
            located.leaf,
        ))
    }

    async fn existing_file(&self, path: &str) -> Result<FileLink> {
        let link = self.file(path).await?;
        if link.info().is_none() {
            return Err(DriveFsError::NotFound {
                path: link.full_name().to_string(),
            });
        }
        Ok(link)
    }

    pub async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let link = self.existing_file(path).await?;
        Ok(self.ops.read_file(&link).await?.into_inner())
    }

    /// Create or replace a file. The parent directory must exist.
    pub async fn write_file(&self, path: &str, data: &[u8]) -> Result<LinkInfoRef> {
        let link = self.file(path).await?;
        let mut reader = data;
        self.ops.write_file(&link, &mut reader, true).await
    }

    /// Create a directory; returns the existing one if already present.
    pub async fn mkdir(&self, path: &str) -> Result<LinkInfoRef> {
        let located = self.locate(path).await?;
        match located.leaf {
            Some(info) if info.is_directory() => {
                debug!(path = %located.full_name, "directory already exists");
                Ok(info)
            }
            Some(_) => Err(DriveFsError::AlreadyExists {
                path: located.full_name,
            }),
            None => {
                let link = DirectoryLink::new(located.full_name, Some(located.parent), None);
                self.ops.create_directory(&link).await
            }
        }
    }

    pub async fn remove_file(&self, path: &str) -> Result<()> {
        let link = self.existing_file(path).await?;
        self.ops.delete_file(&link).await
    }

    pub async fn remove_dir(&self, path: &str, recursive: bool) -> Result<()> {
        let link = self.directory(path).await?;
        self.ops.delete_directory(&link, recursive).await
    }

    /// Move or rename a file or directory. The destination must not exist.
    pub async fn rename(&self, from: &str, to: &str) -> Result<LinkInfoRef> {
        let source = self.locate(from).await?;
        let Some(info) = source.leaf else {
            return Err(DriveFsError::NotFound {
                path: source.full_name,
            });
        };
        let destination = self.locate(to).await?;
        if destination.leaf.is_some() {
            return Err(DriveFsError::AlreadyExists {
                path: destination.full_name,
            });
        }

        if info.is_directory() {
            let src = DirectoryLink::new(source.full_name, Some(source.parent), Some(info));
            let dst = DirectoryLink::new(destination.full_name, Some(destination.parent), None);
            self.ops.move_directory(&src, &dst).await
        } else {
            let src = FileLink::new(source.full_name, Some(source.parent), Some(info));
            let dst = FileLink::new(destination.full_name, Some(destination.parent), None);
            self.ops.move_file(&src, &dst, false).await
        }
    }

    pub async fn list(&self, path: &str, options: &ListingOptions) -> Result<Vec<LinkInfoRef>> {
        let link = self.directory(path).await?;
        self.ops.get_links(&link, options).await
    }
}
