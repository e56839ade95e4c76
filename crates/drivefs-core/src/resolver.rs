use tracing::{debug, warn};

use crate::config::ResolutionErrorPolicy;
use crate::error::{DriveFsError, Result};
use crate::operations::info::link_info;
use crate::remote::query::Query;
use crate::remote::{DriveApi, ListRequest, RemoteNode, ROOT_ID};
use crate::vfs::LinkInfoRef;

/// Outcome of walking a path: the nodes matched for its leading segments.
///
/// `nodes.len() < segments.len()` means the walk stopped at the first segment
/// with no match.
#[derive(Debug, Clone)]
pub(crate) struct Resolution {
    pub segments: Vec<String>,
    pub nodes: Vec<RemoteNode>,
}

impl Resolution {
    pub fn is_complete(&self) -> bool {
        !self.segments.is_empty() && self.nodes.len() == self.segments.len()
    }

    /// Full name of the first `count` segments.
    pub fn prefix(&self, count: usize) -> String {
        self.segments[..count].join("/")
    }

    /// Info for the last segment, if every segment was found.
    pub fn leaf(&self) -> Option<LinkInfoRef> {
        if !self.is_complete() {
            return None;
        }
        let last = self.nodes.len() - 1;
        Some(link_info(self.nodes[last].clone(), &self.prefix(last)))
    }
}

/// Split a logical path into its non-empty segments.
pub(crate) fn split_segments(full_name: &str) -> Vec<String> {
    full_name
        .split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Resolves slash-separated paths to drive nodes, one listing per segment.
pub(crate) struct PathResolver<'a> {
    api: &'a dyn DriveApi,
    page_size: u32,
    policy: ResolutionErrorPolicy,
    rooted: bool,
}

impl<'a> PathResolver<'a> {
    pub fn new(api: &'a dyn DriveApi, page_size: u32, policy: ResolutionErrorPolicy) -> Self {
        Self {
            api,
            page_size: page_size.max(2),
            policy,
            rooted: false,
        }
    }

    /// Match the first segment only among the root folder's children.
    pub fn rooted(mut self) -> Self {
        self.rooted = true;
        self
    }

    /// Nodes named `segment` under `parent`. Paging stops once two are found.
    async fn lookup(&self, segment: &str, parent: Option<&str>) -> Result<Vec<RemoteNode>> {
        let mut query = Query::new().name_eq(segment);
        match parent {
            Some(id) => query = query.in_parents(id),
            None if self.rooted => query = query.in_parents(ROOT_ID),
            None => {}
        }

        let mut request = ListRequest::nodes(query, self.page_size);
        let mut found = Vec::new();
        loop {
            let page = self.api.list(&request).await?;
            found.extend(page.files);
            match page.next_page_token {
                Some(token) if found.len() < 2 => request.page_token = Some(token),
                _ => return Ok(found),
            }
        }
    }

    /// Link info for the node at `full_name`, or `None` if any segment is missing.
    pub async fn resolve(&self, full_name: &str) -> Result<Option<LinkInfoRef>> {
        Ok(self.walk(full_name).await?.leaf())
    }

    /// Walk as far as the path exists.
    ///
    /// Ambiguous segments always fail. Remote failures either end the walk
    /// as if the segment were missing or are returned, depending on policy.
    pub async fn walk(&self, full_name: &str) -> Result<Resolution> {
        let segments = split_segments(full_name);
        let mut nodes: Vec<RemoteNode> = Vec::with_capacity(segments.len());

        for (i, segment) in segments.iter().enumerate() {
            let parent = nodes.last().map(|n| n.id.as_str());
            let mut files = match self.lookup(segment, parent).await {
                Ok(files) => files,
                Err(e) if e.is_remote() && self.policy == ResolutionErrorPolicy::NotFound => {
                    warn!(
                        path = full_name,
                        segment = %segment,
                        error = %e,
                        "path lookup failed, treating as not found"
                    );
                    break;
                }
                Err(e) => return Err(e),
            };

            match files.len() {
                0 => {
                    debug!(path = full_name, segment = %segment, "path segment not found");
                    break;
                }
                1 => nodes.extend(files.pop()),
                n => {
                    return Err(DriveFsError::AmbiguousPath {
                        path: segments[..=i].join("/"),
                        segment: segment.clone(),
                        matches: n,
                    });
                }
            }
        }

        Ok(Resolution { segments, nodes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::memory::MemoryDrive;

    fn resolver(drive: &MemoryDrive, policy: ResolutionErrorPolicy) -> PathResolver<'_> {
        PathResolver::new(drive, 100, policy)
    }

    #[test]
    fn segments_skip_empty_parts() {
        assert_eq!(split_segments("a//b/"), vec!["a", "b"]);
        assert_eq!(split_segments("/a"), vec!["a"]);
        assert!(split_segments("").is_empty());
    }

    #[tokio::test]
    async fn resolves_nested_path() {
        let drive = MemoryDrive::new();
        let a = drive.seed_folder("A", None);
        let b = drive.seed_folder("B", Some(&a));
        drive.seed_file("c.txt", Some(&b), b"abc");

        let r = resolver(&drive, ResolutionErrorPolicy::NotFound);
        let info = r.resolve("A/B/c.txt").await.unwrap().unwrap();
        assert_eq!(info.full_name(), "A/B/c.txt");
        assert_eq!(info.as_file().unwrap().length(), 3);
        assert_eq!(drive.calls().list, 3);
    }

    #[tokio::test]
    async fn same_name_under_other_parent_is_not_matched() {
        let drive = MemoryDrive::new();
        let a = drive.seed_folder("A", None);
        drive.seed_folder("B", None);
        drive.seed_file("x", Some(&a), b"");

        let r = resolver(&drive, ResolutionErrorPolicy::NotFound);
        assert!(r.resolve("B/x").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn walk_stops_at_first_missing_segment() {
        let drive = MemoryDrive::new();
        drive.seed_folder("A", None);

        let r = resolver(&drive, ResolutionErrorPolicy::NotFound);
        let walk = r.walk("A/missing/deeper").await.unwrap();
        assert_eq!(walk.nodes.len(), 1);
        assert!(!walk.is_complete());
        assert!(walk.leaf().is_none());
        assert_eq!(drive.calls().list, 2);
    }

    #[tokio::test]
    async fn ambiguity_is_an_error_under_both_policies() {
        let drive = MemoryDrive::new();
        drive.seed_folder("dup", None);
        drive.seed_folder("dup", None);

        for policy in [ResolutionErrorPolicy::NotFound, ResolutionErrorPolicy::Propagate] {
            let err = resolver(&drive, policy).resolve("dup/x").await.unwrap_err();
            assert!(matches!(
                err,
                DriveFsError::AmbiguousPath { matches: 2, ref segment, .. } if segment == "dup"
            ));
        }
    }

    #[tokio::test]
    async fn remote_failure_follows_policy() {
        let drive = MemoryDrive::new();
        drive.seed_file("a.txt", None, b"");
        drive.set_unavailable(true);

        let swallowed = resolver(&drive, ResolutionErrorPolicy::NotFound)
            .resolve("a.txt")
            .await
            .unwrap();
        assert!(swallowed.is_none());

        let err = resolver(&drive, ResolutionErrorPolicy::Propagate)
            .resolve("a.txt")
            .await
            .unwrap_err();
        assert!(matches!(err, DriveFsError::Api { status: 503, .. }));
    }

    #[tokio::test]
    async fn duplicates_detected_with_single_entry_pages() {
        let drive = MemoryDrive::with_max_page_size(1);
        drive.seed_folder("dup", None);
        drive.seed_folder("dup", None);

        let r = PathResolver::new(&drive, 1, ResolutionErrorPolicy::NotFound);
        let err = r.resolve("dup").await.unwrap_err();
        assert!(matches!(err, DriveFsError::AmbiguousPath { matches: 2, .. }));
        assert_eq!(drive.calls().list, 2);
    }

    #[tokio::test]
    async fn rooted_walk_ignores_nested_namesakes() {
        let drive = MemoryDrive::new();
        let a = drive.seed_folder("a", None);
        drive.seed_file("x.txt", Some(&a), b"nested");

        let unscoped = resolver(&drive, ResolutionErrorPolicy::NotFound);
        assert!(unscoped.resolve("x.txt").await.unwrap().is_some());

        let rooted = resolver(&drive, ResolutionErrorPolicy::NotFound).rooted();
        assert!(rooted.resolve("x.txt").await.unwrap().is_none());
        assert!(rooted.resolve("a/x.txt").await.unwrap().is_some());
    }
}
