use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use clap::Subcommand;
use comfy_table::{presets::UTF8_FULL_CONDENSED, Table};
use drivefs_core::remote::DriveApi;
use drivefs_core::vfs::{LinkInfoRef, LinkSummary, ListingOptions};
use drivefs_core::DriveFileSystem;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

#[derive(Subcommand)]
pub enum FsCommands {
    /// Show file/directory metadata
    Stat {
        /// Path to stat
        path: String,
    },
    /// List directory contents
    Ls {
        /// Directory path (default: drive root)
        #[arg(default_value = "")]
        path: String,
        /// Only list files
        #[arg(long, conflicts_with = "dirs")]
        files: bool,
        /// Only list directories
        #[arg(long)]
        dirs: bool,
    },
    /// Print file contents
    Cat {
        /// File path
        path: String,
    },
    /// Upload a local file (use - for stdin)
    Put {
        /// Local source
        local: PathBuf,
        /// Drive destination path
        remote: String,
    },
    /// Create a directory
    Mkdir {
        /// Directory path
        path: String,
    },
    /// Remove a file or directory
    Rm {
        /// Path to remove
        path: String,
        /// Remove a directory and everything under it
        #[arg(short, long)]
        recursive: bool,
    },
    /// Move/rename a file or directory
    Mv {
        /// Source path
        from: String,
        /// Destination path
        to: String,
    },
}

pub async fn run<A: DriveApi>(
    fs: &DriveFileSystem<A>,
    cmd: FsCommands,
    json: bool,
) -> anyhow::Result<()> {
    match cmd {
        FsCommands::Stat { path } => {
            let Some(info) = fs.stat(&path).await? else {
                anyhow::bail!("not found: {path}");
            };
            let summary = LinkSummary::from(&*info);
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("  Path:      {}", summary.path);
                println!("  Type:      {}", kind(&info));
                if let Some(size) = summary.size {
                    println!("  Size:      {size}");
                }
                if let Some(md5) = &summary.md5 {
                    println!("  MD5:       {md5}");
                }
                println!("  Created:   {}", timestamp(summary.created));
                println!("  Modified:  {}", timestamp(summary.modified));
                println!("  Read-only: {}", summary.read_only);
            }
        }
        FsCommands::Ls { path, files, dirs } => {
            let options = listing_options(files, dirs);
            let mut entries = fs.list(&path, &options).await?;
            entries.sort_by(|a, b| a.full_name().cmp(b.full_name()));

            if json {
                let summaries: Vec<LinkSummary> =
                    entries.iter().map(|e| LinkSummary::from(&**e)).collect();
                println!("{}", serde_json::to_string_pretty(&summaries)?);
            } else {
                println!("{}", listing_table(&entries));
            }
        }
        FsCommands::Cat { path } => {
            let data = fs.read_file(&path).await?;
            if json {
                let text = String::from_utf8_lossy(&data);
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({ "content": text }))?
                );
            } else {
                let mut out = std::io::stdout().lock();
                out.write_all(&data)?;
                out.flush()?;
            }
        }
        FsCommands::Put { local, remote } => {
            let data = read_local(&local, tokio::io::stdin()).await?;
            debug!(local = %local.display(), remote = %remote, bytes = data.len(), "uploading");
            let info = fs.write_file(&remote, &data).await?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&LinkSummary::from(&*info))?
                );
            } else {
                println!("Wrote {} bytes to {}", data.len(), info.full_name());
            }
        }
        FsCommands::Mkdir { path } => {
            let info = fs.mkdir(&path).await?;
            if json {
                println!("{}", serde_json::json!({ "created": info.full_name() }));
            } else {
                println!("Created directory {}", info.full_name());
            }
        }
        FsCommands::Rm { path, recursive } => {
            remove(fs, &path, recursive).await?;
            if json {
                println!("{}", serde_json::json!({ "removed": path }));
            } else {
                println!("Removed {path}");
            }
        }
        FsCommands::Mv { from, to } => {
            let info = fs.rename(&from, &to).await?;
            if json {
                println!(
                    "{}",
                    serde_json::json!({ "renamed": { "from": from, "to": info.full_name() } })
                );
            } else {
                println!("Moved {from} → {}", info.full_name());
            }
        }
    }
    Ok(())
}

fn listing_options(files: bool, dirs: bool) -> ListingOptions {
    match (files, dirs) {
        (true, false) => ListingOptions::files_only(),
        (false, true) => ListingOptions::directories_only(),
        _ => ListingOptions::default(),
    }
}

async fn remove<A: DriveApi>(
    fs: &DriveFileSystem<A>,
    path: &str,
    recursive: bool,
) -> anyhow::Result<()> {
    let Some(info) = fs.lookup(path).await? else {
        anyhow::bail!("not found: {path}");
    };
    if info.is_directory() {
        fs.remove_dir(path, recursive).await?;
    } else {
        fs.remove_file(path).await?;
    }
    Ok(())
}

/// Contents of a local file, or of `stdin` when the path is `-`.
async fn read_local<R: AsyncRead + Unpin>(path: &Path, mut stdin: R) -> anyhow::Result<Vec<u8>> {
    if path.as_os_str() == "-" {
        let mut buf = Vec::new();
        stdin.read_to_end(&mut buf).await?;
        return Ok(buf);
    }
    Ok(tokio::fs::read(path).await?)
}

fn kind(info: &LinkInfoRef) -> &'static str {
    if info.is_directory() {
        "dir"
    } else {
        "file"
    }
}

fn timestamp(value: Option<DateTime<Utc>>) -> String {
    value.map(|t| t.to_rfc3339()).unwrap_or_else(|| "-".to_string())
}

fn listing_table(entries: &[LinkInfoRef]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec!["Name", "Type", "Size", "Modified"]);

    for entry in entries {
        let summary = LinkSummary::from(&**entry);
        let name = summary
            .path
            .rsplit_once('/')
            .map_or(summary.path.as_str(), |(_, name)| name);
        let size = summary.size.map(|s| s.to_string()).unwrap_or_default();
        table.add_row(vec![
            name.to_string(),
            kind(entry).to_string(),
            size,
            timestamp(summary.modified),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use drivefs_core::config::DriveConfig;
    use drivefs_core::remote::memory::MemoryDrive;

    fn setup() -> (DriveFileSystem<Arc<MemoryDrive>>, Arc<MemoryDrive>) {
        let drive = Arc::new(MemoryDrive::new());
        let cfg = DriveConfig::builder("test-key", "drivefs-cli-tests")
            .unwrap()
            .build();
        (DriveFileSystem::with_api(drive.clone(), cfg), drive)
    }

    #[test]
    fn listing_flags() {
        let files = listing_options(true, false);
        assert!(files.search_for_files && !files.search_for_directories);
        let dirs = listing_options(false, true);
        assert!(!dirs.search_for_files && dirs.search_for_directories);
        let both = listing_options(false, false);
        assert!(both.search_for_files && both.search_for_directories);
    }

    #[tokio::test]
    async fn put_uploads_local_file() {
        let (fs, _drive) = setup();
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("notes.md");
        std::fs::write(&local, b"# notes").unwrap();

        run(
            &fs,
            FsCommands::Put {
                local,
                remote: "notes.md".into(),
            },
            true,
        )
        .await
        .unwrap();

        assert_eq!(fs.read_file("notes.md").await.unwrap(), b"# notes");
    }

    #[tokio::test]
    async fn rm_dispatches_on_kind() {
        let (fs, drive) = setup();
        fs.mkdir("d").await.unwrap();
        fs.write_file("d/f.txt", b"x").await.unwrap();

        let err = run(
            &fs,
            FsCommands::Rm {
                path: "d".into(),
                recursive: false,
            },
            false,
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("not empty"));

        run(
            &fs,
            FsCommands::Rm {
                path: "d/f.txt".into(),
                recursive: false,
            },
            false,
        )
        .await
        .unwrap();
        assert_eq!(drive.len(), 1);

        let missing = run(
            &fs,
            FsCommands::Rm {
                path: "ghost".into(),
                recursive: true,
            },
            false,
        )
        .await;
        assert!(missing.is_err());
    }

    #[tokio::test]
    async fn table_lists_entry_names() {
        let (fs, _drive) = setup();
        fs.mkdir("docs").await.unwrap();
        fs.write_file("docs/a.txt", b"abc").await.unwrap();

        let entries = fs.list("docs", &ListingOptions::default()).await.unwrap();
        let rendered = listing_table(&entries).to_string();
        assert!(rendered.contains("a.txt"));
        assert!(rendered.contains("file"));
        assert!(!rendered.contains("docs/a.txt"));
    }

    #[tokio::test]
    async fn dash_reads_stdin() {
        let data = read_local(Path::new("-"), &b"piped input"[..]).await.unwrap();
        assert_eq!(data, b"piped input");

        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("in.txt");
        std::fs::write(&local, b"from disk").unwrap();
        let data = read_local(&local, &b"ignored"[..]).await.unwrap();
        assert_eq!(data, b"from disk");
    }
}
