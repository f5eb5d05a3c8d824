//! Archive store backed by a local directory.

use async_trait::async_trait;
use eventline_types::{ArchiveError, ArchiveStore, ListPage, ObjectSummary};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::DEFAULT_PAGE_SIZE;

/// A bucket mirrored onto the local filesystem.
///
/// Every regular file below `root` is an object. Keys are relative paths
/// joined with `/` and listed in lexicographic order; the continuation token
/// is the last key of the previous page.
#[derive(Debug, Clone)]
pub struct DirectoryArchive {
    root: Arc<PathBuf>,
    page_size: usize,
}

impl DirectoryArchive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Arc::new(root.into()),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Sets the number of objects per page (at least one).
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Resolves `key` below the root, refusing anything that would escape it.
    fn object_path(&self, key: &str) -> Option<PathBuf> {
        let relative = Path::new(key);
        if key.is_empty()
            || !relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)))
        {
            return None;
        }
        Some(self.root.join(relative))
    }
}

/// Collects every file key below `root`, sorted.
///
/// Symlinks are followed. Any entry that resolves to neither a regular file
/// nor a directory fails the listing, so no object is left out unnoticed.
fn collect_keys(root: &Path) -> std::io::Result<Vec<String>> {
    let mut keys = Vec::new();
    let mut visited = HashSet::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        // Symlinked directories can form cycles.
        if !visited.insert(std::fs::canonicalize(&dir)?) {
            continue;
        }
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            let mut file_type = entry.file_type()?;
            if file_type.is_symlink() {
                file_type = std::fs::metadata(&path)?.file_type();
            }
            if file_type.is_dir() {
                pending.push(path);
            } else if file_type.is_file() {
                let relative = path.strip_prefix(root).map_err(std::io::Error::other)?;
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                keys.push(key);
            } else {
                return Err(std::io::Error::other(format!(
                    "unsupported archive entry: {}",
                    path.display()
                )));
            }
        }
    }
    keys.sort();
    Ok(keys)
}

#[async_trait]
impl ArchiveStore for DirectoryArchive {
    async fn list(&self, continuation_token: Option<&str>) -> Result<ListPage, ArchiveError> {
        let root = self.root.clone();
        let keys = tokio::task::spawn_blocking(move || collect_keys(&root))
            .await
            .map_err(|e| ArchiveError::List(format!("listing task failed: {e}")))??;

        let start = match continuation_token {
            Some(token) => keys.partition_point(|key| key.as_str() <= token),
            None => 0,
        };
        let end = (start + self.page_size).min(keys.len());
        let is_truncated = end < keys.len();
        let items: Vec<ObjectSummary> = keys[start..end]
            .iter()
            .map(|key| ObjectSummary::new(key.clone()))
            .collect();
        let next_token = if is_truncated {
            items.last().map(|item| item.key.clone())
        } else {
            None
        };

        tracing::debug!(
            root = %self.root.display(),
            objects = items.len(),
            truncated = is_truncated,
            "listed archive directory"
        );

        Ok(ListPage {
            items,
            is_truncated,
            next_token,
        })
    }

    async fn fetch(&self, key: &str) -> Result<Vec<u8>, ArchiveError> {
        let path = self.object_path(key).ok_or_else(|| ArchiveError::Fetch {
            key: key.to_string(),
            reason: "key escapes the archive root".to_string(),
        })?;
        tokio::fs::read(&path).await.map_err(|e| ArchiveError::Fetch {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }
}
