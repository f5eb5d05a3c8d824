//! In-process archive store.

use async_trait::async_trait;
use eventline_types::{ArchiveError, ArchiveStore, ListPage, ObjectSummary};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::DEFAULT_PAGE_SIZE;

/// Objects kept in memory and listed in insertion order.
///
/// The continuation token is the index of the next object. Failures can be
/// injected per key or for listing, which is how replay's fail-closed path
/// is exercised.
#[derive(Debug)]
pub struct MemoryArchive {
    objects: Vec<(String, Vec<u8>)>,
    page_size: usize,
    failing_keys: HashSet<String>,
    fail_listing: bool,
    list_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self {
            objects: Vec::new(),
            page_size: DEFAULT_PAGE_SIZE,
            failing_keys: HashSet::new(),
            fail_listing: false,
            list_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
        }
    }

    /// Sets the number of objects per page (at least one).
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Appends an object. Objects list in the order they were added.
    pub fn with_object(mut self, key: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.objects.push((key.into(), content.into()));
        self
    }

    /// Makes every fetch of `key` fail.
    pub fn with_failing_fetch(mut self, key: impl Into<String>) -> Self {
        self.failing_keys.insert(key.into());
        self
    }

    /// Makes every listing call fail.
    pub fn with_failing_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    /// Number of `list` calls served so far.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Number of `fetch` calls served so far.
    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

impl Default for MemoryArchive {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArchiveStore for MemoryArchive {
    async fn list(&self, continuation_token: Option<&str>) -> Result<ListPage, ArchiveError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_listing {
            return Err(ArchiveError::List("listing disabled".to_string()));
        }

        let start = match continuation_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| ArchiveError::List(format!("invalid continuation token: {token}")))?,
            None => 0,
        };
        let end = (start + self.page_size).min(self.objects.len());
        let items = self
            .objects
            .get(start..end)
            .unwrap_or_default()
            .iter()
            .map(|(key, _)| ObjectSummary::new(key.clone()))
            .collect();
        let is_truncated = end < self.objects.len();

        Ok(ListPage {
            items,
            is_truncated,
            next_token: is_truncated.then(|| end.to_string()),
        })
    }

    async fn fetch(&self, key: &str) -> Result<Vec<u8>, ArchiveError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_keys.contains(key) {
            return Err(ArchiveError::Fetch {
                key: key.to_string(),
                reason: "injected failure".to_string(),
            });
        }
        self.objects
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, content)| content.clone())
            .ok_or_else(|| ArchiveError::Fetch {
                key: key.to_string(),
                reason: "no such object".to_string(),
            })
    }
}
