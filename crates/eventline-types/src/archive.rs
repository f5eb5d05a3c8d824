//! The object-storage seam used by archive replay.

use async_trait::async_trait;

use crate::error::ArchiveError;

/// One listed archive object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    /// The object key, unique within the archive.
    pub key: String,
}

impl ObjectSummary {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

/// One page of a continuation-token listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    /// Objects in listing order.
    pub items: Vec<ObjectSummary>,
    /// Whether more pages follow.
    pub is_truncated: bool,
    /// Token to pass to the next [`ArchiveStore::list`] call.
    pub next_token: Option<String>,
}

/// Paginated, listable object storage holding newline-delimited archive
/// records.
///
/// Implementations must return objects in a stable order: the replayer treats
/// listing order as event order.
#[async_trait]
pub trait ArchiveStore: Send + Sync {
    /// Lists one page of objects, starting after `continuation_token`
    /// (`None` for the first page).
    async fn list(&self, continuation_token: Option<&str>) -> Result<ListPage, ArchiveError>;

    /// Fetches the full content of one object.
    async fn fetch(&self, key: &str) -> Result<Vec<u8>, ArchiveError>;
}
