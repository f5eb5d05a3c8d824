//! Archive store implementations for Eventline.
//!
//! - [`MemoryArchive`]: objects held in process, in insertion order. Used by
//!   tests and embedders that already have the archive in hand.
//! - [`DirectoryArchive`]: a locally mounted or synced bucket, where every
//!   file under the root is one object and keys are `/`-separated relative
//!   paths listed in lexicographic order.
//!
//! Both page their listings with a continuation token, the same protocol a
//! remote object store uses.

mod directory;
mod memory;

pub use directory::DirectoryArchive;
pub use memory::MemoryArchive;

/// Objects returned per listing page when no page size is configured.
pub const DEFAULT_PAGE_SIZE: usize = 1000;
