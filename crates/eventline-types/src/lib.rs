//! Shared types for the Eventline platform.
//!
//! This crate defines the vocabulary every other Eventline crate speaks:
//! arbitrary-precision [`SequenceNumber`]s, decoded [`Event`]s, the two wire
//! encodings of an [`Envelope`] (archive lines and live request bodies), and
//! the [`ArchiveStore`] seam through which historical objects are listed and
//! fetched.
//!
//! No crate in the workspace depends on anything *except* `eventline-types`
//! for cross-cutting type definitions.

mod archive;
mod envelope;
mod error;
mod sequence;

pub use archive::{ArchiveStore, ListPage, ObjectSummary};
pub use envelope::{Envelope, Event};
pub use error::{ArchiveError, EnvelopeError, ParseSequenceNumberError};
pub use sequence::SequenceNumber;
