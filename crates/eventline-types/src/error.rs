//! Error types shared across Eventline crates.

use thiserror::Error;

/// Error returned when a string is not a valid decimal sequence number.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseSequenceNumberError {
    /// The input was empty.
    #[error("sequence number is empty")]
    Empty,

    /// The input contained something other than ASCII digits.
    #[error("sequence number contains non-digit characters: {0:?}")]
    InvalidDigit(String),
}

/// Errors produced while decoding an archive line or a live request body.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// The envelope itself was not a JSON object of the expected shape.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(#[source] serde_json::Error),

    /// The envelope had no `sequenceNumber`, or it was empty.
    #[error("envelope has no sequenceNumber")]
    MissingSequenceNumber,

    /// The `sequenceNumber` was present but not a decimal integer.
    #[error("invalid sequenceNumber: {0}")]
    InvalidSequenceNumber(#[from] ParseSequenceNumberError),

    /// The envelope had no `data`, or it was empty.
    #[error("envelope has no data")]
    MissingData,

    /// Live `data` was not valid base64.
    #[error("data is not valid base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    /// The embedded event was not valid JSON.
    #[error("embedded event is not valid JSON: {0}")]
    MalformedEvent(#[source] serde_json::Error),

    /// The embedded event was valid JSON but not an object.
    #[error("embedded event is not a JSON object")]
    EventNotObject,

    /// The embedded event had no usable `type`.
    #[error("embedded event has no type")]
    MissingEventType,
}

/// Transport failures while listing or fetching archived objects.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Listing a page of objects failed.
    #[error("failed to list archive objects: {0}")]
    List(String),

    /// Fetching a single object failed.
    #[error("failed to fetch archive object {key}: {reason}")]
    Fetch {
        /// The key of the object that could not be fetched.
        key: String,
        /// Transport-specific detail.
        reason: String,
    },

    /// A page claimed to be truncated but carried no continuation token.
    #[error("archive listing is truncated but has no continuation token")]
    MissingContinuationToken,

    /// A local I/O failure in a filesystem-backed store.
    #[error("archive io error: {0}")]
    Io(#[from] std::io::Error),
}
