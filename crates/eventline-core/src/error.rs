//! Error types for the reconciliation engine.

use eventline_types::{ArchiveError, EnvelopeError};
use std::fmt;
use thiserror::Error;

/// Construction-time configuration errors. Any of these prevents the engine
/// from starting.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// No auth token was configured, so live requests could never be accepted.
    #[error("cannot listen for events: consumer was configured without an auth token")]
    MissingAuthToken,

    /// An archive bucket was configured without one of its required fields.
    #[error("settings contain an archive bucket but no {field}")]
    MissingArchiveField {
        /// Name of the missing setting.
        field: &'static str,
    },

    /// Archive settings are present but no store was handed to `listen`.
    #[error("settings contain an archive bucket but no archive store was supplied")]
    MissingArchiveStore,

    /// A store was handed to `listen` but no archive is configured.
    #[error("an archive store was supplied but settings contain no archive bucket")]
    UnexpectedArchiveStore,
}

/// Invalid handler registration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The event type was empty or whitespace.
    #[error("no event type defined for handler")]
    EmptyEventType,
}

/// Failure reported by an application event handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{detail}")]
pub struct HandlerError {
    detail: String,
}

impl HandlerError {
    pub fn new(detail: impl fmt::Display) -> Self {
        Self {
            detail: detail.to_string(),
        }
    }

    /// Human-readable failure detail.
    pub fn detail(&self) -> &str {
        &self.detail
    }
}

impl From<String> for HandlerError {
    fn from(detail: String) -> Self {
        Self { detail }
    }
}

impl From<&str> for HandlerError {
    fn from(detail: &str) -> Self {
        Self::new(detail)
    }
}

/// A single failed attempt at delivering one archive line. Always retried.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The line could not be decoded.
    #[error("failed to parse archive record: {0}")]
    Envelope(#[from] EnvelopeError),

    /// The handler rejected the event.
    #[error("handler failed: {0}")]
    Handler(#[from] HandlerError),
}

/// Fatal replay failure. The walk is abandoned and the gate stays replaying.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// Listing or fetching archive objects failed.
    #[error("archive transport failed: {0}")]
    Transport(#[from] ArchiveError),

    /// The replay task panicked or was cancelled.
    #[error("replay task aborted: {0}")]
    Aborted(String),
}
