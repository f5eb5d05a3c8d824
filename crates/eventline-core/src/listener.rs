//! Per-request pipeline for the live push channel.
//!
//! Each request runs, short-circuiting on the first failure:
//! 1. authenticate against the configured token
//! 2. reject while the archive is replaying
//! 3. parse the live envelope
//! 4. ignore anything at or below the high-water mark
//! 5. dispatch once; the pushing transport owns redelivery

use eventline_types::Envelope;
use std::sync::Arc;

use crate::auth::AuthToken;
use crate::gate::SequenceGate;
use crate::registry::{DispatchOutcome, Dispatcher};

/// Terminal status of one live request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerStatus {
    /// Missing or wrong credential.
    Unauthorized,
    /// History is still replaying (or replay stalled); retry later.
    ServiceUnavailable,
    /// The body was not a valid live envelope.
    BadRequest(String),
    /// Accepted without invoking a handler: duplicate or unsubscribed.
    Ignored,
    /// The handler ran and succeeded.
    Accepted,
    /// The handler failed; carries its detail.
    HandlerError(String),
}

/// The live entry point. Cheap to clone; all clones share one gate.
#[derive(Clone, Debug)]
pub struct LiveListener {
    auth: Arc<AuthToken>,
    dispatcher: Dispatcher,
}

impl LiveListener {
    pub fn new(auth: AuthToken, dispatcher: Dispatcher) -> Self {
        Self {
            auth: Arc::new(auth),
            dispatcher,
        }
    }

    pub fn gate(&self) -> &Arc<SequenceGate> {
        self.dispatcher.gate()
    }

    /// Runs one request through the pipeline.
    pub async fn handle(&self, credential: Option<&str>, body: &[u8]) -> ListenerStatus {
        if !self.auth.verify(credential) {
            tracing::debug!("rejected live event with invalid credential");
            return ListenerStatus::Unauthorized;
        }

        if self.gate().is_replaying() {
            tracing::debug!(phase = %self.gate().phase(), "rejected live event while replaying");
            return ListenerStatus::ServiceUnavailable;
        }

        let envelope = match Envelope::from_live_body(body) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::info!(error = %e, "failed to parse live event");
                return ListenerStatus::BadRequest(e.to_string());
            }
        };

        match self
            .dispatcher
            .process_event(&envelope.sequence_number, envelope.event)
            .await
        {
            Ok(DispatchOutcome::Handled) => ListenerStatus::Accepted,
            Ok(DispatchOutcome::Duplicate | DispatchOutcome::Unsubscribed) => ListenerStatus::Ignored,
            Err(e) => {
                tracing::warn!(
                    sequence_number = %envelope.sequence_number,
                    error = %e,
                    "live event handler failed"
                );
                ListenerStatus::HandlerError(e.detail().to_string())
            }
        }
    }
}
