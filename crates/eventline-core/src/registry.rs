//! Event handler registry and the dispatch step shared by replay and live
//! delivery.

use eventline_types::{Event, SequenceNumber};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::error::{HandlerError, RegistryError};
use crate::gate::SequenceGate;

/// Future returned by a registered handler.
pub type HandlerFuture = BoxFuture<'static, Result<(), HandlerError>>;

/// A type-erased event handler.
pub type EventHandler = Arc<dyn Fn(Value) -> HandlerFuture + Send + Sync>;

/// Maps event types to the single handler subscribed to each.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, EventHandler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes `handler` to `event_type`, replacing any earlier handler
    /// for that type.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::EmptyEventType` if `event_type` is empty or
    /// whitespace. Nothing is registered in that case.
    pub fn on<F, Fut>(&mut self, event_type: impl Into<String>, handler: F) -> Result<(), RegistryError>
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        let event_type = event_type.into();
        if event_type.trim().is_empty() {
            return Err(RegistryError::EmptyEventType);
        }
        let handler: EventHandler = Arc::new(move |payload| handler(payload).boxed());
        if self.handlers.insert(event_type.clone(), handler).is_some() {
            tracing::debug!(event_type = %event_type, "replaced existing event handler");
        }
        Ok(())
    }

    pub fn get(&self, event_type: &str) -> Option<&EventHandler> {
        self.handlers.get(event_type)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("event_types", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// What `process_event` did with an event that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// At or below the high-water mark; no handler was invoked.
    Duplicate,
    /// No handler is subscribed to the event type.
    Unsubscribed,
    /// The handler succeeded and the gate advanced.
    Handled,
}

/// Routes events to handlers through the dedup gate.
#[derive(Clone, Debug)]
pub struct Dispatcher {
    registry: Arc<HandlerRegistry>,
    gate: Arc<SequenceGate>,
}

impl Dispatcher {
    pub fn new(registry: Arc<HandlerRegistry>, gate: Arc<SequenceGate>) -> Self {
        Self { registry, gate }
    }

    pub fn gate(&self) -> &Arc<SequenceGate> {
        &self.gate
    }

    /// Delivers one event to its handler, at most once per sequence number
    /// as far as the high-water mark can tell.
    ///
    /// The gate advances only after the handler resolves successfully.
    ///
    /// # Errors
    ///
    /// Returns the handler's `HandlerError` unchanged. The gate is untouched.
    pub async fn process_event(
        &self,
        sequence_number: &SequenceNumber,
        event: Event,
    ) -> Result<DispatchOutcome, HandlerError> {
        if self.gate.has_been_handled(sequence_number) {
            tracing::info!(
                sequence_number = %sequence_number,
                event_type = event.event_type(),
                "already handled event"
            );
            return Ok(DispatchOutcome::Duplicate);
        }

        let Some(handler) = self.registry.get(event.event_type()).cloned() else {
            tracing::info!(
                sequence_number = %sequence_number,
                event_type = event.event_type(),
                "not subscribed to event"
            );
            return Ok(DispatchOutcome::Unsubscribed);
        };

        tracing::info!(
            sequence_number = %sequence_number,
            event_type = event.event_type(),
            "handling event"
        );
        handler(event.into_data()).await?;
        self.gate.advance(sequence_number);
        Ok(DispatchOutcome::Handled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_handler(
        calls: Arc<AtomicUsize>,
    ) -> impl Fn(Value) -> futures_util::future::Ready<Result<(), HandlerError>> + Send + Sync
    {
        move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            futures_util::future::ready(Ok(()))
        }
    }

    #[test]
    fn refuses_empty_event_type() {
        let mut registry = HandlerRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        assert_eq!(
            registry.on("", counting_handler(calls.clone())),
            Err(RegistryError::EmptyEventType)
        );
        assert_eq!(
            registry.on("   ", counting_handler(calls)),
            Err(RegistryError::EmptyEventType)
        );
        assert!(registry.is_empty());
        assert!(registry.get("").is_none());
        assert_eq!(
            RegistryError::EmptyEventType.to_string(),
            "no event type defined for handler"
        );
    }

    #[tokio::test]
    async fn last_registration_wins() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let mut registry = HandlerRegistry::new();
        registry.on("reg", counting_handler(first.clone())).unwrap();
        registry.on("reg", counting_handler(second.clone())).unwrap();
        assert_eq!(registry.len(), 1);

        let handler = registry.get("reg").unwrap().clone();
        handler(json!({})).await.unwrap();
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn process_event_advances_only_on_success() {
        let mut registry = HandlerRegistry::new();
        registry
            .on("ok", |_| async { Ok::<_, HandlerError>(()) })
            .unwrap();
        registry
            .on("boom", |_| async { Err(HandlerError::new("Error!")) })
            .unwrap();
        let gate = Arc::new(SequenceGate::new());
        let dispatcher = Dispatcher::new(Arc::new(registry), gate.clone());

        let err = dispatcher
            .process_event(&SequenceNumber::from(1), Event::new("boom", json!({})).unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.detail(), "Error!");
        assert_eq!(gate.high_water_mark(), None);

        let outcome = dispatcher
            .process_event(&SequenceNumber::from(1), Event::new("ok", json!({})).unwrap())
            .await
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::Handled);
        assert_eq!(gate.high_water_mark(), Some(SequenceNumber::from(1)));

        let outcome = dispatcher
            .process_event(&SequenceNumber::from(1), Event::new("ok", json!({})).unwrap())
            .await
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::Duplicate);
    }

    #[tokio::test]
    async fn unsubscribed_events_do_not_advance() {
        let gate = Arc::new(SequenceGate::new());
        let dispatcher = Dispatcher::new(Arc::new(HandlerRegistry::new()), gate.clone());
        let outcome = dispatcher
            .process_event(&SequenceNumber::from(5), Event::new("other", json!(null)).unwrap())
            .await
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::Unsubscribed);
        assert_eq!(gate.high_water_mark(), None);
    }
}
