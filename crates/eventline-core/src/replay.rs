//! Catch-up replay of the historical archive.
//!
//! The walk is strictly sequential: pages in listing order, objects in page
//! order, lines in file order. A line whose delivery fails is retried after a
//! fixed delay until it succeeds, with no ceiling. Transport failures abort
//! the walk and leave the gate stalled in replay mode.

use eventline_types::{ArchiveError, ArchiveStore, Envelope};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use crate::error::{DeliveryError, ReplayError};
use crate::gate::SequenceGate;
use crate::registry::{DispatchOutcome, Dispatcher};

/// Default pause between attempts at a failing archive line.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Counters collected over one archive walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayReport {
    /// Listing pages read.
    pub pages: u64,
    /// Objects fetched.
    pub objects: u64,
    /// Event lines delivered (every non-blank line).
    pub events: u64,
    /// Events that reached a handler successfully.
    pub handled: u64,
    /// Events skipped as already handled.
    pub duplicates: u64,
    /// Events with no subscribed handler.
    pub unsubscribed: u64,
    /// Failed delivery attempts that were retried.
    pub retries: u64,
}

impl ReplayReport {
    fn record(&mut self, outcome: DispatchOutcome) {
        self.events += 1;
        match outcome {
            DispatchOutcome::Handled => self.handled += 1,
            DispatchOutcome::Duplicate => self.duplicates += 1,
            DispatchOutcome::Unsubscribed => self.unsubscribed += 1,
        }
    }
}

/// Single-use walker over an [`ArchiveStore`].
pub struct ArchiveReplayer {
    store: Arc<dyn ArchiveStore>,
    dispatcher: Dispatcher,
    retry_delay: Duration,
}

impl ArchiveReplayer {
    pub fn new(store: Arc<dyn ArchiveStore>, dispatcher: Dispatcher, retry_delay: Duration) -> Self {
        Self {
            store,
            dispatcher,
            retry_delay,
        }
    }

    fn gate(&self) -> &SequenceGate {
        self.dispatcher.gate()
    }

    /// Walks the whole archive, then ends replay on the gate.
    ///
    /// # Errors
    ///
    /// Returns `ReplayError::Transport` if listing or fetching fails. The gate
    /// is stalled first, so live traffic stays rejected.
    pub async fn run(self) -> Result<ReplayReport, ReplayError> {
        self.gate().begin_replay();
        tracing::info!("starting archive replay");

        match self.walk().await {
            Ok(report) => {
                self.gate().end_replay();
                tracing::info!(
                    pages = report.pages,
                    objects = report.objects,
                    events = report.events,
                    handled = report.handled,
                    duplicates = report.duplicates,
                    unsubscribed = report.unsubscribed,
                    retries = report.retries,
                    "archive replay finished, accepting live events"
                );
                Ok(report)
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    "archive replay failed; live events will be rejected until restart"
                );
                self.gate().stall(e.to_string());
                Err(e)
            }
        }
    }

    async fn walk(&self) -> Result<ReplayReport, ReplayError> {
        let mut report = ReplayReport::default();
        let mut token: Option<String> = None;

        loop {
            let page = self.store.list(token.as_deref()).await?;
            report.pages += 1;
            tracing::debug!(
                page = report.pages,
                objects = page.items.len(),
                truncated = page.is_truncated,
                "listed archive page"
            );

            for object in &page.items {
                let content = self.store.fetch(&object.key).await?;
                report.objects += 1;
                self.replay_object(&object.key, &content, &mut report).await?;
            }

            if !page.is_truncated {
                return Ok(report);
            }
            token = Some(page.next_token.ok_or(ArchiveError::MissingContinuationToken)?);
        }
    }

    async fn replay_object(
        &self,
        key: &str,
        content: &[u8],
        report: &mut ReplayReport,
    ) -> Result<(), ReplayError> {
        // A corrupt object would fail identically on every retry.
        let text = std::str::from_utf8(content).map_err(|e| ArchiveError::Fetch {
            key: key.to_string(),
            reason: format!("object is not valid UTF-8: {e}"),
        })?;
        for (index, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            self.replay_line(key, index + 1, line, report).await;
        }
        Ok(())
    }

    async fn replay_line(&self, key: &str, line_number: usize, line: &str, report: &mut ReplayReport) {
        let mut attempt: u64 = 1;
        loop {
            match self.deliver(line).await {
                Ok(outcome) => {
                    report.record(outcome);
                    return;
                }
                Err(e) => {
                    tracing::warn!(
                        key,
                        line = line_number,
                        attempt,
                        error = %e,
                        "failed to replay archived event, retrying"
                    );
                    report.retries += 1;
                    attempt += 1;
                    sleep(self.retry_delay).await;
                }
            }
        }
    }

    async fn deliver(&self, line: &str) -> Result<DispatchOutcome, DeliveryError> {
        let envelope = Envelope::from_archive_line(line)?;
        let outcome = self
            .dispatcher
            .process_event(&envelope.sequence_number, envelope.event)
            .await?;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerError;
    use crate::gate::ReplayPhase;
    use crate::registry::HandlerRegistry;
    use async_trait::async_trait;
    use eventline_types::{ListPage, ObjectSummary, SequenceNumber};
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// A store with one object per entry, one page, and optional failures.
    struct FixedStore {
        objects: Vec<(String, String)>,
        fail_fetch: bool,
    }

    #[async_trait]
    impl ArchiveStore for FixedStore {
        async fn list(&self, _token: Option<&str>) -> Result<ListPage, ArchiveError> {
            Ok(ListPage {
                items: self.objects.iter().map(|(k, _)| ObjectSummary::new(k)).collect(),
                is_truncated: false,
                next_token: None,
            })
        }

        async fn fetch(&self, key: &str) -> Result<Vec<u8>, ArchiveError> {
            if self.fail_fetch {
                return Err(ArchiveError::Fetch {
                    key: key.to_string(),
                    reason: "connection reset".to_string(),
                });
            }
            let map: HashMap<_, _> = self.objects.iter().cloned().collect();
            Ok(map.get(key).cloned().unwrap_or_default().into_bytes())
        }
    }

    fn line(sequence_number: u64, event: Value) -> String {
        json!({ "sequenceNumber": sequence_number.to_string(), "data": event.to_string() })
            .to_string()
    }

    #[tokio::test(start_paused = true)]
    async fn retries_failing_line_until_success() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = HandlerRegistry::new();
        registry
            .on("reg", {
                let calls = calls.clone();
                move |_| {
                    let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    async move {
                        if attempt < 3 {
                            Err(HandlerError::new(format!("attempt {attempt} rejected")))
                        } else {
                            Ok(())
                        }
                    }
                }
            })
            .unwrap();

        let gate = Arc::new(SequenceGate::new());
        let store = FixedStore {
            objects: vec![("a".into(), line(7, json!({ "type": "reg", "data": {} })))],
            fail_fetch: false,
        };
        let replayer = ArchiveReplayer::new(
            Arc::new(store),
            Dispatcher::new(Arc::new(registry), gate.clone()),
            Duration::from_millis(50),
        );

        let report = replayer.run().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(report.retries, 2);
        assert_eq!(report.handled, 1);
        assert_eq!(gate.high_water_mark(), Some(SequenceNumber::from(7)));
        assert!(!gate.is_replaying());
    }

    #[tokio::test(start_paused = true)]
    async fn gate_advances_only_after_success() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(SequenceGate::new());
        let mut registry = HandlerRegistry::new();
        registry
            .on("reg", {
                let calls = calls.clone();
                let seen = seen.clone();
                let gate = gate.clone();
                move |_| {
                    seen.lock().unwrap().push(gate.high_water_mark());
                    let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    async move {
                        if attempt == 1 {
                            Err(HandlerError::new("nope"))
                        } else {
                            Ok(())
                        }
                    }
                }
            })
            .unwrap();

        let store = FixedStore {
            objects: vec![("a".into(), line(1, json!({ "type": "reg" })))],
            fail_fetch: false,
        };
        ArchiveReplayer::new(
            Arc::new(store),
            Dispatcher::new(Arc::new(registry), gate.clone()),
            Duration::from_secs(1),
        )
        .run()
        .await
        .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![None, None]);
        assert_eq!(gate.high_water_mark(), Some(SequenceNumber::from(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_line_is_retried_not_skipped() {
        let gate = Arc::new(SequenceGate::new());
        let store = FixedStore {
            objects: vec![("a".into(), "not json".to_string())],
            fail_fetch: false,
        };
        let replayer = ArchiveReplayer::new(
            Arc::new(store),
            Dispatcher::new(Arc::new(HandlerRegistry::new()), gate.clone()),
            Duration::from_secs(1),
        );

        let walk = tokio::spawn(replayer.run());
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(!walk.is_finished());
        assert!(gate.is_replaying());
        walk.abort();
    }

    #[tokio::test]
    async fn transport_failure_stalls_the_gate() {
        let gate = Arc::new(SequenceGate::new());
        let store = FixedStore {
            objects: vec![("a".into(), line(1, json!({ "type": "reg" })))],
            fail_fetch: true,
        };
        let err = ArchiveReplayer::new(
            Arc::new(store),
            Dispatcher::new(Arc::new(HandlerRegistry::new()), gate.clone()),
            DEFAULT_RETRY_DELAY,
        )
        .run()
        .await
        .unwrap_err();

        assert!(matches!(err, ReplayError::Transport(ArchiveError::Fetch { .. })));
        assert!(gate.is_replaying());
        assert!(gate.phase().as_str() == "stalled");
    }

    #[tokio::test]
    async fn blank_lines_are_skipped() {
        let gate = Arc::new(SequenceGate::new());
        let content = format!(
            "\n{}\n\n{}\n",
            line(1, json!({ "type": "a" })),
            line(2, json!({ "type": "b" }))
        );
        let store = FixedStore {
            objects: vec![("a".into(), content)],
            fail_fetch: false,
        };
        let report = ArchiveReplayer::new(
            Arc::new(store),
            Dispatcher::new(Arc::new(HandlerRegistry::new()), gate),
            DEFAULT_RETRY_DELAY,
        )
        .run()
        .await
        .unwrap();
        assert_eq!(report.events, 2);
        assert_eq!(report.unsubscribed, 2);
        assert_eq!(report.retries, 0);
    }

    #[tokio::test]
    async fn invalid_utf8_object_stalls_the_gate() {
        let gate = Arc::new(SequenceGate::new());
        let mut content = line(1, json!({ "type": "reg" })).into_bytes();
        content.extend_from_slice(b"\n\xff\xfe\n");
        let store = eventline_archive::MemoryArchive::new().with_object("a", content);
        let err = ArchiveReplayer::new(
            Arc::new(store),
            Dispatcher::new(Arc::new(HandlerRegistry::new()), gate.clone()),
            DEFAULT_RETRY_DELAY,
        )
        .run()
        .await
        .unwrap_err();

        assert!(matches!(err, ReplayError::Transport(ArchiveError::Fetch { .. })));
        assert!(matches!(gate.phase(), ReplayPhase::Stalled { .. }));
        assert_eq!(gate.high_water_mark(), None);
    }
}
