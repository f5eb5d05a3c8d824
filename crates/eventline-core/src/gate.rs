//! The high-water mark and replay phase shared by both delivery paths.

use eventline_types::SequenceNumber;
use serde_json::{json, Value};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::watch;

/// Where the engine is in its catch-up lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayPhase {
    /// History is accounted for; live traffic is admitted.
    Live,
    /// The archive walk is in progress.
    Replaying,
    /// The archive walk failed fatally. Live traffic stays rejected.
    Stalled {
        /// Why the walk was abandoned.
        reason: String,
    },
}

impl ReplayPhase {
    /// Returns the canonical label for this phase.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Replaying => "replaying",
            Self::Stalled { .. } => "stalled",
        }
    }
}

impl fmt::Display for ReplayPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks how far history has been handled and whether replay is running.
///
/// The high-water mark only ever moves forward. `end_replay` is one-shot:
/// once the gate has gone live it never returns to replaying.
#[derive(Debug)]
pub struct SequenceGate {
    high_water_mark: Mutex<Option<SequenceNumber>>,
    phase: watch::Sender<ReplayPhase>,
    replay_ended: AtomicBool,
}

impl SequenceGate {
    /// Creates a gate with nothing handled, admitting live traffic.
    pub fn new() -> Self {
        let (phase, _) = watch::channel(ReplayPhase::Live);
        Self {
            high_water_mark: Mutex::new(None),
            phase,
            replay_ended: AtomicBool::new(false),
        }
    }

    fn lock_high_water_mark(&self) -> MutexGuard<'_, Option<SequenceNumber>> {
        match self.high_water_mark.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                // The guarded value is a plain Option; a panic elsewhere
                // cannot leave it half-written.
                tracing::error!("sequence gate lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// True while replaying or stalled.
    pub fn is_replaying(&self) -> bool {
        !matches!(*self.phase.borrow(), ReplayPhase::Live)
    }

    /// True iff `sequence_number` is at or below the high-water mark.
    pub fn has_been_handled(&self, sequence_number: &SequenceNumber) -> bool {
        matches!(&*self.lock_high_water_mark(), Some(mark) if sequence_number <= mark)
    }

    /// Raises the high-water mark to `sequence_number` if it is higher.
    pub fn advance(&self, sequence_number: &SequenceNumber) {
        let mut mark = self.lock_high_water_mark();
        if mark.as_ref().map_or(true, |current| sequence_number > current) {
            *mark = Some(sequence_number.clone());
        }
    }

    /// Snapshot of the high-water mark. `None` means nothing has been handled.
    pub fn high_water_mark(&self) -> Option<SequenceNumber> {
        self.lock_high_water_mark().clone()
    }

    /// Enters replay mode. Has no effect once replay has ended.
    pub fn begin_replay(&self) {
        if self.replay_ended.load(Ordering::SeqCst) {
            tracing::warn!("ignoring begin_replay after replay already ended");
            return;
        }
        self.phase.send_if_modified(|phase| {
            if *phase == ReplayPhase::Live {
                *phase = ReplayPhase::Replaying;
                true
            } else {
                false
            }
        });
    }

    /// Leaves replay mode for good.
    pub fn end_replay(&self) {
        self.replay_ended.store(true, Ordering::SeqCst);
        self.phase.send_replace(ReplayPhase::Live);
    }

    /// Records a fatal replay failure. The gate keeps rejecting live traffic.
    pub fn stall(&self, reason: impl Into<String>) {
        let reason = reason.into();
        self.phase.send_if_modified(|phase| {
            if *phase == ReplayPhase::Replaying {
                *phase = ReplayPhase::Stalled { reason };
                true
            } else {
                false
            }
        });
    }

    /// Snapshot of the current phase.
    pub fn phase(&self) -> ReplayPhase {
        self.phase.borrow().clone()
    }

    /// Subscribes to phase changes.
    pub fn subscribe(&self) -> watch::Receiver<ReplayPhase> {
        self.phase.subscribe()
    }

    /// Resolves once the gate is live. Never resolves if replay stalls.
    pub async fn wait_until_live(&self) {
        let mut rx = self.phase.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|phase| *phase == ReplayPhase::Live).await;
    }

    /// JSON snapshot used by the status endpoint.
    pub fn status_json(&self) -> Value {
        let phase = self.phase();
        let reason = match &phase {
            ReplayPhase::Stalled { reason } => Some(reason.clone()),
            _ => None,
        };
        json!({
            "phase": phase.as_str(),
            "reason": reason,
            "highWaterMark": self.high_water_mark().map(|n| n.to_string()),
        })
    }
}

impl Default for SequenceGate {
    fn default() -> Self {
        Self::new()
    }
}
