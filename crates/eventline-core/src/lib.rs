//! Reconciliation engine for Eventline.
//!
//! Merges two deliveries of one ordered event log into a single in-order,
//! duplicate-free stream of handler calls:
//!
//! - the **archive**, walked once at startup by [`ArchiveReplayer`], strictly
//!   in order and retrying each failed event until it succeeds;
//! - the **live** push channel, one event per request through
//!   [`LiveListener`], rejected while the archive replays and deduplicated
//!   against the [`SequenceGate`] high-water mark afterwards.
//!
//! # Usage
//!
//! ```rust,ignore
//! let mut consumer = Consumer::new(ConsumerSettings {
//!     auth_token: Some("secret".into()),
//!     archive: None,
//! })?;
//! consumer.on("member-registered", |data| async move {
//!     tracing::info!(%data, "new member");
//!     Ok(())
//! })?;
//! let Listening { listener, .. } = consumer.listen(None)?;
//! let status = listener.handle(Some("secret"), &body).await;
//! ```

mod auth;
mod consumer;
mod error;
mod gate;
mod listener;
mod registry;
mod replay;

pub use auth::AuthToken;
pub use consumer::{ArchiveSettings, Consumer, ConsumerSettings, Listening};
pub use error::{ConfigError, DeliveryError, HandlerError, RegistryError, ReplayError};
pub use gate::{ReplayPhase, SequenceGate};
pub use listener::{ListenerStatus, LiveListener};
pub use registry::{DispatchOutcome, Dispatcher, EventHandler, HandlerFuture, HandlerRegistry};
pub use replay::{ArchiveReplayer, ReplayReport, DEFAULT_RETRY_DELAY};
