//! HTTP front end for the Eventline reconciliation engine.
//!
//! Exposes the live push channel as `POST /events` and reports replay
//! progress on `GET /status`.

pub mod api;
pub mod config;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Extension, Router,
};
use chrono::{DateTime, Utc};
use eventline_archive::DirectoryArchive;
use eventline_core::{ConfigError, Consumer, HandlerError, Listening, LiveListener, RegistryError};
use eventline_types::ArchiveStore;
use std::sync::Arc;
use thiserror::Error;
use tower_http::trace::TraceLayer;

/// Largest accepted live request body.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Shared state for request handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub listener: LiveListener,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(listener: LiveListener) -> Self {
        Self {
            listener,
            started_at: Utc::now(),
        }
    }
}

/// Errors raised while assembling the consumer from configuration.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Builds the consumer described by `config` and starts listening.
///
/// Every type in `listener.log_event_types` gets a handler that logs the
/// event payload. When an archive is configured, replay starts on a
/// background task reading `<root>/<bucket>`.
///
/// # Errors
///
/// Returns `StartupError` if the settings are incomplete or a subscribed
/// event type is empty.
pub fn start(config: &config::Config) -> Result<Listening, StartupError> {
    let mut consumer = Consumer::new(config.consumer_settings())?;
    for event_type in &config.listener.log_event_types {
        let logged_type = event_type.clone();
        consumer.on(event_type.as_str(), move |data| {
            let event_type = logged_type.clone();
            async move {
                tracing::info!(%event_type, %data, "event received");
                Ok::<_, HandlerError>(())
            }
        })?;
    }

    let store = config.archive.as_ref().map(|archive| {
        let store = DirectoryArchive::new(archive.bucket_dir()).with_page_size(archive.page_size);
        Arc::new(store) as Arc<dyn ArchiveStore>
    });

    Ok(consumer.listen(store)?)
}

/// Builds the application router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route("/status", get(api::status))
        .route("/events", post(api::receive_event))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(Arc::new(state)))
}
