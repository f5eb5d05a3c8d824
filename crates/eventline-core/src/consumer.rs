//! Engine construction: settings validation, handler registration, and
//! startup of the replay task.

use eventline_types::ArchiveStore;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::auth::AuthToken;
use crate::error::{ConfigError, HandlerError, RegistryError, ReplayError};
use crate::gate::SequenceGate;
use crate::listener::LiveListener;
use crate::registry::{Dispatcher, HandlerRegistry};
use crate::replay::{ArchiveReplayer, ReplayReport, DEFAULT_RETRY_DELAY};

/// Location and credentials of the historical archive.
#[derive(Clone)]
pub struct ArchiveSettings {
    pub bucket: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Endpoint override for S3-compatible [`ArchiveStore`] implementations.
    /// Not used by the engine itself; stores built from these settings read it.
    pub endpoint: Option<String>,
    /// Pause between attempts at a failing archive line.
    pub retry_delay: Duration,
}

impl ArchiveSettings {
    pub fn new(
        bucket: impl Into<String>,
        region: impl Into<String>,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            region: region.into(),
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            endpoint: None,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// Checks that every required field is present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingArchiveField` naming the first empty field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("bucket", &self.bucket),
            ("region", &self.region),
            ("accessKeyId", &self.access_key_id),
            ("secretAccessKey", &self.secret_access_key),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingArchiveField { field });
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ArchiveSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveSettings")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .field("endpoint", &self.endpoint)
            .field("retry_delay", &self.retry_delay)
            .finish()
    }
}

/// Everything needed to construct a [`Consumer`].
#[derive(Clone, Default)]
pub struct ConsumerSettings {
    /// Shared secret live requests must present.
    pub auth_token: Option<String>,
    /// Historical archive to replay before accepting live traffic.
    pub archive: Option<ArchiveSettings>,
}

impl fmt::Debug for ConsumerSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsumerSettings")
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field("archive", &self.archive)
            .finish()
    }
}

/// A running engine: the live entry point plus the replay task, if any.
pub struct Listening {
    pub listener: LiveListener,
    pub replay: Option<JoinHandle<Result<ReplayReport, ReplayError>>>,
}

/// Engine under construction. Register handlers with [`Consumer::on`], then
/// start it with [`Consumer::listen`].
#[derive(Debug)]
pub struct Consumer {
    auth: AuthToken,
    archive: Option<ArchiveSettings>,
    registry: HandlerRegistry,
}

impl Consumer {
    /// Validates `settings` and creates an engine with no handlers.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingAuthToken` without a non-empty token, or
    /// `ConfigError::MissingArchiveField` if archive settings are incomplete.
    pub fn new(settings: ConsumerSettings) -> Result<Self, ConfigError> {
        let auth = match settings.auth_token.as_deref() {
            Some(token) if !token.is_empty() => AuthToken::new(token),
            _ => return Err(ConfigError::MissingAuthToken),
        };
        if let Some(archive) = &settings.archive {
            archive.validate()?;
        }
        Ok(Self {
            auth,
            archive: settings.archive,
            registry: HandlerRegistry::new(),
        })
    }

    /// Registers `handler` for `event_type`. See [`HandlerRegistry::on`].
    pub fn on<F, Fut>(&mut self, event_type: impl Into<String>, handler: F) -> Result<(), RegistryError>
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        self.registry.on(event_type, handler)
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Freezes the registry and starts accepting requests.
    ///
    /// With an archive, the gate enters replay mode before this returns and
    /// the walk runs on its own task. If that task panics, the gate is
    /// stalled. Without an archive, the gate is live at once.
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingArchiveStore` or
    /// `ConfigError::UnexpectedArchiveStore` if `store` does not match the
    /// archive settings.
    pub fn listen(self, store: Option<Arc<dyn ArchiveStore>>) -> Result<Listening, ConfigError> {
        let gate = Arc::new(SequenceGate::new());
        let dispatcher = Dispatcher::new(Arc::new(self.registry), gate.clone());
        let listener = LiveListener::new(self.auth, dispatcher.clone());

        let replay = match (self.archive, store) {
            (Some(settings), Some(store)) => {
                gate.begin_replay();
                tracing::info!(bucket = %settings.bucket, "replaying archive before accepting live events");
                let replayer = ArchiveReplayer::new(store, dispatcher, settings.retry_delay);
                let replay_gate = gate.clone();
                Some(tokio::spawn(async move {
                    match tokio::spawn(replayer.run()).await {
                        Ok(result) => result,
                        Err(e) => {
                            tracing::error!(error = %e, "archive replay task aborted");
                            replay_gate.stall(format!("replay task aborted: {e}"));
                            Err(ReplayError::Aborted(e.to_string()))
                        }
                    }
                }))
            }
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::MissingArchiveStore),
            (None, Some(_)) => return Err(ConfigError::UnexpectedArchiveStore),
        };

        Ok(Listening { listener, replay })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn archive() -> ArchiveSettings {
        ArchiveSettings::new("archive-bucket", "ap-southeast-2", "ABC123", "ABC123")
    }

    fn settings(archive: Option<ArchiveSettings>) -> ConsumerSettings {
        ConsumerSettings {
            auth_token: Some("secret".to_string()),
            archive,
        }
    }

    #[test]
    fn requires_an_auth_token() {
        let err = Consumer::new(ConsumerSettings::default()).unwrap_err();
        assert_eq!(err, ConfigError::MissingAuthToken);

        let err = Consumer::new(ConsumerSettings {
            auth_token: Some(String::new()),
            archive: None,
        })
        .unwrap_err();
        assert_eq!(err, ConfigError::MissingAuthToken);
    }

    #[test]
    fn archive_requires_every_field() {
        let mut a = archive();
        a.bucket.clear();
        let err = Consumer::new(settings(Some(a))).unwrap_err();
        assert_eq!(err, ConfigError::MissingArchiveField { field: "bucket" });
        assert!(err.to_string().contains("no bucket"));

        let mut a = archive();
        a.region.clear();
        let err = Consumer::new(settings(Some(a))).unwrap_err();
        assert!(err.to_string().contains("no region"));

        let mut a = archive();
        a.access_key_id.clear();
        let err = Consumer::new(settings(Some(a))).unwrap_err();
        assert!(err.to_string().contains("no accessKeyId"));

        let mut a = archive();
        a.secret_access_key.clear();
        let err = Consumer::new(settings(Some(a))).unwrap_err();
        assert!(err.to_string().contains("no secretAccessKey"));

        assert!(Consumer::new(settings(Some(archive()))).is_ok());
    }

    #[test]
    fn debug_redacts_secrets() {
        let rendered = format!("{:?}", settings(Some(archive())));
        assert!(!rendered.contains("secret\""));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[tokio::test]
    async fn without_archive_the_gate_is_live_immediately() {
        let consumer = Consumer::new(settings(None)).unwrap();
        let listening = consumer.listen(None).unwrap();
        assert!(listening.replay.is_none());
        assert!(!listening.listener.gate().is_replaying());
    }

    #[tokio::test]
    async fn store_must_match_archive_settings() {
        let consumer = Consumer::new(settings(Some(archive()))).unwrap();
        assert_eq!(
            consumer.listen(None).err(),
            Some(ConfigError::MissingArchiveStore)
        );
    }

    #[tokio::test]
    async fn panicking_replay_stalls_the_gate() {
        let mut consumer = Consumer::new(settings(Some(archive()))).unwrap();
        consumer
            .on("reg", |data| async move {
                if data.is_null() {
                    panic!("handler blew up");
                }
                Ok::<_, HandlerError>(())
            })
            .unwrap();
        let line = serde_json::json!({
            "sequenceNumber": "1",
            "data": serde_json::json!({ "type": "reg" }).to_string(),
        })
        .to_string();
        let store = eventline_archive::MemoryArchive::new().with_object("a", line);

        let listening = consumer.listen(Some(Arc::new(store))).unwrap();
        let err = listening.replay.unwrap().await.unwrap().unwrap_err();

        assert!(matches!(err, ReplayError::Aborted(_)));
        let gate = listening.listener.gate();
        assert!(gate.is_replaying());
        assert_eq!(gate.phase().as_str(), "stalled");
    }
}
