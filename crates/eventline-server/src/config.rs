//! Server configuration loading from file and environment variables.

use eventline_core::{ArchiveSettings, ConsumerSettings, DEFAULT_RETRY_DELAY};
use serde::Deserialize;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Live listener settings.
    #[serde(default)]
    pub listener: ListenerConfig,

    /// Historical archive to replay on startup. Absent means no replay.
    #[serde(default)]
    pub archive: Option<ArchiveConfig>,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Live push channel configuration.
#[derive(Clone, Default, Deserialize)]
pub struct ListenerConfig {
    /// Value the `Authorization` header must carry.
    #[serde(default)]
    pub auth_token: Option<String>,

    /// Event types to subscribe to with the built-in logging handler.
    #[serde(default)]
    pub log_event_types: Vec<String>,
}

impl fmt::Debug for ListenerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerConfig")
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field("log_event_types", &self.log_event_types)
            .finish()
    }
}

/// Archive bucket configuration.
#[derive(Clone, Default, Deserialize)]
pub struct ArchiveConfig {
    /// Bucket name.
    #[serde(default)]
    pub bucket: String,

    /// Bucket region.
    #[serde(default)]
    pub region: String,

    /// Access key for the bucket.
    #[serde(default)]
    pub access_key_id: String,

    /// Secret key for the bucket.
    #[serde(default)]
    pub secret_access_key: String,

    /// Endpoint override for S3-compatible stores. Passed through to
    /// `ArchiveSettings`; the directory-backed store does not read it.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Local directory the bucket is mirrored under; objects are read from
    /// `<root>/<bucket>`.
    #[serde(default = "default_archive_root")]
    pub root: PathBuf,

    /// Objects per listing page.
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Pause between attempts at a failing archived event, in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl fmt::Debug for ArchiveConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveConfig")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .field("endpoint", &self.endpoint)
            .field("root", &self.root)
            .field("page_size", &self.page_size)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .finish()
    }
}

impl ArchiveConfig {
    /// Directory holding this bucket's objects.
    pub fn bucket_dir(&self) -> PathBuf {
        self.root.join(&self.bucket)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "eventline_core=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    3030
}

fn default_archive_root() -> PathBuf {
    PathBuf::from("archive")
}

fn default_page_size() -> usize {
    eventline_archive::DEFAULT_PAGE_SIZE
}

fn default_retry_delay_ms() -> u64 {
    DEFAULT_RETRY_DELAY.as_millis() as u64
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Config {
    /// Engine settings derived from this configuration.
    pub fn consumer_settings(&self) -> ConsumerSettings {
        ConsumerSettings {
            auth_token: self.listener.auth_token.clone(),
            archive: self.archive.as_ref().map(|a| ArchiveSettings {
                bucket: a.bucket.clone(),
                region: a.region.clone(),
                access_key_id: a.access_key_id.clone(),
                secret_access_key: a.secret_access_key.clone(),
                endpoint: a.endpoint.clone(),
                retry_delay: Duration::from_millis(a.retry_delay_ms),
            }),
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `EVENTLINE_HOST` overrides `server.host`
/// - `EVENTLINE_PORT` overrides `server.port`
/// - `EVENTLINE_AUTH_TOKEN` overrides `listener.auth_token`
/// - `EVENTLINE_ARCHIVE_BUCKET` overrides `archive.bucket` (creating the section)
/// - `EVENTLINE_ARCHIVE_REGION` overrides `archive.region`
/// - `EVENTLINE_ARCHIVE_ACCESS_KEY_ID` overrides `archive.access_key_id`
/// - `EVENTLINE_ARCHIVE_SECRET_ACCESS_KEY` overrides `archive.secret_access_key`
/// - `EVENTLINE_LOG_LEVEL` overrides `logging.level`
/// - `EVENTLINE_LOG_JSON` overrides `logging.json` (set to "true" to enable)
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(host) = var("EVENTLINE_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Some(port) = var("EVENTLINE_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Some(token) = var("EVENTLINE_AUTH_TOKEN") {
        config.listener.auth_token = Some(token);
    }
    if let Some(bucket) = var("EVENTLINE_ARCHIVE_BUCKET") {
        config.archive.get_or_insert_with(default_archive).bucket = bucket;
    }
    if let Some(archive) = config.archive.as_mut() {
        if let Some(region) = var("EVENTLINE_ARCHIVE_REGION") {
            archive.region = region;
        }
        if let Some(key) = var("EVENTLINE_ARCHIVE_ACCESS_KEY_ID") {
            archive.access_key_id = key;
        }
        if let Some(secret) = var("EVENTLINE_ARCHIVE_SECRET_ACCESS_KEY") {
            archive.secret_access_key = secret;
        }
    }
    if let Some(level) = var("EVENTLINE_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = var("EVENTLINE_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
}

fn default_archive() -> ArchiveConfig {
    ArchiveConfig {
        root: default_archive_root(),
        page_size: default_page_size(),
        retry_delay_ms: default_retry_delay_ms(),
        ..ArchiveConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_have_no_archive() {
        let config = Config::default();
        assert!(config.archive.is_none());
        assert_eq!(config.server.port, 3030);
        assert_eq!(config.logging.level, "info");
        assert!(config.consumer_settings().archive.is_none());
    }

    #[test]
    fn parses_full_file() {
        let config: Config = toml::from_str(
            r#"
            [server]
            port = 4000

            [listener]
            auth_token = "secret"
            log_event_types = ["member-registered"]

            [archive]
            bucket = "archive-bucket"
            region = "ap-southeast-2"
            access_key_id = "ABC123"
            secret_access_key = "XYZ789"
            retry_delay_ms = 250
            endpoint = "https://objects.example.net"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 4000);
        assert_eq!(config.listener.log_event_types, vec!["member-registered"]);
        let archive = config.archive.as_ref().unwrap();
        assert_eq!(archive.page_size, eventline_archive::DEFAULT_PAGE_SIZE);
        assert_eq!(archive.bucket_dir(), PathBuf::from("archive/archive-bucket"));

        let settings = config.consumer_settings();
        assert_eq!(settings.auth_token.as_deref(), Some("secret"));
        let archive = settings.archive.unwrap();
        assert_eq!(archive.retry_delay, Duration::from_millis(250));
        assert_eq!(archive.endpoint.as_deref(), Some("https://objects.example.net"));
        assert!(archive.validate().is_ok());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = load_config(Some("/definitely/not/here.toml")).unwrap();
        assert_eq!(config.server.port, 3030);
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = [
            ("EVENTLINE_PORT", "8080"),
            ("EVENTLINE_AUTH_TOKEN", "from-env"),
            ("EVENTLINE_ARCHIVE_BUCKET", "bucket"),
            ("EVENTLINE_ARCHIVE_REGION", "eu-west-1"),
            ("EVENTLINE_LOG_JSON", "1"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        apply_env_overrides(&mut config, |key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.listener.auth_token.as_deref(), Some("from-env"));
        let archive = config.archive.as_ref().unwrap();
        assert_eq!(archive.bucket, "bucket");
        assert_eq!(archive.region, "eu-west-1");
        assert_eq!(archive.retry_delay_ms, 1000);
        assert!(config.logging.json);
    }

    #[test]
    fn debug_redacts_secrets() {
        let config: Config = toml::from_str(
            r#"
            [listener]
            auth_token = "hunter2"

            [archive]
            bucket = "b"
            secret_access_key = "topsecret"
            "#,
        )
        .unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("topsecret"));
    }
}
