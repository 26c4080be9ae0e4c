//! Router configuration.
//!
//! [`RouterConfig`] is loaded from an optional TOML file, then patched from
//! `SPACER_*` environment variables, then validated. Every field has a
//! default, so an empty file (or no file at all) yields a runnable router
//! for the `PoESocial` application against a local broker.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RouterError, RouterResult};
use crate::route::{RouteSpec, RouteTable};

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "SPACER_CONFIG";

/// What the consumer does with a message no route matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnroutedPolicy {
    /// Leave the offset uncommitted. A later commit on the same partition
    /// moves past it.
    #[default]
    Skip,
    /// Commit the offset explicitly without invoking anything.
    Commit,
}

impl FromStr for UnroutedPolicy {
    type Err = RouterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "commit" => Ok(Self::Commit),
            other => Err(RouterError::Config(format!(
                "invalid unrouted policy '{other}' (expected 'skip' or 'commit')"
            ))),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Single-line human readable output.
    #[default]
    Compact,
    /// JSON lines.
    Json,
}

impl FromStr for LogFormat {
    type Err = RouterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "json" | "jsonl" => Ok(Self::Json),
            other => Err(RouterError::Config(format!(
                "invalid log format '{other}' (expected 'compact' or 'json')"
            ))),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compact => write!(f, "compact"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Broker connection and consumer settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KafkaConfig {
    /// Comma-separated bootstrap servers.
    pub brokers: String,
    /// Consumer group; `spacer-router-<app_name>` when unset.
    pub group_id: Option<String>,
    /// Consumer session timeout.
    pub session_timeout_ms: u64,
    /// How long one poll waits before reporting idle.
    pub poll_timeout_ms: u64,
    /// Metadata refresh age inside the client, so new topics matching the
    /// subscription pattern are picked up quickly.
    pub metadata_max_age_ms: u64,
    /// Where a new group starts reading.
    pub auto_offset_reset: String,
    /// Report end-of-partition events.
    pub enable_partition_eof: bool,
    /// Handling of messages without a route.
    pub unrouted: UnroutedPolicy,
    /// Timeout for rewinding a partition after a failed invocation.
    pub seek_timeout_ms: u64,
    /// Pause before retrying a send the producer rejected as queue-full.
    pub producer_retry_backoff_ms: u64,
    /// Extra client properties passed through verbatim.
    pub properties: BTreeMap<String, String>,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: "localhost:9092".to_string(),
            group_id: None,
            session_timeout_ms: 6000,
            poll_timeout_ms: 100,
            metadata_max_age_ms: 1000,
            auto_offset_reset: "earliest".to_string(),
            enable_partition_eof: false,
            unrouted: UnroutedPolicy::Skip,
            seek_timeout_ms: 1000,
            producer_retry_backoff_ms: 50,
            properties: BTreeMap::new(),
        }
    }
}

impl KafkaConfig {
    /// Poll timeout as a [`Duration`].
    #[must_use]
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    /// Seek timeout as a [`Duration`].
    #[must_use]
    pub fn seek_timeout(&self) -> Duration {
        Duration::from_millis(self.seek_timeout_ms)
    }

    /// Producer queue-full backoff as a [`Duration`].
    #[must_use]
    pub fn producer_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.producer_retry_backoff_ms)
    }
}

/// Write proxy HTTP settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteProxyConfig {
    /// Listen address.
    pub listen: String,
    /// Capacity of the bounded channel in front of the producer.
    pub channel_capacity: usize,
    /// Largest accepted request body.
    pub max_body_bytes: usize,
}

impl Default for WriteProxyConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:9064".to_string(),
            channel_capacity: 1024,
            max_body_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Metadata refresher settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    /// Time between refreshes.
    pub refresh_interval_ms: u64,
    /// Timeout for one metadata request.
    pub timeout_ms: u64,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: 5000,
            timeout_ms: 100,
        }
    }
}

impl MetadataConfig {
    /// Refresh interval as a [`Duration`].
    #[must_use]
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    /// Request timeout as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Handler invocation settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvokerConfig {
    /// Per-request timeout; `0` means none.
    pub request_timeout_ms: u64,
}

impl InvokerConfig {
    /// Request timeout, `None` when unbounded.
    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Base level (`RUST_LOG` takes precedence).
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

/// Routes of one application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Routes, topics relative to the application.
    pub routes: Vec<RouteSpec>,
}

/// Top-level router configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Application owning the write proxy's output topics.
    pub app_name: String,
    /// Base URL relative handlers are resolved against.
    pub delegator_url: String,
    /// Broker settings.
    pub kafka: KafkaConfig,
    /// Write proxy settings.
    pub write_proxy: WriteProxyConfig,
    /// Metadata refresher settings.
    pub metadata: MetadataConfig,
    /// Invoker settings.
    pub invoker: InvokerConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Routes per application.
    pub apps: BTreeMap<String, AppConfig>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        let mut apps = BTreeMap::new();
        apps.insert(
            "PoESocial".to_string(),
            AppConfig {
                routes: vec![RouteSpec::update("stat", "get_stashes")],
            },
        );
        Self {
            app_name: "PoESocial".to_string(),
            delegator_url: "http://localhost:8080".to_string(),
            kafka: KafkaConfig::default(),
            write_proxy: WriteProxyConfig::default(),
            metadata: MetadataConfig::default(),
            invoker: InvokerConfig::default(),
            logging: LoggingConfig::default(),
            apps,
        }
    }
}

impl RouterConfig {
    /// Loads configuration the way the server does: file named by
    /// `SPACER_CONFIG` (if set), then environment overrides, then validation.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::Config`] on unreadable files, parse errors,
    /// bad override values or failed validation.
    pub fn load() -> RouterResult<Self> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a TOML file. Does not apply overrides or validate.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::Config`] if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> RouterResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            RouterError::Config(format!("failed to read config file {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses TOML text. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::Config`] on malformed TOML.
    pub fn from_toml_str(content: &str) -> RouterResult<Self> {
        toml::from_str(content)
            .map_err(|e| RouterError::Config(format!("failed to parse config: {e}")))
    }

    /// Applies `SPACER_*` overrides using `lookup` to read variables.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::Config`] when an override cannot be parsed.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> RouterResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("SPACER_APP_NAME") {
            self.app_name = v;
        }
        if let Some(v) = lookup("SPACER_BROKERS") {
            self.kafka.brokers = v;
        }
        if let Some(v) = lookup("SPACER_GROUP_ID") {
            self.kafka.group_id = Some(v);
        }
        if let Some(v) = lookup("SPACER_DELEGATOR_URL") {
            self.delegator_url = v;
        }
        if let Some(v) = lookup("SPACER_LISTEN") {
            self.write_proxy.listen = v;
        }
        if let Some(v) = lookup("SPACER_UNROUTED") {
            self.kafka.unrouted = v.parse()?;
        }
        if let Some(v) = lookup("SPACER_LOG_FORMAT") {
            self.logging.format = v.parse()?;
        }
        if let Some(v) = lookup("SPACER_CHANNEL_CAPACITY") {
            self.write_proxy.channel_capacity = v.parse().map_err(|_| {
                RouterError::Config(format!("invalid SPACER_CHANNEL_CAPACITY: '{v}'"))
            })?;
        }
        Ok(())
    }

    /// Checks invariants the rest of the router relies on.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::Config`] describing the first violation.
    pub fn validate(&self) -> RouterResult<()> {
        if self.app_name.is_empty() {
            return Err(RouterError::Config("app_name is empty".into()));
        }
        if let Some(bad) = self
            .apps
            .keys()
            .chain(std::iter::once(&self.app_name))
            .find(|name| !is_valid_app_name(name))
        {
            return Err(RouterError::Config(format!(
                "invalid application name '{bad}' (allowed: letters, digits, '-', '.')"
            )));
        }
        if self.kafka.brokers.trim().is_empty() {
            return Err(RouterError::Config("kafka.brokers is empty".into()));
        }
        if self.kafka.poll_timeout_ms == 0 {
            return Err(RouterError::Config("kafka.poll_timeout_ms must be > 0".into()));
        }
        if self.write_proxy.channel_capacity == 0 {
            return Err(RouterError::Config(
                "write_proxy.channel_capacity must be > 0".into(),
            ));
        }
        if self.metadata.refresh_interval_ms == 0 {
            return Err(RouterError::Config(
                "metadata.refresh_interval_ms must be > 0".into(),
            ));
        }
        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(RouterError::Config(format!(
                "invalid log level '{}' (expected one of: {})",
                self.logging.level,
                valid_levels.join(", ")
            )));
        }
        Ok(())
    }

    /// Consumer group id, defaulting to `spacer-router-<app_name>`.
    #[must_use]
    pub fn group_id(&self) -> String {
        self.kafka
            .group_id
            .clone()
            .unwrap_or_else(|| format!("spacer-router-{}", self.app_name))
    }

    /// Builds the route table. The write proxy's own application is always
    /// subscribed, even without routes.
    ///
    /// # Errors
    ///
    /// Propagates [`RouterError::Route`] from [`RouteTable::build`].
    pub fn route_table(&self) -> RouterResult<RouteTable> {
        let mut apps: BTreeMap<String, Vec<RouteSpec>> = self
            .apps
            .iter()
            .map(|(name, app)| (name.clone(), app.routes.clone()))
            .collect();
        apps.entry(self.app_name.clone()).or_default();
        RouteTable::build(&apps, &self.delegator_url)
    }
}

/// Application names end up inside a subscription regex and topic names.
fn is_valid_app_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
}
