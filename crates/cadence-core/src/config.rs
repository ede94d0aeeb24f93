use figment::{
    providers::{Env, Format, Serialized, Toml},
    value::{Uncased, UncasedStr},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 3011;
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_INSTANCE_NAME: &str = "scheduler-dataservice";
pub const DEFAULT_COLLECTION: &str = "schedules";
pub const DEFAULT_QUEUE: &str = "cta.sch.schedules";
pub const DEFAULT_SYNC_TOPIC: &str = "schedule.synchronize";
pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_REDELIVERY_MS: u64 = 60_000;

/// Top-level config (cadence.toml + CADENCE_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CadenceConfig {
    #[serde(default)]
    pub instance: InstanceConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub messaging: MessagingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceConfig {
    /// Responder name reported in every outcome this instance produces.
    #[serde(default = "default_instance_name")]
    pub name: String,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            name: default_instance_name(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: default_bind(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
    /// Collection holding one document per schedule.
    #[serde(default = "default_collection")]
    pub collection: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            collection: default_collection(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagingConfig {
    /// Work queue carrying message-originated schedule commands.
    #[serde(default = "default_queue")]
    pub queue: String,
    /// Fan-out topic shared by every peer instance.
    #[serde(default = "default_sync_topic")]
    pub sync_topic: String,
    /// Upper bound on how long a dispatched command may stay unresolved.
    /// `0` waits forever.
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,
    /// Unacknowledged queue messages older than this are delivered again.
    #[serde(default = "default_redelivery_ms")]
    pub redelivery_ms: u64,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            queue: default_queue(),
            sync_topic: default_sync_topic(),
            command_timeout_ms: DEFAULT_COMMAND_TIMEOUT_MS,
            redelivery_ms: DEFAULT_REDELIVERY_MS,
        }
    }
}

impl MessagingConfig {
    pub fn command_timeout(&self) -> Option<std::time::Duration> {
        match self.command_timeout_ms {
            0 => None,
            ms => Some(std::time::Duration::from_millis(ms)),
        }
    }
}

fn default_instance_name() -> String {
    DEFAULT_INSTANCE_NAME.to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}
fn default_queue() -> String {
    DEFAULT_QUEUE.to_string()
}
fn default_sync_topic() -> String {
    DEFAULT_SYNC_TOPIC.to_string()
}
fn default_command_timeout_ms() -> u64 {
    DEFAULT_COMMAND_TIMEOUT_MS
}
fn default_redelivery_ms() -> u64 {
    DEFAULT_REDELIVERY_MS
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.cadence/cadence.db", home)
}

impl CadenceConfig {
    /// Load config from a TOML file with CADENCE_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. ~/.cadence/cadence.toml
    ///
    /// The first `_` after a section name nests, so `CADENCE_HTTP_PORT=8080`
    /// sets `http.port` and `CADENCE_MESSAGING_COMMAND_TIMEOUT_MS=0` sets
    /// `messaging.command_timeout_ms`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: CadenceConfig = Figment::from(Serialized::defaults(CadenceConfig::default()))
            .merge(Toml::file(&path))
            .merge(Env::prefixed("CADENCE_").map(env_key))
            .extract()
            .map_err(|e| crate::error::CadenceError::Config(e.to_string()))?;

        Ok(config)
    }
}

const SECTIONS: [&str; 4] = ["instance", "http", "database", "messaging"];

fn env_key(key: &UncasedStr) -> Uncased<'_> {
    let key = key.as_str().to_ascii_lowercase();
    for section in SECTIONS {
        if let Some(leaf) = key.strip_prefix(section).and_then(|rest| rest.strip_prefix('_')) {
            return format!("{section}.{leaf}").into();
        }
    }
    key.into()
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.cadence/cadence.toml", home)
}
