//! Remote list-backed queue sink
//!
//! Each record is reshaped into a JSON document and appended with `RPUSH`
//! to a list key. The production store is a pooled redis client; anything
//! implementing [`ListStore`] can stand in for it.

use crate::core::error::{HookError, Result};
use crate::core::log_level::LogLevel;
use crate::core::log_record::LogRecord;
use crate::core::settings::Settings;
use crate::core::sink::Sink;
use chrono::SecondsFormat;
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;

pub const HOOK_TYPE: &str = "redis";

/// Settings every redis hook must provide
pub const REQUIRED_SETTINGS: &[&str] = &["host", "port", "db", "key"];

pub const DEFAULT_POOL_SIZE: u32 = 3;

/// Idle pooled connections are closed after this long
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(180);

/// Upper bound for obtaining a connection, including the initial ping
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Document layout pushed to the list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageShape {
    /// `{message, level, time, ...fields}`
    #[default]
    Plain,
    /// Logstash event format v0
    LogstashV0,
    /// Logstash event format v1
    LogstashV1,
}

impl MessageShape {
    /// `logstashv0` and `logstashv1` select the logstash layouts, any other
    /// value the plain one.
    pub fn from_setting(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "logstashv0" => MessageShape::LogstashV0,
            "logstashv1" => MessageShape::LogstashV1,
            _ => MessageShape::Plain,
        }
    }
}

impl fmt::Display for MessageShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageShape::Plain => write!(f, "json"),
            MessageShape::LogstashV0 => write!(f, "logstashv0"),
            MessageShape::LogstashV1 => write!(f, "logstashv1"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisHookConfig {
    pub host: String,
    pub port: u16,
    pub db: i64,
    pub key: String,
    pub password: Option<String>,
    pub pool_size: u32,
    pub app: String,
    pub hostname: String,
    pub message_shape: MessageShape,
}

impl RedisHookConfig {
    /// # Errors
    ///
    /// `MissingSetting` unless `host`, `port`, `db` and `key` are all set,
    /// `Config` when `port`, `db` or `poolsize` is not an integer.
    pub fn from_settings(settings: &Settings<'_>) -> Result<Self> {
        settings.require(REQUIRED_SETTINGS)?;

        let port = settings
            .parse_int::<u16>("port")?
            .ok_or_else(|| HookError::missing_setting(HOOK_TYPE, "port"))?;
        let db = settings
            .parse_int::<i64>("db")?
            .ok_or_else(|| HookError::missing_setting(HOOK_TYPE, "db"))?;
        let pool_size = settings
            .parse_int::<u32>("poolsize")?
            .unwrap_or(DEFAULT_POOL_SIZE);
        if pool_size == 0 {
            return Err(HookError::config(settings.hook(), "poolsize must be greater than 0"));
        }

        Ok(Self {
            host: settings.required("host")?.to_string(),
            port,
            db,
            key: settings.required("key")?.to_string(),
            password: settings.get("password").map(str::to_string),
            pool_size,
            app: settings.get("app").unwrap_or_default().to_string(),
            hostname: settings.get("hostname").unwrap_or_default().to_string(),
            message_shape: settings
                .get("logformat")
                .map(MessageShape::from_setting)
                .unwrap_or_default(),
        })
    }

    /// Build the document for `record` in the configured shape
    pub fn message(&self, record: &LogRecord) -> Value {
        match self.message_shape {
            MessageShape::Plain => create_message(record),
            MessageShape::LogstashV0 => create_v0_message(record, &self.app, &self.hostname),
            MessageShape::LogstashV1 => create_v1_message(record, &self.app, &self.hostname),
        }
    }
}

/// RFC 3339 in UTC with nanosecond precision and trailing zeros trimmed
/// from the fraction (`10:30:45.12Z`, `10:30:45Z`)
fn utc_timestamp(record: &LogRecord) -> Value {
    let full = record.timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true);
    let trimmed = match full.strip_suffix('Z').and_then(|s| s.split_once('.')) {
        Some((seconds, fraction)) => {
            let fraction = fraction.trim_end_matches('0');
            if fraction.is_empty() {
                format!("{}Z", seconds)
            } else {
                format!("{}.{}Z", seconds, fraction)
            }
        }
        None => full,
    };
    Value::String(trimmed)
}

fn field_map(record: &LogRecord) -> Map<String, Value> {
    record
        .fields
        .iter()
        .map(|(k, v)| (k.clone(), v.to_json_value()))
        .collect()
}

pub fn create_message(record: &LogRecord) -> Value {
    let mut m = Map::new();
    m.insert("message".into(), Value::String(record.message.clone()));
    m.insert("level".into(), Value::String(record.level.name().into()));
    m.insert("time".into(), utc_timestamp(record));
    m.extend(field_map(record));
    Value::Object(m)
}

pub fn create_v0_message(record: &LogRecord, app: &str, hostname: &str) -> Value {
    let mut fields = Map::new();
    fields.insert("level".into(), Value::String(record.level.name().into()));
    fields.insert("application".into(), Value::String(app.into()));
    fields.extend(field_map(record));

    let mut m = Map::new();
    m.insert("@timestamp".into(), utc_timestamp(record));
    m.insert("@source_host".into(), Value::String(hostname.into()));
    m.insert("@message".into(), Value::String(record.message.clone()));
    m.insert("@fields".into(), Value::Object(fields));
    Value::Object(m)
}

pub fn create_v1_message(record: &LogRecord, app: &str, hostname: &str) -> Value {
    let mut m = Map::new();
    m.insert("@timestamp".into(), utc_timestamp(record));
    m.insert("host".into(), Value::String(hostname.into()));
    m.insert("message".into(), Value::String(record.message.clone()));
    m.insert("level".into(), Value::String(record.level.name().into()));
    m.insert("application".into(), Value::String(app.into()));
    m.extend(field_map(record));
    Value::Object(m)
}

/// Append-only access to named lists
pub trait ListStore: Send {
    /// Check that the store is reachable
    fn ping(&mut self) -> Result<()>;

    /// Append `payload` to the tail of list `key`
    fn push(&mut self, key: &str, payload: &[u8]) -> Result<()>;
}

/// Pooled redis connections
#[cfg(feature = "redis")]
pub struct RedisListStore {
    pool: r2d2::Pool<redis::Client>,
}

#[cfg(feature = "redis")]
impl RedisListStore {
    /// Build the connection pool. No connection is made until first use.
    pub fn open(config: &RedisHookConfig) -> Result<Self> {
        let info = redis::ConnectionInfo {
            addr: redis::ConnectionAddr::Tcp(config.host.clone(), config.port),
            redis: redis::RedisConnectionInfo {
                db: config.db,
                password: config.password.clone(),
                ..Default::default()
            },
        };
        let client = redis::Client::open(info)
            .map_err(|e| HookError::config(HOOK_TYPE, e.to_string()))?;

        let pool = r2d2::Pool::builder()
            .max_size(config.pool_size)
            .idle_timeout(Some(IDLE_TIMEOUT))
            .connection_timeout(CONNECT_TIMEOUT)
            .build_unchecked(client);

        Ok(Self { pool })
    }

    fn connection(&self) -> std::result::Result<r2d2::PooledConnection<redis::Client>, r2d2::Error> {
        self.pool.get()
    }
}

#[cfg(feature = "redis")]
impl ListStore for RedisListStore {
    fn ping(&mut self) -> Result<()> {
        let mut conn = self
            .connection()
            .map_err(|e| HookError::connection(HOOK_TYPE, format!("unable to connect to REDIS: {}", e)))?;
        redis::cmd("PING")
            .query::<String>(&mut *conn)
            .map_err(|e| HookError::connection(HOOK_TYPE, format!("unable to connect to REDIS: {}", e)))?;
        Ok(())
    }

    fn push(&mut self, key: &str, payload: &[u8]) -> Result<()> {
        let mut conn = self
            .connection()
            .map_err(|e| HookError::delivery(HOOK_TYPE, format!("error sending message to REDIS: {}", e)))?;
        redis::cmd("RPUSH")
            .arg(key)
            .arg(payload)
            .query::<i64>(&mut *conn)
            .map_err(|e| HookError::delivery(HOOK_TYPE, format!("error sending message to REDIS: {}", e)))?;
        Ok(())
    }
}

/// Sink pushing JSON documents to a redis list
pub struct RedisSink {
    config: RedisHookConfig,
    store: Box<dyn ListStore>,
}

impl RedisSink {
    /// Wrap an existing store, pinging it first.
    ///
    /// # Errors
    ///
    /// `Connection` if the ping fails.
    pub fn with_store(config: RedisHookConfig, mut store: Box<dyn ListStore>) -> Result<Self> {
        store.ping()?;
        tracing::debug!(
            target: "log_hooks",
            host = %config.host,
            port = config.port,
            key = %config.key,
            shape = %config.message_shape,
            "connected redis hook"
        );
        Ok(Self { config, store })
    }

    /// Open a pooled redis connection for `config` and ping it
    #[cfg(feature = "redis")]
    pub fn connect(config: RedisHookConfig) -> Result<Self> {
        let store = RedisListStore::open(&config)?;
        Self::with_store(config, Box::new(store))
    }

    pub fn config(&self) -> &RedisHookConfig {
        &self.config
    }
}

impl Sink for RedisSink {
    fn deliver(&mut self, record: &LogRecord) -> Result<()> {
        let payload = serde_json::to_vec(&self.config.message(record)).map_err(|e| {
            HookError::delivery(HOOK_TYPE, format!("error creating message for REDIS: {}", e))
        })?;
        self.store.push(&self.config.key, &payload)
    }

    fn name(&self) -> &str {
        HOOK_TYPE
    }

    fn levels(&self) -> &[LogLevel] {
        &LogLevel::ALL
    }
}
