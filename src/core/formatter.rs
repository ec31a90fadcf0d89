//! Record formatters
//!
//! File sinks render each record to bytes through a [`Formatter`] that is
//! built once, outside the delivery path, and shared by every hook that
//! needs it.
//!
//! - [`TextFormatter`]: `[2025-01-08T10:30:45.123Z] [INFO ] message key=value`
//! - [`JsonFormatter`]: one JSON object per line, user fields at the top level
//! - [`NullFormatter`]: renders nothing

use super::error::Result;
use super::log_record::LogRecord;
use super::settings::{Settings, SettingsMap};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Renders one record to bytes
pub trait Formatter: Send + Sync {
    fn format(&self, record: &LogRecord) -> Result<Vec<u8>>;
}

/// Timestamp rendering options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimestampFormat {
    /// `2025-01-08T10:30:45.123Z`
    #[default]
    Iso8601,

    /// `2025-01-08T10:30:45Z`
    Rfc3339,

    /// `2025-01-08T10:30:45.123456789Z`
    Rfc3339Nanos,

    /// `1736332245123`
    UnixMillis,

    /// Any strftime-compatible format string
    Custom(String),
}

impl TimestampFormat {
    /// `iso8601`, `rfc3339`, `rfc3339nano` or `unix_millis`; anything else
    /// is taken as a strftime pattern
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "iso8601" => TimestampFormat::Iso8601,
            "rfc3339" => TimestampFormat::Rfc3339,
            "rfc3339nano" | "rfc3339nanos" => TimestampFormat::Rfc3339Nanos,
            "unix_millis" | "unixmillis" => TimestampFormat::UnixMillis,
            _ => TimestampFormat::Custom(name.to_string()),
        }
    }

    #[must_use]
    pub fn format(&self, datetime: &DateTime<Utc>) -> String {
        match self {
            TimestampFormat::Iso8601 => datetime.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
            TimestampFormat::Rfc3339 => datetime.to_rfc3339_opts(SecondsFormat::Secs, true),
            TimestampFormat::Rfc3339Nanos => {
                datetime.to_rfc3339_opts(SecondsFormat::AutoSi, true)
            }
            TimestampFormat::UnixMillis => datetime.timestamp_millis().to_string(),
            TimestampFormat::Custom(format_str) => datetime.format(format_str).to_string(),
        }
    }
}

/// Human-readable single-line text
#[derive(Debug, Clone, Default)]
pub struct TextFormatter {
    timestamp_format: TimestampFormat,
}

impl TextFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.timestamp_format = format;
        self
    }

    /// Reads `timestamp_format`
    pub fn from_settings(settings: &SettingsMap) -> Self {
        let mut formatter = Self::new();
        if let Some(name) = settings.get("timestamp_format") {
            formatter.timestamp_format = TimestampFormat::from_name(name);
        }
        formatter
    }
}

impl Formatter for TextFormatter {
    fn format(&self, record: &LogRecord) -> Result<Vec<u8>> {
        let mut line = format!(
            "[{}] [{:5}] {}",
            self.timestamp_format.format(&record.timestamp),
            record.level.to_str(),
            record.message
        );

        if !record.fields.is_empty() {
            line.push(' ');
            line.push_str(&record.format_fields());
        }

        line.push('\n');
        Ok(line.into_bytes())
    }
}

pub const FIELD_KEY_TIME: &str = "time";
pub const FIELD_KEY_LEVEL: &str = "level";
pub const FIELD_KEY_MSG: &str = "msg";

/// Renames the built-in JSON keys
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMap {
    pub time: Option<String>,
    pub level: Option<String>,
    pub msg: Option<String>,
}

impl FieldMap {
    pub fn time_key(&self) -> &str {
        self.time.as_deref().unwrap_or(FIELD_KEY_TIME)
    }

    pub fn level_key(&self) -> &str {
        self.level.as_deref().unwrap_or(FIELD_KEY_LEVEL)
    }

    pub fn msg_key(&self) -> &str {
        self.msg.as_deref().unwrap_or(FIELD_KEY_MSG)
    }
}

/// JSON-lines output.
///
/// User fields that collide with the (possibly remapped) time, level or
/// message keys are kept under `fields.<name>`. With a `data_key` all user
/// fields are nested under that key instead and nothing can collide.
#[derive(Debug, Clone, Default)]
pub struct JsonFormatter {
    pub field_map: FieldMap,
    pub data_key: Option<String>,
    pub disable_timestamp: bool,
    pub timestamp_format: TimestampFormat,
    pub pretty: bool,
}

impl JsonFormatter {
    pub fn new() -> Self {
        Self {
            timestamp_format: TimestampFormat::Rfc3339,
            ..Self::default()
        }
    }

    /// Reads `time_key`, `level_key`, `msg_key`, `data_key`,
    /// `disable_timestamp`, `pretty` and `timestamp_format`
    pub fn from_settings(settings: &SettingsMap) -> Self {
        let view = Settings::new("json", settings);
        let owned = |key: &str| view.get(key).map(str::to_string);

        let mut formatter = Self::new();
        formatter.field_map = FieldMap {
            time: owned("time_key"),
            level: owned("level_key"),
            msg: owned("msg_key"),
        };
        formatter.data_key = owned("data_key");
        formatter.disable_timestamp = view.flag("disable_timestamp").unwrap_or(false);
        formatter.pretty = view.flag("pretty").unwrap_or(false);
        if let Some(name) = view.get("timestamp_format") {
            formatter.timestamp_format = TimestampFormat::from_name(name);
        }
        formatter
    }

    fn to_value(&self, record: &LogRecord) -> serde_json::Value {
        let mut data = serde_json::Map::new();
        for (key, value) in &record.fields {
            data.insert(key.clone(), value.to_json_value());
        }

        if let Some(ref data_key) = self.data_key {
            let mut nested = serde_json::Map::new();
            nested.insert(data_key.clone(), serde_json::Value::Object(data));
            data = nested;
        }

        let time_key = self.field_map.time_key();
        let msg_key = self.field_map.msg_key();
        let level_key = self.field_map.level_key();

        for key in [time_key, msg_key, level_key] {
            if let Some(clashing) = data.remove(key) {
                data.insert(format!("fields.{}", key), clashing);
            }
        }

        if !self.disable_timestamp {
            data.insert(
                time_key.to_string(),
                serde_json::Value::String(self.timestamp_format.format(&record.timestamp)),
            );
        }
        data.insert(
            msg_key.to_string(),
            serde_json::Value::String(record.message.clone()),
        );
        data.insert(
            level_key.to_string(),
            serde_json::Value::String(record.level.name().to_string()),
        );

        serde_json::Value::Object(data)
    }
}

impl Formatter for JsonFormatter {
    fn format(&self, record: &LogRecord) -> Result<Vec<u8>> {
        let value = self.to_value(record);
        let mut bytes = if self.pretty {
            serde_json::to_vec_pretty(&value)?
        } else {
            serde_json::to_vec(&value)?
        };
        bytes.push(b'\n');
        Ok(bytes)
    }
}

/// Discards everything; used when only hooks should produce output
#[derive(Debug, Clone, Copy, Default)]
pub struct NullFormatter;

impl Formatter for NullFormatter {
    fn format(&self, _record: &LogRecord) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }
}
