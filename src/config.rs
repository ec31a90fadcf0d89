//! Logger configuration
//!
//! [`LogConfig`] describes a whole logger: its level, how the base output is
//! rendered and where it goes, and the hooks to attach. It deserializes from
//! any serde format; the hook list can also be decoded on its own from JSON
//! with [`HookSpecs::from_json`], which suits environment variables.
//!
//! ```no_run
//! use log_hooks::config::{HookSpecs, LogConfig};
//!
//! let config = LogConfig {
//!     level: "warning".to_string(),
//!     hooks: HookSpecs::from_json(r#"[{"type": "file", "settings": {"name": "app.log"}}]"#)?,
//!     ..LogConfig::default()
//! };
//!
//! let (logger, hook_errors) = config.new_logger()?;
//! if let Some(errors) = hook_errors {
//!     eprintln!("{}", errors);
//! }
//! logger.warn("configured");
//! # Ok::<(), log_hooks::HookError>(())
//! ```

use crate::core::error::{HookError, InitErrors, Result};
use crate::core::formatter::{Formatter, JsonFormatter, NullFormatter, TextFormatter};
use crate::core::log_level::LogLevel;
use crate::core::logger::Logger;
use crate::core::overflow_policy::OverflowCallback;
use crate::core::settings::SettingsMap;
use crate::hooks::registry::{BuildContext, HookRegistry};
use serde::{Deserialize, Deserializer, Serialize};
use std::io::{self, Write};
use std::ops::Deref;
use std::sync::Arc;

pub use crate::hooks::registry::HookSpec;

/// Rendering of log records; unknown names fall back to text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
    Null,
}

impl LogFormat {
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "json" => LogFormat::Json,
            "null" => LogFormat::Null,
            _ => LogFormat::Text,
        }
    }

    /// Formatter for this format, configured from `settings`
    pub fn formatter(&self, settings: &SettingsMap) -> Arc<dyn Formatter> {
        match self {
            LogFormat::Text => Arc::new(TextFormatter::from_settings(settings)),
            LogFormat::Json => Arc::new(JsonFormatter::from_settings(settings)),
            LogFormat::Null => Arc::new(NullFormatter),
        }
    }
}

impl<'de> Deserialize<'de> for LogFormat {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(Self::from_name(&String::deserialize(deserializer)?))
    }
}

/// Destination of the base output; unknown names fall back to stderr
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogWriter {
    #[default]
    Stderr,
    Stdout,
    Discard,
}

impl LogWriter {
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "stdout" => LogWriter::Stdout,
            "discard" => LogWriter::Discard,
            _ => LogWriter::Stderr,
        }
    }

    pub fn open(&self) -> Box<dyn Write + Send> {
        match self {
            LogWriter::Stderr => Box::new(io::stderr()),
            LogWriter::Stdout => Box::new(io::stdout()),
            LogWriter::Discard => Box::new(io::sink()),
        }
    }
}

impl<'de> Deserialize<'de> for LogWriter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(Self::from_name(&String::deserialize(deserializer)?))
    }
}

/// Ordered list of configured hooks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HookSpecs(pub Vec<HookSpec>);

impl HookSpecs {
    /// Decode a JSON array of `{"type": ..., "settings": {...}}` objects
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

impl Deref for HookSpecs {
    type Target = [HookSpec];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<HookSpec>> for HookSpecs {
    fn from(specs: Vec<HookSpec>) -> Self {
        Self(specs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Logger name attached to every record
    pub name: Option<String>,
    pub level: String,
    pub format: LogFormat,
    pub format_settings: SettingsMap,
    pub writer: LogWriter,
    pub hooks: HookSpecs,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            name: None,
            level: LogLevel::Info.name().to_string(),
            format: LogFormat::default(),
            format_settings: SettingsMap::new(),
            writer: LogWriter::default(),
            hooks: HookSpecs::default(),
        }
    }
}

impl LogConfig {
    pub fn parse_level(&self) -> Result<LogLevel> {
        self.level
            .parse()
            .map_err(|_| HookError::InvalidLevel(self.level.clone()))
    }

    pub fn formatter(&self) -> Arc<dyn Formatter> {
        self.format.formatter(&self.format_settings)
    }

    /// Build a logger with the built-in hook types
    ///
    /// # Errors
    ///
    /// `InvalidLevel` for an unknown level. Hook failures do not fail the
    /// call: every hook that could be built is attached and the failures are
    /// returned next to the logger.
    pub fn new_logger(&self) -> Result<(Logger, Option<InitErrors>)> {
        self.new_logger_with(&HookRegistry::with_defaults(), None)
    }

    /// Build a logger resolving hook types through `registry`
    pub fn new_logger_with(
        &self,
        registry: &HookRegistry,
        on_overflow: Option<OverflowCallback>,
    ) -> Result<(Logger, Option<InitErrors>)> {
        let level = self.parse_level()?;
        let formatter = self.formatter();

        let mut ctx = BuildContext::new(Arc::clone(&formatter));
        ctx.on_overflow = on_overflow;
        let (hooks, errors) = registry.build_all(self.hooks.iter(), &ctx).into_parts();

        let mut builder = Logger::builder()
            .min_level(level)
            .shared_formatter(formatter)
            .boxed_writer(self.writer.open())
            .hooks(hooks);
        if let Some(ref name) = self.name {
            builder = builder.name(name);
        }

        Ok((builder.build(), errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn config(level: &str, hooks: Vec<HookSpec>) -> LogConfig {
        LogConfig {
            level: level.to_string(),
            writer: LogWriter::Discard,
            hooks: hooks.into(),
            ..LogConfig::default()
        }
    }

    #[test]
    fn test_new_logger() {
        for format in [LogFormat::Text, LogFormat::Json, LogFormat::Null] {
            let config = LogConfig {
                format,
                ..config("debug", Vec::new())
            };
            let (logger, errors) = config.new_logger().unwrap();
            assert!(errors.is_none());
            assert_eq!(logger.min_level(), LogLevel::Debug);
        }
    }

    #[test]
    fn test_invalid_level() {
        assert!(matches!(
            config("unknown", Vec::new()).new_logger(),
            Err(HookError::InvalidLevel(_))
        ));
        assert_eq!(config("warning", Vec::new()).parse_level().unwrap(), LogLevel::Warn);
    }

    #[test]
    fn test_names_fall_back() {
        assert_eq!(LogWriter::from_name("unknown"), LogWriter::Stderr);
        assert_eq!(LogWriter::from_name("stdout"), LogWriter::Stdout);
        assert_eq!(LogFormat::from_name("unknown"), LogFormat::Text);

        let config: LogConfig =
            serde_json::from_str(r#"{"level": "error", "format": "JSON", "writer": "nowhere"}"#).unwrap();
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.writer, LogWriter::Stderr);
    }

    #[test]
    fn test_hook_specs_from_json() {
        assert!(HookSpecs::from_json("").is_err());
        assert!(HookSpecs::from_json("[{broken:json\"]}").is_err());

        let specs = HookSpecs::from_json(
            r#"[{"type": "redis", "settings": {"host": "localhost", "port": "6379"}},
                {"type": "file", "settings": {"name": "app.log"}}]"#,
        )
        .unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].hook_type, "redis");
        assert_eq!(specs[1].settings["name"], "app.log");
    }

    #[test]
    fn test_hook_failures_reported_next_to_logger() {
        let config = config(
            "debug",
            vec![HookSpec::new("unknow"), HookSpec::new("file")],
        );
        let (logger, errors) = config.new_logger().unwrap();

        assert_eq!(logger.hook_count(), 0);
        let errors = errors.unwrap();
        assert_eq!(errors.len(), 2);
        assert!(errors.to_string().contains("init log hook file fail"));
    }

    #[test]
    fn test_file_hook_receives_records() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().to_string_lossy().into_owned();
        let config = LogConfig {
            format: LogFormat::Json,
            ..config(
                "debug",
                vec![HookSpec::new("file")
                    .with_setting("name", "app.log")
                    .with_setting("path", &path)],
            )
        };

        let (logger, errors) = config.new_logger().unwrap();
        assert!(errors.is_none());
        assert_eq!(logger.hook_count(), 1);

        logger.info("written by hook");
        logger.debug("filtered by the file hook levels");
        assert!(logger.shutdown(Duration::from_secs(2)));

        let files: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("app.log."))
            .collect();
        assert_eq!(files.len(), 1);

        let content = std::fs::read_to_string(files[0].path()).unwrap();
        assert!(content.contains("\"msg\":\"written by hook\""));
        assert!(!content.contains("filtered"));
    }
}
