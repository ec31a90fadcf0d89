//! Error-tracking sink

use crate::core::error::{HookError, Result};
use crate::core::log_level::LogLevel;
use crate::core::log_record::LogRecord;
use crate::core::settings::Settings;
use crate::core::sink::Sink;
use std::time::Duration;

pub const HOOK_TYPE: &str = "sentry";

/// Settings every sentry hook must provide
pub const REQUIRED_SETTINGS: &[&str] = &["dsn"];

/// How long a flush waits for queued events to be sent
pub const FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentryHookConfig {
    pub dsn: String,
}

impl SentryHookConfig {
    pub fn from_settings(settings: &Settings<'_>) -> Result<Self> {
        settings.require(REQUIRED_SETTINGS)?;
        Ok(Self {
            dsn: settings.required("dsn")?.to_string(),
        })
    }
}

/// Receives alert-level records as error-tracking events
pub trait EventCollector: Send {
    fn capture(&mut self, record: &LogRecord) -> Result<()>;

    /// Wait up to `timeout` for captured events to be sent
    fn flush(&mut self, _timeout: Duration) -> bool {
        true
    }
}

/// Collector backed by a sentry client
#[cfg(feature = "sentry")]
pub struct SentryCollector {
    client: sentry::Client,
}

#[cfg(feature = "sentry")]
impl SentryCollector {
    /// # Errors
    ///
    /// `Config` if `dsn` cannot be parsed.
    pub fn new(config: &SentryHookConfig) -> Result<Self> {
        let dsn: sentry::types::Dsn = config
            .dsn
            .parse()
            .map_err(|e| HookError::config(HOOK_TYPE, format!("invalid dsn: {}", e)))?;

        let client = sentry::Client::from(sentry::ClientOptions {
            dsn: Some(dsn),
            ..Default::default()
        });
        Ok(Self { client })
    }

    fn event_for(record: &LogRecord) -> sentry::protocol::Event<'static> {
        let level = match record.level {
            LogLevel::Fatal | LogLevel::Panic => sentry::Level::Fatal,
            LogLevel::Error => sentry::Level::Error,
            LogLevel::Warn => sentry::Level::Warning,
            LogLevel::Info => sentry::Level::Info,
            LogLevel::Debug | LogLevel::Trace => sentry::Level::Debug,
        };

        let extra = record
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json_value()))
            .collect();

        sentry::protocol::Event {
            level,
            message: Some(record.message.clone()),
            logger: record.logger_name().map(str::to_string),
            timestamp: record.timestamp.into(),
            extra,
            ..Default::default()
        }
    }
}

#[cfg(feature = "sentry")]
impl EventCollector for SentryCollector {
    fn capture(&mut self, record: &LogRecord) -> Result<()> {
        self.client.capture_event(Self::event_for(record), None);
        Ok(())
    }

    fn flush(&mut self, timeout: Duration) -> bool {
        self.client.flush(Some(timeout))
    }
}

/// Forwards `Error`, `Fatal` and `Panic` records to an [`EventCollector`]
pub struct SentrySink {
    collector: Box<dyn EventCollector>,
}

impl SentrySink {
    pub fn with_collector(collector: Box<dyn EventCollector>) -> Self {
        Self { collector }
    }

    #[cfg(feature = "sentry")]
    pub fn connect(config: &SentryHookConfig) -> Result<Self> {
        Ok(Self::with_collector(Box::new(SentryCollector::new(config)?)))
    }
}

impl Sink for SentrySink {
    fn deliver(&mut self, record: &LogRecord) -> Result<()> {
        self.collector.capture(record)
    }

    fn flush(&mut self) -> Result<()> {
        if self.collector.flush(FLUSH_TIMEOUT) {
            Ok(())
        } else {
            Err(HookError::delivery(HOOK_TYPE, "timed out flushing events"))
        }
    }

    fn name(&self) -> &str {
        HOOK_TYPE
    }

    fn levels(&self) -> &[LogLevel] {
        &LogLevel::ALERTS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::settings::SettingsMap;
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct Captured(Arc<Mutex<Vec<String>>>);

    impl EventCollector for Captured {
        fn capture(&mut self, record: &LogRecord) -> Result<()> {
            self.0.lock().push(record.message.clone());
            Ok(())
        }
    }

    #[test]
    fn test_dsn_required() {
        let map = SettingsMap::new();
        assert!(matches!(
            SentryHookConfig::from_settings(&Settings::new(HOOK_TYPE, &map)),
            Err(HookError::MissingSetting { .. })
        ));
    }

    #[cfg(feature = "sentry")]
    #[test]
    fn test_malformed_dsn() {
        let config = SentryHookConfig {
            dsn: "xxxx".to_string(),
        };
        assert!(matches!(
            SentryCollector::new(&config),
            Err(HookError::Config { .. })
        ));
    }

    #[cfg(feature = "sentry")]
    #[test]
    fn test_event_carries_record() {
        let record = LogRecord::new(LogLevel::Panic, "worker died").with_field("job", 42);
        let event = SentryCollector::event_for(&record);

        assert_eq!(event.level, sentry::Level::Fatal);
        assert_eq!(event.message.as_deref(), Some("worker died"));
        assert_eq!(event.extra["job"], serde_json::json!(42));
    }

    #[test]
    fn test_only_alert_levels_forwarded() {
        use crate::core::hook::Hook;
        use crate::core::overflow_policy::AsyncPolicy;

        let captured = Arc::new(Mutex::new(Vec::new()));
        let sink = SentrySink::with_collector(Box::new(Captured(Arc::clone(&captured))));
        assert_eq!(sink.levels(), &LogLevel::ALERTS);

        let hook = Hook::new(Box::new(sink), AsyncPolicy::sync()).unwrap();
        for level in LogLevel::ALL {
            hook.fire(&LogRecord::new(level, level.name())).unwrap();
        }

        assert_eq!(*captured.lock(), vec!["error", "fatal", "panic"]);
    }
}
