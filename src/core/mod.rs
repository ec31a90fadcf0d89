//! Core logger types and traits

pub mod channel;
pub mod error;
pub mod formatter;
pub mod hook;
pub mod log_level;
pub mod log_record;
pub mod logger;
pub mod metrics;
pub mod overflow_policy;
pub mod pool;
pub mod settings;
pub mod sink;

pub use channel::{DeliveryChannel, DEFAULT_SHUTDOWN_TIMEOUT};
pub use error::{HookError, InitErrors, Result};
pub use formatter::{
    FieldMap, Formatter, JsonFormatter, NullFormatter, TextFormatter, TimestampFormat,
};
pub use hook::Hook;
pub use log_level::LogLevel;
pub use log_record::{FieldValue, Fields, LogRecord};
pub use logger::{Logger, LoggerBuilder};
pub use metrics::DeliveryMetrics;
pub use overflow_policy::{AsyncPolicy, OverflowCallback, OverflowPolicy, DEFAULT_ASYNC_BUFFER_SIZE};
pub use pool::{EntryPool, PoolMetrics};
pub use settings::{Settings, SettingsMap};
pub use sink::Sink;
