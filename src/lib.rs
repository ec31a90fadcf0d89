//! # log_hooks
//!
//! A structured logger whose records fan out to pluggable delivery hooks
//! (rotating files, a redis list, an error-tracking service) without letting
//! a slow or unreachable destination stall the application.
//!
//! ## Features
//!
//! - **Async Delivery**: each hook can own a bounded queue and a dedicated
//!   worker thread, with a drop-newest or blocking overflow policy
//! - **Record Pooling**: log records are recycled through a lock-free pool
//! - **Hook Registry**: hooks are built from string settings by type tag, and
//!   every construction failure is reported, not just the first
//! - **Graceful Shutdown**: queued records are drained within a deadline
//!
//! ## Example
//!
//! ```
//! use log_hooks::prelude::*;
//!
//! struct Stdout;
//!
//! impl Sink for Stdout {
//!     fn deliver(&mut self, record: &LogRecord) -> Result<()> {
//!         println!("{} {}", record.level, record.message);
//!         Ok(())
//!     }
//!
//!     fn name(&self) -> &str {
//!         "stdout"
//!     }
//! }
//!
//! let hook = Hook::new(Box::new(Stdout), AsyncPolicy::default()).unwrap();
//! let logger = Logger::builder()
//!     .writer(std::io::sink())
//!     .hook(hook)
//!     .build();
//!
//! logger.info("hello");
//! assert!(logger.shutdown(DEFAULT_SHUTDOWN_TIMEOUT));
//! ```

pub mod config;
pub mod core;
pub mod hooks;

pub mod prelude {
    pub use crate::config::{HookSpecs, LogConfig, LogFormat, LogWriter};
    pub use crate::core::{
        AsyncPolicy, DeliveryMetrics, EntryPool, FieldValue, Formatter, Hook, HookError,
        InitErrors, JsonFormatter, LogLevel, LogRecord, Logger, LoggerBuilder, NullFormatter,
        OverflowCallback, OverflowPolicy, Result, Sink, TextFormatter, DEFAULT_SHUTDOWN_TIMEOUT,
    };
    pub use crate::hooks::{BuildContext, HookRegistry, HookSpec};
}

pub use crate::config::{HookSpecs, LogConfig, LogFormat, LogWriter};
pub use crate::core::{
    AsyncPolicy, DeliveryChannel, DeliveryMetrics, EntryPool, FieldMap, FieldValue, Fields,
    Formatter, Hook, HookError, InitErrors, JsonFormatter, LogLevel, LogRecord, Logger,
    LoggerBuilder, NullFormatter, OverflowCallback, OverflowPolicy, PoolMetrics, Result, Settings,
    SettingsMap, Sink, TextFormatter, TimestampFormat, DEFAULT_ASYNC_BUFFER_SIZE,
    DEFAULT_SHUTDOWN_TIMEOUT,
};
pub use crate::hooks::{BuildContext, BuildOutcome, HookRegistry, HookSpec};
