//! Main logger implementation

use super::{
    error::Result,
    formatter::{Formatter, TextFormatter},
    hook::Hook,
    log_level::LogLevel,
    log_record::{FieldValue, LogRecord},
    pool::{self, EntryPool},
};
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub use super::channel::DEFAULT_SHUTDOWN_TIMEOUT;

/// Name given to loggers built without one
pub const DEFAULT_LOGGER_NAME: &str = "root";

/// Structured logger with a base writer and any number of delivery hooks.
///
/// Each call acquires a record from the entry pool, renders it to the base
/// writer, fires every hook that accepts its level, and hands the record
/// back to the pool.
pub struct Logger {
    name: Arc<str>,
    min_level: RwLock<LogLevel>,
    formatter: Arc<dyn Formatter>,
    writer: Mutex<Box<dyn Write + Send>>,
    hooks: RwLock<Vec<Hook>>,
    pool: Arc<EntryPool>,
    closed: AtomicBool,
}

impl Logger {
    /// Text output to stderr at `Info`, no hooks
    #[must_use]
    pub fn new() -> Self {
        LoggerBuilder::new().build()
    }

    #[must_use]
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::new()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn min_level(&self) -> LogLevel {
        *self.min_level.read()
    }

    pub fn set_min_level(&self, level: LogLevel) {
        *self.min_level.write() = level;
    }

    /// Attach a hook; it receives every later record it accepts
    pub fn add_hook(&self, hook: Hook) {
        self.hooks.write().push(hook);
    }

    pub fn hook_count(&self) -> usize {
        self.hooks.read().len()
    }

    /// Run `f` over the attached hooks, e.g. to read their metrics
    pub fn with_hooks<R>(&self, f: impl FnOnce(&[Hook]) -> R) -> R {
        f(&self.hooks.read())
    }

    pub fn pool(&self) -> &EntryPool {
        &self.pool
    }

    #[inline]
    pub fn is_enabled(&self, level: LogLevel) -> bool {
        level >= *self.min_level.read()
    }

    pub fn log(&self, level: LogLevel, message: &str) {
        self.log_with_fields(level, message, std::iter::empty::<(String, FieldValue)>());
    }

    /// Log with structured fields
    pub fn log_with_fields<I, K, V>(&self, level: LogLevel, message: &str, fields: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FieldValue>,
    {
        if !self.is_enabled(level) {
            return;
        }

        let mut record = self.pool.acquire(Some(Arc::clone(&self.name)));
        record.level = level;
        record.timestamp = Utc::now();
        record.set_message(message);
        for (key, value) in fields {
            record.set_field(key, value);
        }

        self.dispatch(&record);
        self.pool.release(record);
    }

    fn dispatch(&self, record: &LogRecord) {
        match self.formatter.format(record) {
            Ok(bytes) if bytes.is_empty() => {}
            Ok(bytes) => {
                if let Err(e) = self.writer.lock().write_all(&bytes) {
                    tracing::error!(
                        target: "log_hooks",
                        logger = %self.name,
                        error = %e,
                        "failed to write log record"
                    );
                }
            }
            Err(e) => {
                tracing::error!(
                    target: "log_hooks",
                    logger = %self.name,
                    error = %e,
                    "failed to format log record"
                );
            }
        }

        if self.closed.load(Ordering::Acquire) {
            return;
        }

        for hook in self.hooks.read().iter() {
            if let Err(e) = hook.fire(record) {
                tracing::error!(
                    target: "log_hooks",
                    logger = %self.name,
                    hook = hook.name(),
                    error = %e,
                    "failed to fire hook"
                );
            }
        }
    }

    #[inline]
    pub fn trace(&self, message: &str) {
        self.log(LogLevel::Trace, message);
    }

    #[inline]
    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    #[inline]
    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    #[inline]
    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message);
    }

    #[inline]
    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }

    #[inline]
    pub fn fatal(&self, message: &str) {
        self.log(LogLevel::Fatal, message);
    }

    /// Log at `Panic` level; does not unwind
    #[inline]
    pub fn panic(&self, message: &str) {
        self.log(LogLevel::Panic, message);
    }

    /// Flush the base writer and every synchronous hook
    pub fn flush(&self) -> Result<()> {
        self.writer.lock().flush()?;
        for hook in self.hooks.read().iter() {
            hook.flush()?;
        }
        Ok(())
    }

    /// Stop every hook, draining async queues within `timeout` overall.
    ///
    /// Records logged afterwards still reach the base writer but no hook.
    /// Returns `true` if every hook finished in time.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use log_hooks::Logger;
    /// use std::time::Duration;
    ///
    /// let logger = Logger::new();
    /// logger.info("Important message");
    ///
    /// if !logger.shutdown(Duration::from_secs(10)) {
    ///     eprintln!("Warning: some hooks did not drain in time");
    /// }
    /// ```
    pub fn shutdown(&self, timeout: Duration) -> bool {
        self.closed.store(true, Ordering::Release);

        let deadline = Instant::now() + timeout;
        let mut clean = true;
        for hook in self.hooks.read().iter() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            clean &= hook.shutdown(remaining);
        }

        if let Err(e) = self.writer.lock().flush() {
            tracing::error!(
                target: "log_hooks",
                logger = %self.name,
                error = %e,
                "failed to flush during shutdown"
            );
            return false;
        }

        clean
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        if !self.closed.load(Ordering::Acquire) {
            self.shutdown(DEFAULT_SHUTDOWN_TIMEOUT);
        }
    }
}

/// Builder for constructing Logger with a fluent API
///
/// # Example
/// ```
/// use log_hooks::prelude::*;
///
/// let logger = Logger::builder()
///     .name("billing")
///     .min_level(LogLevel::Debug)
///     .formatter(JsonFormatter::new())
///     .writer(std::io::sink())
///     .build();
///
/// logger.info("invoice sent");
/// ```
pub struct LoggerBuilder {
    name: Arc<str>,
    min_level: LogLevel,
    formatter: Arc<dyn Formatter>,
    writer: Box<dyn Write + Send>,
    hooks: Vec<Hook>,
    pool: Option<Arc<EntryPool>>,
}

impl LoggerBuilder {
    pub fn new() -> Self {
        Self {
            name: Arc::from(DEFAULT_LOGGER_NAME),
            min_level: LogLevel::Info,
            formatter: Arc::new(TextFormatter::new()),
            writer: Box::new(io::stderr()),
            hooks: Vec::new(),
            pool: None,
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn name(mut self, name: &str) -> Self {
        self.name = Arc::from(name);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn formatter<F: Formatter + 'static>(mut self, formatter: F) -> Self {
        self.formatter = Arc::new(formatter);
        self
    }

    /// Formatter shared with other owners, such as file hooks
    #[must_use = "builder methods return a new value"]
    pub fn shared_formatter(mut self, formatter: Arc<dyn Formatter>) -> Self {
        self.formatter = formatter;
        self
    }

    /// Base writer every record is rendered to, stderr by default
    #[must_use = "builder methods return a new value"]
    pub fn writer<W: Write + Send + 'static>(mut self, writer: W) -> Self {
        self.writer = Box::new(writer);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn boxed_writer(mut self, writer: Box<dyn Write + Send>) -> Self {
        self.writer = writer;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn hook(mut self, hook: Hook) -> Self {
        self.hooks.push(hook);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn hooks(mut self, hooks: impl IntoIterator<Item = Hook>) -> Self {
        self.hooks.extend(hooks);
        self
    }

    /// Use a dedicated entry pool instead of the process-wide one
    #[must_use = "builder methods return a new value"]
    pub fn pool(mut self, pool: Arc<EntryPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn build(self) -> Logger {
        Logger {
            name: self.name,
            min_level: RwLock::new(self.min_level),
            formatter: self.formatter,
            writer: Mutex::new(self.writer),
            hooks: RwLock::new(self.hooks),
            pool: self.pool.unwrap_or_else(pool::global),
            closed: AtomicBool::new(false),
        }
    }
}

impl Default for LoggerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
