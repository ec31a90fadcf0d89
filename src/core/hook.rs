//! Hook: one configured delivery path from log records to a sink

use super::channel::{deliver_isolated, DeliveryChannel};
use super::error::Result;
use super::log_level::LogLevel;
use super::log_record::LogRecord;
use super::metrics::DeliveryMetrics;
use super::overflow_policy::{AsyncPolicy, OverflowCallback};
use super::sink::Sink;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

enum Delivery {
    /// Sink called on the caller's thread
    Sync {
        sink: Mutex<Box<dyn Sink>>,
        metrics: Arc<DeliveryMetrics>,
    },
    Async(DeliveryChannel),
}

/// A sink plus its delivery mode.
///
/// # Example
///
/// ```
/// use log_hooks::prelude::*;
///
/// struct Discard;
///
/// impl Sink for Discard {
///     fn deliver(&mut self, _record: &LogRecord) -> Result<()> {
///         Ok(())
///     }
///
///     fn name(&self) -> &str {
///         "discard"
///     }
/// }
///
/// let hook = Hook::new(Box::new(Discard), AsyncPolicy::default().with_buffer_size(8)).unwrap();
/// hook.fire(&LogRecord::new(LogLevel::Info, "hello")).unwrap();
/// assert!(hook.shutdown(std::time::Duration::from_secs(1)));
/// ```
pub struct Hook {
    name: String,
    levels: Vec<LogLevel>,
    delivery: Delivery,
}

impl Hook {
    /// Wrap `sink` according to `policy`
    ///
    /// # Errors
    ///
    /// `Config` if the policy is unusable (async with a zero-sized buffer).
    pub fn new(sink: Box<dyn Sink>, policy: AsyncPolicy) -> Result<Self> {
        Self::with_overflow_callback(sink, policy, None)
    }

    pub fn with_overflow_callback(
        sink: Box<dyn Sink>,
        policy: AsyncPolicy,
        on_overflow: Option<OverflowCallback>,
    ) -> Result<Self> {
        let name = sink.name().to_string();
        policy.validate(&name)?;

        let levels = sink.levels().to_vec();
        let delivery = if policy.enabled {
            Delivery::Async(DeliveryChannel::spawn(sink, &policy, on_overflow)?)
        } else {
            Delivery::Sync {
                sink: Mutex::new(sink),
                metrics: Arc::new(DeliveryMetrics::new()),
            }
        };

        Ok(Self {
            name,
            levels,
            delivery,
        })
    }

    /// Deliver `record` to the sink.
    ///
    /// Sync hooks block for the sink's I/O and return its result. Async hooks
    /// enqueue a snapshot and return `Ok(())` immediately, or block when the
    /// queue is full and the policy says so. Records at levels the sink does
    /// not accept are ignored.
    pub fn fire(&self, record: &LogRecord) -> Result<()> {
        if !self.accepts(record.level) {
            return Ok(());
        }

        match &self.delivery {
            Delivery::Sync { sink, metrics } => {
                metrics.record_enqueued();
                let mut sink = sink.lock();
                deliver_isolated(&mut **sink, record, metrics)
            }
            Delivery::Async(channel) => {
                channel.send(record.clone());
                Ok(())
            }
        }
    }

    #[inline]
    pub fn accepts(&self, level: LogLevel) -> bool {
        self.levels.contains(&level)
    }

    /// Flush a synchronous sink; async sinks are flushed by their worker
    pub fn flush(&self) -> Result<()> {
        match &self.delivery {
            Delivery::Sync { sink, .. } => sink.lock().flush(),
            Delivery::Async(_) => Ok(()),
        }
    }

    /// Drain and stop the delivery worker, see [`DeliveryChannel::shutdown`]
    pub fn shutdown(&self, timeout: Duration) -> bool {
        match &self.delivery {
            Delivery::Sync { sink, .. } => match sink.lock().flush() {
                Ok(()) => true,
                Err(e) => {
                    tracing::error!(
                        target: "log_hooks",
                        hook = %self.name,
                        error = %e,
                        "failed to flush sink during shutdown"
                    );
                    false
                }
            },
            Delivery::Async(channel) => channel.shutdown(timeout),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn levels(&self) -> &[LogLevel] {
        &self.levels
    }

    pub fn is_async(&self) -> bool {
        matches!(self.delivery, Delivery::Async(_))
    }

    pub fn metrics(&self) -> &DeliveryMetrics {
        match &self.delivery {
            Delivery::Sync { metrics, .. } => metrics,
            Delivery::Async(channel) => channel.metrics(),
        }
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("name", &self.name)
            .field("levels", &self.levels)
            .field("async", &self.is_async())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::HookError;

    struct CollectSink {
        seen: Arc<Mutex<Vec<LogLevel>>>,
        levels: Vec<LogLevel>,
        fail: bool,
    }

    impl Sink for CollectSink {
        fn deliver(&mut self, record: &LogRecord) -> Result<()> {
            if self.fail {
                return Err(HookError::delivery("collect", "nope"));
            }
            self.seen.lock().push(record.level);
            Ok(())
        }

        fn name(&self) -> &str {
            "collect"
        }

        fn levels(&self) -> &[LogLevel] {
            &self.levels
        }
    }

    fn sink(levels: &[LogLevel], fail: bool) -> (Box<dyn Sink>, Arc<Mutex<Vec<LogLevel>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = CollectSink {
            seen: Arc::clone(&seen),
            levels: levels.to_vec(),
            fail,
        };
        (Box::new(sink), seen)
    }

    #[test]
    fn test_sync_hook_returns_sink_error() {
        let (sink, _) = sink(&LogLevel::ALL, true);
        let hook = Hook::new(sink, AsyncPolicy::sync()).unwrap();
        assert!(!hook.is_async());

        let err = hook.fire(&LogRecord::new(LogLevel::Info, "x")).unwrap_err();
        assert!(matches!(err, HookError::Delivery { .. }));
        assert_eq!(hook.metrics().failed_count(), 1);
    }

    #[test]
    fn test_async_hook_swallows_sink_error() {
        let (sink, _) = sink(&LogLevel::ALL, true);
        let hook = Hook::new(sink, AsyncPolicy::default().with_buffer_size(4)).unwrap();
        assert!(hook.is_async());

        assert!(hook.fire(&LogRecord::new(LogLevel::Info, "x")).is_ok());
        assert!(hook.shutdown(Duration::from_secs(2)));
        assert_eq!(hook.metrics().failed_count(), 1);
    }

    #[test]
    fn test_level_filter() {
        let (sink, seen) = sink(&LogLevel::ALERTS, false);
        let hook = Hook::new(sink, AsyncPolicy::sync()).unwrap();

        hook.fire(&LogRecord::new(LogLevel::Info, "ignored")).unwrap();
        hook.fire(&LogRecord::new(LogLevel::Error, "kept")).unwrap();
        hook.fire(&LogRecord::new(LogLevel::Panic, "kept")).unwrap();

        assert_eq!(*seen.lock(), vec![LogLevel::Error, LogLevel::Panic]);
        assert_eq!(hook.metrics().enqueued_count(), 2);
    }

    #[test]
    fn test_zero_buffer_rejected_at_construction() {
        let (sink, _) = sink(&LogLevel::ALL, false);
        let result = Hook::new(sink, AsyncPolicy::default().with_buffer_size(0));
        assert!(matches!(result, Err(HookError::Config { .. })));
    }
}
