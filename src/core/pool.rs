//! Lock-free pool of reusable log records
//!
//! Emitting a log line needs a record to populate. Rather than allocating a
//! fresh one (plus its field map) on every call, records are recycled through
//! a bounded lock-free queue shared by every producer thread.

use super::log_level::LogLevel;
use super::log_record::LogRecord;
use crossbeam_queue::ArrayQueue;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

/// Default number of idle records kept by a pool
pub const DEFAULT_POOL_CAPACITY: usize = 1024;

/// Counters describing pool reuse
#[derive(Debug, Default)]
pub struct PoolMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    returns: AtomicU64,
    discards: AtomicU64,
}

impl PoolMetrics {
    pub const fn new() -> Self {
        Self {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            returns: AtomicU64::new(0),
            discards: AtomicU64::new(0),
        }
    }

    /// Records handed out from the idle queue
    #[inline]
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Records allocated because the idle queue was empty
    #[inline]
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn returns(&self) -> u64 {
        self.returns.load(Ordering::Relaxed)
    }

    /// Records dropped on release because the idle queue was full
    #[inline]
    pub fn discards(&self) -> u64 {
        self.discards.load(Ordering::Relaxed)
    }

    /// Fraction of acquisitions served without allocating (0.0 - 1.0)
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits();
        let total = hits + self.misses();
        if total == 0 {
            1.0
        } else {
            hits as f64 / total as f64
        }
    }
}

/// Process-wide recycler for [`LogRecord`]s.
///
/// # Example
///
/// ```
/// use log_hooks::core::EntryPool;
///
/// let pool = EntryPool::new(16);
/// let mut record = pool.acquire(None);
/// record.set_field("hello", "world");
/// pool.release(record);
///
/// let record = pool.acquire(None);
/// assert!(record.fields.is_empty());
/// ```
pub struct EntryPool {
    idle: ArrayQueue<Box<LogRecord>>,
    metrics: PoolMetrics,
}

impl EntryPool {
    /// Create a pool that keeps at most `capacity` idle records
    pub fn new(capacity: usize) -> Self {
        Self {
            idle: ArrayQueue::new(capacity.max(1)),
            metrics: PoolMetrics::new(),
        }
    }

    /// Take a record ready for population.
    ///
    /// The field map is always empty and the owning logger is set to `logger`.
    #[inline]
    pub fn acquire(&self, logger: Option<Arc<str>>) -> Box<LogRecord> {
        let mut record = match self.idle.pop() {
            Some(record) => {
                self.metrics.hits.fetch_add(1, Ordering::Relaxed);
                record
            }
            None => {
                self.metrics.misses.fetch_add(1, Ordering::Relaxed);
                Box::new(LogRecord::new(LogLevel::Info, String::new()))
            }
        };
        record.logger = logger;
        record
    }

    /// Clear a record and hand it back for reuse
    #[inline]
    pub fn release(&self, mut record: Box<LogRecord>) {
        record.reset();
        match self.idle.push(record) {
            Ok(()) => {
                self.metrics.returns.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                self.metrics.discards.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Number of idle records currently held
    pub fn idle(&self) -> usize {
        self.idle.len()
    }

    pub fn capacity(&self) -> usize {
        self.idle.capacity()
    }

    pub fn metrics(&self) -> &PoolMetrics {
        &self.metrics
    }
}

impl Default for EntryPool {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_CAPACITY)
    }
}

/// Process-wide pool shared by every logger that is not given its own
pub fn global() -> Arc<EntryPool> {
    static GLOBAL: OnceLock<Arc<EntryPool>> = OnceLock::new();
    Arc::clone(GLOBAL.get_or_init(|| Arc::new(EntryPool::default())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_released_record_comes_back_empty() {
        let pool = EntryPool::new(4);
        let logger: Arc<str> = Arc::from("app");

        let mut record = pool.acquire(Some(Arc::clone(&logger)));
        assert_eq!(record.logger_name(), Some("app"));
        record.set_field("hello", "world");
        record.set_message("populated");
        pool.release(record);

        let record = pool.acquire(Some(logger));
        assert!(record.fields.is_empty());
        assert!(record.message.is_empty());
        assert_eq!(record.logger_name(), Some("app"));
        assert_eq!(pool.metrics().hits(), 1);
        assert_eq!(pool.metrics().misses(), 1);
    }

    #[test]
    fn test_full_pool_discards() {
        let pool = EntryPool::new(1);
        let a = pool.acquire(None);
        let b = pool.acquire(None);
        pool.release(a);
        pool.release(b);

        assert_eq!(pool.idle(), 1);
        assert_eq!(pool.metrics().returns(), 1);
        assert_eq!(pool.metrics().discards(), 1);
    }

    #[test]
    fn test_concurrent_acquire_release() {
        let pool = Arc::new(EntryPool::new(8));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let pool = Arc::clone(&pool);
                thread::spawn(move || {
                    for i in 0..500 {
                        let mut record = pool.acquire(None);
                        assert!(record.fields.is_empty());
                        record.set_field("thread", t);
                        record.set_field("i", i);
                        pool.release(record);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert!(pool.idle() <= pool.capacity());
        let m = pool.metrics();
        assert_eq!(m.hits() + m.misses(), 2000);
        assert_eq!(m.returns() + m.discards(), 2000);
    }
}
