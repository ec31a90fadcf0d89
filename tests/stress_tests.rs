//! Stress tests for async hook delivery
//!
//! These tests verify:
//! - Every record is accounted for under drop-newest overflow
//! - Blocking overflow never loses a record
//! - Per-producer ordering survives concurrent producers
//! - A panicking sink does not stop its delivery worker
//! - Records fired while a hook shuts down are delivered or counted as dropped

use log_hooks::prelude::*;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const PRODUCERS: usize = 8;
const PER_PRODUCER: usize = 2_000;

/// Counts deliveries, optionally sleeping to keep the queue under pressure
struct CountingSink {
    delivered: Arc<AtomicU64>,
    pause_every: u64,
}

impl Sink for CountingSink {
    fn deliver(&mut self, _record: &LogRecord) -> Result<()> {
        let n = self.delivered.fetch_add(1, Ordering::SeqCst) + 1;
        if self.pause_every > 0 && n % self.pause_every == 0 {
            thread::sleep(Duration::from_millis(1));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "counting"
    }
}

/// Keeps the sequence of every producer as it arrives
struct SequenceSink {
    seen: Arc<Mutex<HashMap<i64, Vec<i64>>>>,
}

impl Sink for SequenceSink {
    fn deliver(&mut self, record: &LogRecord) -> Result<()> {
        let producer = match record.fields.get("producer") {
            Some(FieldValue::Int(p)) => *p,
            _ => return Err(HookError::delivery("sequence", "missing producer")),
        };
        let seq = match record.fields.get("seq") {
            Some(FieldValue::Int(s)) => *s,
            _ => return Err(HookError::delivery("sequence", "missing seq")),
        };
        self.seen.lock().entry(producer).or_default().push(seq);
        Ok(())
    }

    fn name(&self) -> &str {
        "sequence"
    }
}

fn flood(hook: &Arc<Hook>) {
    let handles: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let hook = Arc::clone(hook);
            thread::spawn(move || {
                for i in 0..PER_PRODUCER {
                    let record = LogRecord::new(LogLevel::Info, "stress")
                        .with_field("producer", p as i64)
                        .with_field("seq", i as i64);
                    hook.fire(&record).expect("async fire never fails");
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("producer panicked");
    }
}

#[test]
fn test_drop_newest_accounts_for_every_record() {
    let delivered = Arc::new(AtomicU64::new(0));
    let sink = CountingSink {
        delivered: Arc::clone(&delivered),
        pause_every: 100,
    };

    // Tiny queue to force overflow
    let hook = Arc::new(Hook::new(Box::new(sink), AsyncPolicy::default().with_buffer_size(16)).unwrap());
    flood(&hook);
    assert!(hook.shutdown(Duration::from_secs(10)));

    let total = (PRODUCERS * PER_PRODUCER) as u64;
    let metrics = hook.metrics();
    assert_eq!(metrics.enqueued_count() + metrics.dropped_count(), total);
    assert_eq!(metrics.delivered_count() + metrics.failed_count(), metrics.enqueued_count());
    assert_eq!(delivered.load(Ordering::SeqCst), metrics.delivered_count());
    assert!(metrics.dropped_count() > 0, "queue of 16 should have overflowed");
}

#[test]
fn test_blocking_policy_loses_nothing() {
    let delivered = Arc::new(AtomicU64::new(0));
    let sink = CountingSink {
        delivered: Arc::clone(&delivered),
        pause_every: 500,
    };

    let policy = AsyncPolicy::default()
        .with_buffer_size(8)
        .with_block_on_full(true);
    let hook = Arc::new(Hook::new(Box::new(sink), policy).unwrap());
    flood(&hook);
    assert!(hook.shutdown(Duration::from_secs(10)));

    let total = (PRODUCERS * PER_PRODUCER) as u64;
    assert_eq!(hook.metrics().dropped_count(), 0);
    assert_eq!(hook.metrics().enqueued_count(), total);
    assert_eq!(delivered.load(Ordering::SeqCst), total);
}

#[test]
fn test_per_producer_order_preserved() {
    let seen = Arc::new(Mutex::new(HashMap::new()));
    let sink = SequenceSink {
        seen: Arc::clone(&seen),
    };

    let policy = AsyncPolicy::default()
        .with_buffer_size(64)
        .with_block_on_full(true);
    let hook = Arc::new(Hook::new(Box::new(sink), policy).unwrap());
    flood(&hook);
    assert!(hook.shutdown(Duration::from_secs(10)));

    let seen = seen.lock();
    assert_eq!(seen.len(), PRODUCERS);
    let expected: Vec<i64> = (0..PER_PRODUCER as i64).collect();
    for sequence in seen.values() {
        assert_eq!(*sequence, expected);
    }
}

#[test]
fn test_panicking_sink_keeps_worker_alive() {
    struct Flaky {
        calls: u64,
        delivered: Arc<AtomicU64>,
    }

    impl Sink for Flaky {
        fn deliver(&mut self, _record: &LogRecord) -> Result<()> {
            self.calls += 1;
            if self.calls % 10 == 0 {
                panic!("sink exploded");
            }
            self.delivered.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    let delivered = Arc::new(AtomicU64::new(0));
    let sink = Flaky {
        calls: 0,
        delivered: Arc::clone(&delivered),
    };
    let hook = Hook::new(Box::new(sink), AsyncPolicy::default().with_buffer_size(1024)).unwrap();

    for _ in 0..100 {
        hook.fire(&LogRecord::new(LogLevel::Error, "boom?")).unwrap();
    }
    assert!(hook.shutdown(Duration::from_secs(5)));

    assert_eq!(delivered.load(Ordering::SeqCst), 90);
    assert_eq!(hook.metrics().failed_count(), 10);
    assert_eq!(hook.metrics().delivered_count(), 90);
}

#[test]
fn test_logger_under_concurrent_load() {
    let delivered = Arc::new(AtomicU64::new(0));
    let sink = CountingSink {
        delivered: Arc::clone(&delivered),
        pause_every: 0,
    };
    let policy = AsyncPolicy::default().with_block_on_full(true);

    let logger = Arc::new(
        Logger::builder()
            .writer(std::io::sink())
            .hook(Hook::new(Box::new(sink), policy).unwrap())
            .build(),
    );

    let handles: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let logger = Arc::clone(&logger);
            thread::spawn(move || {
                for i in 0..PER_PRODUCER {
                    logger.log_with_fields(LogLevel::Warn, "concurrent", [("producer", p as i64), ("seq", i as i64)]);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("producer panicked");
    }

    assert!(logger.shutdown(Duration::from_secs(10)));
    assert_eq!(delivered.load(Ordering::SeqCst), (PRODUCERS * PER_PRODUCER) as u64);
}

#[test]
fn test_fire_racing_shutdown_accounts_for_every_record() {
    for policy in [
        AsyncPolicy::default().with_buffer_size(32),
        AsyncPolicy::default().with_buffer_size(32).with_block_on_full(true),
    ] {
        for _ in 0..20 {
            let delivered = Arc::new(AtomicU64::new(0));
            let sink = CountingSink {
                delivered: Arc::clone(&delivered),
                pause_every: 50,
            };
            let hook = Arc::new(Hook::new(Box::new(sink), policy).unwrap());
            let fired = Arc::new(AtomicU64::new(0));

            let producers: Vec<_> = (0..4)
                .map(|_| {
                    let hook = Arc::clone(&hook);
                    let fired = Arc::clone(&fired);
                    thread::spawn(move || {
                        for _ in 0..500 {
                            hook.fire(&LogRecord::new(LogLevel::Info, "racing")).unwrap();
                            fired.fetch_add(1, Ordering::SeqCst);
                        }
                    })
                })
                .collect();

            thread::sleep(Duration::from_millis(2));
            assert!(hook.shutdown(Duration::from_secs(5)));
            for producer in producers {
                producer.join().expect("producer panicked");
            }

            let metrics = hook.metrics();
            let total = fired.load(Ordering::SeqCst);
            assert_eq!(total, 2_000);
            assert_eq!(
                metrics.delivered_count() + metrics.failed_count() + metrics.dropped_count(),
                total
            );
            assert_eq!(delivered.load(Ordering::SeqCst), metrics.delivered_count());
        }
    }
}
