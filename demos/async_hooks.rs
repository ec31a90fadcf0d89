//! Asynchronous hook delivery example
//!
//! A deliberately slow sink behind a small queue shows that logging calls
//! never wait on it, how overflow is reported, and how shutdown drains what
//! was accepted. Operational warnings from the delivery machinery go through
//! `tracing`; set `RUST_LOG=log_hooks=debug` to see more.
//!
//! Run with: cargo run --example async_hooks

use log_hooks::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

struct SlowSink {
    delay: Duration,
}

impl Sink for SlowSink {
    fn deliver(&mut self, record: &LogRecord) -> Result<()> {
        thread::sleep(self.delay);
        println!("   delivered: {}", record.message);
        Ok(())
    }

    fn name(&self) -> &str {
        "slow"
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("log_hooks=warn")))
        .init();

    println!("=== log_hooks - Async Hooks Example ===\n");

    let overflowed = Arc::new(AtomicU64::new(0));
    let callback: OverflowCallback = {
        let overflowed = Arc::clone(&overflowed);
        Arc::new(move |dropped| overflowed.store(dropped, Ordering::Relaxed))
    };

    let slow = Hook::with_overflow_callback(
        Box::new(SlowSink {
            delay: Duration::from_millis(20),
        }),
        AsyncPolicy::default().with_buffer_size(8),
        Some(callback),
    )?;

    let logger = Logger::builder()
        .writer(std::io::sink())
        .hook(slow)
        .build();

    println!("1. Logging 50 records through a queue of 8:");
    let start = Instant::now();
    for i in 0..50 {
        logger.info(&format!("record {}", i));
    }
    println!("   all calls returned after {:?}", start.elapsed());

    println!("\n2. Draining on shutdown:");
    let drained = logger.shutdown(Duration::from_secs(5));
    println!("   drained in time: {}", drained);

    logger.with_hooks(|hooks| {
        for hook in hooks {
            let m = hook.metrics();
            println!(
                "\n3. Metrics for '{}': enqueued={} delivered={} dropped={} drop_rate={:.1}%",
                hook.name(),
                m.enqueued_count(),
                m.delivered_count(),
                m.dropped_count(),
                m.drop_rate()
            );
        }
    });
    println!("   overflow callback last reported {} dropped", overflowed.load(Ordering::Relaxed));

    println!("\n=== Example completed successfully! ===");
    Ok(())
}
