//! Bounded async delivery channel
//!
//! Each async hook owns one channel: a fixed-capacity queue fed by any number
//! of producer threads and drained in FIFO order by a single worker thread
//! that calls the sink. The queue is the only handoff point between the two
//! sides, and `try_send` makes the full/not-full decision atomically.
//!
//! When the queue is full the configured [`OverflowPolicy`] applies:
//! `DropNewest` discards the record and returns at once, `Block` parks the
//! producer until the worker frees a slot.

use super::error::{HookError, Result};
use super::log_record::LogRecord;
use super::metrics::DeliveryMetrics;
use super::overflow_policy::{AsyncPolicy, OverflowCallback, OverflowPolicy};
use super::sink::Sink;
use crossbeam_channel::{bounded, select, Receiver, SendTimeoutError, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Default time allowed for draining a channel when it is dropped without
/// an explicit shutdown
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Extra time granted after the drain deadline for the final sink flush
const FLUSH_GRACE: Duration = Duration::from_millis(200);

/// Emit an overflow warning on the first drop and every this many after
const ALERT_EVERY: u64 = 1000;

/// How often a producer blocked on a full queue rechecks for shutdown
const BLOCK_POLL: Duration = Duration::from_millis(10);

pub struct DeliveryChannel {
    name: String,
    /// Taken on shutdown, which disconnects the queue from the worker's side
    sender: RwLock<Option<Sender<LogRecord>>>,
    shutdown_tx: Sender<Instant>,
    closed: AtomicBool,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
    metrics: Arc<DeliveryMetrics>,
    overflow_policy: OverflowPolicy,
    on_overflow: Option<OverflowCallback>,
    capacity: usize,
}

impl DeliveryChannel {
    /// Start a worker thread that owns `sink` and drains a queue sized by
    /// `policy.buffer_size`.
    ///
    /// # Errors
    ///
    /// `Config` for a zero-capacity queue, `Io` if the worker thread cannot
    /// be spawned.
    pub fn spawn(
        sink: Box<dyn Sink>,
        policy: &AsyncPolicy,
        on_overflow: Option<OverflowCallback>,
    ) -> Result<Self> {
        let name = sink.name().to_string();
        if policy.buffer_size == 0 {
            return Err(HookError::config(
                &name,
                "async_buffer_size must be greater than 0",
            ));
        }

        let (sender, receiver) = bounded(policy.buffer_size);
        let (shutdown_tx, shutdown_rx) = bounded(1);
        let metrics = Arc::new(DeliveryMetrics::new());
        let worker_metrics = Arc::clone(&metrics);

        let handle = thread::Builder::new()
            .name(format!("log-hook-{}", name))
            .spawn(move || Self::run(sink, receiver, shutdown_rx, worker_metrics))?;

        tracing::debug!(
            target: "log_hooks",
            hook = %name,
            capacity = policy.buffer_size,
            policy = %policy.overflow_policy(),
            "started async delivery worker"
        );

        Ok(Self {
            name,
            sender: RwLock::new(Some(sender)),
            shutdown_tx,
            closed: AtomicBool::new(false),
            worker: Mutex::new(Some(handle)),
            metrics,
            overflow_policy: policy.overflow_policy(),
            on_overflow,
            capacity: policy.buffer_size,
        })
    }

    /// Worker loop: deliver one record at a time until the channel is shut
    /// down or every sender is gone.
    fn run(
        mut sink: Box<dyn Sink>,
        receiver: Receiver<LogRecord>,
        shutdown_rx: Receiver<Instant>,
        metrics: Arc<DeliveryMetrics>,
    ) {
        loop {
            select! {
                recv(receiver) -> msg => match msg {
                    Ok(record) => {
                        let _ = deliver_isolated(sink.as_mut(), &record, &metrics);
                    }
                    Err(_) => break,
                },
                recv(shutdown_rx) -> msg => {
                    let deadline = msg.unwrap_or_else(|_| Instant::now());
                    Self::drain(sink.as_mut(), &receiver, &metrics, deadline);
                    break;
                }
            }
        }

        if let Err(e) = sink.flush() {
            tracing::error!(
                target: "log_hooks",
                sink = sink.name(),
                error = %e,
                "log hook flush failed during shutdown"
            );
        }
    }

    /// Deliver whatever is still queued, up to `deadline`
    fn drain(
        sink: &mut dyn Sink,
        receiver: &Receiver<LogRecord>,
        metrics: &DeliveryMetrics,
        deadline: Instant,
    ) {
        while Instant::now() < deadline {
            match receiver.try_recv() {
                Ok(record) => {
                    let _ = deliver_isolated(sink, &record, metrics);
                }
                Err(_) => return,
            }
        }

        let mut abandoned = 0u64;
        while receiver.try_recv().is_ok() {
            metrics.record_dropped();
            abandoned += 1;
        }
        if abandoned > 0 {
            tracing::warn!(
                target: "log_hooks",
                sink = sink.name(),
                abandoned,
                "drain deadline reached, discarding queued records"
            );
        }
    }

    /// Hand a record to the worker without waiting for delivery.
    ///
    /// Never reports an error: overflow and closed-channel drops are counted
    /// and logged instead.
    pub fn send(&self, record: LogRecord) {
        // Held until the record is queued or dropped; shutdown takes the
        // sender only after every in-flight send has finished
        let guard = self.sender.read();
        let sender = match guard.as_ref() {
            Some(sender) if !self.closed.load(Ordering::Acquire) => sender,
            _ => {
                self.metrics.record_dropped();
                return;
            }
        };

        match sender.try_send(record) {
            Ok(()) => {
                self.metrics.record_enqueued();
            }
            Err(TrySendError::Full(record)) => {
                self.handle_overflow(sender, record);
            }
            Err(TrySendError::Disconnected(_)) => {
                // Worker already gone
                self.metrics.record_dropped();
            }
        }
    }

    fn handle_overflow(&self, sender: &Sender<LogRecord>, record: LogRecord) {
        self.metrics.record_queue_full();

        match self.overflow_policy {
            OverflowPolicy::DropNewest => {
                drop(record);
                self.alert_and_drop();
            }
            OverflowPolicy::Block => {
                self.metrics.record_block();
                let mut record = record;
                loop {
                    match sender.send_timeout(record, BLOCK_POLL) {
                        Ok(()) => {
                            self.metrics.record_enqueued();
                            return;
                        }
                        Err(SendTimeoutError::Timeout(pending)) => {
                            if self.closed.load(Ordering::Acquire) {
                                self.metrics.record_dropped();
                                return;
                            }
                            record = pending;
                        }
                        Err(SendTimeoutError::Disconnected(_)) => {
                            self.metrics.record_dropped();
                            return;
                        }
                    }
                }
            }
        }
    }

    fn alert_and_drop(&self) {
        let dropped_count = self.metrics.record_dropped();

        let should_alert = dropped_count == 0 || (dropped_count + 1) % ALERT_EVERY == 0;
        if should_alert {
            tracing::warn!(
                target: "log_hooks",
                hook = %self.name,
                dropped = dropped_count + 1,
                capacity = self.capacity,
                "delivery queue full, dropping log records"
            );

            if let Some(ref callback) = self.on_overflow {
                callback(dropped_count + 1);
            }
        }
    }

    /// Close the queue, let the worker drain it within `timeout`, and join.
    ///
    /// Returns `true` if the worker finished in time. Calling this more than
    /// once is harmless.
    pub fn shutdown(&self, timeout: Duration) -> bool {
        let start = Instant::now();
        self.closed.store(true, Ordering::Release);

        // Waits out in-flight sends; blocked producers see `closed` within
        // BLOCK_POLL. Once the sender is gone nothing new can be queued.
        drop(self.sender.write().take());

        let handle = match self.worker.lock().take() {
            Some(handle) => handle,
            None => return true,
        };

        let _ = self.shutdown_tx.try_send(start + timeout);

        let join_timeout = timeout + FLUSH_GRACE;
        loop {
            if handle.is_finished() {
                if let Err(e) = handle.join() {
                    tracing::error!(
                        target: "log_hooks",
                        hook = %self.name,
                        "delivery worker panicked during shutdown: {:?}",
                        e
                    );
                    return false;
                }
                return true;
            }

            if start.elapsed() >= join_timeout {
                tracing::warn!(
                    target: "log_hooks",
                    hook = %self.name,
                    timeout = ?timeout,
                    "delivery worker did not finish in time, some records may be lost"
                );
                return false;
            }

            thread::sleep(Duration::from_millis(5));
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Records waiting in the queue
    pub fn pending(&self) -> usize {
        self.sender.read().as_ref().map_or(0, Sender::len)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn overflow_policy(&self) -> OverflowPolicy {
        self.overflow_policy
    }

    pub fn metrics(&self) -> &Arc<DeliveryMetrics> {
        &self.metrics
    }
}

impl Drop for DeliveryChannel {
    fn drop(&mut self) {
        if !self.shutdown(DEFAULT_SHUTDOWN_TIMEOUT) {
            return;
        }

        let dropped = self.metrics.dropped_count();
        if dropped > 0 {
            tracing::warn!(
                target: "log_hooks",
                hook = %self.name,
                dropped,
                drop_rate = self.metrics.drop_rate(),
                "delivery channel closed with dropped records"
            );
        }
    }
}

/// Call `sink.deliver` with panic isolation, updating `metrics`.
///
/// Failures are reported through the operational log and also returned so
/// synchronous callers can surface them.
pub(crate) fn deliver_isolated(
    sink: &mut dyn Sink,
    record: &LogRecord,
    metrics: &DeliveryMetrics,
) -> Result<()> {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| sink.deliver(record)));

    let error = match outcome {
        Ok(Ok(())) => {
            metrics.record_delivered();
            return Ok(());
        }
        Ok(Err(e)) => e,
        Err(panic_info) => {
            let panic_msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = panic_info.downcast_ref::<String>() {
                s.clone()
            } else {
                "Unknown panic".to_string()
            };
            HookError::delivery(sink.name(), format!("sink panicked: {}", panic_msg))
        }
    };

    metrics.record_failed();
    tracing::error!(
        target: "log_hooks",
        sink = sink.name(),
        error = %error,
        "log hook delivery failed"
    );
    Err(error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::log_level::LogLevel;
    use crossbeam_channel::Receiver as Gate;

    /// Sink that records messages, optionally waiting on a gate per record
    struct GatedSink {
        delivered: Arc<Mutex<Vec<String>>>,
        gate: Option<Gate<()>>,
        entered: Option<Sender<()>>,
    }

    impl Sink for GatedSink {
        fn deliver(&mut self, record: &LogRecord) -> Result<()> {
            if let Some(ref entered) = self.entered {
                let _ = entered.send(());
            }
            if let Some(ref gate) = self.gate {
                let _ = gate.recv();
            }
            self.delivered.lock().push(record.message.clone());
            Ok(())
        }

        fn name(&self) -> &str {
            "gated"
        }
    }

    struct FailingSink;

    impl Sink for FailingSink {
        fn deliver(&mut self, record: &LogRecord) -> Result<()> {
            if record.message == "panic" {
                panic!("sink exploded");
            }
            Err(HookError::delivery("failing", "destination unavailable"))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    fn record(msg: &str) -> LogRecord {
        LogRecord::new(LogLevel::Info, msg)
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let sink = GatedSink {
            delivered: Arc::new(Mutex::new(Vec::new())),
            gate: None,
            entered: None,
        };
        let policy = AsyncPolicy::default().with_buffer_size(0);
        let result = DeliveryChannel::spawn(Box::new(sink), &policy, None);
        assert!(matches!(result, Err(HookError::Config { .. })));
    }

    #[test]
    fn test_fifo_delivery_and_drain_on_shutdown() {
        let delivered = Arc::new(Mutex::new(Vec::new()));
        let sink = GatedSink {
            delivered: Arc::clone(&delivered),
            gate: None,
            entered: None,
        };
        let channel =
            DeliveryChannel::spawn(Box::new(sink), &AsyncPolicy::default().with_buffer_size(64), None)
                .unwrap();

        for i in 0..50 {
            channel.send(record(&format!("m{}", i)));
        }
        assert!(channel.shutdown(Duration::from_secs(5)));

        let expected: Vec<String> = (0..50).map(|i| format!("m{}", i)).collect();
        assert_eq!(*delivered.lock(), expected);
        assert_eq!(channel.metrics().delivered_count(), 50);
        assert_eq!(channel.metrics().dropped_count(), 0);
    }

    #[test]
    fn test_drop_newest_when_full() {
        let delivered = Arc::new(Mutex::new(Vec::new()));
        let (gate_tx, gate_rx) = bounded::<()>(0);
        let (entered_tx, entered_rx) = bounded::<()>(8);
        let sink = GatedSink {
            delivered: Arc::clone(&delivered),
            gate: Some(gate_rx),
            entered: Some(entered_tx),
        };
        let dropped_seen = Arc::new(std::sync::atomic::AtomicU64::new(0));
        let seen = Arc::clone(&dropped_seen);
        let channel = DeliveryChannel::spawn(
            Box::new(sink),
            &AsyncPolicy::default().with_buffer_size(1),
            Some(Arc::new(move |count| seen.store(count, Ordering::SeqCst))),
        )
        .unwrap();

        // Worker takes the first record and parks inside the sink
        channel.send(record("first"));
        entered_rx.recv().unwrap();

        channel.send(record("second")); // fills the single slot
        channel.send(record("third")); // dropped

        assert_eq!(channel.metrics().dropped_count(), 1);
        assert_eq!(dropped_seen.load(Ordering::SeqCst), 1);

        // Release both deliveries
        gate_tx.send(()).unwrap();
        gate_tx.send(()).unwrap();
        assert!(channel.shutdown(Duration::from_secs(5)));

        assert_eq!(*delivered.lock(), vec!["first".to_string(), "second".to_string()]);
    }

    #[test]
    fn test_failures_do_not_stop_worker() {
        let channel = DeliveryChannel::spawn(
            Box::new(FailingSink),
            &AsyncPolicy::default().with_buffer_size(16),
            None,
        )
        .unwrap();

        channel.send(record("one"));
        channel.send(record("panic"));
        channel.send(record("two"));
        assert!(channel.shutdown(Duration::from_secs(5)));

        assert_eq!(channel.metrics().failed_count(), 3);
        assert_eq!(channel.metrics().delivered_count(), 0);
    }

    #[test]
    fn test_send_after_shutdown_is_dropped() {
        let sink = GatedSink {
            delivered: Arc::new(Mutex::new(Vec::new())),
            gate: None,
            entered: None,
        };
        let channel =
            DeliveryChannel::spawn(Box::new(sink), &AsyncPolicy::default().with_buffer_size(4), None)
                .unwrap();

        assert!(channel.shutdown(Duration::from_secs(1)));
        assert!(channel.is_closed());
        // Second shutdown is a no-op
        assert!(channel.shutdown(Duration::from_secs(1)));

        channel.send(record("late"));
        assert_eq!(channel.metrics().dropped_count(), 1);
        assert_eq!(channel.pending(), 0);
    }
}
