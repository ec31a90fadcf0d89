//! Basic logger usage example
//!
//! Demonstrates the base output, level filtering, structured fields and a
//! synchronous hook.
//!
//! Run with: cargo run --example basic_usage

use log_hooks::prelude::*;
use std::time::Duration;

/// Prints alert-level records to stdout
struct AlertPrinter;

impl Sink for AlertPrinter {
    fn deliver(&mut self, record: &LogRecord) -> Result<()> {
        println!("   [alert hook] {} {}", record.level, record.message);
        Ok(())
    }

    fn name(&self) -> &str {
        "alert-printer"
    }

    fn levels(&self) -> &[LogLevel] {
        &LogLevel::ALERTS
    }
}

fn main() -> Result<()> {
    println!("=== log_hooks - Basic Usage Example ===\n");

    let logger = Logger::builder()
        .name("basic")
        .min_level(LogLevel::Trace)
        .writer(std::io::stdout())
        .hook(Hook::new(Box::new(AlertPrinter), AsyncPolicy::sync())?)
        .build();

    println!("1. Logging at different levels:");
    logger.trace("This is a trace message");
    logger.debug("This is a debug message");
    logger.info("This is an info message");
    logger.warn("This is a warning message");
    logger.error("This is an error message");
    logger.fatal("This is a fatal message");

    println!("\n2. Logging with different minimum levels:");
    logger.set_min_level(LogLevel::Info);
    println!("   Minimum level set to INFO - trace and debug won't show:");
    logger.trace("Trace message (hidden)");
    logger.debug("Debug message (hidden)");
    logger.info("Info message (visible)");

    println!("\n3. Structured fields:");
    logger.log_with_fields(
        LogLevel::Warn,
        "Disk almost full",
        [("mount", FieldValue::from("/var")), ("used_pct", FieldValue::from(93))],
    );

    logger.shutdown(Duration::from_secs(1));
    println!("\n=== Example completed successfully! ===");

    Ok(())
}
