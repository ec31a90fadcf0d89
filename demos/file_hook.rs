//! File hook example
//!
//! Configures a logger from a JSON hook list, the way it would be read from
//! an environment variable, and writes JSON records to a daily file.
//!
//! Run with: cargo run --example file_hook

use log_hooks::prelude::*;
use std::time::Duration;

fn main() -> Result<()> {
    println!("=== log_hooks - File Hook Example ===\n");

    let dir = std::env::temp_dir().join("log_hooks_demo");
    std::fs::create_dir_all(&dir)?;

    let hooks = format!(
        r#"[
            {{"type": "file", "settings": {{"name": "app.log", "path": "{}", "keep": "3", "levels": "info,warning,error"}}}},
            {{"type": "carrier-pigeon"}}
        ]"#,
        dir.display()
    );

    let config = LogConfig {
        name: Some("file-demo".to_string()),
        level: "debug".to_string(),
        format: LogFormat::Json,
        hooks: HookSpecs::from_json(&hooks)?,
        ..LogConfig::default()
    };

    let (logger, errors) = config.new_logger()?;
    if let Some(errors) = errors {
        println!("Some hooks failed to start: {}\n", errors);
    }

    logger.debug("Only on stderr");
    logger.info("Application started");
    logger.log_with_fields(LogLevel::Warn, "Cache miss", [("key", "user:42")]);
    logger.error("Upstream unavailable");

    logger.shutdown(Duration::from_secs(2));

    println!("\nLog files in {}:", dir.display());
    for entry in std::fs::read_dir(&dir)? {
        let entry = entry?;
        println!("   {}", entry.file_name().to_string_lossy());
    }

    println!("\n=== Example completed successfully! ===");
    Ok(())
}
