//! Sink trait for hook delivery destinations

use super::{error::Result, log_level::LogLevel, log_record::LogRecord};

/// One concrete destination behind a uniform, blocking delivery contract.
///
/// `deliver` performs the destination-specific I/O for exactly one record.
pub trait Sink: Send {
    fn deliver(&mut self, record: &LogRecord) -> Result<()>;

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str;

    /// Levels this sink accepts; records at other levels never reach it
    fn levels(&self) -> &[LogLevel] {
        &LogLevel::ALL
    }
}
