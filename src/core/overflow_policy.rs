//! Async delivery policy
//!
//! Decides whether a hook delivers on the caller's thread or through a
//! bounded queue, and what happens when that queue is full.

use super::error::{HookError, Result};
use super::settings::Settings;
use std::fmt;
use std::sync::Arc;

/// Default capacity of a hook's delivery queue
pub const DEFAULT_ASYNC_BUFFER_SIZE: usize = 100_000;

/// What a producer does when the delivery queue is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Discard the new record and return immediately
    ///
    /// The drop is counted and reported through the operational log, never
    /// surfaced to the caller.
    #[default]
    DropNewest,

    /// Block the producer until the worker frees a slot
    ///
    /// Warning: this turns a slow sink into application latency.
    Block,
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverflowPolicy::DropNewest => write!(f, "DropNewest"),
            OverflowPolicy::Block => write!(f, "Block"),
        }
    }
}

/// Async settings shared by every hook type.
///
/// # Example
///
/// ```
/// use log_hooks::AsyncPolicy;
///
/// let policy = AsyncPolicy::default();
/// assert!(policy.enabled);
/// assert_eq!(policy.buffer_size, 100_000);
/// assert!(!policy.block_on_full);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AsyncPolicy {
    pub enabled: bool,
    pub buffer_size: usize,
    /// Ignored when `enabled` is false
    pub block_on_full: bool,
}

impl Default for AsyncPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            buffer_size: DEFAULT_ASYNC_BUFFER_SIZE,
            block_on_full: false,
        }
    }
}

impl AsyncPolicy {
    /// Synchronous delivery on the caller's thread
    #[must_use]
    pub fn sync() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    #[must_use]
    pub fn with_block_on_full(mut self, block: bool) -> Self {
        self.block_on_full = block;
        self
    }

    /// Read `async_enable`, `async_buffer_size` and `async_block`, starting
    /// from `defaults`.
    ///
    /// A malformed buffer size keeps the default and logs a warning.
    pub fn from_settings(settings: &Settings<'_>, defaults: AsyncPolicy) -> Self {
        let mut policy = defaults;

        if let Some(enabled) = settings.flag("async_enable") {
            policy.enabled = enabled;
        }

        if let Some(raw) = settings.get("async_buffer_size") {
            match raw.trim().parse::<usize>() {
                Ok(size) => policy.buffer_size = size,
                Err(_) => {
                    tracing::warn!(
                        target: "log_hooks",
                        logger_hook = settings.hook(),
                        value = raw,
                        default = policy.buffer_size,
                        "async_buffer_size is not a valid integer, using the default value"
                    );
                }
            }
        }

        if let Some(block) = settings.flag("async_block") {
            policy.block_on_full = block;
        }

        policy
    }

    /// Reject configurations that cannot work
    pub fn validate(&self, hook: &str) -> Result<()> {
        if self.enabled && self.buffer_size == 0 {
            return Err(HookError::config(
                hook,
                "async_buffer_size must be greater than 0 when async delivery is enabled",
            ));
        }
        Ok(())
    }

    pub fn overflow_policy(&self) -> OverflowPolicy {
        if self.block_on_full {
            OverflowPolicy::Block
        } else {
            OverflowPolicy::DropNewest
        }
    }
}

/// Callback type for overflow notifications
///
/// Called when records are dropped due to queue overflow.
/// The parameter is the total count of dropped records so far.
pub type OverflowCallback = Arc<dyn Fn(u64) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::settings::SettingsMap;

    fn settings_from(pairs: &[(&str, &str)]) -> SettingsMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_async_settings_table() {
        let cases = [
            (settings_from(&[]), true, DEFAULT_ASYNC_BUFFER_SIZE, false),
            (
                settings_from(&[
                    ("async_enable", "0"),
                    ("async_buffer_size", "1000"),
                    ("async_block", "1"),
                ]),
                false,
                1000,
                true,
            ),
            (
                settings_from(&[
                    ("async_enable", "1"),
                    ("async_buffer_size", "2000"),
                    ("async_block", "0"),
                ]),
                true,
                2000,
                false,
            ),
        ];

        for (map, enabled, size, block) in cases {
            let policy = AsyncPolicy::from_settings(&Settings::new("file", &map), AsyncPolicy::default());
            assert_eq!(policy.enabled, enabled);
            assert_eq!(policy.buffer_size, size);
            assert_eq!(policy.block_on_full, block);
        }
    }

    #[test]
    fn test_invalid_buffer_size_keeps_default() {
        let map = settings_from(&[("async_buffer_size", "lots")]);
        let policy = AsyncPolicy::from_settings(&Settings::new("file", &map), AsyncPolicy::default());
        assert_eq!(policy.buffer_size, DEFAULT_ASYNC_BUFFER_SIZE);
    }

    #[test]
    fn test_zero_buffer_rejected() {
        let policy = AsyncPolicy::default().with_buffer_size(0);
        assert!(matches!(policy.validate("file"), Err(HookError::Config { .. })));

        // Irrelevant when delivery is synchronous
        let policy = AsyncPolicy::sync().with_buffer_size(0);
        assert!(policy.validate("file").is_ok());
    }

    #[test]
    fn test_overflow_policy_mapping() {
        assert_eq!(AsyncPolicy::default().overflow_policy(), OverflowPolicy::DropNewest);
        assert_eq!(
            AsyncPolicy::default().with_block_on_full(true).overflow_policy(),
            OverflowPolicy::Block
        );
        assert_eq!(OverflowPolicy::Block.to_string(), "Block");
    }
}
