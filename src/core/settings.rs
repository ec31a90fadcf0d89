//! Flat string-keyed hook settings
//!
//! Settings arrive already parsed from whatever configuration source the
//! application uses; this module only validates and converts them.

use super::error::{HookError, Result};
use std::collections::HashMap;
use std::str::FromStr;

/// Raw settings for one hook
pub type SettingsMap = HashMap<String, String>;

/// Read-only view of one hook's settings, tagged with the hook type for
/// error reporting.
#[derive(Debug, Clone, Copy)]
pub struct Settings<'a> {
    hook: &'a str,
    map: &'a SettingsMap,
}

impl<'a> Settings<'a> {
    pub fn new(hook: &'a str, map: &'a SettingsMap) -> Self {
        Self { hook, map }
    }

    pub fn hook(&self) -> &'a str {
        self.hook
    }

    pub fn get(&self, key: &str) -> Option<&'a str> {
        self.map.get(key).map(String::as_str)
    }

    /// Fail with `MissingSetting` on the first absent key
    pub fn require(&self, keys: &[&str]) -> Result<()> {
        for key in keys {
            if !self.map.contains_key(*key) {
                tracing::error!(
                    target: "log_hooks",
                    logger_hook = self.hook,
                    setting = *key,
                    "missing required hook setting"
                );
                return Err(HookError::missing_setting(self.hook, *key));
            }
        }
        Ok(())
    }

    /// Value of a key already checked by [`Settings::require`]
    pub fn required(&self, key: &str) -> Result<&'a str> {
        self.get(key)
            .ok_or_else(|| HookError::missing_setting(self.hook, key))
    }

    /// Parse an optional integer setting; a present but malformed value is a
    /// configuration error.
    pub fn parse_int<T: FromStr>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse::<T>()
                .map(Some)
                .map_err(|_| HookError::config(self.hook, format!("{} should be integer", key))),
        }
    }

    /// `"true"` or `"1"` enable a flag, anything else disables it
    pub fn flag(&self, key: &str) -> Option<bool> {
        self.get(key).map(|v| v == "true" || v == "1")
    }
}
