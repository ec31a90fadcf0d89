//! Error types for hook construction and delivery

use std::fmt;

pub type Result<T> = std::result::Result<T, HookError>;

#[derive(Debug, thiserror::Error)]
pub enum HookError {
    /// A required setting key is absent
    #[error("Missing required setting '{setting}' for hook '{hook}'")]
    MissingSetting { hook: String, setting: String },

    /// A setting is present but cannot be used
    #[error("Invalid configuration for hook '{hook}': {message}")]
    Config { hook: String, message: String },

    /// A configured directory does not exist
    #[error("Log path '{path}' does not exist")]
    PathNotFound { path: String },

    /// The sink could not be reached while building the hook
    #[error("Unable to connect for hook '{hook}': {message}")]
    Connection { hook: String, message: String },

    /// A single delivery attempt failed at runtime
    #[error("Delivery to sink '{sink}' failed: {message}")]
    Delivery { sink: String, message: String },

    /// No constructor is registered for the hook type tag
    #[error("Unknown hook type '{0}'")]
    UnknownHookType(String),

    /// Invalid logger level name
    #[error("Invalid log level: '{0}'")]
    InvalidLevel(String),

    /// File rotation error
    #[error("File rotation failed for '{path}': {message}")]
    Rotation { path: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HookError {
    pub fn missing_setting(hook: impl Into<String>, setting: impl Into<String>) -> Self {
        HookError::MissingSetting {
            hook: hook.into(),
            setting: setting.into(),
        }
    }

    pub fn config(hook: impl Into<String>, message: impl Into<String>) -> Self {
        HookError::Config {
            hook: hook.into(),
            message: message.into(),
        }
    }

    pub fn path_not_found(path: impl Into<String>) -> Self {
        HookError::PathNotFound { path: path.into() }
    }

    pub fn connection(hook: impl Into<String>, message: impl Into<String>) -> Self {
        HookError::Connection {
            hook: hook.into(),
            message: message.into(),
        }
    }

    pub fn delivery(sink: impl Into<String>, message: impl Into<String>) -> Self {
        HookError::Delivery {
            sink: sink.into(),
            message: message.into(),
        }
    }

    pub fn rotation(path: impl Into<String>, message: impl Into<String>) -> Self {
        HookError::Rotation {
            path: path.into(),
            message: message.into(),
        }
    }

    /// True for failures caused by settings rather than the environment
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            HookError::MissingSetting { .. } | HookError::Config { .. } | HookError::UnknownHookType(_)
        )
    }
}

/// Every hook construction failure from one initialization pass.
#[derive(Debug, Default)]
pub struct InitErrors {
    errors: Vec<(String, HookError)>,
}

impl InitErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, hook_type: impl Into<String>, error: HookError) {
        self.errors.push((hook_type.into(), error));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &HookError)> {
        self.errors.iter().map(|(t, e)| (t.as_str(), e))
    }

    pub fn into_inner(self) -> Vec<(String, HookError)> {
        self.errors
    }
}

impl fmt::Display for InitErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self
            .errors
            .iter()
            .map(|(hook_type, e)| format!("init log hook {} fail: {}", hook_type, e))
            .collect();
        write!(f, "{}", messages.join(" "))
    }
}
