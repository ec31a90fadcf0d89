//! Hook registry: sink-type tags to constructors
//!
//! A [`HookSpec`] names a sink type and carries its raw string settings. The
//! registry looks up the constructor for the type, checks the type's required
//! keys, reads the async policy from the same settings, and wraps the
//! resulting sink in a [`Hook`].
//! [`HookRegistry::build_all`] attempts every spec and reports all failures
//! together instead of stopping at the first one.

use super::file::{self, FileHookConfig, FileSink};
use crate::core::error::{HookError, InitErrors, Result};
use crate::core::formatter::{Formatter, TextFormatter};
use crate::core::hook::Hook;
use crate::core::overflow_policy::{AsyncPolicy, OverflowCallback};
use crate::core::settings::{Settings, SettingsMap};
use crate::core::sink::Sink;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// One configured hook: a type tag plus string settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookSpec {
    #[serde(rename = "type", default)]
    pub hook_type: String,
    #[serde(default)]
    pub settings: SettingsMap,
}

impl HookSpec {
    pub fn new(hook_type: impl Into<String>) -> Self {
        Self {
            hook_type: hook_type.into(),
            settings: SettingsMap::new(),
        }
    }

    #[must_use]
    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }
}

/// Shared inputs handed to every sink constructor
#[derive(Clone)]
pub struct BuildContext {
    /// Formatter for sinks that render records themselves
    pub formatter: Arc<dyn Formatter>,
    /// Starting point for each hook's async settings
    pub async_defaults: AsyncPolicy,
    pub on_overflow: Option<OverflowCallback>,
}

impl BuildContext {
    pub fn new(formatter: Arc<dyn Formatter>) -> Self {
        Self {
            formatter,
            async_defaults: AsyncPolicy::default(),
            on_overflow: None,
        }
    }

    #[must_use]
    pub fn with_async_defaults(mut self, defaults: AsyncPolicy) -> Self {
        self.async_defaults = defaults;
        self
    }

    #[must_use]
    pub fn with_overflow_callback(mut self, callback: OverflowCallback) -> Self {
        self.on_overflow = Some(callback);
        self
    }
}

impl Default for BuildContext {
    fn default() -> Self {
        Self::new(Arc::new(TextFormatter::new()))
    }
}

/// Builds a sink from validated settings
pub type SinkConstructor = fn(&Settings<'_>, &BuildContext) -> Result<Box<dyn Sink>>;

/// Hooks that were built plus every failure from the same pass
#[derive(Debug, Default)]
pub struct BuildOutcome {
    pub hooks: Vec<Hook>,
    pub errors: InitErrors,
}

impl BuildOutcome {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// Split into the hooks and, if anything failed, the collected errors
    pub fn into_parts(self) -> (Vec<Hook>, Option<InitErrors>) {
        let errors = if self.errors.is_empty() {
            None
        } else {
            Some(self.errors)
        };
        (self.hooks, errors)
    }
}

/// A registered sink type
#[derive(Clone, Copy)]
struct Registration {
    required: &'static [&'static str],
    constructor: SinkConstructor,
}

pub struct HookRegistry {
    types: HashMap<String, Registration>,
}

impl HookRegistry {
    /// Registry with no sink types
    pub fn new() -> Self {
        Self {
            types: HashMap::new(),
        }
    }

    /// Registry with the built-in `file`, `redis` and `sentry` types, as far
    /// as their features are enabled
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(file::HOOK_TYPE, file::REQUIRED_SETTINGS, build_file_sink);
        #[cfg(feature = "redis")]
        registry.register(
            super::redis::HOOK_TYPE,
            super::redis::REQUIRED_SETTINGS,
            build_redis_sink,
        );
        #[cfg(feature = "sentry")]
        registry.register(
            super::sentry::HOOK_TYPE,
            super::sentry::REQUIRED_SETTINGS,
            build_sentry_sink,
        );
        registry
    }

    /// Register `constructor` for `hook_type`, returning the one it replaces.
    ///
    /// `required` keys are checked before anything else about a spec, so a
    /// missing key is reported as `MissingSetting` even when other settings
    /// are also wrong.
    pub fn register(
        &mut self,
        hook_type: impl Into<String>,
        required: &'static [&'static str],
        constructor: SinkConstructor,
    ) -> Option<SinkConstructor> {
        self.types
            .insert(hook_type.into(), Registration { required, constructor })
            .map(|previous| previous.constructor)
    }

    pub fn contains(&self, hook_type: &str) -> bool {
        self.types.contains_key(hook_type)
    }

    /// Registered type tags, sorted
    pub fn types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.types.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Build one hook.
    ///
    /// Required keys are checked first, then the async policy, and only then
    /// is the sink constructed, so invalid settings never open a connection.
    ///
    /// # Errors
    ///
    /// `UnknownHookType` for an unregistered tag, `MissingSetting` for an
    /// absent required key, otherwise whatever the policy check or the sink
    /// constructor reports.
    pub fn build(&self, spec: &HookSpec, ctx: &BuildContext) -> Result<Hook> {
        let registration = self
            .types
            .get(&spec.hook_type)
            .ok_or_else(|| HookError::UnknownHookType(spec.hook_type.clone()))?;

        let settings = Settings::new(&spec.hook_type, &spec.settings);
        settings.require(registration.required)?;
        let policy = AsyncPolicy::from_settings(&settings, ctx.async_defaults);
        policy.validate(&spec.hook_type)?;

        let sink = (registration.constructor)(&settings, ctx)?;
        Hook::with_overflow_callback(sink, policy, ctx.on_overflow.clone())
    }

    /// Build every spec, keeping the hooks that succeed
    pub fn build_all<'a, I>(&self, specs: I, ctx: &BuildContext) -> BuildOutcome
    where
        I: IntoIterator<Item = &'a HookSpec>,
    {
        let mut outcome = BuildOutcome::default();

        for spec in specs {
            match self.build(spec, ctx) {
                Ok(hook) => {
                    tracing::debug!(
                        target: "log_hooks",
                        logger_hook = %spec.hook_type,
                        async_delivery = hook.is_async(),
                        "initialized log hook"
                    );
                    outcome.hooks.push(hook);
                }
                Err(e) => {
                    tracing::error!(
                        target: "log_hooks",
                        logger_hook = %spec.hook_type,
                        error = %e,
                        "failed to initialize log hook"
                    );
                    outcome.errors.push(spec.hook_type.clone(), e);
                }
            }
        }

        outcome
    }
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn build_file_sink(settings: &Settings<'_>, ctx: &BuildContext) -> Result<Box<dyn Sink>> {
    let config = FileHookConfig::from_settings(settings)?;
    Ok(Box::new(FileSink::new(config, Arc::clone(&ctx.formatter))))
}

#[cfg(feature = "redis")]
fn build_redis_sink(settings: &Settings<'_>, _ctx: &BuildContext) -> Result<Box<dyn Sink>> {
    let config = super::redis::RedisHookConfig::from_settings(settings)?;
    Ok(Box::new(super::redis::RedisSink::connect(config)?))
}

#[cfg(feature = "sentry")]
fn build_sentry_sink(settings: &Settings<'_>, _ctx: &BuildContext) -> Result<Box<dyn Sink>> {
    let config = super::sentry::SentryHookConfig::from_settings(settings)?;
    Ok(Box::new(super::sentry::SentrySink::connect(&config)?))
}
