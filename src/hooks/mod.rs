//! Built-in sink adapters and the hook registry

pub mod file;
pub mod redis;
pub mod registry;
pub mod sentry;

pub use self::file::{FileHookConfig, FileSink};
pub use self::redis::{ListStore, MessageShape, RedisHookConfig, RedisSink};
pub use self::registry::{BuildContext, BuildOutcome, HookRegistry, HookSpec, SinkConstructor};
pub use self::sentry::{EventCollector, SentryHookConfig, SentrySink};
