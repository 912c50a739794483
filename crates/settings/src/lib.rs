//! Persistent NEXUS configuration.
//! NEXUS 的設定檔讀寫。

pub mod config;

pub use config::{
    default_config_path, ConfigError, ConfigStore, NexusConfig, ResolveConfig, RetryConfig,
    SharedConfig, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_INTERVAL_MS,
};
