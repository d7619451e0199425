//! Test configuration: file loading, defaults and normalization.
mod loader;
mod normalize;
pub mod types;


pub use loader::load_config;
pub use normalize::rewrite_for_container;
pub use types::{
    ConfigFile, DEFAULT_CONNECTIONS, DEFAULT_DURATION_SECS, DEFAULT_METHOD, DEFAULT_RPS,
    DEFAULT_TIMEOUT_SECS, TestConfig, TestConfigRequest,
};

#[cfg(test)]
pub(crate) use loader::load_config_file;
