#[allow(clippy::module_inception)] mod config;
mod error;

#[cfg(test)] mod config_test;

pub use config::QueueConfig;
pub use error::ConfigError;
