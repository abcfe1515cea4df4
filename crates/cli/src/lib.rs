//! `stockroom` command-line entry point: configuration and the demo run.

pub mod config;
pub mod demo;

pub use config::{Config, ConfigError};
