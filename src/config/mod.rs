//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Top-level config structs and file loading (Config, ServerConfig, LoggingConfig)
//! - [`security`]: Abuse protection configuration (ShieldConfig and its sections)
//! - [`validation`]: Startup validation collecting every error at once

mod security;
mod types;
pub mod validation;

pub use security::{
    AccessConfig, BanConfig, BurstConfig, FingerprintConfig, GlobalConfig, JanitorConfig,
    MAX_BAN_SECS, ShieldConfig, SuspicionConfig,
};
pub use types::{Config, ConfigError, LoggingConfig, ServerConfig};
