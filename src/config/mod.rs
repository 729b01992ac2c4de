//! Configuration module.
//!
//! Supports JSON configuration files, environment variable overrides, and
//! compiled-in defaults:
//!
//! - [`types`]: root `Config` struct and its sections
//! - [`logging`]: logging configuration
//! - [`loader`]: configuration loading and merging
//! - [`validation`]: startup validation
//! - [`defaults`]: default value functions

pub mod defaults;
pub mod loader;
pub mod logging;
pub mod types;
pub mod validation;

pub use loader::load;
pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use types::{Config, JudgeSection, RateLimitSection, SecuritySection, ServerSection};
pub use validation::{is_production_mode, validate_config};
