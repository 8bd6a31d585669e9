//! Configuration: environment parsing, validation, and defaults.
//!
//! # Module Structure
//!
//! - [`types`]: root [`Config`] struct
//! - [`logging`]: logging configuration (format, level, rotation)
//! - [`loader`]: environment variable loading
//! - [`validation`]: post-load validation (fatal at startup on failure)
//! - [`defaults`]: default value functions backing every field
//! - [`error`]: [`ConfigError`]

pub mod defaults;
pub mod error;
pub mod loader;
pub mod logging;
pub mod types;
pub mod validation;

pub use error::ConfigError;
pub use loader::load;
pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use types::Config;
pub use validation::validate;
