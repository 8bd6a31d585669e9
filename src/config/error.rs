//! Config-layer error type.

use thiserror::Error;

/// Fatal configuration problems; all are detected at startup, never at request time.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidValue { var: &'static str, reason: String },

    #[error("{var} lists no usable entries after parsing")]
    Empty { var: &'static str },

    #[error("port {0} is out of the valid TCP range")]
    InvalidPort(u32),
}
