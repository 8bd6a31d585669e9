//! Post-load configuration validation.

use super::error::ConfigError;
use super::types::Config;
use crate::policy::BackendPolicy;

/// Validate a loaded [`Config`], independent of how it was assembled. Called
/// once at startup; failures are fatal (see §7 `ConfigError`).
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.port == 0 {
        return Err(ConfigError::InvalidPort(0));
    }

    let policy = BackendPolicy::parse(&config.allowed_backends).map_err(|err| ConfigError::InvalidValue {
        var: "RELAY_ALLOWED_BACKENDS",
        reason: err.to_string(),
    })?;

    if policy.is_empty() {
        return Err(ConfigError::Empty {
            var: "RELAY_ALLOWED_BACKENDS",
        });
    }

    Ok(())
}
