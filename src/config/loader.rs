//! Environment-variable configuration loading.
//!
//! The relay takes every setting from the process environment; there is no
//! config file layer (the system this was distilled from has none either).

use super::error::ConfigError;
use super::logging::{LogFormat, LogLevel, LoggingConfig};
use super::types::Config;
use std::env;
use std::str::FromStr;

/// Load configuration from environment variables, falling back to the
/// documented defaults for anything unset. Returns a [`ConfigError`] only for
/// values that are present but unparseable.
pub fn load() -> Result<Config, ConfigError> {
    let mut config = Config::default();

    if let Ok(name) = env::var("RELAY_SERVICE_NAME") {
        if !name.trim().is_empty() {
            config.service_name = name;
        }
    }

    if let Some(port) = parse_env("PORT", |s| s.parse::<u16>().ok())? {
        config.port = port;
    }

    if let Ok(origins) = env::var("RELAY_ALLOWED_ORIGINS") {
        if !origins.trim().is_empty() {
            config.allowed_origins = origins;
        }
    }

    if let Ok(backends) = env::var("RELAY_ALLOWED_BACKENDS") {
        let parsed = split_csv(&backends);
        if !parsed.is_empty() {
            config.allowed_backends = parsed;
        }
    }

    if let Ok(host) = env::var("RELAY_DEFAULT_BACKEND_HOST") {
        if !host.trim().is_empty() {
            config.default_backend_host = host;
        }
    }

    if let Some(port) = parse_env("RELAY_DEFAULT_BACKEND_PORT", |s| s.parse::<u16>().ok())? {
        config.default_backend_port = port;
    }

    if let Ok(list) = env::var("SERVER_LIST") {
        config.server_list = split_csv(&list);
    }

    if let Ok(token) = env::var("RELAY_AUTH_TOKEN") {
        config.auth_token = Some(token);
    }

    if let Some(idle) = parse_env("RELAY_IDLE_SEC", |s| s.parse::<u64>().ok())? {
        config.idle_sec = idle;
    }

    if let Some(low_water) = parse_env("RELAY_DATACHANNEL_BUFFERED_AMOUNT_LOW_WATER", |s| {
        s.parse::<usize>().ok()
    })? {
        config.datachannel_buffered_amount_low_water = low_water;
    }

    if let Some(enabled) = parse_env("RELAY_ENABLE_SIGNALING_CLIENT_INITIATED", parse_bool)? {
        config.enable_signaling_client_initiated = enabled;
    }

    if let Some(timeout) = parse_env("RELAY_QUERY_TIMEOUT_MS", |s| s.parse::<u64>().ok())? {
        config.query_timeout_ms = timeout;
    }

    if let Some(timeout) = parse_env("RELAY_ANSWER_TIMEOUT_SECS", |s| s.parse::<u64>().ok())? {
        config.answer_timeout_secs = timeout;
    }

    if let Some(enabled) = parse_env("RELAY_ENABLE_SERVER_DISCOVERY", parse_bool)? {
        config.enable_server_discovery = enabled;
    }

    if let Ok(ports) = env::var("RELAY_DISCOVERY_PORTS") {
        let parsed: Vec<u16> = split_csv(&ports).iter().filter_map(|p| p.parse().ok()).collect();
        if !parsed.is_empty() {
            config.discovery_ports = parsed;
        }
    }

    config.logging = load_logging()?;

    Ok(config)
}

fn load_logging() -> Result<LoggingConfig, ConfigError> {
    let mut logging = LoggingConfig::default();

    if let Ok(dir) = env::var("RELAY_LOG_DIR") {
        if !dir.trim().is_empty() {
            logging.dir = Some(dir);
        }
    }

    if let Some(format) = parse_env("RELAY_LOG_FORMAT", |s| LogFormat::from_str(s).ok())? {
        logging.format = format;
    }

    if let Some(level) = parse_env("RELAY_LOG_LEVEL", |s| LogLevel::from_str(s).ok())? {
        logging.level = Some(level);
    }

    if let Ok(name) = env::var("RELAY_SERVICE_NAME") {
        if !name.trim().is_empty() {
            logging.service_name = name;
        }
    }

    Ok(logging)
}

/// Split a comma-separated env value into trimmed, non-empty entries.
fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Read and parse an env var, turning an unset var into `None` and a
/// present-but-unparseable var into a [`ConfigError`].
fn parse_env<T>(
    var: &'static str,
    parse: impl FnOnce(&str) -> Option<T>,
) -> Result<Option<T>, ConfigError> {
    match env::var(var) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => parse(&raw).map(Some).ok_or_else(|| ConfigError::InvalidValue {
            var,
            reason: format!("could not parse '{raw}'"),
        }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for var in [
            "PORT",
            "RELAY_ALLOWED_ORIGINS",
            "RELAY_ALLOWED_BACKENDS",
            "RELAY_DEFAULT_BACKEND_HOST",
            "RELAY_DEFAULT_BACKEND_PORT",
            "SERVER_LIST",
            "RELAY_AUTH_TOKEN",
            "RELAY_IDLE_SEC",
            "RELAY_DATACHANNEL_BUFFERED_AMOUNT_LOW_WATER",
            "RELAY_ENABLE_SIGNALING_CLIENT_INITIATED",
            "RELAY_QUERY_TIMEOUT_MS",
            "RELAY_ANSWER_TIMEOUT_SECS",
            "RELAY_ENABLE_SERVER_DISCOVERY",
            "RELAY_DISCOVERY_PORTS",
            "RELAY_LOG_DIR",
            "RELAY_LOG_FORMAT",
            "RELAY_LOG_LEVEL",
            "RELAY_SERVICE_NAME",
        ] {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn loads_defaults_when_env_unset() {
        clear_env();
        let config = load().unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.idle_sec, 300);
    }

    #[test]
    #[serial]
    fn overrides_from_env() {
        clear_env();
        env::set_var("PORT", "9000");
        env::set_var("RELAY_ALLOWED_BACKENDS", "10.13.13.0/24, 127.0.0.1/32");
        env::set_var("RELAY_AUTH_TOKEN", "s3cret");
        let config = load().unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(
            config.allowed_backends,
            vec!["10.13.13.0/24".to_string(), "127.0.0.1/32".to_string()]
        );
        assert!(config.auth_required());
        clear_env();
    }

    #[test]
    #[serial]
    fn discovery_is_off_by_default_with_standard_ports() {
        clear_env();
        let config = load().unwrap();
        assert!(!config.enable_server_discovery);
        assert_eq!(config.discovery_ports, vec![27015, 27016, 27017, 27018, 27019]);
    }

    #[test]
    #[serial]
    fn discovery_settings_override_from_env() {
        clear_env();
        env::set_var("RELAY_ENABLE_SERVER_DISCOVERY", "true");
        env::set_var("RELAY_DISCOVERY_PORTS", "27020,27021");
        let config = load().unwrap();
        assert!(config.enable_server_discovery);
        assert_eq!(config.discovery_ports, vec![27020, 27021]);
        clear_env();
    }

    #[test]
    #[serial]
    fn rejects_unparseable_port() {
        clear_env();
        env::set_var("PORT", "not-a-port");
        let result = load();
        assert!(result.is_err());
        clear_env();
    }
}
