use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name of the environment variable overriding the configured base port.
const BASE_PORT_ENV_NAME: &str = "TESTKIT_BASE_PORT";

/// Name of the environment variable pointing at the Postgres binaries directory.
const PG_BIN_ENV_NAME: &str = "PG_BIN";

/// Base port used when [`BASE_PORT_ENV_NAME`] is not set.
///
/// Each test module claims a pair of consecutive ports starting from an even
/// offset above this value, so the default leaves plenty of room below the
/// ephemeral range.
pub const DEFAULT_BASE_PORT: u16 = 20000;

/// Process-wide harness settings, loaded from the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct HarnessConfig {
    /// First port of the range test modules allocate from.
    pub base_port: u16,
    /// Directory holding `initdb`, `pg_ctl` and `pg_config`.
    ///
    /// When absent, binaries are resolved through `PATH`.
    pub pg_bin: Option<PathBuf>,
}

/// Error raised when the harness environment variables cannot be parsed.
#[derive(Debug, Error)]
pub enum HarnessConfigError {
    #[error("`{0}` is not a valid base port")]
    InvalidBasePort(String),
}

impl HarnessConfig {
    /// Loads the harness settings from `TESTKIT_BASE_PORT` and `PG_BIN`.
    pub fn load() -> Result<HarnessConfig, HarnessConfigError> {
        let base_port = match std::env::var(BASE_PORT_ENV_NAME) {
            Ok(raw) => parse_base_port(&raw)?,
            Err(_) => DEFAULT_BASE_PORT,
        };
        let pg_bin = std::env::var_os(PG_BIN_ENV_NAME).map(PathBuf::from);

        Ok(HarnessConfig { base_port, pg_bin })
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        HarnessConfig {
            base_port: DEFAULT_BASE_PORT,
            pg_bin: None,
        }
    }
}

fn parse_base_port(raw: &str) -> Result<u16, HarnessConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| HarnessConfigError::InvalidBasePort(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_base_port_accepts_plain_numbers() {
        assert_eq!(parse_base_port("20000").unwrap(), 20000);
        assert_eq!(parse_base_port(" 21840 ").unwrap(), 21840);
    }

    #[test]
    fn test_parse_base_port_rejects_garbage() {
        assert!(parse_base_port("").is_err());
        assert!(parse_base_port("port").is_err());
        assert!(parse_base_port("70000").is_err());
    }

    #[test]
    fn test_default_config() {
        let config = HarnessConfig::default();

        assert_eq!(config.base_port, DEFAULT_BASE_PORT);
        assert!(config.pg_bin.is_none());
    }
}
