//! Postgres version and build introspection via `pg_config`.
//!
//! Major versions are compared as plain integers; the harness only ever gates
//! behavior on the major release.

use std::path::Path;

use tokio::process::Command;

use crate::error::{NodeError, NodeResult};

pub const POSTGRES_14: u32 = 14;
pub const POSTGRES_15: u32 = 15;
pub const POSTGRES_16: u32 = 16;
pub const POSTGRES_17: u32 = 17;

/// Returns [`true`] if the server version meets or exceeds the required version.
///
/// [`None`] versions compare as not meeting any requirement, making this safe
/// to use where version information might not be available.
pub fn meets_version(server_version: Option<u32>, required_version: u32) -> bool {
    server_version.is_some_and(|v| v >= required_version)
}

/// Extracts the major version from `pg_config --version` output.
///
/// Handles release (`PostgreSQL 16.4`) and development (`PostgreSQL 17devel`)
/// version strings.
pub fn parse_major_version(version_output: &str) -> Option<u32> {
    let version = version_output.trim().rsplit(' ').next()?;
    let digits: String = version.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Returns [`true`] when the `pg_config --configure` output shows an ICU build.
pub fn built_with_icu(configure_output: &str) -> bool {
    configure_output.contains("--with-icu")
}

/// Runs `pg_config --version` and returns the server's major version.
pub async fn pg_major_version(pg_bin: Option<&Path>) -> NodeResult<u32> {
    let output = run_pg_config(pg_bin, "--version").await?;
    parse_major_version(&output).ok_or(NodeError::UnexpectedResult {
        query: format!("pg_config --version ({})", output.trim()),
    })
}

/// Runs `pg_config --configure` and returns the raw configure flags.
pub async fn pg_configure_flags(pg_bin: Option<&Path>) -> NodeResult<String> {
    run_pg_config(pg_bin, "--configure").await
}

async fn run_pg_config(pg_bin: Option<&Path>, flag: &str) -> NodeResult<String> {
    let program = match pg_bin {
        Some(dir) => dir.join("pg_config"),
        None => "pg_config".into(),
    };
    let rendered = format!("{} {flag}", program.display());

    let output = Command::new(&program)
        .arg(flag)
        .output()
        .await
        .map_err(|source| NodeError::Launch {
            command: rendered.clone(),
            source,
        })?;
    if !output.status.success() {
        return Err(NodeError::CommandFailed {
            command: rendered,
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_release_version() {
        assert_eq!(parse_major_version("PostgreSQL 16.4\n"), Some(16));
        assert_eq!(parse_major_version("PostgreSQL 14.12"), Some(14));
    }

    #[test]
    fn test_parse_devel_version() {
        assert_eq!(parse_major_version("PostgreSQL 17devel"), Some(17));
        assert_eq!(parse_major_version("PostgreSQL 18beta1"), Some(18));
    }

    #[test]
    fn test_parse_garbage_version() {
        assert_eq!(parse_major_version(""), None);
        assert_eq!(parse_major_version("PostgreSQL devel"), None);
    }

    #[test]
    fn test_meets_version() {
        assert!(meets_version(Some(16), POSTGRES_15));
        assert!(meets_version(Some(15), POSTGRES_15));
        assert!(!meets_version(Some(14), POSTGRES_15));
        assert!(!meets_version(None, POSTGRES_14));
    }

    #[test]
    fn test_built_with_icu() {
        assert!(built_with_icu("'--with-icu' '--with-libxml'"));
        assert!(!built_with_icu("'--with-libxml'"));
    }
}
