use serde::{Deserialize, Serialize};
use tokio_postgres::Config as TokioPgConnectOptions;

/// Static connection options applied to every harness connection.
///
/// Throwaway nodes are initialized from scratch, so these options pin the
/// client-visible formatting behavior instead of relying on whatever the
/// local installation defaults to.
pub struct DefaultPgConnectionOptions;

impl DefaultPgConnectionOptions {
    /// Returns the options as a string suitable for the tokio-postgres options parameter.
    ///
    /// Returns a space-separated list of `-c key=value` pairs.
    pub fn to_options_string() -> String {
        "-c datestyle=ISO -c client_encoding=UTF8".to_string()
    }
}

/// Configuration for connecting to a Postgres node.
///
/// Harness nodes listen on loopback with trust authentication, so no
/// password or TLS material is carried here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PgConnectionConfig {
    /// Hostname or IP address the node is listening on.
    pub host: String,
    /// Port number the node is listening on.
    pub port: u16,
    /// Name of the database to connect to.
    pub name: String,
    /// Username for authenticating with the node.
    pub username: String,
}

/// A trait which converts the implementation into crate-specific connect
/// options, keeping the connection parameters centralized in
/// [`PgConnectionConfig`].
pub trait IntoConnectOptions<Output> {
    /// Creates connection options for connecting to the server without
    /// specifying a database.
    ///
    /// Useful for administrative operations that must be performed before a
    /// specific database exists.
    fn without_db(&self) -> Output;

    /// Creates connection options for connecting to a specific database.
    fn with_db(&self) -> Output;
}

impl IntoConnectOptions<TokioPgConnectOptions> for PgConnectionConfig {
    fn without_db(&self) -> TokioPgConnectOptions {
        let mut config = TokioPgConnectOptions::new();
        config
            .host(&self.host)
            .port(self.port)
            .user(&self.username)
            .options(&DefaultPgConnectionOptions::to_options_string());

        config
    }

    fn with_db(&self) -> TokioPgConnectOptions {
        let mut options: TokioPgConnectOptions = self.without_db();
        options.dbname(&self.name);
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> PgConnectionConfig {
        PgConnectionConfig {
            host: "127.0.0.1".to_string(),
            port: 20002,
            name: "postgres".to_string(),
            username: "tester".to_string(),
        }
    }

    #[test]
    fn test_options_string_format() {
        let options_string = DefaultPgConnectionOptions::to_options_string();

        assert_eq!(options_string, "-c datestyle=ISO -c client_encoding=UTF8");
    }

    #[test]
    fn test_with_db_carries_all_parameters() {
        let options: TokioPgConnectOptions = test_config().with_db();

        assert_eq!(options.get_user(), Some("tester"));
        assert_eq!(options.get_dbname(), Some("postgres"));
        assert_eq!(options.get_ports(), &[20002]);
    }

    #[test]
    fn test_without_db_omits_database_name() {
        let options: TokioPgConnectOptions = test_config().without_db();

        assert_eq!(options.get_dbname(), None);
    }
}
