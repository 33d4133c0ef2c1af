use std::sync::Arc;

use testkit_config::shared::{IntoConnectOptions, PgConnectionConfig};
use tokio_postgres::tls::NoTlsStream;
use tokio_postgres::{Client, Connection, NoTls, SimpleQueryMessage, SimpleQueryRow, Socket};
use tracing::{debug, error};

use crate::error::{NodeError, NodeResult};

/// Spawns a background task to drive a Postgres connection until it terminates.
fn spawn_postgres_connection(connection: Connection<Socket, NoTlsStream>) {
    let task = async move {
        match connection.await {
            Err(err) => error!("an error occurred during the postgres connection: {}", err),
            Ok(()) => debug!("postgres connection terminated successfully"),
        }
    };

    // There is no need to track the connection task via the `JoinHandle` since the `Client`, which
    // returned the connection, will automatically terminate the connection when dropped.
    tokio::spawn(task);
}

/// A session on a throwaway Postgres node.
///
/// Cloning the client shares the underlying session, so a statement issued
/// through a clone runs on the same backend and holds the same locks.
#[derive(Debug, Clone)]
pub struct PgClient {
    client: Arc<Client>,
}

impl PgClient {
    /// Opens a new session using the supplied connection configuration.
    pub async fn connect(config: &PgConnectionConfig) -> NodeResult<PgClient> {
        let options: tokio_postgres::Config = config.with_db();
        let (client, connection) = options.connect(NoTls).await?;
        spawn_postgres_connection(connection);

        Ok(PgClient {
            client: Arc::new(client),
        })
    }

    /// Executes `sql` via the simple-query protocol and returns the data rows.
    pub async fn simple_query(&self, sql: &str) -> NodeResult<Vec<SimpleQueryRow>> {
        let messages = self.client.simple_query(sql).await?;

        Ok(messages
            .into_iter()
            .filter_map(|message| match message {
                SimpleQueryMessage::Row(row) => Some(row),
                _ => None,
            })
            .collect())
    }

    /// Executes `sql` and returns the first column of the first row, if any.
    pub async fn query_scalar(&self, sql: &str) -> NodeResult<Option<String>> {
        let rows = self.simple_query(sql).await?;

        Ok(rows
            .first()
            .and_then(|row| row.get(0))
            .map(|value| value.to_string()))
    }

    /// Executes a boolean query and returns its value.
    ///
    /// A query returning no rows counts as false, matching the shape of the
    /// `SELECT EXISTS (...)` polls the harness issues.
    pub async fn query_bool(&self, sql: &str) -> NodeResult<bool> {
        Ok(self.query_scalar(sql).await?.as_deref() == Some("t"))
    }

    /// Executes a query whose first column is a backend pid.
    ///
    /// Returns [`None`] while the queried backend has not shown up in
    /// `pg_stat_activity` yet.
    pub async fn query_pid(&self, sql: &str) -> NodeResult<Option<i32>> {
        let Some(value) = self.query_scalar(sql).await? else {
            return Ok(None);
        };

        value
            .parse()
            .map(Some)
            .map_err(|_| NodeError::UnexpectedResult {
                query: sql.to_string(),
            })
    }

    /// Returns the underlying tokio-postgres client for direct access.
    pub fn inner(&self) -> &Client {
        &self.client
    }
}
