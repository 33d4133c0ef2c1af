//! Lifecycle management for throwaway Postgres nodes.
//!
//! A [`PgNode`] owns one base directory holding a data directory, a server
//! log, and the unix socket. Nodes are initialized with trust authentication
//! on loopback, so tests connect without credentials.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use pg_escape::quote_literal;
use testkit_config::shared::{HarnessConfig, PgConnectionConfig};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio_postgres::SimpleQueryRow;
use tracing::{debug, info};

use crate::client::PgClient;
use crate::error::{NodeError, NodeResult};

/// Name of the data directory inside a node's base directory.
pub const DATA_DIR: &str = "data";

/// Name of the main configuration file inside the data directory.
pub const PG_CONF_FILE: &str = "postgresql.conf";

/// Name of the server log inside the base directory.
pub const PG_LOG_FILE: &str = "postgresql.log";

/// Lock/pid artifact a running server keeps inside its data directory.
pub const POSTMASTER_PID_FILE: &str = "postmaster.pid";

/// Database every harness session connects to.
pub const DEFAULT_DATABASE: &str = "postgres";

/// Interval between attempts in [`PgNode::poll_query_until`].
pub const QUERY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Lifecycle state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    /// The base directory holds no data directory yet.
    Uninitialized,
    /// The data directory exists but no server owns it.
    Stopped,
    /// A server process is attached to the data directory.
    Running,
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeStatus::Uninitialized => write!(f, "uninitialized"),
            NodeStatus::Stopped => write!(f, "stopped"),
            NodeStatus::Running => write!(f, "running"),
        }
    }
}

/// Connection identity of the node a backup, replica or branch descends from.
#[derive(Debug, Clone)]
pub struct ParentRef {
    /// Host the parent listens on.
    pub host: String,
    /// Port the parent listens on.
    pub port: u16,
    /// Username used for connections to the parent.
    pub username: String,
    /// The parent's data directory.
    pub data_dir: PathBuf,
}

impl ParentRef {
    /// Returns a connection configuration pointing at the parent node.
    pub fn connection_config(&self) -> PgConnectionConfig {
        PgConnectionConfig {
            host: self.host.clone(),
            port: self.port,
            name: DEFAULT_DATABASE.to_string(),
            username: self.username.clone(),
        }
    }
}

/// A running or stopped throwaway Postgres instance.
pub struct PgNode {
    name: String,
    base_dir: PathBuf,
    port: u16,
    username: String,
    pg_bin: Option<PathBuf>,
    status: NodeStatus,
    parent: Option<ParentRef>,
}

impl PgNode {
    /// Creates a handle for a node rooted at `base_dir`.
    ///
    /// A base directory that already contains a data directory (a tree seeded
    /// from a backup) yields a stopped node; otherwise the node starts out
    /// uninitialized and must go through [`PgNode::init`].
    pub fn new(
        name: impl Into<String>,
        base_dir: impl Into<PathBuf>,
        port: u16,
        harness: &HarnessConfig,
    ) -> PgNode {
        let base_dir = base_dir.into();
        let status = if base_dir.join(DATA_DIR).is_dir() {
            NodeStatus::Stopped
        } else {
            NodeStatus::Uninitialized
        };

        PgNode {
            name: name.into(),
            base_dir,
            port,
            username: default_username(),
            pg_bin: harness.pg_bin.clone(),
            status,
            parent: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn data_dir(&self) -> PathBuf {
        self.base_dir.join(DATA_DIR)
    }

    pub fn logfile(&self) -> PathBuf {
        self.base_dir.join(PG_LOG_FILE)
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the node this instance was seeded from, if any.
    pub fn parent(&self) -> Option<&ParentRef> {
        self.parent.as_ref()
    }

    pub fn set_parent(&mut self, parent: ParentRef) {
        self.parent = Some(parent);
    }

    /// Returns this node's identity as a parent reference for its descendants.
    pub fn as_parent_ref(&self) -> ParentRef {
        ParentRef {
            host: "127.0.0.1".to_string(),
            port: self.port,
            username: self.username.clone(),
            data_dir: self.data_dir(),
        }
    }

    /// Returns the node's lifecycle state.
    ///
    /// A node the handle believes is running but whose pid file has vanished
    /// reports stopped; the server either crashed or was stopped externally.
    pub fn status(&self) -> NodeStatus {
        if self.status == NodeStatus::Running
            && !self.data_dir().join(POSTMASTER_PID_FILE).exists()
        {
            return NodeStatus::Stopped;
        }

        self.status
    }

    /// Initializes the data directory with `initdb` and applies the base configuration.
    pub async fn init(&mut self) -> NodeResult<()> {
        self.expect_status(NodeStatus::Uninitialized)?;

        tokio::fs::create_dir_all(&self.base_dir)
            .await
            .map_err(|source| NodeError::Io {
                path: self.base_dir.clone(),
                source,
            })?;

        let data_dir = self.data_dir().display().to_string();
        self.run_pg_command(
            "initdb",
            &["-D", &data_dir, "-U", &self.username, "-A", "trust", "-N"],
        )
        .await?;

        let base_dir = self.base_dir.display().to_string();
        self.append_config_lines(&[
            "listen_addresses = '127.0.0.1'".to_string(),
            format!("port = {}", self.port),
            format!("unix_socket_directories = '{base_dir}'"),
            "fsync = off".to_string(),
        ])
        .await?;

        self.status = NodeStatus::Stopped;
        info!(node = %self.name, port = self.port, "initialized node");

        Ok(())
    }

    /// Starts the server with `pg_ctl`, waiting until it accepts connections.
    pub async fn start(&mut self) -> NodeResult<()> {
        self.expect_status(NodeStatus::Stopped)?;

        let data_dir = self.data_dir().display().to_string();
        let logfile = self.logfile().display().to_string();
        self.run_pg_command("pg_ctl", &["-D", &data_dir, "-l", &logfile, "-w", "start"])
            .await?;

        self.status = NodeStatus::Running;
        info!(node = %self.name, port = self.port, "started node");

        Ok(())
    }

    /// Stops the server with a fast shutdown, waiting for completion.
    pub async fn stop(&mut self) -> NodeResult<()> {
        self.expect_status(NodeStatus::Running)?;

        let data_dir = self.data_dir().display().to_string();
        self.run_pg_command("pg_ctl", &["-D", &data_dir, "-m", "fast", "-w", "stop"])
            .await?;

        self.status = NodeStatus::Stopped;
        info!(node = %self.name, "stopped node");

        Ok(())
    }

    /// Restarts the server.
    pub async fn restart(&mut self) -> NodeResult<()> {
        self.stop().await?;
        self.start().await
    }

    /// Returns the connection configuration for this node.
    pub fn connection_config(&self) -> PgConnectionConfig {
        PgConnectionConfig {
            host: "127.0.0.1".to_string(),
            port: self.port,
            name: DEFAULT_DATABASE.to_string(),
            username: self.username.clone(),
        }
    }

    /// Opens a new session on this node.
    pub async fn connect(&self) -> NodeResult<PgClient> {
        PgClient::connect(&self.connection_config()).await
    }

    /// Executes `sql` on a fresh session and returns the data rows.
    pub async fn execute(&self, sql: &str) -> NodeResult<Vec<SimpleQueryRow>> {
        let client = self.connect().await?;
        client.simple_query(sql).await
    }

    /// Polls a boolean query at a fixed interval until it returns true.
    ///
    /// No timeout is enforced; the caller's test timeout bounds the wait.
    pub async fn poll_query_until(&self, sql: &str) -> NodeResult<()> {
        let client = self.connect().await?;
        loop {
            if client.query_bool(sql).await? {
                return Ok(());
            }
            tokio::time::sleep(QUERY_POLL_INTERVAL).await;
        }
    }

    /// Returns whether this standby has replayed WAL up to `lsn`.
    pub async fn has_replayed_past(&self, lsn: &str) -> NodeResult<bool> {
        let sql = format!(
            "SELECT pg_wal_lsn_diff(pg_last_wal_replay_lsn(), {}) >= 0;",
            quote_literal(lsn)
        );

        let client = self.connect().await?;
        client.query_bool(&sql).await
    }

    /// Appends a `key = value` setting to the node's `postgresql.conf`.
    pub async fn append_config(&self, key: &str, value: impl fmt::Display) -> NodeResult<()> {
        self.append_config_line(&format!("{key} = {value}")).await
    }

    /// Appends a raw line to the node's `postgresql.conf`.
    pub async fn append_config_line(&self, line: &str) -> NodeResult<()> {
        self.append_config_lines(&[line.to_string()]).await
    }

    async fn append_config_lines(&self, lines: &[String]) -> NodeResult<()> {
        let path = self.data_dir().join(PG_CONF_FILE);
        let io_error = |source| NodeError::Io {
            path: path.clone(),
            source,
        };

        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(&path)
            .await
            .map_err(io_error)?;
        let mut block = String::new();
        for line in lines {
            block.push_str(line);
            block.push('\n');
        }
        file.write_all(block.as_bytes()).await.map_err(io_error)?;

        Ok(())
    }

    /// Removes the node's base directory.
    ///
    /// Only valid once the node is stopped; a running server would be left
    /// without its data directory otherwise.
    pub async fn cleanup(self) -> NodeResult<()> {
        if self.status() == NodeStatus::Running {
            return Err(NodeError::InvalidState {
                name: self.name,
                expected: NodeStatus::Stopped,
                actual: NodeStatus::Running,
            });
        }

        match tokio::fs::remove_dir_all(&self.base_dir).await {
            Ok(()) => Ok(()),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(NodeError::Io {
                path: self.base_dir,
                source,
            }),
        }
    }

    fn expect_status(&self, expected: NodeStatus) -> NodeResult<()> {
        let actual = self.status();
        if actual != expected {
            return Err(NodeError::InvalidState {
                name: self.name.clone(),
                expected,
                actual,
            });
        }

        Ok(())
    }

    fn resolve_bin(&self, name: &str) -> PathBuf {
        match &self.pg_bin {
            Some(dir) => dir.join(name),
            None => PathBuf::from(name),
        }
    }

    async fn run_pg_command(&self, program: &str, args: &[&str]) -> NodeResult<()> {
        let program_path = self.resolve_bin(program);
        let rendered = format!("{} {}", program_path.display(), args.join(" "));
        debug!(command = %rendered, "running postgres command");

        let output = Command::new(&program_path)
            .args(args)
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

        Ok(())
    }
}

impl fmt::Debug for PgNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgNode")
            .field("name", &self.name)
            .field("base_dir", &self.base_dir)
            .field("port", &self.port)
            .field("status", &self.status)
            .finish()
    }
}

/// Returns the username new nodes are initialized with.
///
/// Follows the `PGUSER` convention before falling back to the OS user.
pub fn default_username() -> String {
    std::env::var("PGUSER")
        .or_else(|_| std::env::var("USER"))
        .unwrap_or_else(|_| "postgres".to_string())
}
