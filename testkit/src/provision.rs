//! Spawning runnable nodes from backups.
//!
//! A backup can seed either a streaming replica, which continuously applies
//! WAL from the source node, or an independent branch, which records its
//! ancestry once and then diverges. Both get a fresh working directory and a
//! port disjoint from every other live instance in the run.

use testkit_config::shared::HarnessConfig;
use testkit_postgres::node::{DATA_DIR, PgNode};
use tracing::info;

use crate::backup::{NoExclusions, NodeBackup, copy_tree_filtered};
use crate::error::{ErrorKind, TestkitResult};
use crate::naming::unique_base_dir;
use crate::oriole::SOURCES_FILE;
use crate::{bail, testkit_error};

/// File whose presence makes a data directory start as a standby.
const STANDBY_SIGNAL_FILE: &str = "standby.signal";

impl NodeBackup {
    /// Spawns a streaming replica of the backup's source node.
    ///
    /// The returned node is stopped, seeded from the backup tree, configured
    /// to listen on `port`, and set up to stream from the source node until
    /// torn down. The caller starts it.
    pub async fn spawn_replica(&self, name: &str, port: u16) -> TestkitResult<PgNode> {
        let mut node = self.materialize_node(name, port).await?;

        let data_dir = node.data_dir();
        tokio::fs::write(data_dir.join(STANDBY_SIGNAL_FILE), b"")
            .await
            .map_err(|err| {
                testkit_error!(
                    ErrorKind::ProvisionFailed,
                    "Failed to write the standby signal file",
                    data_dir.display(),
                    source: err
                )
            })?;
        node.append_config_line(&format!(
            "primary_conninfo = 'host={} port={} user={} application_name={}'",
            self.source().host,
            self.source().port,
            self.source().username,
            name
        ))
        .await?;
        node.set_parent(self.source().clone());

        info!(replica = name, port, "spawned replica");
        Ok(node)
    }

    /// Spawns an independent, write-capable branch of the backup's source node.
    ///
    /// Before the node ever starts, the source's data-directory path is
    /// recorded in the copied tree as a provenance marker, so later tooling
    /// can trace branch ancestry. No data flows after that.
    pub async fn spawn_branch(&self, name: &str, port: u16) -> TestkitResult<PgNode> {
        let mut node = self.materialize_node(name, port).await?;

        let sources_file = node.data_dir().join(SOURCES_FILE);
        let mut contents = self.source().data_dir.display().to_string();
        contents.push('\n');
        tokio::fs::write(&sources_file, contents)
            .await
            .map_err(|err| {
                testkit_error!(
                    ErrorKind::ProvisionFailed,
                    "Failed to write the branch provenance marker",
                    sources_file.display(),
                    source: err
                )
            })?;
        node.set_parent(self.source().clone());

        info!(branch = name, port, "spawned branch");
        Ok(node)
    }

    /// Seeds a fresh working directory from the backup tree and wraps it in a
    /// stopped node listening on `port`.
    async fn materialize_node(&self, name: &str, port: u16) -> TestkitResult<PgNode> {
        let data_src = self.data_dir();
        if !data_src.is_dir() {
            bail!(
                ErrorKind::ProvisionFailed,
                "Backup tree is missing its data directory",
                data_src.display()
            );
        }
        ensure_port_free(port)?;

        let harness = HarnessConfig::load()?;
        let base_dir = unique_base_dir(name, "node");
        copy_tree_filtered(data_src, base_dir.join(DATA_DIR), NoExclusions).await?;

        let node = PgNode::new(name, base_dir, port, &harness);
        node.append_config_line("").await?;
        node.append_config("port", port).await?;

        Ok(node)
    }
}

fn ensure_port_free(port: u16) -> TestkitResult<()> {
    // Probed with a transient bind; the listener is dropped immediately and
    // the port goes to the new node.
    match std::net::TcpListener::bind(("127.0.0.1", port)) {
        Ok(_listener) => Ok(()),
        Err(err) => Err(testkit_error!(
            ErrorKind::ProvisionFailed,
            "Port for the new node is already bound",
            format!("port {port}"),
            source: err
        )),
    }
}
