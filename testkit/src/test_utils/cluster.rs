use testkit_config::shared::HarnessConfig;
use testkit_postgres::node::{NodeStatus, PgNode};
use tracing::warn;

use crate::backup::{NoExclusions, NodeBackup};
use crate::error::{ErrorKind, TestkitResult};
use crate::naming::{
    DEFAULT_MODULE_SUFFIX, ModulePorts, module_ordinal, module_short_name, unique_base_dir,
};
use crate::oriole::{EXTENSION_NAME, branching_data_filter};
use crate::testkit_error;

/// One test module's primary node plus its optional replica or branch.
///
/// The cluster owns every directory it creates. [`TestCluster::finish`]
/// removes them only when the test passed; on failure they stay on disk, with
/// their paths logged, so the broken state can be inspected.
pub struct TestCluster {
    module: String,
    ports: ModulePorts,
    node: PgNode,
    secondary: Option<PgNode>,
    backups: Vec<NodeBackup>,
}

impl TestCluster {
    /// Creates and initializes the primary node for a test module.
    ///
    /// `module_file` is this module's file name and `sorted_siblings` the
    /// sorted sibling list from
    /// [`discover_test_modules`](crate::naming::discover_test_modules); the
    /// module's rank in that list pins its port pair for the whole run. The
    /// node is initialized with the extension preloaded but not started.
    pub async fn setup(module_file: &str, sorted_siblings: &[String]) -> TestkitResult<TestCluster> {
        let harness = HarnessConfig::load()?;
        let ordinal = module_ordinal(module_file, sorted_siblings).ok_or_else(|| {
            testkit_error!(
                ErrorKind::ConfigError,
                "Test module is not among its discovered siblings",
                module_file.to_string()
            )
        })?;
        let ports = ModulePorts::new(harness.base_port, ordinal);

        let short_name = module_short_name(module_file, DEFAULT_MODULE_SUFFIX);
        let base_dir = unique_base_dir(short_name, "node");
        let mut node = PgNode::new("test", base_dir, ports.primary(), &harness);
        node.init().await?;
        node.append_config_line(&format!("shared_preload_libraries = '{EXTENSION_NAME}'"))
            .await?;

        Ok(TestCluster {
            module: short_name.to_string(),
            ports,
            node,
            secondary: None,
            backups: Vec::new(),
        })
    }

    /// The module's primary node.
    pub fn node(&mut self) -> &mut PgNode {
        &mut self.node
    }

    /// The module's port pair.
    pub fn ports(&self) -> ModulePorts {
        self.ports
    }

    /// Returns the module's replica, spawning it on first use.
    ///
    /// The replica is seeded from a fresh unfiltered backup of the primary,
    /// listens on the module's secondary port, and is returned stopped.
    pub async fn replica(&mut self) -> TestkitResult<&mut PgNode> {
        if self.secondary.is_none() {
            let backup_dir = unique_base_dir(&self.module, "backup");
            let backup = NodeBackup::take(&self.node, backup_dir, NoExclusions).await?;
            let replica = backup.spawn_replica("replica", self.ports.secondary()).await?;
            self.backups.push(backup);
            self.secondary = Some(replica);
        }

        Ok(self
            .secondary
            .as_mut()
            .expect("secondary was just provisioned"))
    }

    /// Returns the module's branch, spawning it on first use.
    ///
    /// The branch is seeded from a backup that keeps only the engine's
    /// control files in its data subtree, listens on the module's secondary
    /// port, and is returned stopped.
    pub async fn branch(&mut self) -> TestkitResult<&mut PgNode> {
        if self.secondary.is_none() {
            let backup_dir = unique_base_dir(&self.module, "backup");
            let backup = NodeBackup::take(&self.node, backup_dir, branching_data_filter).await?;
            let branch = backup.spawn_branch("branch", self.ports.secondary()).await?;
            self.backups.push(backup);
            self.secondary = Some(branch);
        }

        Ok(self
            .secondary
            .as_mut()
            .expect("secondary was just provisioned"))
    }

    /// Tears the cluster down.
    ///
    /// Nodes still running are stopped either way. Working directories are
    /// removed only when `ok` is true; on failure they are kept on disk for
    /// inspection and their paths logged.
    pub async fn finish(mut self, ok: bool) -> TestkitResult<()> {
        stop_if_running(&mut self.node).await;
        if let Some(secondary) = self.secondary.as_mut() {
            stop_if_running(secondary).await;
        }

        if ok {
            self.node.cleanup().await?;
            if let Some(secondary) = self.secondary {
                secondary.cleanup().await?;
            }
            for backup in self.backups {
                backup.cleanup().await?;
            }
        } else {
            warn!(base_dir = %self.node.base_dir().display(), "keeping base directory for inspection");
            if let Some(secondary) = &self.secondary {
                warn!(base_dir = %secondary.base_dir().display(), "keeping base directory for inspection");
            }
        }

        Ok(())
    }
}

async fn stop_if_running(node: &mut PgNode) {
    if node.status() == NodeStatus::Running {
        if let Err(err) = node.stop().await {
            warn!(node = node.name(), error = %err, "failed to stop node during teardown");
        }
    }
}
