use std::time::Duration;

use testkit_postgres::client::PgClient;
use testkit_postgres::node::PgNode;
use tracing::debug;

use crate::error::{ErrorKind, TestkitResult};
use crate::oriole::RECOVERY_SYNCHRONIZED_QUERY;
use crate::testkit_error;

/// Interval between replication-position polls.
pub const CATCHUP_POLL_INTERVAL: Duration = Duration::from_millis(100);

const CURRENT_WAL_LSN_QUERY: &str = "SELECT pg_current_wal_lsn()::text;";

/// Blocks until `replica` has caught up with its parent.
///
/// Two conditions must hold before this returns: the replica has replayed
/// WAL up to the parent's write position as of the call, and the engine
/// reports recovery as synchronized, meaning its secondary structures have
/// been rebuilt to match the replayed state. Every record present on the
/// parent when catchup was requested is then readable on the replica.
pub async fn wait_catchup(replica: &PgNode) -> TestkitResult<()> {
    let parent = replica.parent().ok_or_else(|| {
        testkit_error!(
            ErrorKind::InvalidState,
            "Node has no parent to catch up with"
        )
    })?;

    let primary = PgClient::connect(&parent.connection_config()).await?;
    let target_lsn = primary
        .query_scalar(CURRENT_WAL_LSN_QUERY)
        .await?
        .ok_or_else(|| {
            testkit_error!(
                ErrorKind::SourceQueryFailed,
                "Parent did not report a WAL position"
            )
        })?;
    debug!(replica = replica.name(), target_lsn = %target_lsn, "waiting for catchup");

    loop {
        if replica.has_replayed_past(&target_lsn).await? {
            break;
        }
        tokio::time::sleep(CATCHUP_POLL_INTERVAL).await;
    }

    replica.poll_query_until(RECOVERY_SYNCHRONIZED_QUERY).await?;
    debug!(replica = replica.name(), "replica caught up");

    Ok(())
}
