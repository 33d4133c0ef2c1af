use std::time::Duration;

use testkit_postgres::node::PgNode;
use tracing::debug;

use crate::error::TestkitResult;
use crate::oriole::{
    BGWRITER_BACKEND_TYPE, CHECKPOINTER_BACKEND_TYPE, backend_pid_query, stopevent_waiters_query,
};

/// Interval between stopevent polls.
pub const STOPEVENT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Blocks until `pid` is reported blocked on a stopevent by `node`.
///
/// The wait condition is ephemeral: it holds only while the monitored process
/// is paused at its breakpoint and disappears the instant it resumes. A pid
/// that never blocks makes this hang, which the caller's test timeout turns
/// into a failure.
pub async fn wait_for_stopevent(node: &PgNode, pid: i32) -> TestkitResult<()> {
    let client = node.connect().await?;
    let sql = stopevent_waiters_query(pid);

    loop {
        if client.query_bool(&sql).await? {
            debug!(pid, "process blocked on stopevent");
            return Ok(());
        }
        tokio::time::sleep(STOPEVENT_POLL_INTERVAL).await;
    }
}

/// Blocks until the checkpointer is blocked on a stopevent.
pub async fn wait_for_checkpointer_stopevent(node: &PgNode) -> TestkitResult<()> {
    let pid = resolve_backend_pid(node, CHECKPOINTER_BACKEND_TYPE).await?;
    wait_for_stopevent(node, pid).await
}

/// Blocks until the engine's background writer is blocked on a stopevent.
pub async fn wait_for_bgwriter_stopevent(node: &PgNode) -> TestkitResult<()> {
    let pid = resolve_backend_pid(node, BGWRITER_BACKEND_TYPE).await?;
    wait_for_stopevent(node, pid).await
}

/// Resolves the pid of a background worker by backend type.
///
/// The worker may not have started yet, so this polls until it shows up in
/// `pg_stat_activity`.
async fn resolve_backend_pid(node: &PgNode, backend_type: &str) -> TestkitResult<i32> {
    let client = node.connect().await?;
    let sql = backend_pid_query(backend_type);

    loop {
        if let Some(pid) = client.query_pid(&sql).await? {
            debug!(backend_type, pid, "resolved background worker");
            return Ok(pid);
        }
        tokio::time::sleep(STOPEVENT_POLL_INTERVAL).await;
    }
}
