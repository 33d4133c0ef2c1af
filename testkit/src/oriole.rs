//! OrioleDB-specific SQL surface and on-disk layout.
//!
//! Everything the harness knows about the extension under test lives here:
//! the stopevent introspection queries, the recovery predicate, and the names
//! the engine uses inside a data directory.

use std::collections::HashSet;
use std::path::Path;

use pg_escape::quote_literal;

/// Library name appended to `shared_preload_libraries`.
pub const EXTENSION_NAME: &str = "orioledb";

/// Subdirectory of the data directory holding the engine's table data.
pub const ORIOLEDB_DATA_DIR: &str = "orioledb_data";

/// Provenance marker written into a branched data directory.
pub const SOURCES_FILE: &str = "orioledb_sources";

/// `pg_stat_activity.backend_type` of the stock checkpointer.
pub const CHECKPOINTER_BACKEND_TYPE: &str = "checkpointer";

/// `pg_stat_activity.backend_type` of the engine's background writer.
pub const BGWRITER_BACKEND_TYPE: &str = "orioledb background writer";

/// Query reporting whether recovery has rebuilt the engine's secondary
/// structures to match the replayed WAL.
pub const RECOVERY_SYNCHRONIZED_QUERY: &str = "SELECT orioledb_recovery_synchronized();";

/// Returns the query reporting whether `pid` is blocked on a stopevent.
pub fn stopevent_waiters_query(pid: i32) -> String {
    format!(
        "SELECT EXISTS (\
           SELECT se.* \
           FROM pg_stopevents() se \
           WHERE se.waiter_pids @> ARRAY[{pid}]\
         );"
    )
}

/// Returns the query resolving the pid of a background worker by backend type.
pub fn backend_pid_query(backend_type: &str) -> String {
    format!(
        "SELECT pid FROM pg_stat_activity WHERE backend_type = {};",
        quote_literal(backend_type)
    )
}

/// Backup filter that drops the engine's bulk data while keeping its control
/// files.
///
/// Outside the engine data directory nothing is excluded; inside it, only
/// entries ending in `control` or `.xid` survive. Used when branching, where
/// the engine rebuilds bulk data from the sources marker.
pub fn branching_data_filter(dir: &Path, names: &[String]) -> HashSet<String> {
    if !dir.ends_with(ORIOLEDB_DATA_DIR) {
        return HashSet::new();
    }

    names
        .iter()
        .filter(|name| !name.ends_with("control") && !name.ends_with(".xid"))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn names(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn test_filter_ignores_other_directories() {
        let excluded = branching_data_filter(
            &PathBuf::from("/tmp/node/data/base"),
            &names(&["1", "2", "pg_internal.init"]),
        );

        assert!(excluded.is_empty());
    }

    #[test]
    fn test_filter_keeps_control_and_xid_files() {
        let excluded = branching_data_filter(
            &PathBuf::from("/tmp/node/data/orioledb_data"),
            &names(&["o_tables.control", "42.xid", "1_0", "1_1", "evt"]),
        );

        assert_eq!(excluded, names(&["1_0", "1_1", "evt"]).into_iter().collect());
    }

    #[test]
    fn test_stopevent_query_embeds_pid() {
        let sql = stopevent_waiters_query(4242);

        assert!(sql.contains("ARRAY[4242]"));
        assert!(sql.contains("pg_stopevents()"));
    }

    #[test]
    fn test_backend_pid_query_quotes_type() {
        let sql = backend_pid_query(BGWRITER_BACKEND_TYPE);

        assert!(sql.contains("'orioledb background writer'"));
    }
}
