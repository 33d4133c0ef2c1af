use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

use crate::node::NodeStatus;

/// Convenient result type for node operations.
pub type NodeResult<T> = Result<T, NodeError>;

/// Errors raised while driving a throwaway Postgres node.
#[derive(Debug, Error)]
pub enum NodeError {
    /// A Postgres binary could not be launched at all.
    #[error("failed to launch `{command}`: {source}")]
    Launch {
        command: String,
        #[source]
        source: io::Error,
    },

    /// A Postgres binary ran but exited unsuccessfully.
    #[error("`{command}` exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: ExitStatus,
        stderr: String,
    },

    /// A filesystem operation inside the node's base directory failed.
    #[error("filesystem operation on `{path}` failed: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The node was in the wrong lifecycle state for the requested operation.
    #[error("node `{name}` is {actual}, expected {expected}")]
    InvalidState {
        name: String,
        expected: NodeStatus,
        actual: NodeStatus,
    },

    /// A query returned no result, or one the harness could not interpret.
    #[error("query `{query}` returned an unexpected result")]
    UnexpectedResult { query: String },

    /// An error surfaced by tokio-postgres.
    #[error(transparent)]
    Query(#[from] tokio_postgres::Error),
}
