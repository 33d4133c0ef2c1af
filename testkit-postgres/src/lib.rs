//! Throwaway Postgres node management for extension tests.
//!
//! Provides the process-level abstraction the harness builds on: initializing
//! a fresh cluster, starting and stopping it through `pg_ctl`, editing its
//! configuration, and running SQL against it over tokio-postgres.

pub mod client;
pub mod error;
pub mod node;
pub mod version;
