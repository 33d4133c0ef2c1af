//! Shared configuration types for harness components.

mod connection;
mod harness;

pub use connection::{DefaultPgConnectionOptions, IntoConnectOptions, PgConnectionConfig};
pub use harness::{DEFAULT_BASE_PORT, HarnessConfig, HarnessConfigError};
