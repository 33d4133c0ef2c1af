//! Test harness for the OrioleDB storage extension.
//!
//! Provisions throwaway Postgres instances, takes crash-consistent hot
//! backups of live data directories, spawns replicas and branches from those
//! backups, and synchronizes test code with background server workers through
//! poll-until-condition primitives.

pub mod backup;
pub mod concurrency;
pub mod error;
mod macros;
pub mod naming;
pub mod oriole;
pub mod provision;
pub mod sync;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
