//! Shared configuration types for the test harness crates.

pub mod shared;
