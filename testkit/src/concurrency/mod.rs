//! Background execution helpers for concurrent test scenarios.

mod task;

pub use task::{BackgroundTask, spawn_query};
