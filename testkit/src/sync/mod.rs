//! Poll-based synchronization with background server processes.
//!
//! Waits in this module deliberately carry no timeout: in a test environment
//! the awaited condition is expected within a bounded, short time, and the
//! test framework's overall timeout is the only cancellation mechanism.

mod catchup;
mod stopevents;

pub use catchup::{CATCHUP_POLL_INTERVAL, wait_catchup};
pub use stopevents::{
    STOPEVENT_POLL_INTERVAL, wait_for_bgwriter_stopevent, wait_for_checkpointer_stopevent,
    wait_for_stopevent,
};
