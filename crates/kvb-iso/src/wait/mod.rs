//! Background pollers backing the long waits of a build.
//!
//! Each poller runs as one spawned task, reports through a single-slot
//! channel and stops when its token is cancelled.
mod address;
pub use address::{AddressWorker, bracket_ipv6};

mod agent;
pub use agent::AgentWorker;
