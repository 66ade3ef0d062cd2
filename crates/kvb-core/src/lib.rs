//! Step-sequencing engine of the image builder.
//!
//! A build is an ordered list of [`step::Step`]s sharing one
//! [`state::StateBag`]. The [`runner::Runner`] executes them in order and,
//! when one halts, cleans up the already-executed steps in reverse.
pub mod cluster;
pub mod error;
pub mod metrics;
pub mod runner;
pub mod state;
pub mod step;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub mod prelude {
    pub use crate::cluster::{BundleStore, ClusterError, VirtClient};
    pub use crate::error::{Halted, StepError};
    pub use crate::metrics::{MetricsBackend, MetricsHandle, StepOutcome};
    pub use crate::runner::{RunReport, Runner};
    pub use crate::state::StateBag;
    pub use crate::step::{Step, StepAction};
}
