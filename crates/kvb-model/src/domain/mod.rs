mod flag;
pub use flag::Flag;

mod labels;
pub use labels::Labels;

mod quantity;
pub use quantity::Quantity;

pub mod constants;

/// Duration value in milliseconds, as used throughout the configuration surface.
pub type DurationMs = u64;
