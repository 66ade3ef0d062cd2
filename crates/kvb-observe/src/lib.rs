//! Logging for image builds.
//!
//! [`init_logger`] installs the global `tracing` subscriber described by a
//! [`LoggerConfig`]; [`StepLogger`] reports step lifecycle events through
//! the same subscriber.
mod config;
pub use config::LoggerConfig;

mod error;
pub use error::{LoggerError, LoggerResult};

mod format;
pub use format::LoggerFormat;

mod level;
pub use level::LoggerLevel;

mod init;
pub use init::{init_logger, subscriber};

mod steps;
pub use steps::StepLogger;

mod timer;
pub use timer::{BuildTimer, LoggerTimeZone};
