//! Builds a reusable disk image by installing an OS from an ISO volume on a
//! temporary virtual machine.
//!
//! ```text
//! validate ISO -> stage media -> create VM -> type boot command
//!   -> wait for install -> [agent -> IP -> tunnel -> connect -> provision]
//!   -> stop VM -> clone root disk into the image
//! ```
//!
//! The bracketed part only runs when a remote-access protocol is configured.
mod builder;
pub use builder::{Artifact, Builder, BuilderDeps};

mod error;
pub use error::{BuildError, TunnelError};

pub mod comm;
pub mod resources;
pub mod steps;
pub mod tunnel;
pub mod wait;
