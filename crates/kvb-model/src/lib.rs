//! Data model of the ISO image builder: configuration, enums, well-known
//! constants and the cluster resource payloads exchanged with the control plane.

mod domain;
pub use domain::constants;
pub use domain::{DurationMs, Flag, Labels, Quantity};

mod error;
pub use error::{ModelError, ModelResult};

mod kind;
pub use kind::{AccessMode, CommType, OsType, VolumeMode};

pub mod boot;
pub mod config;
pub use config::BuildConfig;

pub mod resource;
pub use resource::ResourceRef;
