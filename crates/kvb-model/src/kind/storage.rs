use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::ModelError;

/// Persistent volume access mode requested for the root and image volumes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AccessMode {
    /// Single-writer (default).
    #[default]
    ReadWriteOnce,
    /// Multi-writer.
    ReadWriteMany,
}

impl AccessMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessMode::ReadWriteOnce => "ReadWriteOnce",
            AccessMode::ReadWriteMany => "ReadWriteMany",
        }
    }
}

impl FromStr for AccessMode {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "ReadWriteOnce" => Ok(Self::ReadWriteOnce),
            "ReadWriteMany" => Ok(Self::ReadWriteMany),
            _ => Err(ModelError::UnknownAccessMode(s.to_string())),
        }
    }
}

impl TryFrom<String> for AccessMode {
    type Error = ModelError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<AccessMode> for String {
    fn from(m: AccessMode) -> Self {
        m.as_str().to_string()
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persistent volume mode: a mounted filesystem or a raw block device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum VolumeMode {
    #[default]
    Filesystem,
    Block,
}

impl VolumeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            VolumeMode::Filesystem => "Filesystem",
            VolumeMode::Block => "Block",
        }
    }
}

impl FromStr for VolumeMode {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "Filesystem" => Ok(Self::Filesystem),
            "Block" => Ok(Self::Block),
            _ => Err(ModelError::UnknownVolumeMode(s.to_string())),
        }
    }
}

impl TryFrom<String> for VolumeMode {
    type Error = ModelError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<VolumeMode> for String {
    fn from(m: VolumeMode) -> Self {
        m.as_str().to_string()
    }
}

impl fmt::Display for VolumeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
