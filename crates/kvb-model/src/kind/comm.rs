use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{DurationMs, ModelError};

/// Remote protocol used to reach the guest after installation.
/// - `Ssh`   — secure shell (default).
/// - `Winrm` — Windows remote management.
/// - `None`  — no remote access; connect and provisioning steps are skipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CommType {
    #[default]
    Ssh,
    Winrm,
    None,
}

impl CommType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommType::Ssh => "ssh",
            CommType::Winrm => "winrm",
            CommType::None => "none",
        }
    }

    /// Well-known guest port of the protocol.
    pub fn default_port(&self) -> u16 {
        match self {
            CommType::Ssh => 22,
            CommType::Winrm => 5985,
            CommType::None => 0,
        }
    }

    /// How long the connect step keeps retrying when no timeout is configured.
    pub fn default_timeout_ms(&self) -> DurationMs {
        match self {
            CommType::Ssh => 5 * 60_000,
            CommType::Winrm => 30 * 60_000,
            CommType::None => 0,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, CommType::None)
    }
}

impl FromStr for CommType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "ssh" => Ok(Self::Ssh),
            "winrm" => Ok(Self::Winrm),
            "none" => Ok(Self::None),
            _ => Err(ModelError::UnknownCommType(s.to_string())),
        }
    }
}

impl TryFrom<String> for CommType {
    type Error = ModelError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<CommType> for String {
    fn from(c: CommType) -> Self {
        c.as_str().to_string()
    }
}

impl fmt::Display for CommType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
