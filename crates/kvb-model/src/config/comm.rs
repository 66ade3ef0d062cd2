use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{CommType, DurationMs};

/// Remote access settings of the guest, one block per protocol.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommConfig {
    pub communicator: CommType,

    pub ssh_host: Option<String>,
    pub ssh_port: u16,
    pub ssh_username: Option<String>,
    pub ssh_password: Option<String>,
    pub ssh_private_key_file: Option<PathBuf>,
    pub ssh_timeout_ms: DurationMs,
    /// Local end of the tunnel; 0 picks an ephemeral port.
    pub ssh_local_port: u16,
    /// Deprecated alias of `ssh_port`.
    pub ssh_remote_port: u16,

    pub winrm_host: Option<String>,
    pub winrm_port: u16,
    pub winrm_username: Option<String>,
    pub winrm_password: Option<String>,
    pub winrm_timeout_ms: DurationMs,
    pub winrm_local_port: u16,
    /// Deprecated alias of `winrm_port`.
    pub winrm_remote_port: u16,
    /// Deprecated alias of `winrm_timeout_ms`.
    pub winrm_wait_timeout_ms: DurationMs,
}

impl CommConfig {
    /// Statically configured guest host of the active protocol.
    pub fn host(&self) -> Option<&str> {
        let host = match self.communicator {
            CommType::Ssh => self.ssh_host.as_deref(),
            CommType::Winrm => self.winrm_host.as_deref(),
            CommType::None => None,
        };
        host.filter(|h| !h.is_empty())
    }

    /// Guest port of the active protocol.
    pub fn port(&self) -> u16 {
        match self.communicator {
            CommType::Ssh => self.ssh_port,
            CommType::Winrm => self.winrm_port,
            CommType::None => 0,
        }
    }

    pub fn local_port(&self) -> u16 {
        match self.communicator {
            CommType::Ssh => self.ssh_local_port,
            CommType::Winrm => self.winrm_local_port,
            CommType::None => 0,
        }
    }

    pub fn timeout_ms(&self) -> DurationMs {
        match self.communicator {
            CommType::Ssh => self.ssh_timeout_ms,
            CommType::Winrm => self.winrm_timeout_ms,
            CommType::None => 0,
        }
    }

    pub fn username(&self) -> Option<&str> {
        match self.communicator {
            CommType::Ssh => self.ssh_username.as_deref(),
            CommType::Winrm => self.winrm_username.as_deref(),
            CommType::None => None,
        }
    }

    pub fn password(&self) -> Option<&str> {
        match self.communicator {
            CommType::Ssh => self.ssh_password.as_deref(),
            CommType::Winrm => self.winrm_password.as_deref(),
            CommType::None => None,
        }
    }

    /// Remaps deprecated aliases and fills protocol defaults.
    /// Returns deprecation warnings.
    pub(crate) fn prepare(&mut self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.ssh_remote_port != 0 {
            warnings.push("ssh_remote_port is deprecated - use ssh_port instead".to_string());
            self.ssh_port = self.ssh_remote_port;
        }
        if self.winrm_remote_port != 0 {
            warnings.push("winrm_remote_port is deprecated - use winrm_port instead".to_string());
            self.winrm_port = self.winrm_remote_port;
        }
        if self.winrm_wait_timeout_ms != 0 {
            warnings.push(
                "winrm_wait_timeout_ms is deprecated - use winrm_timeout_ms instead".to_string(),
            );
            self.winrm_timeout_ms = self.winrm_wait_timeout_ms;
        }

        if self.ssh_port == 0 {
            self.ssh_port = CommType::Ssh.default_port();
        }
        if self.winrm_port == 0 {
            self.winrm_port = CommType::Winrm.default_port();
        }
        if self.ssh_timeout_ms == 0 {
            self.ssh_timeout_ms = CommType::Ssh.default_timeout_ms();
        }
        if self.winrm_timeout_ms == 0 {
            self.winrm_timeout_ms = CommType::Winrm.default_timeout_ms();
        }

        warnings
    }
}
