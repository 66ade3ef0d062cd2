//! Build configuration: what to install, where, and how to reach the guest.
//!
//! Every duration is expressed in milliseconds (`*_ms`). [`BuildConfig::prepare`]
//! must run before the configuration is handed to the steps: it validates
//! the whole surface at once and fills derived defaults.

mod comm;
pub use comm::CommConfig;

mod network;
pub use network::{MultusNetwork, NetworkConfig, PodNetwork};

mod wait;
pub use wait::{DEFAULT_IP_SETTLE_TIMEOUT_MS, DEFAULT_IP_WAIT_TIMEOUT_MS, WaitConfig, poll_interval};

use std::{collections::BTreeMap, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::boot::parse_boot_command;
use crate::constants::{
    DEFAULT_INSTANCETYPE_KIND, DEFAULT_MEDIA_LABEL, DEFAULT_PREFERENCE_KIND,
    DEFAULT_VIRTIO_CONTAINER, ROOTDISK_SUFFIX, VM_NAME_SUFFIX,
};
use crate::{AccessMode, DurationMs, Flag, ModelError, ModelResult, OsType, Quantity, VolumeMode};

pub const DEFAULT_VM_READY_TIMEOUT_MS: DurationMs = 3_600_000;
pub const DEFAULT_VOLUME_WAIT_TIMEOUT_MS: DurationMs = 3_600_000;
pub const DEFAULT_STOP_TIMEOUT_MS: DurationMs = 600_000;
pub const DEFAULT_BOOT_KEY_INTERVAL_MS: DurationMs = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Name of the produced image (and of its data volume).
    pub name: String,
    pub namespace: String,
    /// Existing data volume holding the installation ISO.
    pub iso_volume_name: String,
    pub disk_size: Option<Quantity>,
    pub access_mode: AccessMode,
    pub volume_mode: VolumeMode,

    pub instance_type: String,
    pub instance_type_kind: String,
    pub preference: String,
    pub preference_kind: String,
    /// `linux` or `windows`; kept verbatim so the create step can reject it too.
    pub os_type: String,
    pub networks: Vec<NetworkConfig>,

    /// Files staged for the installer, keyed by basename.
    pub media_files: Vec<PathBuf>,
    /// Inline staged files; wins over a same-named entry of `media_files`.
    pub media_content: BTreeMap<String, String>,
    pub media_label: String,
    pub virtio_container: String,

    pub boot_command: Vec<String>,
    pub boot_wait_ms: DurationMs,
    pub boot_key_interval_ms: DurationMs,
    pub installation_wait_timeout_ms: DurationMs,

    /// Temporary machine name; defaults to `<name>-builder`.
    pub vm_name: String,
    pub vm_ready_timeout_ms: DurationMs,
    pub volume_wait_timeout_ms: DurationMs,
    pub stop_timeout_ms: DurationMs,

    pub keep_vm: Flag,
    pub keep_media: Flag,
    /// Orphan the root volume when the machine is deleted.
    pub keep_volumes: Flag,
    pub disable_forwarding: Flag,

    #[serde(flatten)]
    pub wait: WaitConfig,
    #[serde(flatten)]
    pub comm: CommConfig,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            namespace: String::new(),
            iso_volume_name: String::new(),
            disk_size: None,
            access_mode: AccessMode::default(),
            volume_mode: VolumeMode::default(),
            instance_type: String::new(),
            instance_type_kind: String::new(),
            preference: String::new(),
            preference_kind: String::new(),
            os_type: String::new(),
            networks: Vec::new(),
            media_files: Vec::new(),
            media_content: BTreeMap::new(),
            media_label: String::new(),
            virtio_container: String::new(),
            boot_command: Vec::new(),
            boot_wait_ms: 0,
            boot_key_interval_ms: DEFAULT_BOOT_KEY_INTERVAL_MS,
            installation_wait_timeout_ms: 0,
            vm_name: String::new(),
            vm_ready_timeout_ms: DEFAULT_VM_READY_TIMEOUT_MS,
            volume_wait_timeout_ms: DEFAULT_VOLUME_WAIT_TIMEOUT_MS,
            stop_timeout_ms: DEFAULT_STOP_TIMEOUT_MS,
            keep_vm: Flag::disabled(),
            keep_media: Flag::disabled(),
            keep_volumes: Flag::disabled(),
            disable_forwarding: Flag::disabled(),
            wait: WaitConfig::default(),
            comm: CommConfig::default(),
        }
    }
}

impl BuildConfig {
    /// Validates the configuration and fills derived defaults.
    ///
    /// All problems are reported together; on success the returned
    /// strings are deprecation warnings for the operator.
    pub fn prepare(&mut self) -> ModelResult<Vec<String>> {
        let mut errs = Vec::new();

        if self.os_type.trim().is_empty() {
            self.os_type = OsType::default().as_str().to_string();
        }
        for (field, value) in [
            ("name", &self.name),
            ("namespace", &self.namespace),
            ("iso_volume_name", &self.iso_volume_name),
            ("instance_type", &self.instance_type),
            ("preference", &self.preference),
        ] {
            if value.trim().is_empty() {
                errs.push(ModelError::MissingField(field));
            }
        }
        if self.disk_size.is_none() {
            errs.push(ModelError::MissingField("disk_size"));
        }
        if let Err(e) = self.os() {
            errs.push(e);
        }
        for n in &self.networks {
            if n.name.trim().is_empty() {
                errs.push(ModelError::Invalid("network without a name".to_string()));
            }
            if n.is_ambiguous() {
                errs.push(ModelError::Invalid(format!(
                    "network {:?}: only one of pod or multus can be defined",
                    n.name
                )));
            }
        }
        if let Err(e) = parse_boot_command(&self.boot_command_text()) {
            errs.push(e);
        }

        match errs.len() {
            0 => {}
            1 => return Err(errs.remove(0)),
            _ => return Err(ModelError::Multiple(errs)),
        }

        self.fill_defaults();
        Ok(self.comm.prepare())
    }

    fn fill_defaults(&mut self) {
        fn or_default(field: &mut String, default: &str) {
            if field.trim().is_empty() {
                *field = default.to_string();
            }
        }

        let vm_name = format!("{}{}", self.name, VM_NAME_SUFFIX);
        or_default(&mut self.vm_name, &vm_name);
        or_default(&mut self.instance_type_kind, DEFAULT_INSTANCETYPE_KIND);
        or_default(&mut self.preference_kind, DEFAULT_PREFERENCE_KIND);
        or_default(&mut self.media_label, DEFAULT_MEDIA_LABEL);
        or_default(&mut self.virtio_container, DEFAULT_VIRTIO_CONTAINER);

        for (field, default) in [
            (&mut self.vm_ready_timeout_ms, DEFAULT_VM_READY_TIMEOUT_MS),
            (&mut self.volume_wait_timeout_ms, DEFAULT_VOLUME_WAIT_TIMEOUT_MS),
            (&mut self.stop_timeout_ms, DEFAULT_STOP_TIMEOUT_MS),
        ] {
            if *field == 0 {
                *field = default;
            }
        }
    }

    pub fn os(&self) -> ModelResult<OsType> {
        self.os_type.parse()
    }

    /// Boot command entries joined into one script.
    pub fn boot_command_text(&self) -> String {
        self.boot_command.concat()
    }

    /// Name of the machine's root data volume.
    pub fn rootdisk_name(&self) -> String {
        format!("{}{}", self.vm_name, ROOTDISK_SUFFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CommType;

    fn valid() -> BuildConfig {
        BuildConfig {
            name: "fedora-42".into(),
            namespace: "images".into(),
            iso_volume_name: "fedora-42-iso".into(),
            disk_size: Some("20Gi".parse().unwrap()),
            instance_type: "u1.medium".into(),
            preference: "fedora".into(),
            os_type: "linux".into(),
            ..Default::default()
        }
    }

    #[test]
    fn prepare_fills_defaults() {
        let mut c = valid();
        let warnings = c.prepare().unwrap();
        assert!(warnings.is_empty());
        assert_eq!(c.vm_name, "fedora-42-builder");
        assert_eq!(c.rootdisk_name(), "fedora-42-builder-rootdisk");
        assert_eq!(c.instance_type_kind, DEFAULT_INSTANCETYPE_KIND);
        assert_eq!(c.preference_kind, DEFAULT_PREFERENCE_KIND);
        assert_eq!(c.media_label, "OEMDRV");
        assert_eq!(c.comm.port(), 22);
    }

    #[test]
    fn missing_os_type_means_linux() {
        let mut c = valid();
        c.os_type.clear();
        c.prepare().unwrap();
        assert_eq!(c.os().unwrap(), OsType::Linux);
    }

    #[test]
    fn prepare_keeps_explicit_values() {
        let mut c = valid();
        c.vm_name = "custom".into();
        c.media_label = "CIDATA".into();
        c.prepare().unwrap();
        assert_eq!(c.vm_name, "custom");
        assert_eq!(c.media_label, "CIDATA");
    }

    #[test]
    fn prepare_collects_every_error() {
        let mut c = BuildConfig {
            os_type: "plan9".into(),
            networks: vec![NetworkConfig {
                name: "both".into(),
                pod: Some(PodNetwork::default()),
                multus: Some(MultusNetwork::default()),
            }],
            boot_command: vec!["<wait1x>".into()],
            ..Default::default()
        };
        match c.prepare().unwrap_err() {
            ModelError::Multiple(errs) => {
                assert!(errs
                    .iter()
                    .any(|e| matches!(e, ModelError::MissingField("disk_size"))));
                assert!(errs
                    .iter()
                    .any(|e| matches!(e, ModelError::UnsupportedOsType(_))));
                assert!(errs
                    .iter()
                    .any(|e| matches!(e, ModelError::InvalidBootCommand { .. })));
                assert!(errs.iter().any(|e| e.to_string().contains("only one of pod or multus")));
            }
            other => panic!("expected multiple errors, got {other}"),
        }
    }

    #[test]
    fn single_error_is_not_wrapped() {
        let mut c = valid();
        c.namespace.clear();
        assert!(matches!(
            c.prepare().unwrap_err(),
            ModelError::MissingField("namespace")
        ));
    }

    #[test]
    fn deserializes_flat_document() {
        let c: BuildConfig = serde_json::from_value(serde_json::json!({
            "name": "win11",
            "namespace": "images",
            "iso_volume_name": "win11-iso",
            "disk_size": "64Gi",
            "volume_mode": "Block",
            "instance_type": "u1.large",
            "preference": "windows.11",
            "os_type": "windows",
            "keep_vm": true,
            "communicator": "winrm",
            "winrm_username": "Administrator",
            "ip_settle_timeout_ms": 0,
            "networks": [{"name": "default", "pod": {}}]
        }))
        .unwrap();
        assert_eq!(c.os().unwrap(), OsType::Windows);
        assert_eq!(c.volume_mode, VolumeMode::Block);
        assert!(c.keep_vm.is_enabled());
        assert_eq!(c.comm.communicator, CommType::Winrm);
        assert_eq!(c.comm.username(), Some("Administrator"));
        assert_eq!(c.wait.ip_settle_timeout_ms, 0);
        assert_eq!(c.wait.ip_wait_timeout_ms, DEFAULT_IP_WAIT_TIMEOUT_MS);
        assert_eq!(c.disk_size.as_ref().map(Quantity::bytes), Some(64 << 30));
    }

    #[test]
    fn invalid_access_mode_is_rejected_at_load() {
        let res: Result<BuildConfig, _> =
            serde_json::from_value(serde_json::json!({"access_mode": "ReadOnlyMany"}));
        assert!(res.is_err());
    }
}
