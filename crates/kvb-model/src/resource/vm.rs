use serde::{Deserialize, Serialize};

use crate::resource::{DataVolumeSpec, ObjectMeta};

pub const VM_API_VERSION: &str = "kubevirt.io/v1";

/// Desired-state descriptor of the temporary build machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachine {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: VirtualMachineSpec,
    #[serde(default)]
    pub status: VirtualMachineStatus,
}

impl VirtualMachine {
    pub fn new(metadata: ObjectMeta, spec: VirtualMachineSpec) -> Self {
        Self {
            api_version: VM_API_VERSION.to_string(),
            kind: "VirtualMachine".to_string(),
            metadata,
            spec,
            status: VirtualMachineStatus::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineSpec {
    pub run_strategy: RunStrategy,
    pub instancetype: Matcher,
    pub preference: Matcher,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data_volume_templates: Vec<DataVolumeTemplate>,
    pub template: InstanceTemplate,
}

/// Status fields written by the control plane.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineStatus {
    #[serde(default)]
    pub ready: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStrategy {
    Always,
    Halted,
}

/// Reference to an instance type or preference resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Matcher {
    pub kind: String,
    pub name: String,
}

/// Volume created together with (and owned by) the machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataVolumeTemplate {
    pub metadata: ObjectMeta,
    pub spec: DataVolumeSpec,
}

/// Instance-level part of the machine definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceTemplate {
    #[serde(default)]
    pub networks: Vec<Network>,
    #[serde(default)]
    pub interfaces: Vec<Interface>,
    #[serde(default)]
    pub disks: Vec<Disk>,
    #[serde(default)]
    pub volumes: Vec<Volume>,
}

/// Disk device as seen by the guest. Order in the list is significant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Disk {
    pub name: String,
    #[serde(flatten)]
    pub device: DiskDevice,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boot_order: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DiskDevice {
    Disk {},
    Cdrom { tray: String, bus: String },
}

impl DiskDevice {
    /// Optical drive with a closed tray on the SATA bus.
    pub fn closed_cdrom() -> Self {
        DiskDevice::Cdrom {
            tray: "closed".to_string(),
            bus: "sata".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    pub name: String,
    #[serde(flatten)]
    pub source: VolumeSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VolumeSource {
    #[serde(rename_all = "camelCase")]
    DataVolume { name: String },
    #[serde(rename_all = "camelCase")]
    ConfigMap {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        volume_label: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Sysprep { config_map: String },
    #[serde(rename_all = "camelCase")]
    ContainerDisk { image: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub name: String,
    #[serde(flatten)]
    pub source: NetworkSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NetworkSource {
    #[serde(rename_all = "camelCase")]
    Pod {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        vm_network_cidr: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        vm_ipv6_network_cidr: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Multus {
        network_name: String,
        #[serde(default)]
        default: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interface {
    pub name: String,
    pub binding: InterfaceBinding,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InterfaceBinding {
    Masquerade,
    Bridge,
}
