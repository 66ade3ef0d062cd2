//! Cluster resource payloads exchanged with the control plane.
//!
//! Only the fields the build reads or writes are modelled.

mod bundle;
pub use bundle::ConfigMap;

mod meta;
pub use meta::{ObjectMeta, ResourceRef};

mod vm;
pub use vm::{
    DataVolumeTemplate, Disk, DiskDevice, InstanceTemplate, Interface, InterfaceBinding, Matcher,
    Network, NetworkSource, RunStrategy, VirtualMachine, VirtualMachineSpec, VirtualMachineStatus,
    Volume, VolumeSource,
};

mod vmi;
pub use vmi::{
    Condition, ConditionStatus, InstanceInterface, InstancePhase, InstanceStatus,
    VirtualMachineInstance,
};

mod volume;
pub use volume::{
    DataSource, DataSourceSpec, DataVolume, DataVolumePhase, DataVolumeSource, DataVolumeSpec,
    DataVolumeStatus, PvcSource, StorageSpec,
};
