//! Builders of the cluster objects a build creates.
use std::collections::BTreeMap;

use kvb_core::error::StepError;
use kvb_model::constants::{LABEL_DEFAULT_INSTANCETYPE, LABEL_DEFAULT_PREFERENCE, ROOTDISK_SUFFIX};
use kvb_model::resource::{
    ConfigMap, DataSource, DataVolume, DataVolumeSource, DataVolumeSpec, DataVolumeTemplate, Disk,
    DiskDevice, InstanceTemplate, Matcher, ObjectMeta, PvcSource, RunStrategy, StorageSpec,
    VirtualMachine, VirtualMachineSpec, Volume, VolumeSource,
};
use kvb_model::{BuildConfig, Labels, ModelError, OsType};

const DISK_ROOT: &str = "rootdisk";
const DISK_CDROM: &str = "cdrom";
const DISK_VIRTIO: &str = "virtiocontainerdisk";
const DISK_USERDATA: &str = "userdata";

fn meta(name: &str, namespace: &str) -> ObjectMeta {
    ObjectMeta {
        name: name.to_string(),
        namespace: Some(namespace.to_string()),
        labels: Labels::new(),
    }
}

fn storage(config: &BuildConfig) -> Result<StorageSpec, ModelError> {
    let size = config
        .disk_size
        .clone()
        .ok_or(ModelError::MissingField("disk_size"))?;
    Ok(StorageSpec {
        access_modes: vec![config.access_mode],
        volume_mode: config.volume_mode,
        size,
    })
}

/// Temporary build machine booting the installation ISO.
pub fn virtual_machine(config: &BuildConfig, os: OsType) -> Result<VirtualMachine, ModelError> {
    let (networks, interfaces) = config.networks.iter().map(|n| n.to_attachment()).unzip();

    let spec = VirtualMachineSpec {
        run_strategy: RunStrategy::Always,
        instancetype: Matcher {
            kind: config.instance_type_kind.clone(),
            name: config.instance_type.clone(),
        },
        preference: Matcher {
            kind: config.preference_kind.clone(),
            name: config.preference.clone(),
        },
        data_volume_templates: vec![DataVolumeTemplate {
            metadata: ObjectMeta::named(config.rootdisk_name()),
            spec: DataVolumeSpec {
                source: DataVolumeSource::Blank {},
                storage: storage(config)?,
            },
        }],
        template: InstanceTemplate {
            networks,
            interfaces,
            disks: disks(os),
            volumes: volumes(config, os),
        },
    };

    Ok(VirtualMachine::new(
        meta(&config.vm_name, &config.namespace),
        spec,
    ))
}

/// Disk order as seen by the guest.
///
/// The VirtIO driver disk sits ahead of `userdata` on Windows so drive
/// letters referenced by answer files stay stable.
pub fn disks(os: OsType) -> Vec<Disk> {
    let mut disks = vec![
        Disk {
            name: DISK_ROOT.to_string(),
            device: DiskDevice::Disk {},
            boot_order: Some(1),
        },
        Disk {
            name: DISK_CDROM.to_string(),
            device: DiskDevice::closed_cdrom(),
            boot_order: Some(2),
        },
    ];
    if os == OsType::Windows {
        disks.push(Disk {
            name: DISK_VIRTIO.to_string(),
            device: DiskDevice::closed_cdrom(),
            boot_order: None,
        });
    }
    disks.push(Disk {
        name: DISK_USERDATA.to_string(),
        device: DiskDevice::closed_cdrom(),
        boot_order: None,
    });
    disks
}

pub fn volumes(config: &BuildConfig, os: OsType) -> Vec<Volume> {
    let mut volumes = vec![
        Volume {
            name: DISK_ROOT.to_string(),
            source: VolumeSource::DataVolume {
                name: config.rootdisk_name(),
            },
        },
        Volume {
            name: DISK_CDROM.to_string(),
            source: VolumeSource::DataVolume {
                name: config.iso_volume_name.clone(),
            },
        },
    ];

    match os {
        OsType::Windows => {
            volumes.push(Volume {
                name: DISK_USERDATA.to_string(),
                source: VolumeSource::Sysprep {
                    config_map: config.vm_name.clone(),
                },
            });
            volumes.push(Volume {
                name: DISK_VIRTIO.to_string(),
                source: VolumeSource::ContainerDisk {
                    image: config.virtio_container.clone(),
                },
            });
        }
        OsType::Linux => volumes.push(Volume {
            name: DISK_USERDATA.to_string(),
            source: VolumeSource::ConfigMap {
                name: config.vm_name.clone(),
                volume_label: Some(config.media_label.clone()),
            },
        }),
    }
    volumes
}

/// Bundle of staged installer files, named after the machine.
pub fn media_config_map(config: &BuildConfig, data: BTreeMap<String, String>) -> ConfigMap {
    ConfigMap::new(meta(&config.vm_name, &config.namespace), data)
}

/// Clone of the machine's root disk under the image name.
pub fn bootable_volume(config: &BuildConfig) -> Result<DataVolume, StepError> {
    if config.vm_name.trim().is_empty() {
        return Err(StepError::EmptyRootVolume);
    }
    let spec = DataVolumeSpec {
        source: DataVolumeSource::Pvc(PvcSource {
            name: format!("{}{}", config.vm_name, ROOTDISK_SUFFIX),
            namespace: config.namespace.clone(),
        }),
        storage: storage(config)?,
    };
    Ok(DataVolume::new(meta(&config.name, &config.namespace), spec))
}

/// Reusable image pointing at the bootable volume.
pub fn data_source(config: &BuildConfig) -> DataSource {
    let mut labels = Labels::new();
    labels
        .insert(LABEL_DEFAULT_INSTANCETYPE, config.instance_type.as_str())
        .insert(LABEL_DEFAULT_PREFERENCE, config.preference.as_str());

    DataSource::new(
        meta(&config.name, &config.namespace).with_labels(labels),
        PvcSource {
            name: config.name.clone(),
            namespace: config.namespace.clone(),
        },
    )
}

#[cfg(test)]
mod tests {
    use kvb_model::config::NetworkConfig;
    use kvb_model::resource::{InterfaceBinding, NetworkSource};

    use super::*;

    fn config() -> BuildConfig {
        let mut c = BuildConfig {
            name: "fedora-42".into(),
            namespace: "images".into(),
            iso_volume_name: "fedora-42-iso".into(),
            disk_size: Some("20Gi".parse().unwrap()),
            instance_type: "u1.medium".into(),
            preference: "fedora".into(),
            os_type: "linux".into(),
            networks: vec![
                NetworkConfig::pod("default"),
                NetworkConfig::multus("lan", "infra/br0"),
            ],
            ..Default::default()
        };
        c.prepare().unwrap();
        c
    }

    fn names(disks: &[Disk]) -> Vec<&str> {
        disks.iter().map(|d| d.name.as_str()).collect()
    }

    #[test]
    fn linux_disk_order() {
        let disks = disks(OsType::Linux);
        assert_eq!(names(&disks), ["rootdisk", "cdrom", "userdata"]);
        assert_eq!(disks[0].boot_order, Some(1));
        assert_eq!(disks[1].boot_order, Some(2));
        assert_eq!(disks[2].boot_order, None);
    }

    #[test]
    fn windows_disk_order_puts_virtio_before_userdata() {
        let disks = disks(OsType::Windows);
        assert_eq!(
            names(&disks),
            ["rootdisk", "cdrom", "virtiocontainerdisk", "userdata"]
        );
        assert_eq!(disks[1].device, DiskDevice::closed_cdrom());
    }

    #[test]
    fn linux_userdata_is_labelled_config_map() {
        let c = config();
        let vols = volumes(&c, OsType::Linux);
        assert_eq!(
            vols[2].source,
            VolumeSource::ConfigMap {
                name: "fedora-42-builder".into(),
                volume_label: Some("OEMDRV".into()),
            }
        );
        assert_eq!(
            vols[0].source,
            VolumeSource::DataVolume {
                name: "fedora-42-builder-rootdisk".into()
            }
        );
        assert_eq!(
            vols[1].source,
            VolumeSource::DataVolume {
                name: "fedora-42-iso".into()
            }
        );
    }

    #[test]
    fn windows_userdata_is_sysprep_plus_driver_disk() {
        let c = config();
        let vols = volumes(&c, OsType::Windows);
        assert_eq!(
            vols[2].source,
            VolumeSource::Sysprep {
                config_map: "fedora-42-builder".into()
            }
        );
        assert_eq!(
            vols[3].source,
            VolumeSource::ContainerDisk {
                image: c.virtio_container.clone()
            }
        );
    }

    #[test]
    fn machine_descriptor() {
        let c = config();
        let vm = virtual_machine(&c, OsType::Linux).unwrap();

        assert_eq!(vm.metadata.name, "fedora-42-builder");
        assert_eq!(vm.metadata.namespace.as_deref(), Some("images"));
        assert_eq!(vm.spec.run_strategy, RunStrategy::Always);
        assert_eq!(vm.spec.instancetype.kind, "virtualmachineclusterinstancetype");
        assert_eq!(vm.spec.preference.name, "fedora");

        let root = &vm.spec.data_volume_templates[0];
        assert_eq!(root.metadata.name, "fedora-42-builder-rootdisk");
        assert_eq!(root.spec.source, DataVolumeSource::Blank {});

        let t = &vm.spec.template;
        assert_eq!(t.networks.len(), 2);
        assert!(matches!(t.networks[0].source, NetworkSource::Pod { .. }));
        assert_eq!(t.interfaces[0].binding, InterfaceBinding::Masquerade);
        assert_eq!(t.interfaces[1].binding, InterfaceBinding::Bridge);
    }

    #[test]
    fn bootable_volume_clones_rootdisk() {
        let c = config();
        let dv = bootable_volume(&c).unwrap();
        assert_eq!(dv.metadata.name, "fedora-42");
        assert_eq!(
            dv.spec.source,
            DataVolumeSource::Pvc(PvcSource {
                name: "fedora-42-builder-rootdisk".into(),
                namespace: "images".into(),
            })
        );
    }

    #[test]
    fn bootable_volume_requires_vm_name() {
        let mut c = config();
        c.vm_name.clear();
        assert!(matches!(
            bootable_volume(&c),
            Err(StepError::EmptyRootVolume)
        ));
    }

    #[test]
    fn data_source_labels_and_source() {
        let c = config();
        let ds = data_source(&c);
        assert_eq!(ds.labels().get(LABEL_DEFAULT_INSTANCETYPE), Some("u1.medium"));
        assert_eq!(ds.labels().get(LABEL_DEFAULT_PREFERENCE), Some("fedora"));
        assert_eq!(
            ds.spec.source,
            PvcSource {
                name: "fedora-42".into(),
                namespace: "images".into(),
            }
        );
    }
}
