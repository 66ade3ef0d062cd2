use serde::{Deserialize, Serialize};

use crate::resource::ObjectMeta;
use crate::{AccessMode, Labels, Quantity, VolumeMode};

pub const CDI_API_VERSION: &str = "cdi.kubevirt.io/v1beta1";

/// Persistent disk managed by the data-import layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataVolume {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: DataVolumeSpec,
    #[serde(default)]
    pub status: DataVolumeStatus,
}

impl DataVolume {
    pub fn new(metadata: ObjectMeta, spec: DataVolumeSpec) -> Self {
        Self {
            api_version: CDI_API_VERSION.to_string(),
            kind: "DataVolume".to_string(),
            metadata,
            spec,
            status: DataVolumeStatus::default(),
        }
    }

    pub fn phase(&self) -> DataVolumePhase {
        self.status.phase
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataVolumeSpec {
    pub source: DataVolumeSource,
    pub storage: StorageSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DataVolumeSource {
    Blank {},
    Pvc(PvcSource),
}

/// Existing claim used as a clone source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PvcSource {
    pub name: String,
    pub namespace: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageSpec {
    pub access_modes: Vec<AccessMode>,
    pub volume_mode: VolumeMode,
    pub size: Quantity,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataVolumeStatus {
    #[serde(default)]
    pub phase: DataVolumePhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataVolumePhase {
    #[default]
    Pending,
    ImportScheduled,
    ImportInProgress,
    CloneScheduled,
    CloneInProgress,
    Paused,
    Succeeded,
    Failed,
    #[serde(other)]
    Unknown,
}

/// Named, labelled pointer to a volume; what the build publishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSource {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: DataSourceSpec,
}

impl DataSource {
    pub fn new(metadata: ObjectMeta, source: PvcSource) -> Self {
        Self {
            api_version: CDI_API_VERSION.to_string(),
            kind: "DataSource".to_string(),
            metadata,
            spec: DataSourceSpec { source },
        }
    }

    pub fn labels(&self) -> &Labels {
        &self.metadata.labels
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSourceSpec {
    #[serde(with = "pvc_wrapper")]
    pub source: PvcSource,
}

/// `source: { pvc: { name, namespace } }` on the wire.
mod pvc_wrapper {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::PvcSource;

    #[derive(Serialize, Deserialize)]
    struct Wrapped<T> {
        pvc: T,
    }

    pub fn serialize<S: Serializer>(src: &PvcSource, s: S) -> Result<S::Ok, S::Error> {
        Wrapped { pvc: src }.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<PvcSource, D::Error> {
        Wrapped::<PvcSource>::deserialize(d).map(|w| w.pvc)
    }
}
