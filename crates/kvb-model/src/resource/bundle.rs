use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::resource::ObjectMeta;

/// Key/value bundle mounted into the guest as an auxiliary drive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMap {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

impl ConfigMap {
    pub fn new(metadata: ObjectMeta, data: BTreeMap<String, String>) -> Self {
        Self { metadata, data }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }
}
