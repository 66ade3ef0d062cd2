use serde::{Deserialize, Serialize};

use crate::resource::ObjectMeta;

/// Running instance of the build machine, as reported by the control plane.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineInstance {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub status: InstanceStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceStatus {
    #[serde(default)]
    pub phase: InstancePhase,
    /// `None` when the control plane does not report interfaces at all,
    /// as opposed to an empty list while the guest is still booting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interfaces: Option<Vec<InstanceInterface>>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl InstanceStatus {
    /// Address of the first interface, empty when not yet assigned.
    pub fn first_address(&self) -> Option<&str> {
        let ifaces = self.interfaces.as_ref()?;
        Some(ifaces.first().map(|i| i.ip.as_str()).unwrap_or(""))
    }

    /// `true` if a condition of the given type is in the `True` state.
    pub fn condition_is_true(&self, kind: &str) -> bool {
        self.conditions
            .iter()
            .any(|c| c.kind == kind && c.status == ConditionStatus::True)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstancePhase {
    #[default]
    Pending,
    Scheduling,
    Scheduled,
    Running,
    Succeeded,
    Failed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceInterface {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "ipAddress")]
    pub ip: String,
}

impl InstanceInterface {
    pub fn with_ip(ip: impl Into<String>) -> Self {
        Self {
            name: String::new(),
            ip: ip.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(rename = "type")]
    pub kind: String,
    pub status: ConditionStatus,
}

impl Condition {
    pub fn new(kind: impl Into<String>, status: ConditionStatus) -> Self {
        Self {
            kind: kind.into(),
            status,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_address_distinguishes_missing_and_empty_lists() {
        let mut status = InstanceStatus::default();
        assert_eq!(status.first_address(), None);

        status.interfaces = Some(vec![]);
        assert_eq!(status.first_address(), Some(""));

        status.interfaces = Some(vec![
            InstanceInterface::with_ip("10.0.0.7"),
            InstanceInterface::with_ip("10.0.0.8"),
        ]);
        assert_eq!(status.first_address(), Some("10.0.0.7"));
    }

    #[test]
    fn condition_lookup_requires_true_status() {
        let status = InstanceStatus {
            conditions: vec![
                Condition::new("Ready", ConditionStatus::True),
                Condition::new("AgentConnected", ConditionStatus::False),
            ],
            ..Default::default()
        };
        assert!(status.condition_is_true("Ready"));
        assert!(!status.condition_is_true("AgentConnected"));
    }

    #[test]
    fn unknown_phase_deserializes() {
        let json = r#"{"metadata":{"name":"vm"},"status":{"phase":"WaitingForSync"}}"#;
        let vmi: VirtualMachineInstance = serde_json::from_str(json).unwrap();
        assert_eq!(vmi.status.phase, InstancePhase::Unknown);
    }
}
