use serde::{Deserialize, Serialize};

use crate::resource::{Interface, InterfaceBinding, Network, NetworkSource};

/// Network attachment of the build machine. Exactly one source may be set;
/// with neither, the attachment is a pod network.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub name: String,
    pub pod: Option<PodNetwork>,
    pub multus: Option<MultusNetwork>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PodNetwork {
    #[serde(rename = "vmNetworkCIDR")]
    pub vm_network_cidr: Option<String>,
    #[serde(rename = "vmIPv6NetworkCIDR")]
    pub vm_ipv6_network_cidr: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MultusNetwork {
    pub network_name: String,
    pub default: bool,
}

impl NetworkConfig {
    pub fn pod(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pod: Some(PodNetwork::default()),
            multus: None,
        }
    }

    pub fn multus(name: impl Into<String>, network_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pod: None,
            multus: Some(MultusNetwork {
                network_name: network_name.into(),
                default: false,
            }),
        }
    }

    pub fn is_ambiguous(&self) -> bool {
        self.pod.is_some() && self.multus.is_some()
    }

    /// Machine network plus its interface: pod → masquerade, multus → bridge.
    pub fn to_attachment(&self) -> (Network, Interface) {
        let (source, binding) = match &self.multus {
            Some(m) => (
                NetworkSource::Multus {
                    network_name: m.network_name.clone(),
                    default: m.default,
                },
                InterfaceBinding::Bridge,
            ),
            None => {
                let pod = self.pod.clone().unwrap_or_default();
                (
                    NetworkSource::Pod {
                        vm_network_cidr: pod.vm_network_cidr,
                        vm_ipv6_network_cidr: pod.vm_ipv6_network_cidr,
                    },
                    InterfaceBinding::Masquerade,
                )
            }
        };
        (
            Network {
                name: self.name.clone(),
                source,
            },
            Interface {
                name: self.name.clone(),
                binding,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pod_maps_to_masquerade_and_multus_to_bridge() {
        let (net, iface) = NetworkConfig::pod("default").to_attachment();
        assert!(matches!(net.source, NetworkSource::Pod { .. }));
        assert_eq!(iface.binding, InterfaceBinding::Masquerade);

        let (net, iface) = NetworkConfig::multus("lan", "infra/br0").to_attachment();
        assert_eq!(
            net.source,
            NetworkSource::Multus {
                network_name: "infra/br0".into(),
                default: false
            }
        );
        assert_eq!(iface.binding, InterfaceBinding::Bridge);
        assert_eq!(iface.name, "lan");
    }

    #[test]
    fn camel_case_cidr_keys() {
        let n: NetworkConfig = serde_json::from_str(
            r#"{"name":"default","pod":{"vmNetworkCIDR":"10.1.0.0/24"}}"#,
        )
        .unwrap();
        assert_eq!(
            n.pod.unwrap().vm_network_cidr.as_deref(),
            Some("10.1.0.0/24")
        );
    }
}
