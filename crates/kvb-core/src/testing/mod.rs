//! In-memory cluster used by tests of this workspace.
//!
//! [`FakeCluster`] implements every collaborator trait of [`crate::cluster`]
//! with scripted behaviour: instance statuses are replayed in order (the
//! last one repeats), created data volumes jump to a configurable phase,
//! and any call can be made to fail.
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use kvb_model::boot::{Key, KeyAction};
use kvb_model::resource::{
    Condition, ConditionStatus, ConfigMap, DataSource, DataVolume, DataVolumePhase,
    InstanceInterface, InstancePhase, InstanceStatus, VirtualMachine, VirtualMachineInstance,
};
use kvb_model::{ResourceRef, constants::CONDITION_AGENT_CONNECTED};

use crate::cluster::{
    BundleStore, ClusterError, ClusterResult, DeleteOptions, Keyboard, PortStream, PortTarget,
    VirtClient,
};

type ObjKey = (String, String);

fn key(namespace: &str, name: &str) -> ObjKey {
    (namespace.to_string(), name.to_string())
}

#[derive(Default)]
struct Inner {
    vms: HashMap<ObjKey, VirtualMachine>,
    vm_gets_until_ready: usize,
    vm_deletes: Vec<(ResourceRef, DeleteOptions)>,
    stopped: bool,
    vmi_script: VecDeque<InstanceStatus>,
    data_volumes: HashMap<ObjKey, DataVolume>,
    dv_phases: VecDeque<DataVolumePhase>,
    data_sources: Vec<DataSource>,
    config_maps: HashMap<ObjKey, ConfigMap>,
    failures: HashMap<&'static str, ClusterError>,
    calls: Vec<String>,
}

#[derive(Clone, Default)]
pub struct FakeCluster {
    inner: Arc<Mutex<Inner>>,
    keys: Arc<Mutex<Vec<(Key, KeyAction)>>>,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn enter(&self, op: &'static str, target: String) -> ClusterResult<MutexGuard<'_, Inner>> {
        let mut inner = self.lock();
        inner.calls.push(format!("{op} {target}"));
        match inner.failures.get(op) {
            Some(err) => Err(err.clone()),
            None => Ok(inner),
        }
    }

    /// Makes every call of operation `op` (a trait method name) fail.
    pub fn fail_on(&self, op: &'static str, err: ClusterError) {
        self.lock().failures.insert(op, err);
    }

    /// Number of `get_vm` calls answered before the machine reports ready.
    pub fn set_vm_ready_after(&self, gets: usize) {
        self.lock().vm_gets_until_ready = gets;
    }

    /// Statuses returned by successive `get_vmi` calls; the last one repeats.
    pub fn script_vmi(&self, statuses: impl IntoIterator<Item = InstanceStatus>) {
        self.lock().vmi_script = statuses.into_iter().collect();
    }

    /// Shorthand for [`Self::script_vmi`] with one address per poll.
    /// An empty string yields an empty interface list.
    pub fn script_addresses(&self, addresses: &[&str]) {
        self.script_vmi(addresses.iter().map(|ip| running_with_address(ip)));
    }

    /// Phases reported by successive `get_data_volume` calls for volumes
    /// created through the client; the last one repeats.
    pub fn script_volume_phases(&self, phases: impl IntoIterator<Item = DataVolumePhase>) {
        self.lock().dv_phases = phases.into_iter().collect();
    }

    /// Seeds an existing data volume, e.g. the installation ISO.
    pub fn insert_data_volume(&self, dv: DataVolume) {
        let ns = dv.metadata.namespace.clone().unwrap_or_default();
        self.lock()
            .data_volumes
            .insert(key(&ns, &dv.metadata.name), dv);
    }

    pub fn vm(&self, namespace: &str, name: &str) -> Option<VirtualMachine> {
        self.lock().vms.get(&key(namespace, name)).cloned()
    }

    pub fn vm_deletes(&self) -> Vec<(ResourceRef, DeleteOptions)> {
        self.lock().vm_deletes.clone()
    }

    pub fn data_volume(&self, namespace: &str, name: &str) -> Option<DataVolume> {
        self.lock().data_volumes.get(&key(namespace, name)).cloned()
    }

    pub fn data_sources(&self) -> Vec<DataSource> {
        self.lock().data_sources.clone()
    }

    pub fn config_map(&self, namespace: &str, name: &str) -> Option<ConfigMap> {
        self.lock().config_maps.get(&key(namespace, name)).cloned()
    }

    /// Every call made so far, as `"<operation> <namespace>/<name>"`.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// `true` if any recorded call starts with `op`.
    pub fn called(&self, op: &str) -> bool {
        self.lock().calls.iter().any(|c| c.split(' ').next() == Some(op))
    }

    /// Keys typed on any keyboard opened through this cluster.
    pub fn keys_sent(&self) -> Vec<(Key, KeyAction)> {
        self.keys.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

/// Running instance whose first interface reports `ip`.
pub fn running_with_address(ip: &str) -> InstanceStatus {
    let interfaces = if ip.is_empty() {
        Vec::new()
    } else {
        vec![InstanceInterface::with_ip(ip)]
    };
    InstanceStatus {
        phase: InstancePhase::Running,
        interfaces: Some(interfaces),
        conditions: Vec::new(),
    }
}

/// Running instance with the agent-connected condition set to `connected`.
pub fn running_with_agent(connected: bool) -> InstanceStatus {
    let status = if connected {
        ConditionStatus::True
    } else {
        ConditionStatus::False
    };
    InstanceStatus {
        phase: InstancePhase::Running,
        interfaces: Some(Vec::new()),
        conditions: vec![Condition::new(CONDITION_AGENT_CONNECTED, status)],
    }
}

fn namespace_of(meta_ns: &Option<String>) -> String {
    meta_ns.clone().unwrap_or_default()
}

#[async_trait]
impl VirtClient for FakeCluster {
    async fn create_vm(&self, vm: &VirtualMachine) -> ClusterResult<VirtualMachine> {
        let ns = namespace_of(&vm.metadata.namespace);
        let mut inner = self.enter("create_vm", format!("{ns}/{}", vm.name()))?;
        let k = key(&ns, vm.name());
        if inner.vms.contains_key(&k) {
            return Err(ClusterError::AlreadyExists {
                kind: "VirtualMachine".into(),
                namespace: ns,
                name: vm.name().to_string(),
            });
        }
        inner.stopped = false;
        inner.vms.insert(k, vm.clone());
        Ok(vm.clone())
    }

    async fn get_vm(&self, namespace: &str, name: &str) -> ClusterResult<VirtualMachine> {
        let mut inner = self.enter("get_vm", format!("{namespace}/{name}"))?;
        let ready = if inner.vm_gets_until_ready == 0 {
            true
        } else {
            inner.vm_gets_until_ready -= 1;
            false
        };
        let vm = inner
            .vms
            .get_mut(&key(namespace, name))
            .ok_or_else(|| ClusterError::not_found("VirtualMachine", namespace, name))?;
        vm.status.ready = ready;
        Ok(vm.clone())
    }

    async fn delete_vm(
        &self,
        namespace: &str,
        name: &str,
        opts: DeleteOptions,
    ) -> ClusterResult<()> {
        let mut inner = self.enter("delete_vm", format!("{namespace}/{name}"))?;
        inner
            .vms
            .remove(&key(namespace, name))
            .ok_or_else(|| ClusterError::not_found("VirtualMachine", namespace, name))?;
        inner
            .vm_deletes
            .push((ResourceRef::new("VirtualMachine", namespace, name), opts));
        Ok(())
    }

    async fn stop_vm(&self, namespace: &str, name: &str) -> ClusterResult<()> {
        let mut inner = self.enter("stop_vm", format!("{namespace}/{name}"))?;
        if !inner.vms.contains_key(&key(namespace, name)) {
            return Err(ClusterError::not_found("VirtualMachine", namespace, name));
        }
        inner.stopped = true;
        Ok(())
    }

    async fn get_vmi(&self, namespace: &str, name: &str) -> ClusterResult<VirtualMachineInstance> {
        let mut inner = self.enter("get_vmi", format!("{namespace}/{name}"))?;
        if inner.stopped {
            return Err(ClusterError::not_found(
                "VirtualMachineInstance",
                namespace,
                name,
            ));
        }
        let status = if inner.vmi_script.len() > 1 {
            inner.vmi_script.pop_front().unwrap_or_default()
        } else {
            inner.vmi_script.front().cloned().unwrap_or_default()
        };
        Ok(VirtualMachineInstance {
            metadata: kvb_model::resource::ObjectMeta {
                name: name.to_string(),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            status,
        })
    }

    async fn create_data_volume(&self, dv: &DataVolume) -> ClusterResult<DataVolume> {
        let ns = namespace_of(&dv.metadata.namespace);
        let mut inner = self.enter("create_data_volume", format!("{ns}/{}", dv.metadata.name))?;
        let k = key(&ns, &dv.metadata.name);
        if inner.data_volumes.contains_key(&k) {
            return Err(ClusterError::AlreadyExists {
                kind: "DataVolume".into(),
                namespace: ns,
                name: dv.metadata.name.clone(),
            });
        }
        inner.data_volumes.insert(k, dv.clone());
        Ok(dv.clone())
    }

    async fn get_data_volume(&self, namespace: &str, name: &str) -> ClusterResult<DataVolume> {
        let mut inner = self.enter("get_data_volume", format!("{namespace}/{name}"))?;
        let created = inner.calls.iter().any(|c| {
            c.starts_with("create_data_volume ") && c.ends_with(&format!(" {namespace}/{name}"))
        });
        let phase = if !created {
            None
        } else if inner.dv_phases.len() > 1 {
            inner.dv_phases.pop_front()
        } else {
            inner.dv_phases.front().copied()
        };
        let dv = inner
            .data_volumes
            .get_mut(&key(namespace, name))
            .ok_or_else(|| ClusterError::not_found("DataVolume", namespace, name))?;
        if let Some(phase) = phase {
            dv.status.phase = phase;
        }
        Ok(dv.clone())
    }

    async fn create_data_source(&self, ds: &DataSource) -> ClusterResult<DataSource> {
        let ns = namespace_of(&ds.metadata.namespace);
        let mut inner = self.enter("create_data_source", format!("{ns}/{}", ds.metadata.name))?;
        inner.data_sources.push(ds.clone());
        Ok(ds.clone())
    }

    async fn open_keyboard(&self, namespace: &str, name: &str) -> ClusterResult<Box<dyn Keyboard>> {
        drop(self.enter("open_keyboard", format!("{namespace}/{name}"))?);
        Ok(Box::new(FakeKeyboard {
            keys: self.keys.clone(),
        }))
    }

    /// Echoes every byte written to the stream back to the reader.
    async fn open_port_stream(
        &self,
        target: &PortTarget,
        port: u16,
    ) -> ClusterResult<Box<dyn PortStream>> {
        drop(self.enter(
            "open_port_stream",
            format!("{}/{}:{port}", target.namespace, target.name),
        )?);
        let (near, far) = tokio::io::duplex(64 * 1024);
        tokio::spawn(async move {
            let (mut rd, mut wr) = tokio::io::split(far);
            let _ = tokio::io::copy(&mut rd, &mut wr).await;
        });
        Ok(Box::new(near))
    }
}

#[async_trait]
impl BundleStore for FakeCluster {
    async fn create_config_map(&self, cm: &ConfigMap) -> ClusterResult<ConfigMap> {
        let ns = namespace_of(&cm.metadata.namespace);
        let mut inner = self.enter("create_config_map", format!("{ns}/{}", cm.name()))?;
        inner.config_maps.insert(key(&ns, cm.name()), cm.clone());
        Ok(cm.clone())
    }

    async fn delete_config_map(&self, namespace: &str, name: &str) -> ClusterResult<()> {
        let mut inner = self.enter("delete_config_map", format!("{namespace}/{name}"))?;
        inner
            .config_maps
            .remove(&key(namespace, name))
            .map(|_| ())
            .ok_or_else(|| ClusterError::not_found("ConfigMap", namespace, name))
    }
}

struct FakeKeyboard {
    keys: Arc<Mutex<Vec<(Key, KeyAction)>>>,
}

#[async_trait]
impl Keyboard for FakeKeyboard {
    async fn send(&mut self, key: Key, action: KeyAction) -> ClusterResult<()> {
        self.keys
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push((key, action));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;

    #[tokio::test]
    async fn vmi_script_repeats_last_status() {
        let cluster = FakeCluster::new();
        cluster.script_addresses(&["", "10.0.0.1"]);

        let ips: Vec<String> = {
            let mut out = Vec::new();
            for _ in 0..3 {
                let vmi = cluster.get_vmi("ns", "vm").await.unwrap();
                out.push(vmi.status.first_address().unwrap_or("-").to_string());
            }
            out
        };
        assert_eq!(ips, ["", "10.0.0.1", "10.0.0.1"]);
    }

    #[tokio::test]
    async fn injected_failure_is_returned_and_logged() {
        let cluster = FakeCluster::new();
        cluster.fail_on("get_vm", ClusterError::Api("boom".into()));

        let err = cluster.get_vm("ns", "vm").await.unwrap_err();
        assert_eq!(err, ClusterError::Api("boom".into()));
        assert_eq!(cluster.calls(), ["get_vm ns/vm"]);
    }

    #[tokio::test]
    async fn port_stream_echoes() {
        let cluster = FakeCluster::new();
        let mut stream = cluster
            .open_port_stream(&PortTarget::vmi("ns", "vm"), 22)
            .await
            .unwrap();

        stream.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        stream.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");
    }
}
