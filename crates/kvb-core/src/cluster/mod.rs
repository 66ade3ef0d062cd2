//! Remote collaborators of a build, consumed through traits.
//!
//! Clients are constructor-injected into steps as `Arc<dyn …>` handles.
//! Calls carry no cancellation of their own; callers race them against
//! the build token with `tokio::select!`.
mod error;
pub use error::{ClusterError, ClusterResult};

use std::fmt;

use async_trait::async_trait;
use kvb_model::boot::{Key, KeyAction};
use kvb_model::resource::{ConfigMap, DataSource, DataVolume, VirtualMachine, VirtualMachineInstance};
use tokio::io::{AsyncRead, AsyncWrite};

/// Dependent-object handling when a machine is deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Propagation {
    /// Dependents are deleted in the background.
    #[default]
    Background,
    /// Dependents (the root volume) are left in place.
    Orphan,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteOptions {
    pub grace_period_secs: u64,
    pub propagation: Propagation,
}

impl DeleteOptions {
    /// Delete without a grace period.
    pub fn immediate(propagation: Propagation) -> Self {
        Self {
            grace_period_secs: 0,
            propagation,
        }
    }
}

/// Workload a port stream is opened to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortTarget {
    /// Resource kind in the control-plane API, e.g. `vmi`.
    pub kind: String,
    pub namespace: String,
    pub name: String,
}

impl PortTarget {
    pub fn vmi(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: "vmi".to_string(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for PortTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.kind, self.namespace, self.name)
    }
}

/// Byte stream relayed through the control plane to a workload port.
pub trait PortStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> PortStream for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

/// Console keyboard of a running instance.
#[async_trait]
pub trait Keyboard: Send {
    async fn send(&mut self, key: Key, action: KeyAction) -> ClusterResult<()>;
}

/// Virtualization and storage API of the cluster.
///
/// Objects carry their namespace in `metadata.namespace` on create.
#[async_trait]
pub trait VirtClient: Send + Sync {
    async fn create_vm(&self, vm: &VirtualMachine) -> ClusterResult<VirtualMachine>;

    async fn get_vm(&self, namespace: &str, name: &str) -> ClusterResult<VirtualMachine>;

    async fn delete_vm(
        &self,
        namespace: &str,
        name: &str,
        opts: DeleteOptions,
    ) -> ClusterResult<()>;

    /// Requests a graceful shutdown of the machine.
    async fn stop_vm(&self, namespace: &str, name: &str) -> ClusterResult<()>;

    async fn get_vmi(&self, namespace: &str, name: &str) -> ClusterResult<VirtualMachineInstance>;

    async fn create_data_volume(&self, dv: &DataVolume) -> ClusterResult<DataVolume>;

    async fn get_data_volume(&self, namespace: &str, name: &str) -> ClusterResult<DataVolume>;

    async fn create_data_source(&self, ds: &DataSource) -> ClusterResult<DataSource>;

    /// Opens the console keyboard of a running instance.
    async fn open_keyboard(&self, namespace: &str, name: &str) -> ClusterResult<Box<dyn Keyboard>>;

    /// Opens one relayed connection to `port` of the target workload.
    async fn open_port_stream(
        &self,
        target: &PortTarget,
        port: u16,
    ) -> ClusterResult<Box<dyn PortStream>>;
}

/// Store of key/value bundles staged for the installer.
#[async_trait]
pub trait BundleStore: Send + Sync {
    async fn create_config_map(&self, cm: &ConfigMap) -> ClusterResult<ConfigMap>;

    async fn delete_config_map(&self, namespace: &str, name: &str) -> ClusterResult<()>;
}
