use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kvb_core::cluster::{DeleteOptions, Propagation, VirtClient};
use kvb_core::error::StepError;
use kvb_core::state::StateBag;
use kvb_core::step::{Step, StepAction};
use kvb_model::BuildConfig;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::resources;
use crate::steps::{POLL_INTERVAL, poll_until, race, retain};

/// Creates the temporary build machine and waits until it reports ready.
pub struct StepCreateVirtualMachine {
    config: Arc<BuildConfig>,
    client: Arc<dyn VirtClient>,
}

impl StepCreateVirtualMachine {
    pub fn new(config: Arc<BuildConfig>, client: Arc<dyn VirtClient>) -> Self {
        Self { config, client }
    }

    async fn create(&self, cancel: &CancellationToken) -> Result<(), StepError> {
        let os = self.config.os()?;
        let vm = resources::virtual_machine(&self.config, os)?;

        info!(
            namespace = %self.config.namespace,
            name = %self.config.vm_name,
            os = %os,
            "creating temporary VirtualMachine"
        );
        race(cancel, "VirtualMachine creation", self.client.create_vm(&vm)).await?;
        Ok(())
    }

    async fn wait_ready(&self, cancel: &CancellationToken) -> Result<(), StepError> {
        let ns = self.config.namespace.as_str();
        let name = self.config.vm_name.as_str();
        let client = &self.client;
        poll_until(
            cancel,
            "VirtualMachine ready",
            POLL_INTERVAL,
            Duration::from_millis(self.config.vm_ready_timeout_ms),
            || async move {
                let vm = client.get_vm(ns, name).await?;
                Ok::<_, StepError>(vm.status.ready)
            },
        )
        .await?;

        info!(namespace = ns, name, "VirtualMachine is ready");
        Ok(())
    }

    /// Deletes the machine unless `keep_vm` is set.
    async fn remove(&self, state: &mut StateBag) -> Result<(), StepError> {
        let ns = &self.config.namespace;
        let name = &self.config.vm_name;

        if self.config.keep_vm.is_enabled() {
            info!(namespace = %ns, name = %name, "keeping VirtualMachine");
            retain(state, "VirtualMachine", ns, name);
            return Ok(());
        }

        let propagation = if self.config.keep_volumes.is_enabled() {
            Propagation::Orphan
        } else {
            Propagation::Background
        };
        info!(namespace = %ns, name = %name, ?propagation, "deleting VirtualMachine");

        match self
            .client
            .delete_vm(ns, name, DeleteOptions::immediate(propagation))
            .await
        {
            Err(e) if !e.is_not_found() => Err(e.into()),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl Step for StepCreateVirtualMachine {
    fn name(&self) -> &'static str {
        "create-virtual-machine"
    }

    async fn run(&self, cancel: &CancellationToken, state: &mut StateBag) -> StepAction {
        // A rejected create leaves nothing of ours behind.
        if let Err(err) = self.create(cancel).await {
            return StepAction::Halt(err);
        }

        match self.wait_ready(cancel).await {
            Ok(()) => StepAction::Continue,
            Err(err) => {
                // The halting step is not unwound by the runner.
                if let Err(e) = self.remove(state).await {
                    warn!(error = %e, "cannot remove VirtualMachine after failed start");
                }
                StepAction::Halt(err)
            }
        }
    }

    async fn cleanup(&self, state: &mut StateBag) -> Result<(), StepError> {
        self.remove(state).await
    }
}

#[cfg(test)]
mod tests {
    use kvb_core::cluster::ClusterError;
    use kvb_core::testing::FakeCluster;
    use kvb_model::{Flag, ModelError, ResourceRef, constants::STATE_RETAINED};

    use super::*;
    use crate::steps::fixtures;

    fn step(cluster: &FakeCluster, config: BuildConfig) -> StepCreateVirtualMachine {
        StepCreateVirtualMachine::new(Arc::new(config), Arc::new(cluster.clone()))
    }

    #[tokio::test(start_paused = true)]
    async fn waits_until_ready() {
        let cluster = FakeCluster::new();
        cluster.set_vm_ready_after(2);

        let started = tokio::time::Instant::now();
        let action = step(&cluster, fixtures::config())
            .run(&CancellationToken::new(), &mut StateBag::new())
            .await;

        assert!(action.is_continue());
        assert_eq!(started.elapsed(), Duration::from_secs(10));
        assert!(cluster.vm("images", "fedora-42-builder").is_some());
    }

    #[tokio::test]
    async fn unsupported_os_halts_before_any_call() {
        let cluster = FakeCluster::new();
        let mut config = fixtures::config();
        config.os_type = "bsd".into();

        let action = step(&cluster, config)
            .run(&CancellationToken::new(), &mut StateBag::new())
            .await;

        assert!(matches!(
            action,
            StepAction::Halt(StepError::Config(ModelError::UnsupportedOsType(_)))
        ));
        assert!(cluster.calls().is_empty());
    }

    #[tokio::test]
    async fn create_error_halts() {
        let cluster = FakeCluster::new();
        cluster.fail_on("create_vm", ClusterError::Api("quota exceeded".into()));

        let action = step(&cluster, fixtures::config())
            .run(&CancellationToken::new(), &mut StateBag::new())
            .await;
        assert!(matches!(action, StepAction::Halt(StepError::Cluster(_))));
    }

    #[tokio::test]
    async fn existing_machine_is_left_alone() {
        let cluster = FakeCluster::new();
        let config = fixtures::config();
        let existing = resources::virtual_machine(&config, config.os().unwrap()).unwrap();
        cluster.create_vm(&existing).await.unwrap();

        let action = step(&cluster, config)
            .run(&CancellationToken::new(), &mut StateBag::new())
            .await;

        assert!(matches!(
            action,
            StepAction::Halt(StepError::Cluster(ClusterError::AlreadyExists { .. }))
        ));
        assert!(cluster.vm_deletes().is_empty());
        assert!(cluster.vm("images", "fedora-42-builder").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_ready_wait_removes_the_machine() {
        let cluster = FakeCluster::new();
        cluster.set_vm_ready_after(usize::MAX);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(7)).await;
            trigger.cancel();
        });

        let started = tokio::time::Instant::now();
        let action = step(&cluster, fixtures::config())
            .run(&cancel, &mut StateBag::new())
            .await;

        assert!(matches!(action, StepAction::Halt(StepError::Cancelled { .. })));
        assert!(started.elapsed() < Duration::from_secs(7) + POLL_INTERVAL);
        assert_eq!(cluster.vm_deletes().len(), 1);
        assert!(cluster.vm("images", "fedora-42-builder").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn ready_timeout_removes_the_machine() {
        let cluster = FakeCluster::new();
        cluster.set_vm_ready_after(usize::MAX);
        let mut config = fixtures::config();
        config.vm_ready_timeout_ms = 20_000;

        let action = step(&cluster, config)
            .run(&CancellationToken::new(), &mut StateBag::new())
            .await;

        assert!(matches!(action, StepAction::Halt(StepError::Timeout { .. })));
        assert!(cluster.vm("images", "fedora-42-builder").is_none());
    }

    #[tokio::test]
    async fn cleanup_deletes_immediately() {
        let cluster = FakeCluster::new();
        let s = step(&cluster, fixtures::config());
        let mut state = StateBag::new();
        s.run(&CancellationToken::new(), &mut state).await;

        s.cleanup(&mut state).await.unwrap();

        let deletes = cluster.vm_deletes();
        assert_eq!(deletes.len(), 1);
        assert_eq!(deletes[0].1, DeleteOptions::immediate(Propagation::Background));
    }

    #[tokio::test]
    async fn keep_volumes_orphans_the_root_disk() {
        let cluster = FakeCluster::new();
        let mut config = fixtures::config();
        config.keep_volumes = Flag::enabled();
        let s = step(&cluster, config);
        let mut state = StateBag::new();
        s.run(&CancellationToken::new(), &mut state).await;

        s.cleanup(&mut state).await.unwrap();
        assert_eq!(cluster.vm_deletes()[0].1.propagation, Propagation::Orphan);
    }

    #[tokio::test]
    async fn keep_vm_skips_delete_and_records_it() {
        let cluster = FakeCluster::new();
        let mut config = fixtures::config();
        config.keep_vm = Flag::enabled();
        let s = step(&cluster, config);
        let mut state = StateBag::new();
        s.run(&CancellationToken::new(), &mut state).await;

        s.cleanup(&mut state).await.unwrap();

        assert!(cluster.vm_deletes().is_empty());
        assert_eq!(
            state.get::<Vec<ResourceRef>>(STATE_RETAINED).unwrap(),
            &vec![ResourceRef::new("VirtualMachine", "images", "fedora-42-builder")]
        );
    }
}
