//! Entry point of an ISO build.
//!
//! [`Builder`] validates a [`BuildConfig`], assembles the fixed step list for
//! it and drives the list through a [`Runner`].
use std::sync::Arc;

use kvb_core::cluster::{BundleStore, VirtClient};
use kvb_core::error::Halted;
use kvb_core::metrics::{MetricsHandle, noop_metrics};
use kvb_core::runner::Runner;
use kvb_core::state::StateBag;
use kvb_core::step::Step;
use kvb_model::constants::{STATE_BOOTABLE_VOLUME_NAME, STATE_RETAINED};
use kvb_model::{BuildConfig, ResourceRef};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::comm::{Connector, ProvisionHook};
use crate::error::BuildError;
use crate::steps::*;
use crate::tunnel::{ClusterForwarderFactory, ForwarderFactory};

/// Collaborators a build talks to.
#[derive(Clone)]
pub struct BuilderDeps {
    pub client: Arc<dyn VirtClient>,
    pub bundles: Arc<dyn BundleStore>,
    /// Required unless the communicator is `none`.
    pub connector: Option<Arc<dyn Connector>>,
    pub hook: Option<Arc<dyn ProvisionHook>>,
    pub forwarders: Arc<dyn ForwarderFactory>,
    pub metrics: MetricsHandle,
}

impl BuilderDeps {
    /// Dependencies backed by one cluster client, tunnelling through it and
    /// without remote access or metrics.
    pub fn new(client: Arc<dyn VirtClient>, bundles: Arc<dyn BundleStore>) -> Self {
        Self {
            forwarders: Arc::new(ClusterForwarderFactory::new(client.clone())),
            client,
            bundles,
            connector: None,
            hook: None,
            metrics: noop_metrics(),
        }
    }

    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    pub fn with_hook(mut self, hook: Arc<dyn ProvisionHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn with_forwarders(mut self, forwarders: Arc<dyn ForwarderFactory>) -> Self {
        self.forwarders = forwarders;
        self
    }

    pub fn with_metrics(mut self, metrics: MetricsHandle) -> Self {
        self.metrics = metrics;
        self
    }
}

/// Identifier of the produced reusable image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub name: String,
    pub namespace: String,
}

pub struct Builder {
    deps: BuilderDeps,
    config: Option<Arc<BuildConfig>>,
}

impl Builder {
    pub fn new(deps: BuilderDeps) -> Self {
        Self { deps, config: None }
    }

    /// Validates `config` and fills its defaults. Returns deprecation
    /// warnings. Nothing is sent to the cluster.
    pub fn prepare(&mut self, mut config: BuildConfig) -> Result<Vec<String>, BuildError> {
        let warnings = config.prepare()?;
        for w in &warnings {
            warn!("{w}");
        }
        if !config.comm.communicator.is_none() && self.deps.connector.is_none() {
            return Err(BuildError::MissingConnector(config.comm.communicator));
        }
        self.config = Some(Arc::new(config));
        Ok(warnings)
    }

    /// Names of the steps a prepared build will run.
    pub fn step_names(&self) -> Result<Vec<&'static str>, BuildError> {
        let config = self.config.as_ref().ok_or(BuildError::NotPrepared)?;
        Ok(self.steps(config)?.iter().map(|s| s.name()).collect())
    }

    /// Runs the build to completion.
    ///
    /// Tunnels opened during the run are closed when it returns.
    #[instrument(level = "info", skip_all, fields(image = tracing::field::Empty))]
    pub async fn run(&self, cancel: &CancellationToken) -> Result<Artifact, BuildError> {
        let config = self.config.clone().ok_or(BuildError::NotPrepared)?;
        tracing::Span::current().record("image", config.name.as_str());

        let run_token = cancel.child_token();
        let _close_tunnels = run_token.clone().drop_guard();

        let runner = Runner::new(self.steps(&config)?).with_metrics(self.deps.metrics.clone());
        info!(namespace = %config.namespace, steps = ?runner.step_names(), "starting build");

        let report = runner.run(&run_token, StateBag::new()).await;
        let retained = retained(&report.state);
        for r in &retained {
            warn!(resource = %r, "resource left in the cluster");
        }

        if let Some(Halted { step, source }) = report.halt {
            return Err(BuildError::Halted {
                step,
                source,
                retained,
            });
        }

        let name = report
            .state
            .get_str(STATE_BOOTABLE_VOLUME_NAME)
            .ok_or(BuildError::MissingArtifact)?;
        info!(name, "build finished");
        Ok(Artifact {
            name: name.to_string(),
            namespace: config.namespace.clone(),
        })
    }

    fn steps(&self, config: &Arc<BuildConfig>) -> Result<Vec<Box<dyn Step>>, BuildError> {
        let d = &self.deps;
        let mut steps: Vec<Box<dyn Step>> = vec![
            Box::new(StepValidateIsoVolume::new(config.clone(), d.client.clone())),
            Box::new(StepCopyMediaFiles::new(config.clone(), d.bundles.clone())),
            Box::new(StepCreateVirtualMachine::new(config.clone(), d.client.clone())),
            Box::new(StepBootCommand::new(config.clone(), d.client.clone())),
            Box::new(StepWaitForInstallation::new(config.clone())),
        ];

        let comm = config.comm.communicator;
        if !comm.is_none() {
            let connector = d
                .connector
                .clone()
                .ok_or(BuildError::MissingConnector(comm))?;
            steps.push(Box::new(StepWaitForAgent::new(config.clone(), d.client.clone())));
            steps.push(Box::new(StepWaitForIp::new(config.clone(), d.client.clone())));
            steps.push(Box::new(StepStartPortForward::new(
                config.clone(),
                d.forwarders.clone(),
            )));
            steps.push(Box::new(StepConnect::new(config.clone(), connector)));
            steps.push(Box::new(StepProvision::new(d.hook.clone())));
        }

        steps.push(Box::new(StepStopVirtualMachine::new(
            config.clone(),
            d.client.clone(),
        )));
        steps.push(Box::new(StepCreateBootableVolume::new(
            config.clone(),
            d.client.clone(),
        )));
        Ok(steps)
    }
}

fn retained(state: &StateBag) -> Vec<ResourceRef> {
    state
        .get::<Vec<ResourceRef>>(STATE_RETAINED)
        .cloned()
        .unwrap_or_default()
}
