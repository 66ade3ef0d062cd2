use std::sync::Arc;

use async_trait::async_trait;
use kvb_core::error::StepError;
use kvb_core::state::StateBag;
use kvb_core::step::{Step, StepAction};
use kvb_model::constants::STATE_COMMUNICATOR;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::comm::{ProvisionHook, RemoteSession};
use crate::steps::race;

/// Hands the connected session to the caller's provisioning hook.
pub struct StepProvision {
    hook: Option<Arc<dyn ProvisionHook>>,
}

impl StepProvision {
    pub fn new(hook: Option<Arc<dyn ProvisionHook>>) -> Self {
        Self { hook }
    }

    async fn execute(
        &self,
        hook: &Arc<dyn ProvisionHook>,
        cancel: &CancellationToken,
        state: &StateBag,
    ) -> Result<(), StepError> {
        let session = state
            .get::<Arc<dyn RemoteSession>>(STATE_COMMUNICATOR)
            .cloned()
            .ok_or_else(|| StepError::Failed("no remote session to provision over".into()))?;

        info!(endpoint = session.target().endpoint(), "provisioning guest");
        race(cancel, "provisioning", hook.provision(session, cancel)).await
    }
}

#[async_trait]
impl Step for StepProvision {
    fn name(&self) -> &'static str {
        "provision"
    }

    async fn run(&self, cancel: &CancellationToken, state: &mut StateBag) -> StepAction {
        let Some(hook) = &self.hook else {
            debug!("no provisioning hook configured");
            return StepAction::Continue;
        };
        self.execute(hook, cancel, state).await.into()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use kvb_model::CommType;

    use super::*;
    use crate::comm::{CommError, ConnectTarget};
    use crate::steps::connect::tests::Session;

    #[derive(Default)]
    struct Script {
        commands: Vec<&'static str>,
        ran: Mutex<Vec<(String, i32)>>,
    }

    #[async_trait]
    impl ProvisionHook for Script {
        async fn provision(
            &self,
            session: Arc<dyn RemoteSession>,
            _cancel: &CancellationToken,
        ) -> Result<(), CommError> {
            for cmd in &self.commands {
                let status = session.execute(cmd).await?;
                self.ran.lock().unwrap().push((cmd.to_string(), status));
                if status != 0 {
                    return Err(CommError::Provision(format!("{cmd} exited with {status}")));
                }
            }
            Ok(())
        }
    }

    fn connected() -> StateBag {
        let mut state = StateBag::new();
        let session: Arc<dyn RemoteSession> = Arc::new(Session(ConnectTarget {
            protocol: CommType::Ssh,
            host: "127.0.0.1".into(),
            port: 2222,
            username: Some("fedora".into()),
            password: None,
            private_key_file: None,
        }));
        state.put(STATE_COMMUNICATOR, session);
        state
    }

    #[tokio::test]
    async fn runs_hook_over_session() {
        let hook = Arc::new(Script {
            commands: vec!["dnf -y update", "cloud-init clean"],
            ..Default::default()
        });
        let step = StepProvision::new(Some(hook.clone() as Arc<dyn ProvisionHook>));

        let action = step.run(&CancellationToken::new(), &mut connected()).await;

        assert!(action.is_continue());
        assert_eq!(hook.ran.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn without_hook_continues() {
        let action = StepProvision::new(None)
            .run(&CancellationToken::new(), &mut StateBag::new())
            .await;
        assert!(action.is_continue());
    }

    #[tokio::test]
    async fn missing_session_halts() {
        let step = StepProvision::new(Some(Arc::new(Script::default())));
        let action = step.run(&CancellationToken::new(), &mut StateBag::new()).await;
        assert!(matches!(action, StepAction::Halt(StepError::Failed(_))));
    }
}
