//! Concrete steps of an ISO build, in execution order.
mod boot_command;
pub use boot_command::StepBootCommand;

mod bootable_volume;
pub use bootable_volume::StepCreateBootableVolume;

mod connect;
pub use connect::StepConnect;

mod copy_media;
pub use copy_media::StepCopyMediaFiles;

mod create_vm;
pub use create_vm::StepCreateVirtualMachine;

mod port_forward;
pub use port_forward::{FORWARDING_HOST, StepStartPortForward};

mod provision;
pub use provision::StepProvision;

mod stop_vm;
pub use stop_vm::StepStopVirtualMachine;

mod validate_iso;
pub use validate_iso::StepValidateIsoVolume;

mod wait_agent;
pub use wait_agent::StepWaitForAgent;

mod wait_install;
pub use wait_install::StepWaitForInstallation;

mod wait_ip;
pub use wait_ip::StepWaitForIp;

use std::future::Future;
use std::time::Duration;

use kvb_core::error::StepError;
use kvb_core::state::StateBag;
use kvb_model::ResourceRef;
use kvb_model::constants::STATE_RETAINED;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Interval of the fixed-rate control-plane polls.
pub(crate) const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Awaits `fut` unless the build is cancelled first.
pub(crate) async fn race<F, T, E>(
    cancel: &CancellationToken,
    what: &str,
    fut: F,
) -> Result<T, StepError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<StepError>,
{
    tokio::select! {
        _ = cancel.cancelled() => Err(StepError::cancelled(what)),
        res = fut => res.map_err(Into::into),
    }
}

/// Sleeps for `dur` unless the build is cancelled first.
pub(crate) async fn pause(
    cancel: &CancellationToken,
    what: &str,
    dur: Duration,
) -> Result<(), StepError> {
    tokio::select! {
        _ = cancel.cancelled() => Err(StepError::cancelled(what)),
        _ = tokio::time::sleep(dur) => Ok(()),
    }
}

/// Runs `check` immediately and then every `every` until it reports done,
/// fails, `timeout` elapses or the build is cancelled.
pub(crate) async fn poll_until<F, Fut>(
    cancel: &CancellationToken,
    what: &str,
    every: Duration,
    timeout: Duration,
    mut check: F,
) -> Result<(), StepError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, StepError>>,
{
    let deadline = Instant::now() + timeout;
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(StepError::cancelled(what)),
            _ = tokio::time::sleep_until(deadline) => return Err(StepError::timeout(what, timeout)),
            _ = ticker.tick() => {}
        }
        if race(cancel, what, check()).await? {
            return Ok(());
        }
    }
}

/// Records a resource left behind on purpose.
pub(crate) fn retain(state: &mut StateBag, kind: &str, namespace: &str, name: &str) {
    state.append(STATE_RETAINED, ResourceRef::new(kind, namespace, name));
}
