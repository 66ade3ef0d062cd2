use tracing::Subscriber;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{BuildTimer, LoggerConfig, LoggerError, LoggerFormat, LoggerResult};

type BoxedSubscriber = Box<dyn Subscriber + Send + Sync + 'static>;

/// Builds the subscriber described by `cfg` without installing it.
pub fn subscriber(cfg: &LoggerConfig) -> LoggerResult<BoxedSubscriber> {
    let filter = cfg.level.to_env_filter()?;
    let timer = BuildTimer::new(cfg.tz);
    let registry = tracing_subscriber::registry().with(filter);

    let subscriber: BoxedSubscriber = match cfg.format {
        LoggerFormat::Text => Box::new(
            registry.with(
                fmt::layer()
                    .with_ansi(cfg.should_use_color())
                    .with_target(cfg.with_targets)
                    .with_timer(timer),
            ),
        ),
        LoggerFormat::Json => Box::new(
            registry.with(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_target(cfg.with_targets)
                    .with_current_span(true)
                    .with_timer(timer),
            ),
        ),
        LoggerFormat::Journald => Box::new(registry.with(journald()?)),
    };
    Ok(subscriber)
}

#[cfg(target_os = "linux")]
fn journald() -> LoggerResult<tracing_journald::Layer> {
    tracing_journald::layer()
        .map(|l| l.with_syslog_identifier("kvb".to_string()))
        .map_err(|e| LoggerError::JournaldInitFailed(e.to_string()))
}

#[cfg(not(target_os = "linux"))]
fn journald() -> LoggerResult<tracing_subscriber::layer::Identity> {
    Err(LoggerError::JournaldNotSupported)
}

/// Installs the logger as the process-wide default.
///
/// With `tz = local`, call this before starting the async runtime.
pub fn init_logger(cfg: &LoggerConfig) -> LoggerResult<()> {
    subscriber(cfg)?
        .try_init()
        .map_err(|_| LoggerError::AlreadyInitialized)
}
