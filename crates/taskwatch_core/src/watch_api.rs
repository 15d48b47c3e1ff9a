use crate::config::Settings;
use crate::error::WatchError;
use crate::model::Snapshot;
use crate::poll::{CycleStats, PollLoop};
use crate::report::build_reporter;
use crate::source::{HostSource, TaskSource};
use tokio::sync::watch;
use tracing::info;

/// Collects the host's scheduled tasks once.
pub async fn collect_snapshot(settings: &Settings) -> Result<Snapshot, WatchError> {
    let mut source = HostSource::detect(&settings.source)?;
    source.collect().await
}

/// Monitors the host's scheduled tasks until `shutdown` turns true.
///
/// Fails without polling when the platform has no task source or the baseline
/// cannot be captured.
pub async fn monitor(
    settings: &Settings,
    shutdown: watch::Receiver<bool>,
) -> Result<CycleStats, WatchError> {
    let source = HostSource::detect(&settings.source)?;
    let reporter = build_reporter(&settings.report)?;
    info!(source = source.name(), "starting scheduled task monitor");

    let mut poll_loop = PollLoop::new(source, reporter, settings.poll_interval);
    poll_loop.run(shutdown).await
}
