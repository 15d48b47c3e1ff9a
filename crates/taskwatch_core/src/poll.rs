use crate::diff::diff;
use crate::error::WatchError;
use crate::model::Snapshot;
use crate::report::Reporter;
use crate::source::TaskSource;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Initializing,
    Running,
    Stopped,
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub successful_cycles: u64,
    pub failed_cycles: u64,
    pub events_reported: u64,
}

/// Drives a task source on a fixed interval and reports what changed between
/// consecutive successful collections.
pub struct PollLoop<S, R> {
    source: S,
    reporter: R,
    interval: Duration,
    state: LoopState,
    previous: Option<Snapshot>,
    stats: CycleStats,
}

impl<S: TaskSource, R: Reporter> PollLoop<S, R> {
    pub fn new(source: S, reporter: R, interval: Duration) -> Self {
        Self {
            source,
            reporter,
            interval,
            state: LoopState::Initializing,
            previous: None,
            stats: CycleStats::default(),
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    /// The last successfully collected snapshot.
    pub fn baseline(&self) -> Option<&Snapshot> {
        self.previous.as_ref()
    }

    /// Captures the baseline, then polls until `shutdown` turns true.
    ///
    /// Returns the baseline error if the first collection fails; the loop is
    /// `Failed` in that case and never polls. Shutdown is only observed
    /// between cycles, so a collection in flight always completes.
    pub async fn run(
        &mut self,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<CycleStats, WatchError> {
        self.initialize().await?;

        while wait_for_next_cycle(self.interval, &mut shutdown).await {
            self.cycle().await;
        }

        self.state = LoopState::Stopped;
        info!(
            successful_cycles = self.stats.successful_cycles,
            failed_cycles = self.stats.failed_cycles,
            events_reported = self.stats.events_reported,
            "monitoring stopped"
        );
        Ok(self.stats)
    }

    async fn initialize(&mut self) -> Result<(), WatchError> {
        self.state = LoopState::Initializing;
        match self.source.collect().await {
            Ok(snapshot) => {
                info!(
                    tasks = snapshot.len(),
                    interval_secs = self.interval.as_secs(),
                    "baseline captured, monitoring scheduled tasks"
                );
                self.previous = Some(snapshot);
                self.state = LoopState::Running;
                Ok(())
            }
            Err(err) => {
                error!(code = err.code(), error = %err.message(), "cannot capture baseline snapshot");
                self.state = LoopState::Failed;
                Err(err)
            }
        }
    }

    async fn cycle(&mut self) {
        let current = match self.source.collect().await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                self.stats.failed_cycles += 1;
                error!(
                    code = err.code(),
                    error = %err.message(),
                    "failed to collect scheduled tasks, keeping previous baseline"
                );
                return;
            }
        };

        let changes = match self.previous.as_ref() {
            Some(previous) => diff(previous, &current),
            None => diff(&Snapshot::empty(current.captured_at()), &current),
        };

        for event in changes.events() {
            match self.reporter.report(&event) {
                Ok(()) => self.stats.events_reported += 1,
                Err(err) => error!(
                    code = err.code(),
                    error = %err.message(),
                    identity = %event.identity(),
                    "failed to report change"
                ),
            }
        }

        debug!(
            tasks = current.len(),
            added = changes.added.len(),
            removed = changes.removed.len(),
            updated = changes.updated.len(),
            "poll cycle complete"
        );
        self.previous = Some(current);
        self.stats.successful_cycles += 1;
    }
}

/// Sleeps for `interval`. Returns false as soon as shutdown is requested.
async fn wait_for_next_cycle(interval: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    let sleep = tokio::time::sleep(interval);
    tokio::pin!(sleep);

    loop {
        if *shutdown.borrow_and_update() {
            info!("shutdown requested");
            return false;
        }

        tokio::select! {
            _ = &mut sleep => return true,
            changed = shutdown.changed() => {
                if changed.is_err() {
                    // Nobody can request shutdown any more.
                    (&mut sleep).await;
                    return true;
                }
            }
        }
    }
}
