use std::pin::pin;
use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use futures::future::{Either, select};
use futures_channel::mpsc;
use snafu::{Report, ResultExt, Snafu};
use tracing::{debug, error, info, trace, warn};

use crate::application::RuntimeConfig;
use crate::baseline::{BaselineStore, CycleReport};
use crate::persistence::BaselineFile;
use crate::scheduler::{IllegalTransitionError, SchedulerState, ShutdownToken};
use crate::walker::{TreeWalker, WalkerCreationError};

/// Drives scan cycles: load the baseline once, then walk, persist and report
/// until told to stop or, without an interval, after the first cycle.
///
/// The scheduler is the single owner of the [`BaselineStore`].
pub struct Scheduler {
    config: Arc<RuntimeConfig>,
    walker: TreeWalker,
    baseline_file: BaselineFile,
    store: BaselineStore,
    state: SchedulerState,
}

impl Scheduler {
    pub fn new(config: Arc<RuntimeConfig>) -> Result<Self, SchedulerCreationError> {
        let walker = TreeWalker::new(config.workers).context(WalkerSnafu)?;
        let baseline_file = BaselineFile::new(&config.persist_path);

        Ok(Self {
            config,
            walker,
            baseline_file,
            store: BaselineStore::empty(),
            state: SchedulerState::Idle,
        })
    }

    fn transition(&mut self, next: SchedulerState) -> Result<(), SchedulerError> {
        debug!("Scheduler {} -> {}", self.state, next);
        self.state.transition(next).context(TransitionSnafu)
    }

    /// Loads the persisted baseline. Any failure leaves an empty store and
    /// makes the next cycle baseline-establishing.
    pub async fn load(&mut self) -> Result<(), SchedulerError> {
        self.transition(SchedulerState::Loading)?;

        self.store = match self.baseline_file.load().await {
            Ok(entries) => BaselineStore::from_entries(entries),
            Err(err) if err.is_not_found() => {
                info!(
                    "No previous scan data at '{}', the first scan will be a baseline scan",
                    self.baseline_file.path().display()
                );
                BaselineStore::empty()
            }
            Err(err) => {
                warn!(
                    "Could not load the persisted scan data, this scan will be treated as a baseline scan: {}",
                    Report::from_error(err)
                );
                BaselineStore::empty()
            }
        };
        Ok(())
    }

    /// Runs one full cycle: walk, persist, report.
    pub async fn run_cycle(&mut self, token: &ShutdownToken) -> Result<CycleReport, SchedulerError> {
        self.transition(SchedulerState::Scanning)?;
        if self.store.is_baseline_complete() {
            info!("Running a new scan...");
        } else {
            info!("Running a baseline scan...");
        }

        let mut report = CycleReport::new(self.store.is_baseline_complete());
        let started = Instant::now();

        let (sender, mut receiver) = mpsc::unbounded();
        let walk = self.walker.walk(&self.config.scan_root, sender, token);
        let store = &mut self.store;
        let cycle_report = &mut report;
        let collect = async move {
            while let Some(observation) = receiver.next().await {
                let classification =
                    store.observe(observation.path.clone(), observation.fingerprint, cycle_report);
                trace!("{} is {}", observation.path, classification);
            }
        };
        let (stats, ()) = futures::join!(walk, collect);

        report.duration = started.elapsed();
        report.directories = stats.directories;
        report.files = stats.files;
        report.interrupted = stats.interrupted;
        if stats.interrupted {
            info!("Scan interrupted by shutdown.");
        } else {
            info!("Scan complete.");
        }

        self.transition(SchedulerState::Persisting)?;
        self.persist().await;

        self.transition(SchedulerState::Reporting)?;
        report.emit();
        self.store.mark_baseline_complete();

        Ok(report)
    }

    async fn persist(&self) {
        debug!("Persisting baseline of {} files", self.store.len());
        if let Err(err) = self.baseline_file.save(self.store.entries()).await {
            error!(
                "Could not persist scan data, check that '{}' is writable. Will try again next run: {}",
                self.baseline_file.path().display(),
                Report::from_error(err)
            );
        }
    }

    /// Loads the baseline, then runs cycles until shutdown or, without an
    /// interval, once.
    ///
    /// Returns the number of completed cycles once the loop has stopped and
    /// the worker pool has shut down. The pool is shut down on failure too.
    pub async fn run(mut self, token: ShutdownToken) -> Result<usize, SchedulerError> {
        let outcome = match self.load().await {
            Ok(()) => self.run_cycles(&token).await,
            Err(err) => Err(err),
        };
        let joined = self.walker.join().await.context(WorkerShutdownSnafu);

        let cycles = outcome?;
        joined?;
        Ok(cycles)
    }

    async fn run_cycles(&mut self, token: &ShutdownToken) -> Result<usize, SchedulerError> {
        let mut cycles = 0;

        loop {
            if token.is_cancelled() {
                info!("Shutdown requested, not starting another scan.");
                break;
            }

            self.run_cycle(token).await?;
            cycles += 1;

            let Some(interval) = self.config.interval else {
                break;
            };
            if token.is_cancelled() {
                break;
            }

            self.transition(SchedulerState::Sleeping)?;
            info!(
                "Sleeping for '{}' milliseconds, until next run cycle...",
                interval.as_millis()
            );
            let sleep = pin!(compio::time::sleep(interval));
            let cancelled = pin!(token.cancelled());
            if let Either::Right(_) = select(sleep, cancelled).await {
                info!("Shutdown requested while sleeping.");
                break;
            }
        }

        self.transition(SchedulerState::Stopped)?;
        Ok(cycles)
    }
}

#[derive(Debug, Snafu)]
pub enum SchedulerCreationError {
    #[snafu(display("Failed to create the tree walker"))]
    WalkerError { source: WalkerCreationError },
}

#[derive(Debug, Snafu)]
pub enum SchedulerError {
    #[snafu(display("Scan loop reached an inconsistent state"))]
    TransitionError { source: IllegalTransitionError },
    #[snafu(display("Scan worker pool did not shut down cleanly"))]
    WorkerShutdownError { source: std::io::Error },
}
