use std::io::ErrorKind;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::available_parallelism;

use compio::dispatcher::{Dispatcher, DispatcherBuilder};
use compio::fs;
use futures::FutureExt;
use futures::future::{LocalBoxFuture, join_all};
use futures_channel::mpsc::UnboundedSender;
use snafu::{Report, ResultExt, Snafu};
use tracing::{debug, error, trace, warn};

use crate::digest::{DigestError, Fingerprint};
use crate::scheduler::ShutdownToken;

/// Default number of worker threads when unable to determine system parallelism
const DEFAULT_WORKER_THREADS: usize = 1;

/// A successfully digested file, on its way to the baseline store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub path: String,
    pub fingerprint: Fingerprint,
}

/// Totals for one walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkStats {
    pub directories: u64,
    pub files: u64,
    pub interrupted: bool,
}

#[derive(Debug, Default)]
struct WalkCounters {
    directories: AtomicU64,
    files: AtomicU64,
}

struct WalkContext<'a> {
    counters: WalkCounters,
    observations: UnboundedSender<Observation>,
    token: &'a ShutdownToken,
}

/// What a worker found at a path.
#[derive(Debug)]
enum Probe {
    Directory(Vec<PathBuf>),
    UnreadableDirectory(std::io::Error),
    File(Result<Fingerprint, DigestError>),
    Missing,
    /// Shutdown was requested before the worker reached the path.
    Abandoned,
    /// Symlinks, sockets, devices and entries whose metadata is off limits.
    Skipped,
}

impl Probe {
    async fn of(path: PathBuf, token: ShutdownToken) -> Self {
        if token.is_cancelled() {
            return Probe::Abandoned;
        }

        let metadata = match fs::symlink_metadata(&path).await {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == ErrorKind::NotFound => return Probe::Missing,
            Err(err) => {
                trace!("Skipping '{}': {}", path.display(), err);
                return Probe::Skipped;
            }
        };

        if metadata.is_dir() {
            match list_children(&path) {
                Ok(children) => Probe::Directory(children),
                Err(err) => Probe::UnreadableDirectory(err),
            }
        } else if metadata.is_file() {
            Probe::File(Fingerprint::of_file(&path, &token).await)
        } else {
            trace!("Skipping '{}': neither directory nor file", path.display());
            Probe::Skipped
        }
    }
}

fn list_children(path: &Path) -> std::io::Result<Vec<PathBuf>> {
    std::fs::read_dir(path)?
        .map(|entry| entry.map(|entry| entry.path()))
        .collect()
}

/// Recursive, concurrent walk over a filesystem subtree.
///
/// Every metadata lookup, directory listing and file digest runs on a bounded
/// pool of worker threads. The recursion itself is a tree of lightweight
/// futures on the calling runtime, so arbitrarily wide or deep trees never
/// spawn more than the configured number of threads.
pub struct TreeWalker {
    dispatcher: Dispatcher,
}

impl TreeWalker {
    pub fn new(workers: Option<NonZeroUsize>) -> Result<Self, WalkerCreationError> {
        let workers = workers.unwrap_or_else(Self::determine_worker_count);
        debug!("Using {} worker threads for scanning", workers);

        let dispatcher = DispatcherBuilder::new()
            .worker_threads(workers)
            .build()
            .context(DispatcherSnafu)?;

        Ok(Self { dispatcher })
    }

    /// Determines the optimal number of worker threads for scanning
    fn determine_worker_count() -> NonZeroUsize {
        available_parallelism()
            .ok()
            .or_else(|| NonZeroUsize::new(DEFAULT_WORKER_THREADS))
            .unwrap_or(NonZeroUsize::MIN)
    }

    /// Walks `root`, sending every successfully digested file to
    /// `observations`.
    ///
    /// A missing root is an empty tree. Once `token` is cancelled no further
    /// paths are dispatched and probes still queued on the pool return without
    /// touching the filesystem; the call waits for all of them before
    /// returning. Files abandoned mid-digest are not counted. The sender is
    /// dropped on return, closing the channel.
    pub async fn walk(
        &self,
        root: &Path,
        observations: UnboundedSender<Observation>,
        token: &ShutdownToken,
    ) -> WalkStats {
        let context = WalkContext {
            counters: WalkCounters::default(),
            observations,
            token,
        };

        self.visit(root.to_path_buf(), &context).await;

        WalkStats {
            directories: context.counters.directories.load(Ordering::SeqCst),
            files: context.counters.files.load(Ordering::SeqCst),
            interrupted: token.is_cancelled(),
        }
    }

    fn visit<'a>(&'a self, path: PathBuf, context: &'a WalkContext<'a>) -> LocalBoxFuture<'a, ()> {
        async move {
            if context.token.is_cancelled() {
                return;
            }

            let Some(probe) = self.probe(path.clone(), context.token).await else {
                return;
            };

            match probe {
                Probe::Directory(children) => {
                    if !context.token.is_cancelled() {
                        join_all(children.into_iter().map(|child| self.visit(child, context)))
                            .await;
                    }
                    context.counters.directories.fetch_add(1, Ordering::SeqCst);
                }
                Probe::UnreadableDirectory(err) => {
                    warn!("Could not list directory '{}': {}", path.display(), err);
                    context.counters.directories.fetch_add(1, Ordering::SeqCst);
                }
                Probe::File(Ok(fingerprint)) => {
                    context.counters.files.fetch_add(1, Ordering::SeqCst);
                    let observation = Observation {
                        path: path.to_string_lossy().into_owned(),
                        fingerprint,
                    };
                    if context.observations.unbounded_send(observation).is_err() {
                        error!(
                            "Observation receiver dropped, '{}' will not be recorded",
                            path.display()
                        );
                    }
                }
                Probe::File(Err(err @ DigestError::Aborted { .. })) => debug!("{}", err),
                Probe::File(Err(err)) => {
                    context.counters.files.fetch_add(1, Ordering::SeqCst);
                    error!("{}", Report::from_error(err));
                }
                Probe::Missing | Probe::Skipped | Probe::Abandoned => {}
            }
        }
        .boxed_local()
    }

    /// Hands the path to the worker pool and waits for its verdict.
    async fn probe(&self, path: PathBuf, token: &ShutdownToken) -> Option<Probe> {
        let token = token.clone();
        let display_path = path.display().to_string();

        let receiver = match self
            .dispatcher
            .dispatch(move || async move { Probe::of(path, token).await })
        {
            Ok(receiver) => receiver,
            Err(err) => {
                error!("Failed to dispatch probe of '{}': {}", display_path, err);
                return None;
            }
        };

        match receiver.await {
            Ok(probe) => Some(probe),
            Err(err) => {
                error!("Probe of '{}' was canceled: {}", display_path, err);
                None
            }
        }
    }

    /// Stops the worker pool, waiting for its threads to exit.
    pub async fn join(self) -> std::io::Result<()> {
        self.dispatcher.join().await
    }
}

#[derive(Debug, Snafu)]
pub enum WalkerCreationError {
    #[snafu(display("Failed to create scan worker pool"))]
    DispatcherError { source: std::io::Error },
}
