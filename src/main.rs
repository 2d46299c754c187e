use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use clap::Parser as _;
use tracing::{debug, info, warn};

use crate::{
    application::{Application, ApplicationError},
    cli::Cli,
    scheduler::ShutdownToken,
};

mod application;
mod baseline;
mod cli;
mod digest;
mod persistence;
mod scheduler;
mod walker;

#[compio::main]
#[snafu::report]
async fn main() -> Result<(), ApplicationError> {
    let cli_args = Cli::parse();
    setup_tracing(&cli_args);
    debug!("Parsed CLI arguments: {cli_args:?}");

    let token = ShutdownToken::new();
    compio::runtime::spawn(cancel_on_signal(wait_for_shutdown_signal(), token.clone())).detach();

    Application::run(cli_args, token).await?;
    info!("Shutdown complete.");

    Ok(())
}

fn setup_tracing(cli_args: &Cli) {
    let Some(level) = cli_args.log_level.to_tracing_level() else {
        return;
    };

    let log_file = cli_args.log_path.as_deref().map(open_log_file);
    match log_file {
        Some(Ok(file)) => tracing_subscriber::fmt()
            .with_max_level(level)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init(),
        Some(Err(err)) => {
            tracing_subscriber::fmt().with_max_level(level).init();
            warn!("Could not open log file, logging to the console instead: {err}");
        }
        None => tracing_subscriber::fmt().with_max_level(level).init(),
    }
}

fn open_log_file(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Cancels `token` once `signal` fires. A listener that fails to register
/// leaves the token untouched.
async fn cancel_on_signal(
    signal: impl Future<Output = std::io::Result<()>>,
    token: ShutdownToken,
) {
    match signal.await {
        Ok(()) => {
            info!("Shutdown signal received, stopping...");
            token.cancel();
        }
        Err(err) => warn!("Failed to listen for shutdown signals, running until killed: {err}"),
    }
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use futures::future::select;
    use std::pin::pin;

    let interrupt = pin!(compio::signal::ctrl_c());
    let terminate = pin!(compio::signal::unix::signal(libc::SIGTERM));
    let (result, _) = select(interrupt, terminate).await.factor_first();
    result
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    compio::signal::ctrl_c().await
}
