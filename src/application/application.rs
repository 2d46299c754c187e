use std::sync::Arc;

use snafu::Snafu;
use snafu::prelude::*;
use tracing::{debug, info};

use crate::application::RuntimeConfig;
use crate::scheduler::{Scheduler, SchedulerCreationError, SchedulerError, ShutdownToken};

pub struct Application;

impl Application {
    /// Runs the scan loop until it stops on its own or `token` is cancelled.
    ///
    /// Returns only after the in-flight cycle, if any, has fully unwound.
    pub async fn run(
        app_config: impl Into<RuntimeConfig>,
        token: ShutdownToken,
    ) -> Result<(), ApplicationError> {
        let app_config: RuntimeConfig = app_config.into();
        debug!("Runtime config: {:?}", app_config);
        info!(
            "Watching '{}', baseline at '{}'",
            app_config.scan_root.display(),
            app_config.persist_path.display()
        );

        let cycles = Scheduler::new(Arc::new(app_config))
            .context(SchedulerCreationSnafu)?
            .run(token)
            .await
            .context(SchedulerRunSnafu)?;
        info!("Scanner stopped after {} scan cycles", cycles);

        Ok(())
    }
}

#[derive(Debug, Snafu)]
pub enum ApplicationError {
    #[snafu(display("Critical failure encountered while setting up the scanner"))]
    SchedulerCreationError { source: SchedulerCreationError },
    #[snafu(display("Critical failure encountered while running the scanner"))]
    SchedulerRunError { source: SchedulerError },
}
