//! The scan cycle loop and its shutdown plumbing.

mod scheduler;
mod scheduler_state;
mod shutdown_token;

pub use scheduler::{Scheduler, SchedulerCreationError, SchedulerError};
pub use scheduler_state::{IllegalTransitionError, SchedulerState};
pub use shutdown_token::ShutdownToken;
