use derive_more::Display;
use snafu::Snafu;

/// Lifecycle of the scan loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum SchedulerState {
    #[default]
    Idle,
    Loading,
    Scanning,
    Persisting,
    Reporting,
    Sleeping,
    Stopped,
}

impl SchedulerState {
    pub fn can_transition_to(self, next: SchedulerState) -> bool {
        use SchedulerState::*;

        matches!(
            (self, next),
            (Idle, Loading)
                | (Loading, Scanning)
                | (Loading, Stopped)
                | (Scanning, Persisting)
                | (Persisting, Reporting)
                | (Reporting, Sleeping)
                | (Reporting, Stopped)
                | (Sleeping, Scanning)
                | (Sleeping, Stopped)
        )
    }

    /// Moves to `next`, refusing edges the scan loop never takes.
    pub fn transition(&mut self, next: SchedulerState) -> Result<(), IllegalTransitionError> {
        if !self.can_transition_to(next) {
            return IllegalTransitionSnafu {
                from: *self,
                to: next,
            }
            .fail();
        }
        *self = next;
        Ok(())
    }
}

#[derive(Debug, Snafu)]
#[snafu(display("Scheduler cannot move from {from} to {to}"))]
pub struct IllegalTransitionError {
    from: SchedulerState,
    to: SchedulerState,
}
