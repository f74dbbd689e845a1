//! Scheduling errors

use thiserror::Error;

use crate::queue::EventId;

pub type SimResult<T> = Result<T, SimError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimError {
    /// Cancellation of an event that is not in the queue. Timers are
    /// cancelled only by the node that armed them, so this is a logic
    /// error in the caller, not a race.
    #[error("cancelled event {0:?} is not scheduled")]
    UnknownEvent(EventId),
}
