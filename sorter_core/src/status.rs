//! Outcome of a single control tick.

use sorter_traits::Fixed;

use crate::error::SorterError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickStatus {
    /// Controller not running; nothing read or written.
    Idle,
    /// A new speed command was written to the drive.
    Commanded {
        output: Fixed,
        feedback: Fixed,
        error: Fixed,
    },
    /// Feedback reported a fault; the controller has stopped itself.
    Faulted { code: i32 },
    /// A port call failed; the controller keeps running and retries next tick.
    Failed(SorterError),
}

impl TickStatus {
    /// True for `Faulted` and `Failed`.
    pub fn is_failure(&self) -> bool {
        matches!(self, TickStatus::Faulted { .. } | TickStatus::Failed(_))
    }
}
