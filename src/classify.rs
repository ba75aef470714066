//! Status classification
//!
//! Maps Setup and Countdown results to the label a screen filters on.

use std::fmt;

use crate::{detectors::CountdownResult, SetupEvent};

/// Default tally treated as a completed Countdown
pub const DEFAULT_SIGNAL_TARGET: usize = 13;

/// Where a series stands in the Setup/Countdown sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Status {
    SetupNotCompleted,
    CountdownNotStarted,
    /// Countdown underway with the given tally (below target)
    CountdownInProgress(usize),
    CountdownSignal,
}

impl Status {
    /// Whether a symbol with this status belongs in a screen result.
    #[inline]
    pub fn is_screenable(self) -> bool {
        !matches!(self, Status::SetupNotCompleted)
    }

    #[inline]
    pub fn is_signal(self) -> bool {
        matches!(self, Status::CountdownSignal)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::SetupNotCompleted => f.write_str("Setup not completed"),
            Status::CountdownNotStarted => f.write_str("Countdown not started"),
            Status::CountdownInProgress(n) => write!(f, "Countdown {n}/{DEFAULT_SIGNAL_TARGET}"),
            Status::CountdownSignal => write!(f, "Countdown {DEFAULT_SIGNAL_TARGET} (Signal)"),
        }
    }
}

/// Classify against the default target of 13.
pub fn classify(setups: &[SetupEvent], countdown: &CountdownResult) -> Status {
    classify_with_target(setups, countdown, DEFAULT_SIGNAL_TARGET)
}

pub fn classify_with_target(
    setups: &[SetupEvent],
    countdown: &CountdownResult,
    target: usize,
) -> Status {
    if setups.is_empty() {
        return Status::SetupNotCompleted;
    }
    match countdown.tally {
        0 => Status::CountdownNotStarted,
        n if n < target => Status::CountdownInProgress(n),
        _ => Status::CountdownSignal,
    }
}
