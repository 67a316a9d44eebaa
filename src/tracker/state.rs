use tokio::time::Instant;

use super::ticker::Ticker;

/// Timer state of a [SessionTracker](super::SessionTracker). Nothing here is persisted.
#[derive(Debug)]
pub enum TimerState {
    Idle,
    /// The ticker lives only as long as this variant does.
    Running { started: Instant, ticker: Ticker },
    /// Timer is stopped and the elapsed value is frozen until the user decides.
    AwaitingConfirmation,
}

/// Copyable summary of [TimerState] for presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Running,
    AwaitingConfirmation,
}

impl TimerState {
    pub fn phase(&self) -> Phase {
        match self {
            TimerState::Idle => Phase::Idle,
            TimerState::Running { .. } => Phase::Running,
            TimerState::AwaitingConfirmation => Phase::AwaitingConfirmation,
        }
    }
}

/// Whole seconds between `started` and `now`, truncated.
pub fn elapsed_seconds(started: Instant, now: Instant) -> u64 {
    now.saturating_duration_since(started).as_secs()
}
