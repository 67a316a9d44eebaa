use std::time::Duration;

use tokio::time::Instant;

use crate::utils::clock::Clock;

pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Deadline schedule of the display refresh. Ticks land on `start + n * period`, so a late wake
/// up doesn't shift the following ones. It holds no task of its own: once the running state that
/// owns it is dropped no tick can fire.
#[derive(Debug)]
pub struct Ticker {
    next: Instant,
    period: Duration,
}

impl Ticker {
    pub fn starting_at(start: Instant, period: Duration) -> Self {
        Self {
            next: start + period,
            period,
        }
    }

    /// Waits for the next deadline. Deadlines that were already missed are skipped. Dropping the
    /// returned future before it completes leaves the schedule untouched.
    pub async fn tick(&mut self, clock: &dyn Clock) {
        clock.sleep_until(self.next).await;
        let now = clock.instant();
        while self.next <= now {
            self.next += self.period;
        }
    }
}
