//! The session tracker: a timer plus the reconciliation of its readings against one
//! [WorkSession] per calendar day.
//!
//! `Idle -> Running -> AwaitingConfirmation -> Idle`. Every network call is awaited in place,
//! nothing is fired in the background.

pub mod state;
pub mod ticker;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use state::{elapsed_seconds, Phase, TimerState};
use ticker::{Ticker, TICK_PERIOD};
use tracing::{debug, error, info, instrument, warn};

use crate::{
    store::{
        entities::{NewWorkSession, WorkSession},
        index::SessionIndex,
        SessionStore,
    },
    utils::clock::Clock,
};

pub struct SessionTracker<S: SessionStore> {
    store: S,
    clock: Box<dyn Clock>,
    sessions: SessionIndex,
    /// Whether the latest listing succeeded. Sessions are never created while it didn't,
    /// otherwise a day already present in the store could get a second record.
    synced: bool,
    state: TimerState,
    elapsed: u64,
}

impl<S: SessionStore> SessionTracker<S> {
    pub fn new(store: S, clock: Box<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            sessions: SessionIndex::default(),
            synced: false,
            state: TimerState::Idle,
            elapsed: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    /// Seconds shown on the timer. Frozen while awaiting confirmation.
    pub fn elapsed(&self) -> u64 {
        self.elapsed
    }

    pub fn sessions(&self) -> &SessionIndex {
        &self.sessions
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Replaces the local collection with the one held by the store. On failure the last known
    /// collection is still shown, but it is listed again before anything gets created.
    #[instrument(skip(self))]
    pub async fn refresh(&mut self) -> Result<()> {
        let listing = match self.store.list().await {
            Ok(listing) => listing,
            Err(e) => {
                self.synced = false;
                return Err(e).context("Failed to fetch work history");
            }
        };
        self.sessions = SessionIndex::from_listing(listing);
        self.synced = true;
        debug!("Loaded {} sessions", self.sessions.len());
        Ok(())
    }

    /// Looks up the session of `date`, listing the collection first if the latest listing
    /// failed. Fails for a day whose stored record couldn't be read, since creating one would
    /// leave the day with two records.
    async fn resolve(&mut self, date: NaiveDate) -> Result<Option<WorkSession>> {
        if !self.synced {
            self.refresh()
                .await
                .context("Can't tell whether today already has a session")?;
        }
        match self.sessions.get(date) {
            Some(session) => Ok(Some(session.clone())),
            None if self.sessions.is_unreadable(date) => {
                bail!("The stored session for {date} can't be read, fix it in the store first")
            }
            None => Ok(None),
        }
    }

    /// Starts the timer. If today has no session yet one is created with zero duration first,
    /// and the timer only starts once the store confirmed it.
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> Result<()> {
        match self.state {
            TimerState::Idle => (),
            TimerState::Running { .. } => bail!("Timer is already running"),
            TimerState::AwaitingConfirmation => {
                bail!("Confirm or discard the stopped session before starting a new one")
            }
        }

        let today = self.clock.today();
        if self.resolve(today).await?.is_none() {
            let created = self
                .store
                .create(NewWorkSession::empty(today))
                .await
                .context("Failed to create today's session")?;
            info!("Created session {} for {today}", created.id);
            self.sessions.upsert(created);
        }

        let started = self.clock.instant();
        self.state = TimerState::Running {
            started,
            ticker: Ticker::starting_at(started, TICK_PERIOD),
        };
        self.elapsed = 0;
        info!("Timer started");
        Ok(())
    }

    /// Waits for the next display tick and refreshes the elapsed value. Never completes unless
    /// the timer is running.
    pub async fn next_tick(&mut self) -> u64 {
        let TimerState::Running { started, ticker } = &mut self.state else {
            return std::future::pending().await;
        };
        ticker.tick(self.clock.as_ref()).await;
        self.elapsed = elapsed_seconds(*started, self.clock.instant());
        self.elapsed
    }

    /// Stops the timer and freezes the elapsed seconds until [Self::confirm] or [Self::discard].
    #[instrument(skip(self))]
    pub fn stop(&mut self) -> Result<u64> {
        let TimerState::Running { started, .. } = &self.state else {
            bail!("Timer is not running");
        };
        self.elapsed = elapsed_seconds(*started, self.clock.instant());
        self.state = TimerState::AwaitingConfirmation;
        info!("Timer stopped at {}s", self.elapsed);
        Ok(self.elapsed)
    }

    /// Adds the frozen seconds to today's session and reloads the collection from the store.
    ///
    /// Once the write was attempted the tracker always returns to idle, even if the write or the
    /// reload failed; the error is still returned so it can be reported. If today's session can't
    /// be resolved nothing is written and the stopped timer stays pending.
    #[instrument(skip(self))]
    pub async fn confirm(&mut self) -> Result<u64> {
        let TimerState::AwaitingConfirmation = self.state else {
            bail!("There is no stopped timer to confirm");
        };
        let elapsed = self.elapsed;
        let today = self.clock.today();

        let write = match self.resolve(today).await? {
            Some(session) => self.store.update(session.add_seconds(elapsed)).await,
            None => {
                // Happens when the day changed while the timer was running.
                warn!("No session for {today} at confirmation, creating one");
                self.store
                    .create(NewWorkSession {
                        date: today,
                        duration: elapsed,
                    })
                    .await
            }
        };
        if let Ok(session) = &write {
            self.sessions.upsert(session.clone());
        }
        let refresh = self.refresh().await;

        self.state = TimerState::Idle;
        self.elapsed = 0;

        if let (Err(_), Err(e)) = (&write, &refresh) {
            error!("Reloading after a failed write also failed {e:?}");
        }
        let session = write.with_context(|| format!("{elapsed}s were not added to {today}"))?;
        info!("Session {} now holds {}s", session.id, session.duration);
        refresh?;
        Ok(elapsed)
    }

    /// Drops the frozen seconds without touching the store.
    #[instrument(skip(self))]
    pub fn discard(&mut self) -> Result<u64> {
        let TimerState::AwaitingConfirmation = self.state else {
            bail!("There is no stopped timer to discard");
        };
        let discarded = self.elapsed;
        self.state = TimerState::Idle;
        self.elapsed = 0;
        info!("Discarded {discarded}s");
        Ok(discarded)
    }

    /// Leaves any timer state behind. Unconfirmed time is lost.
    pub fn shutdown(&mut self) -> u64 {
        let discarded = match &self.state {
            TimerState::Idle => 0,
            TimerState::Running { started, .. } => elapsed_seconds(*started, self.clock.instant()),
            TimerState::AwaitingConfirmation => self.elapsed,
        };
        if discarded > 0 {
            warn!("Shutting down with {discarded}s of unconfirmed time");
        }
        self.state = TimerState::Idle;
        self.elapsed = 0;
        discarded
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use anyhow::{anyhow, Result};
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
    use tokio::time::timeout;

    use crate::{
        store::{
            entities::{SessionId, SessionListing, WorkSession},
            memory::MemoryStore,
            MockSessionStore, SessionStore,
        },
        utils::{clock::test_clock::TestClock, logging::TEST_LOGGING},
    };

    use super::{state::Phase, SessionTracker};

    const TODAY: NaiveDate = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    const YESTERDAY: NaiveDate = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

    fn session(id: u64, date: NaiveDate, duration: u64) -> WorkSession {
        WorkSession {
            id: SessionId::Number(id),
            date,
            duration,
        }
    }

    async fn loaded<S: SessionStore>(store: S) -> Result<SessionTracker<S>> {
        *TEST_LOGGING;
        let mut tracker = SessionTracker::new(store, Box::new(TestClock::at(TODAY)));
        tracker.refresh().await?;
        Ok(tracker)
    }

    async fn run_for(tracker: &mut SessionTracker<&MemoryStore>, seconds: u64) -> Result<u64> {
        tracker.start().await?;
        tokio::time::advance(Duration::from_secs(seconds)).await;
        tracker.stop()
    }

    #[tokio::test(start_paused = true)]
    async fn start_creates_missing_session_first() -> Result<()> {
        let store = MemoryStore::with_sessions(vec![session(1, YESTERDAY, 59)]);
        let mut tracker = loaded(&store).await?;

        tracker.start().await?;

        assert_eq!(tracker.phase(), Phase::Running);
        assert_eq!(store.creates(), 1);
        assert_eq!(store.duration_on(TODAY), Some(0));
        assert_eq!(tracker.sessions().get(TODAY).map(|v| v.duration), Some(0));
        assert_eq!(tracker.sessions().len(), 2);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn start_reuses_existing_session() -> Result<()> {
        let store = MemoryStore::with_sessions(vec![session(1, TODAY, 10)]);
        let mut tracker = loaded(&store).await?;

        tracker.start().await?;

        assert_eq!(store.creates(), 0);
        assert_eq!(tracker.elapsed(), 0);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn confirmed_time_is_added_to_today() -> Result<()> {
        let store = MemoryStore::with_sessions(vec![session(1, TODAY, 3600)]);
        let mut tracker = loaded(&store).await?;

        assert_eq!(run_for(&mut tracker, 125).await?, 125);
        assert_eq!(tracker.phase(), Phase::AwaitingConfirmation);
        assert_eq!(tracker.elapsed(), 125);

        assert_eq!(tracker.confirm().await?, 125);

        assert_eq!(store.duration_on(TODAY), Some(3725));
        assert_eq!(tracker.sessions().get(TODAY).map(|v| v.duration), Some(3725));
        assert_eq!(tracker.phase(), Phase::Idle);
        assert_eq!(tracker.elapsed(), 0);
        // Initial load plus the reload after confirming.
        assert_eq!(store.lists(), 2);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn confirmed_intervals_add_up() -> Result<()> {
        let store = MemoryStore::default();
        let mut tracker = loaded(&store).await?;

        for seconds in [5, 17, 30, 3600] {
            run_for(&mut tracker, seconds).await?;
            tracker.confirm().await?;
        }

        assert_eq!(store.duration_on(TODAY), Some(3652));
        assert_eq!(store.creates(), 1);
        assert_eq!(store.updates(), 4);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn discarding_keeps_stored_duration() -> Result<()> {
        let store = MemoryStore::with_sessions(vec![session(1, TODAY, 100)]);
        let mut tracker = loaded(&store).await?;

        run_for(&mut tracker, 40).await?;
        assert_eq!(tracker.discard()?, 40);

        assert_eq!(store.duration_on(TODAY), Some(100));
        assert_eq!(store.updates(), 0);
        assert_eq!(tracker.elapsed(), 0);
        assert_eq!(tracker.phase(), Phase::Idle);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_once_per_second_while_running() -> Result<()> {
        let store = MemoryStore::default();
        let mut tracker = loaded(&store).await?;

        tracker.start().await?;
        for expected in 1..=5 {
            assert_eq!(tracker.next_tick().await, expected);
            assert_eq!(tracker.elapsed(), expected);
        }
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn no_ticks_outside_running() -> Result<()> {
        let store = MemoryStore::default();
        let mut tracker = loaded(&store).await?;

        assert!(timeout(Duration::from_secs(5), tracker.next_tick()).await.is_err());

        tracker.start().await?;
        tracker.next_tick().await;
        tracker.next_tick().await;
        assert_eq!(tracker.stop()?, 2);

        assert!(timeout(Duration::from_secs(5), tracker.next_tick()).await.is_err());
        assert_eq!(tracker.elapsed(), 2);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn illegal_transitions_are_rejected() -> Result<()> {
        let store = MemoryStore::default();
        let mut tracker = loaded(&store).await?;

        assert!(tracker.stop().is_err());
        assert!(tracker.confirm().await.is_err());
        assert!(tracker.discard().is_err());

        tracker.start().await?;
        assert!(tracker.start().await.is_err());
        assert!(tracker.confirm().await.is_err());
        assert_eq!(tracker.phase(), Phase::Running);

        tracker.stop()?;
        assert!(tracker.start().await.is_err());
        assert!(tracker.stop().is_err());
        assert_eq!(tracker.phase(), Phase::AwaitingConfirmation);
        assert_eq!(store.creates(), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn confirming_after_midnight_creates_the_new_day() -> Result<()> {
        *TEST_LOGGING;
        let store = MemoryStore::default();
        let late = NaiveDateTime::new(YESTERDAY, NaiveTime::from_hms_opt(23, 59, 30).unwrap());
        let mut tracker = SessionTracker::new(&store, Box::new(TestClock::at_time(late)));
        tracker.refresh().await?;

        run_for(&mut tracker, 60).await?;
        assert_eq!(tracker.today(), TODAY);
        tracker.confirm().await?;

        assert_eq!(store.duration_on(YESTERDAY), Some(0));
        assert_eq!(store.duration_on(TODAY), Some(60));
        assert_eq!(tracker.sessions().len(), 2);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_days_collapse_on_load() -> Result<()> {
        let store = MemoryStore::with_sessions(vec![
            session(1, TODAY, 10),
            session(2, TODAY, 20),
            session(3, YESTERDAY, 30),
        ]);
        let tracker = loaded(&store).await?;

        assert_eq!(tracker.sessions().len(), 2);
        assert_eq!(tracker.sessions().get(TODAY).map(|v| v.duration), Some(10));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn failed_create_keeps_timer_idle() -> Result<()> {
        let mut store = MockSessionStore::new();
        store.expect_list().returning(|| Ok(vec![].into()));
        store
            .expect_create()
            .times(1)
            .returning(|_| Err(anyhow!("store is down")));
        let mut tracker = loaded(store).await?;

        assert!(tracker.start().await.is_err());
        assert_eq!(tracker.phase(), Phase::Idle);
        assert!(tracker.sessions().is_empty());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn start_retries_failed_initial_load() -> Result<()> {
        *TEST_LOGGING;
        let mut store = MockSessionStore::new();
        let mut calls = 0;
        store.expect_list().times(2).returning(move || {
            calls += 1;
            if calls == 1 {
                Err(anyhow!("store is down"))
            } else {
                Ok(vec![session(7, TODAY, 50)].into())
            }
        });
        store.expect_create().never();
        let mut tracker = SessionTracker::new(store, Box::new(TestClock::at(TODAY)));

        assert!(tracker.refresh().await.is_err());
        assert!(tracker.sessions().is_empty());

        tracker.start().await?;
        assert_eq!(tracker.phase(), Phase::Running);
        assert_eq!(tracker.sessions().get(TODAY).map(|v| v.duration), Some(50));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn start_without_history_never_creates() -> Result<()> {
        *TEST_LOGGING;
        let mut store = MockSessionStore::new();
        store
            .expect_list()
            .returning(|| Err(anyhow!("store is down")));
        store.expect_create().never();
        let mut tracker = SessionTracker::new(store, Box::new(TestClock::at(TODAY)));

        assert!(tracker.refresh().await.is_err());
        assert!(tracker.start().await.is_err());
        assert_eq!(tracker.phase(), Phase::Idle);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn failed_update_still_reloads_and_resets() -> Result<()> {
        let mut store = MockSessionStore::new();
        store
            .expect_list()
            .times(2)
            .returning(|| Ok(vec![session(1, TODAY, 3600)].into()));
        store
            .expect_update()
            .times(1)
            .withf(|v| v.duration == 3610)
            .returning(|_| Err(anyhow!("store is down")));
        let mut tracker = loaded(store).await?;

        tracker.start().await?;
        tokio::time::advance(Duration::from_secs(10)).await;
        tracker.stop()?;

        assert!(tracker.confirm().await.is_err());
        assert_eq!(tracker.phase(), Phase::Idle);
        assert_eq!(tracker.elapsed(), 0);
        assert_eq!(tracker.sessions().get(TODAY).map(|v| v.duration), Some(3600));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn confirm_waits_when_history_cannot_be_reloaded() -> Result<()> {
        *TEST_LOGGING;
        let mut store = MockSessionStore::new();
        let mut calls = 0;
        store.expect_list().times(3).returning(move || {
            calls += 1;
            if calls == 1 {
                Ok(vec![session(1, TODAY, 3600)].into())
            } else {
                Err(anyhow!("store is down"))
            }
        });
        store.expect_update().never();
        store.expect_create().never();
        let mut tracker = loaded(store).await?;

        tracker.start().await?;
        tokio::time::advance(Duration::from_secs(10)).await;
        tracker.stop()?;
        assert!(tracker.refresh().await.is_err());

        assert!(tracker.confirm().await.is_err());
        assert_eq!(tracker.phase(), Phase::AwaitingConfirmation);
        assert_eq!(tracker.elapsed(), 10);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn unreadable_day_is_never_created() -> Result<()> {
        *TEST_LOGGING;
        let mut store = MockSessionStore::new();
        store.expect_list().returning(|| {
            Ok(SessionListing {
                sessions: vec![session(1, YESTERDAY, 30)],
                unreadable: [TODAY].into(),
            })
        });
        store.expect_create().never();
        store.expect_update().never();
        let mut tracker = loaded(store).await?;

        assert!(tracker.start().await.is_err());
        assert_eq!(tracker.phase(), Phase::Idle);
        assert!(tracker.sessions().is_unreadable(TODAY));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn confirm_keeps_time_for_unreadable_day() -> Result<()> {
        *TEST_LOGGING;
        let mut store = MockSessionStore::new();
        let mut calls = 0;
        store.expect_list().times(2).returning(move || {
            calls += 1;
            if calls == 1 {
                Ok(vec![session(1, TODAY, 3600)].into())
            } else {
                Ok(SessionListing {
                    sessions: vec![],
                    unreadable: [TODAY].into(),
                })
            }
        });
        store.expect_create().never();
        store.expect_update().never();
        let mut tracker = loaded(store).await?;

        tracker.start().await?;
        tokio::time::advance(Duration::from_secs(10)).await;
        tracker.stop()?;
        tracker.refresh().await?;

        assert!(tracker.confirm().await.is_err());
        assert_eq!(tracker.phase(), Phase::AwaitingConfirmation);
        assert_eq!(tracker.elapsed(), 10);
        assert_eq!(tracker.discard()?, 10);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_discards_running_time() -> Result<()> {
        let store = MemoryStore::with_sessions(vec![session(1, TODAY, 5)]);
        let mut tracker = loaded(&store).await?;

        tracker.start().await?;
        tokio::time::advance(Duration::from_secs(42)).await;

        assert_eq!(tracker.shutdown(), 42);
        assert_eq!(tracker.phase(), Phase::Idle);
        assert_eq!(store.duration_on(TODAY), Some(5));
        Ok(())
    }
}
