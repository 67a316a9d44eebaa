use std::collections::{btree_map::Entry, BTreeMap, BTreeSet};

use chrono::NaiveDate;
use tracing::warn;

use super::entities::{SessionListing, WorkSession};

/// In-memory view of the `workSessions` collection keyed by day. Holding sessions in a map
/// keeps at most one record per date no matter what the store returns.
#[derive(Debug, Default, Clone)]
pub struct SessionIndex {
    sessions: BTreeMap<NaiveDate, WorkSession>,
    /// Days the store holds a record for that couldn't be read.
    unreadable: BTreeSet<NaiveDate>,
}

impl SessionIndex {
    /// Builds the index from a freshly listed collection. When the store holds several records
    /// for one day the first one wins and the rest are only reported.
    pub fn from_sessions(sessions: impl IntoIterator<Item = WorkSession>) -> Self {
        let mut index = BTreeMap::new();
        for session in sessions {
            match index.entry(session.date) {
                Entry::Vacant(entry) => {
                    entry.insert(session);
                }
                Entry::Occupied(entry) => {
                    warn!(
                        "Ignoring duplicate session {} for {}, keeping {}",
                        session.id,
                        session.date,
                        entry.get().id
                    );
                }
            }
        }
        Self {
            sessions: index,
            unreadable: BTreeSet::new(),
        }
    }

    pub fn from_listing(listing: SessionListing) -> Self {
        Self {
            unreadable: listing.unreadable,
            ..Self::from_sessions(listing.sessions)
        }
    }

    /// Whether the store has a record for `date` that this index couldn't take in. Such a day
    /// must not get another record.
    pub fn is_unreadable(&self, date: NaiveDate) -> bool {
        self.unreadable.contains(&date)
    }

    /// Days with records that couldn't be read, oldest first.
    pub fn unreadable(&self) -> impl Iterator<Item = &NaiveDate> {
        self.unreadable.iter()
    }

    pub fn get(&self, date: NaiveDate) -> Option<&WorkSession> {
        self.sessions.get(&date)
    }

    /// Inserts or replaces the session for its day, returning the previous one.
    pub fn upsert(&mut self, session: WorkSession) -> Option<WorkSession> {
        self.sessions.insert(session.date, session)
    }

    /// Sessions ordered by date, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &WorkSession> {
        self.sessions.values()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
