use std::{collections::BTreeSet, fmt::Display};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Identifier assigned by the remote store. Stores are free to use numbers or strings, so the
/// original representation is kept and sent back untouched.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize, Clone)]
#[serde(untagged)]
pub enum SessionId {
    Number(u64),
    Text(String),
}

impl Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionId::Number(v) => write!(f, "{v}"),
            SessionId::Text(v) => write!(f, "{v}"),
        }
    }
}

/// Total tracked time for one calendar day, as stored in the `workSessions` collection.
/// Dates are (de)serialized as `YYYY-MM-DD`, durations as whole seconds.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
pub struct WorkSession {
    pub id: SessionId,
    pub date: NaiveDate,
    pub duration: u64,
}

impl WorkSession {
    pub fn with_duration(self, duration: u64) -> Self {
        Self { duration, ..self }
    }

    /// Adds confirmed seconds to the day's total.
    pub fn add_seconds(self, seconds: u64) -> Self {
        let duration = self.duration.saturating_add(seconds);
        self.with_duration(duration)
    }
}

/// A session that hasn't been persisted yet and therefore has no id.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
pub struct NewWorkSession {
    pub date: NaiveDate,
    pub duration: u64,
}

impl NewWorkSession {
    pub fn empty(date: NaiveDate) -> Self {
        Self { date, duration: 0 }
    }

    pub fn into_session(self, id: SessionId) -> WorkSession {
        WorkSession {
            id,
            date: self.date,
            duration: self.duration,
        }
    }
}

/// Result of listing the collection. Records that couldn't be read but still name a day are
/// remembered by that day, so nobody creates a second record for it.
#[derive(PartialEq, Eq, Debug, Default, Clone)]
pub struct SessionListing {
    pub sessions: Vec<WorkSession>,
    pub unreadable: BTreeSet<NaiveDate>,
}

impl From<Vec<WorkSession>> for SessionListing {
    fn from(sessions: Vec<WorkSession>) -> Self {
        Self {
            sessions,
            unreadable: BTreeSet::new(),
        }
    }
}
