//! Access to the remote `workSessions` collection.
//!  - [SessionStore] is the contract: list, create and update. Nothing is ever deleted.
//!  - [rest::RestSessionStore] talks to the REST service.
//!  - [index::SessionIndex] is the local, day keyed copy of the collection.

pub mod entities;
pub mod index;
#[cfg(test)]
pub mod memory;
pub mod rest;

use std::ops::Deref;

use anyhow::Result;
use async_trait::async_trait;
use entities::{NewWorkSession, SessionListing, WorkSession};
use tracing::warn;

use crate::utils::time::key_to_date;

/// Interface for abstracting the remote store. Date uniqueness is a client side convention, so
/// implementations are not expected to enforce it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Returns every known session in no particular order.
    async fn list(&self) -> Result<SessionListing>;

    /// Persists a new session. The returned record carries the id assigned by the store.
    async fn create(&self, session: NewWorkSession) -> Result<WorkSession>;

    /// Replaces the record addressed by `session.id`.
    async fn update(&self, session: WorkSession) -> Result<WorkSession>;
}

#[async_trait]
impl<T> SessionStore for T
where
    T: Deref + Send + Sync,
    T::Target: SessionStore,
{
    async fn list(&self) -> Result<SessionListing> {
        self.deref().list().await
    }

    async fn create(&self, session: NewWorkSession) -> Result<WorkSession> {
        self.deref().create(session).await
    }

    async fn update(&self, session: WorkSession) -> Result<WorkSession> {
        self.deref().update(session).await
    }
}

/// Parses records of a listed collection one by one. Records that don't look like a session are
/// skipped, so one broken entry doesn't hide the whole history. The day of a skipped record is
/// still kept whenever it can be read.
pub fn parse_sessions(values: Vec<serde_json::Value>) -> SessionListing {
    let mut listing = SessionListing::default();
    for value in values {
        match serde_json::from_value::<WorkSession>(value.clone()) {
            Ok(session) => listing.sessions.push(session),
            Err(e) => {
                warn!("Skipping malformed session {value}: {e}");
                if let Some(date) = value
                    .get("date")
                    .and_then(|v| v.as_str())
                    .and_then(key_to_date)
                {
                    listing.unreadable.insert(date);
                }
            }
        }
    }
    listing
}
