use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::NaiveDate;

use super::{
    entities::{NewWorkSession, SessionId, SessionListing, WorkSession},
    SessionStore,
};

/// In-memory stand-in for the REST service, recording how often it was called.
#[derive(Default)]
pub struct MemoryStore {
    sessions: Mutex<Vec<WorkSession>>,
    pub lists: AtomicUsize,
    pub creates: AtomicUsize,
    pub updates: AtomicUsize,
}

impl MemoryStore {
    pub fn with_sessions(sessions: Vec<WorkSession>) -> Self {
        Self {
            sessions: Mutex::new(sessions),
            ..Default::default()
        }
    }

    pub fn sessions(&self) -> Vec<WorkSession> {
        self.sessions.lock().unwrap().clone()
    }

    pub fn duration_on(&self, date: NaiveDate) -> Option<u64> {
        self.sessions()
            .into_iter()
            .find(|v| v.date == date)
            .map(|v| v.duration)
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn lists(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn list(&self) -> Result<SessionListing> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        Ok(self.sessions().into())
    }

    async fn create(&self, session: NewWorkSession) -> Result<WorkSession> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        let mut sessions = self.sessions.lock().unwrap();
        let session = session.into_session(SessionId::Number(sessions.len() as u64 + 1));
        sessions.push(session.clone());
        Ok(session)
    }

    async fn update(&self, session: WorkSession) -> Result<WorkSession> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        let mut sessions = self.sessions.lock().unwrap();
        let stored = sessions
            .iter_mut()
            .find(|v| v.id == session.id)
            .ok_or_else(|| anyhow!("No session {}", session.id))?;
        *stored = session.clone();
        Ok(session)
    }
}
