use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::{debug, instrument, warn};

use super::{
    entities::{NewWorkSession, SessionListing, WorkSession},
    parse_sessions, SessionStore,
};

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";
const RESOURCE: &str = "workSessions";

#[derive(Debug, Clone)]
pub struct RestConfig {
    pub base_url: String,
    pub timeout: Duration,
    /// How many times listing is attempted. Only listing is retried, creating twice could leave
    /// two records for one day.
    pub list_attempts: u32,
    pub retry_backoff: Duration,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            timeout: Duration::from_secs(10),
            list_attempts: 3,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

/// [SessionStore] backed by a REST collection, e.g. `json-server` serving `workSessions`.
pub struct RestSessionStore {
    client: Client,
    collection: Url,
    config: RestConfig,
}

impl RestSessionStore {
    pub fn new(config: RestConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to build http client")?;
        let mut collection = Url::parse(&config.base_url)
            .with_context(|| format!("Invalid store url {}", config.base_url))?;
        collection
            .path_segments_mut()
            .map_err(|_| anyhow!("Store url {} can't hold a path", config.base_url))?
            .pop_if_empty()
            .push(RESOURCE);
        Ok(Self {
            client,
            collection,
            config,
        })
    }

    fn collection_url(&self) -> Url {
        self.collection.clone()
    }

    /// Ids are pushed as a single path segment, so characters like `/` or `?` are escaped.
    fn record_url(&self, session: &WorkSession) -> Url {
        let mut url = self.collection_url();
        // Cannot fail, the collection url was checked to hold a path in `new`.
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(&session.id.to_string());
        }
        url
    }

    async fn list_once(&self) -> Result<SessionListing> {
        let values = self
            .client
            .get(self.collection_url())
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<serde_json::Value>>()
            .await?;
        Ok(parse_sessions(values))
    }
}

#[async_trait]
impl SessionStore for RestSessionStore {
    #[instrument(skip(self))]
    async fn list(&self) -> Result<SessionListing> {
        let attempts = self.config.list_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.list_once().await {
                Ok(listing) => {
                    debug!(
                        "Listed {} sessions, {} unreadable days",
                        listing.sessions.len(),
                        listing.unreadable.len()
                    );
                    return Ok(listing);
                }
                Err(e) if attempt < attempts => {
                    warn!("Listing sessions failed on attempt {attempt}/{attempts}: {e:?}");
                    attempt += 1;
                    tokio::time::sleep(self.config.retry_backoff).await;
                }
                Err(e) => {
                    return Err(e).with_context(|| {
                        format!("Failed to list sessions from {}", self.collection_url())
                    })
                }
            }
        }
    }

    #[instrument(skip(self))]
    async fn create(&self, session: NewWorkSession) -> Result<WorkSession> {
        let created = self
            .client
            .post(self.collection_url())
            .json(&session)
            .send()
            .await
            .and_then(|v| v.error_for_status())
            .with_context(|| format!("Failed to create session for {}", session.date))?
            .json::<WorkSession>()
            .await
            .context("Store returned an unexpected session")?;
        debug!("Created session {}", created.id);
        Ok(created)
    }

    #[instrument(skip(self))]
    async fn update(&self, session: WorkSession) -> Result<WorkSession> {
        let updated = self
            .client
            .put(self.record_url(&session))
            .json(&session)
            .send()
            .await
            .and_then(|v| v.error_for_status())
            .with_context(|| format!("Failed to update session {}", session.id))?
            .json::<WorkSession>()
            .await
            .context("Store returned an unexpected session")?;
        debug!("Updated session {} to {}s", updated.id, updated.duration);
        Ok(updated)
    }
}
