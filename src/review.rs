//! Fetch, search and summary behind the admin dashboard.
//!
//! Entering the dashboard takes one snapshot of every record. Searching runs
//! over that snapshot in memory and never goes back to the store; only an
//! explicit refresh does. Export always uses the full snapshot (see
//! [`crate::export`]).

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::{debug, info, warn};

use crate::gate::AccessGate;
use crate::store::{StoreError, StudentRecord, StudentStore};

/// Session key under which the fetched snapshot lives.
pub const SNAPSHOT_KEY: &str = "review_snapshot";

/// Shown in place of a figure that has nothing to summarise.
pub const PLACEHOLDER: &str = "\u{2014}";

/// Everything the dashboard knows about the stored records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewSnapshot {
    /// All records, newest first. Empty when the fetch failed.
    pub records: Vec<StudentRecord>,
    /// The store's message when the fetch failed.
    #[serde(default)]
    pub fetch_error: Option<String>,
}

/// Figures shown above the records table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub total: usize,
    pub latest: Option<LatestEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestEntry {
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Summary {
    /// Name of the newest record, or [`PLACEHOLDER`].
    pub fn latest_name(&self) -> &str {
        self.latest.as_ref().map_or(PLACEHOLDER, |l| l.name.as_str())
    }
}

impl ReviewSnapshot {
    /// Issues the single fetch-all for a dashboard visit.
    ///
    /// A failed fetch leaves the snapshot empty and keeps the store's message
    /// in `fetch_error`, so an empty result and a failed fetch stay
    /// distinguishable.
    pub async fn fetch(store: &dyn StudentStore) -> Self {
        match store.select_all().await {
            Ok(records) => {
                info!(count = records.len(), "fetched student records");
                Self {
                    records,
                    fetch_error: None,
                }
            }
            Err(StoreError::Read(message) | StoreError::Write(message)) => {
                warn!(error = %message, "fetching student records failed");
                Self {
                    records: Vec::new(),
                    fetch_error: Some(message),
                }
            }
        }
    }

    /// Fetches only when the gate is open; a locked gate never reaches the store.
    pub async fn fetch_if_unlocked(gate: AccessGate, store: &dyn StudentStore) -> Option<Self> {
        if gate.is_unlocked() {
            Some(Self::fetch(store).await)
        } else {
            None
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.fetch_error.is_some()
    }

    /// Records whose name, email, college or department contain `query`,
    /// ignoring case. A blank query matches everything.
    pub fn filter(&self, query: &str) -> Vec<&StudentRecord> {
        let needle = query.to_lowercase();
        let matched: Vec<&StudentRecord> = self
            .records
            .iter()
            .filter(|r| matches_query(r, &needle))
            .collect();
        debug!(query, matched = matched.len(), total = self.records.len(), "filtered records");
        matched
    }

    pub fn summary(&self) -> Summary {
        Summary {
            total: self.records.len(),
            latest: self.records.first().map(|r| LatestEntry {
                name: r.name.clone(),
                created_at: r.created_at,
            }),
        }
    }

    pub async fn load(session: &Session) -> Result<Option<Self>, tower_sessions::session::Error> {
        session.get::<Self>(SNAPSHOT_KEY).await
    }

    pub async fn persist(&self, session: &Session) -> Result<(), tower_sessions::session::Error> {
        session.insert(SNAPSHOT_KEY, self).await
    }
}

/// `needle` must already be lowercase.
fn matches_query(record: &StudentRecord, needle: &str) -> bool {
    [
        &record.name,
        &record.email,
        &record.college,
        &record.department,
    ]
    .into_iter()
    .any(|field| field.to_lowercase().contains(needle))
}

/// Renders a timestamp the way `Date.toLocaleString()` does for en-US,
/// e.g. `3/7/2025, 4:05:09 PM`, shifted to `offset`.
pub fn format_timestamp(at: DateTime<Utc>, offset: FixedOffset) -> String {
    at.with_timezone(&offset)
        .format("%-m/%-d/%Y, %-I:%M:%S %p")
        .to_string()
}
