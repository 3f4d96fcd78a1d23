//! The storage capability the registration and review flows depend on.
//!
//! Two operations are consumed: append one record, and read every record
//! newest first. [`SeaOrmStudentStore`](crate::SeaOrmStudentStore) is the
//! production implementation; [`MemoryStudentStore`](crate::MemoryStudentStore)
//! substitutes for it in tests.

use std::fmt::Debug;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::validation::NewStudent;

/// Errors surfaced by a [`StudentStore`].
///
/// Both variants carry the backend's own message so it can be shown to the
/// user verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("{0}")]
    Write(String),
    #[error("{0}")]
    Read(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// One stored registration, as read back from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentRecord {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub email: String,
    pub college: String,
    pub department: String,
    pub year: String,
    pub created_at: DateTime<Utc>,
}

/// Append-only student storage.
///
/// Implementations assign `id` and `created_at`. Records are never updated
/// or deleted once inserted.
#[async_trait]
pub trait StudentStore: Debug + Send + Sync {
    /// Inserts exactly one record and returns the identifier assigned to it.
    async fn insert(&self, student: &NewStudent) -> Result<Uuid>;

    /// Reads every record ordered by `created_at`, most recent first.
    async fn select_all(&self) -> Result<Vec<StudentRecord>>;
}
