//! An in-memory [`StudentStore`] for tests and local demos.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::store::{self, StoreError, StudentRecord, StudentStore};
use crate::validation::NewStudent;

/// Keeps records in a vector, oldest first, and counts every call.
///
/// Writes and reads can be made to fail on demand to exercise the error
/// paths of the flows built on top of a store.
#[derive(Debug, Default)]
pub struct MemoryStudentStore {
    records: RwLock<Vec<StudentRecord>>,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
    insert_calls: AtomicUsize,
    select_calls: AtomicUsize,
}

impl MemoryStudentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store with existing records in any order.
    pub fn with_records(records: Vec<StudentRecord>) -> Self {
        let mut records = records;
        records.sort_by_key(|r| r.created_at);
        Self {
            records: RwLock::new(records),
            ..Self::default()
        }
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }

    pub fn select_calls(&self) -> usize {
        self.select_calls.load(Ordering::SeqCst)
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    fn next_timestamp(last: Option<DateTime<Utc>>) -> DateTime<Utc> {
        let now = Utc::now();
        // Keep creation times strictly increasing so newest-first is total
        match last {
            Some(last) if now <= last => last + chrono::Duration::microseconds(1),
            _ => now,
        }
    }
}

#[async_trait]
impl StudentStore for MemoryStudentStore {
    async fn insert(&self, student: &NewStudent) -> store::Result<Uuid> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Write("insert rejected by memory store".into()));
        }

        let mut records = self.records.write().await;
        let record = StudentRecord {
            id: Uuid::new_v4(),
            name: student.name.clone(),
            phone: student.phone.clone(),
            email: student.email.clone(),
            college: student.college.clone(),
            department: student.department.as_str().to_string(),
            year: student.year.as_str().to_string(),
            created_at: Self::next_timestamp(records.last().map(|r| r.created_at)),
        };
        let id = record.id;
        records.push(record);
        Ok(id)
    }

    async fn select_all(&self) -> store::Result<Vec<StudentRecord>> {
        self.select_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Read("select rejected by memory store".into()));
        }

        Ok(self.records.read().await.iter().rev().cloned().collect())
    }
}
