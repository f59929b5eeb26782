use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;

use crate::error::{SinkError, StoreFailure};

use super::{
    entities::SessionRecord,
    session_storage::{SessionFilter, SessionSink},
};

/// In-memory sink for tests. Can be told to fail or to hang.
#[derive(Default)]
pub struct MemorySessionStore {
    records: Mutex<Vec<SessionRecord>>,
    failing: AtomicBool,
    append_calls: AtomicUsize,
    stall: Option<Duration>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<SessionRecord>) -> Self {
        Self {
            records: Mutex::new(records),
            ..Self::default()
        }
    }

    pub fn stalling(stall: Duration) -> Self {
        Self {
            stall: Some(stall),
            ..Self::default()
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Appends attempted so far, failed ones included.
    pub fn append_calls(&self) -> usize {
        self.append_calls.load(Ordering::SeqCst)
    }

    pub fn records(&self) -> Vec<SessionRecord> {
        self.records.lock().unwrap().clone()
    }

    fn failure() -> StoreFailure {
        StoreFailure::Status {
            status: 503,
            body: "unavailable".into(),
        }
    }
}

#[async_trait]
impl SessionSink for MemorySessionStore {
    async fn append(&self, record: &SessionRecord) -> Result<(), SinkError> {
        self.append_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(stall) = self.stall {
            tokio::time::sleep(stall).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(SinkError::Write(Self::failure()));
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn query(&self, filter: &SessionFilter) -> Result<Vec<SessionRecord>, SinkError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SinkError::Query(Self::failure()));
        }
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect())
    }
}
