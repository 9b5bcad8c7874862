use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::StorageError;
use crate::event::{LifecycleEvent, GENESIS_HASH};
use crate::record::{Record, RecordKind};
use crate::traits::{check_expected, RecordStore};

#[derive(Default)]
struct Inner {
    records: HashMap<String, Record>,
    /// Ids in insertion order.
    order: Vec<String>,
    events: Vec<LifecycleEvent>,
}

impl Inner {
    /// Put a stamped record in place, remembering first insertion order.
    fn store(&mut self, record: Record) -> Record {
        if !self.records.contains_key(&record.id) {
            self.order.push(record.id.clone());
        }
        self.records.insert(record.id.clone(), record.clone());
        record
    }

    fn seal(&mut self, event: LifecycleEvent) -> LifecycleEvent {
        let (seq, prev) = match self.events.last() {
            Some(last) => (last.seq + 1, last.hash.clone()),
            None => (1, GENESIS_HASH.to_string()),
        };
        let sealed = event.seal(seq, &prev);
        self.events.push(sealed.clone());
        sealed
    }
}

/// In-process store. Nothing survives the process; used in tests and as the
/// reference backend for the conformance suite.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StorageError> {
        self.inner
            .lock()
            .map_err(|_| StorageError::Backend("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn create(&self, record: Record) -> Result<Record, StorageError> {
        let mut inner = self.lock()?;
        check_expected(&record.id, inner.records.get(&record.id), None)?;
        Ok(inner.store(record.stamped(None)?))
    }

    async fn upsert(&self, record: Record) -> Result<Record, StorageError> {
        let mut inner = self.lock()?;
        let existing = inner.records.get(&record.id);
        let stamped = record.stamped(existing)?;
        Ok(inner.store(stamped))
    }

    async fn update(&self, record: Record, expected_version: u64) -> Result<Record, StorageError> {
        let mut inner = self.lock()?;
        let existing = inner.records.get(&record.id);
        check_expected(&record.id, existing, Some(expected_version))?;
        let stamped = record.stamped(existing)?;
        Ok(inner.store(stamped))
    }

    async fn commit(
        &self,
        record: Record,
        expected_version: Option<u64>,
        event: LifecycleEvent,
    ) -> Result<(Record, LifecycleEvent), StorageError> {
        let mut inner = self.lock()?;
        let existing = inner.records.get(&record.id);
        check_expected(&record.id, existing, expected_version)?;
        let stamped = record.stamped(existing)?;
        let sealed = inner.seal(event);
        Ok((inner.store(stamped), sealed))
    }

    async fn get(&self, id: &str) -> Result<Record, StorageError> {
        self.lock()?
            .records
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound { id: id.to_string() })
    }

    async fn list(
        &self,
        kind: RecordKind,
        owner_app_id: Option<&str>,
    ) -> Result<Vec<Record>, StorageError> {
        let inner = self.lock()?;
        Ok(inner
            .order
            .iter()
            .filter_map(|id| inner.records.get(id))
            .filter(|r| r.kind() == kind)
            .filter(|r| owner_app_id.map_or(true, |app| r.owner_app_id == app))
            .cloned()
            .collect())
    }

    async fn exists(&self, id: &str) -> Result<bool, StorageError> {
        Ok(self.lock()?.records.contains_key(id))
    }

    async fn append_event(&self, event: LifecycleEvent) -> Result<LifecycleEvent, StorageError> {
        Ok(self.lock()?.seal(event))
    }

    async fn events(&self, record_id: Option<&str>) -> Result<Vec<LifecycleEvent>, StorageError> {
        let inner = self.lock()?;
        Ok(inner
            .events
            .iter()
            .filter(|e| record_id.map_or(true, |id| e.record_id == id))
            .cloned()
            .collect())
    }
}
