use async_trait::async_trait;

use crate::error::StorageError;
use crate::event::LifecycleEvent;
use crate::record::{Record, RecordKind};

/// The storage trait for ledger backends.
///
/// A `RecordStore` provides durable, identifier-keyed storage for typed
/// records plus an append-only lifecycle journal. Records are never
/// removed; "deletion" is a status transition owned by the lifecycle engine.
///
/// ## Write stamping
///
/// Every successful write sets `updated_at` to the current time and
/// increments `version` (a freshly created record is stored at version 0).
/// `created_at` is immutable: `upsert` over an existing record keeps the
/// stored value regardless of what the caller passes. The kind stored under
/// an id is fixed too: overwriting it with another kind returns
/// `Err(StorageError::KindMismatch { .. })`.
///
/// ## Atomicity
///
/// A crash between two writes must never leave a record half-written.
/// File-backed implementations write to a temporary file and rename it into
/// place.
///
/// `commit` persists a record together with its journal event: either both
/// are stored or neither is. A failed `commit` leaves the record at the
/// version the caller read, so the same write can be retried.
///
/// ## Compare-and-swap
///
/// `update` succeeds only if the stored version equals `expected_version`;
/// otherwise it returns `Err(StorageError::VersionConflict { .. })` and
/// leaves the record untouched. Concurrent writers of the same id are
/// serialised so exactly one of several racing updates from the same
/// version wins, including writers in other processes sharing the store.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` so a store can be shared
/// behind an `Arc` across tokio tasks.
#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    // ── Writes ───────────────────────────────────────────────────────────────

    /// Insert a new record.
    ///
    /// Returns `Err(StorageError::AlreadyExists)` if the id is taken.
    async fn create(&self, record: Record) -> Result<Record, StorageError>;

    /// Insert a record or overwrite the one stored at the same id.
    async fn upsert(&self, record: Record) -> Result<Record, StorageError>;

    /// Overwrite an existing record if its stored version is
    /// `expected_version`.
    ///
    /// Returns the stored record (with its new version) on success.
    async fn update(&self, record: Record, expected_version: u64) -> Result<Record, StorageError>;

    /// Write `record` and seal `event` into the journal as one unit.
    ///
    /// `expected_version` of `None` creates the record (`AlreadyExists` if
    /// the id is taken); `Some(v)` overwrites it under compare-and-swap as
    /// `update` does. Returns the stored record and the sealed event.
    async fn commit(
        &self,
        record: Record,
        expected_version: Option<u64>,
        event: LifecycleEvent,
    ) -> Result<(Record, LifecycleEvent), StorageError>;

    // ── Queries ──────────────────────────────────────────────────────────────

    /// Read a record by id.
    ///
    /// Returns `Err(StorageError::NotFound)` if no record has this id.
    async fn get(&self, id: &str) -> Result<Record, StorageError>;

    /// All records of `kind`, optionally restricted to one owning app, in
    /// insertion order.
    async fn list(
        &self,
        kind: RecordKind,
        owner_app_id: Option<&str>,
    ) -> Result<Vec<Record>, StorageError>;

    async fn exists(&self, id: &str) -> Result<bool, StorageError>;

    // ── Journal ──────────────────────────────────────────────────────────────

    /// Seal and append an event, returning it with `seq`, `prev_hash` and
    /// `hash` filled in.
    async fn append_event(&self, event: LifecycleEvent) -> Result<LifecycleEvent, StorageError>;

    /// Journal events in append order, optionally only those of one record.
    async fn events(&self, record_id: Option<&str>) -> Result<Vec<LifecycleEvent>, StorageError>;
}

/// Check the stored state of `id` against what a write expects to find.
///
/// `None` expects no record; `Some(v)` expects a record at version `v`.
pub(crate) fn check_expected(
    id: &str,
    existing: Option<&Record>,
    expected_version: Option<u64>,
) -> Result<(), StorageError> {
    match (existing, expected_version) {
        (None, None) => Ok(()),
        (Some(_), None) => Err(StorageError::AlreadyExists { id: id.to_string() }),
        (None, Some(_)) => Err(StorageError::NotFound { id: id.to_string() }),
        (Some(found), Some(expected_version)) if found.version != expected_version => {
            Err(StorageError::VersionConflict {
                id: id.to_string(),
                expected_version,
                found_version: found.version,
            })
        }
        (Some(_), Some(_)) => Ok(()),
    }
}
