//! Lifecycle engine.
//!
//! The only component that changes a record's `status`. Each transition:
//!
//! 1. reads the record,
//! 2. validates the edge and its inputs against that snapshot,
//! 3. commits the new state and its lifecycle event together, with
//!    compare-and-swap on the version it read.
//!
//! A failed commit stores neither the record nor the event, so the same
//! call can be retried. If another writer got in between steps 1 and 3 the
//! store reports a version conflict and the engine starts again from step
//! 1. The second pass sees the winner's status, so a lost race comes back
//! as `InvalidTransition` instead of a second write.

mod agreement;
mod audit;
mod cluster;
mod deployment;
mod proof;

use std::collections::BTreeMap;
use std::future::Future;

use metaledger_storage::{LifecycleEvent, Record, RecordKind, RecordStore, StorageError};

use crate::error::LedgerError;

pub use agreement::AgreementParams;
pub use audit::{AuditFinding, AuditReport};
pub use cluster::ClusterParams;
pub use deployment::DeploymentParams;

/// Compare-and-swap passes before a transition gives up with `Conflict`.
const MAX_CAS_ATTEMPTS: usize = 8;

/// Event details attached by a transition.
pub(crate) type Details = BTreeMap<String, String>;

/// Record lifecycle operations over a store.
pub struct Lifecycle<S: RecordStore> {
    store: S,
}

impl<S: RecordStore> Lifecycle<S> {
    pub fn new(store: S) -> Self {
        Lifecycle { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // ── Queries ──────────────────────────────────────────────────────────────

    /// Current state of any record.
    pub async fn get_status(&self, id: &str) -> Result<Record, LedgerError> {
        Ok(self.store.get(id).await?)
    }

    pub async fn list(
        &self,
        kind: RecordKind,
        owner_app_id: Option<&str>,
    ) -> Result<Vec<Record>, LedgerError> {
        Ok(self.store.list(kind, owner_app_id).await?)
    }

    /// Journal events of one record, oldest first.
    pub async fn history(&self, id: &str) -> Result<Vec<LifecycleEvent>, LedgerError> {
        if !self.store.exists(id).await? {
            return Err(LedgerError::NotFound { id: id.to_string() });
        }
        Ok(self.store.events(Some(id)).await?)
    }

    // ── Write paths shared by every kind ─────────────────────────────────────

    /// Persist a brand-new record and journal its creation.
    pub(crate) async fn insert(
        &self,
        record: Record,
        details: Details,
    ) -> Result<Record, LedgerError> {
        check_invariants(&record)?;
        let mut event = LifecycleEvent::new(&record.id, record.kind(), "create", None, record.status());
        event.details = details;
        let (stored, _) = self.store.commit(record, None, event).await?;
        tracing::info!(
            id = %stored.id,
            kind = %stored.kind(),
            owner = %stored.owner_app_id,
            "record created"
        );
        Ok(stored)
    }

    /// Apply `apply` to the current state of `id` and write the result.
    ///
    /// `apply` validates against the snapshot it is given and mutates it in
    /// place, returning the details to journal. It may run more than once
    /// if the write races another writer, and must not have side effects.
    pub(crate) async fn transition<F>(
        &self,
        id: &str,
        operation: &str,
        mut apply: F,
    ) -> Result<Record, LedgerError>
    where
        F: FnMut(&mut Record) -> Result<Details, LedgerError>,
    {
        self.transition_with(id, operation, |mut record| {
            let applied = apply(&mut record).map(|details| (record, details));
            std::future::ready(applied)
        })
        .await
    }

    /// `transition` for checks that need to read the store on every pass.
    ///
    /// `apply` gets its own copy of the snapshot and returns the record to
    /// write along with the event details.
    pub(crate) async fn transition_with<F, Fut>(
        &self,
        id: &str,
        operation: &str,
        mut apply: F,
    ) -> Result<Record, LedgerError>
    where
        F: FnMut(Record) -> Fut,
        Fut: Future<Output = Result<(Record, Details), LedgerError>>,
    {
        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let current = self.store.get(id).await?;
            let (next, details) = apply(current.clone()).await?;
            check_invariants(&next)?;

            let mut event = LifecycleEvent::new(
                &next.id,
                next.kind(),
                operation,
                Some(current.status()),
                next.status(),
            );
            event.details = details;
            match self.store.commit(next, Some(current.version), event).await {
                Ok((stored, _)) => {
                    tracing::info!(
                        id = %stored.id,
                        kind = %stored.kind(),
                        operation,
                        from = current.status(),
                        to = stored.status(),
                        "transition applied"
                    );
                    return Ok(stored);
                }
                Err(StorageError::VersionConflict { found_version, .. }) => {
                    tracing::debug!(
                        id,
                        operation,
                        attempt,
                        read_version = current.version,
                        found_version,
                        "lost compare-and-swap race, re-reading"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(LedgerError::Conflict(format!(
            "{} on {} kept losing concurrent writes after {} attempts",
            operation, id, MAX_CAS_ATTEMPTS
        )))
    }
}

/// `InvalidTransition` for `operation` against `record` as it stands.
pub(crate) fn invalid(record: &Record, operation: &str) -> LedgerError {
    LedgerError::InvalidTransition {
        id: record.id.clone(),
        kind: record.kind(),
        operation: operation.to_string(),
        status: record.status().to_string(),
    }
}

/// `Validation` error for an operation applied to the wrong record kind.
pub(crate) fn wrong_kind(record: &Record, expected: RecordKind) -> LedgerError {
    LedgerError::Validation(format!(
        "record {} is a {}, not a {}",
        record.id,
        record.kind(),
        expected
    ))
}

fn check_invariants(record: &Record) -> Result<(), LedgerError> {
    record
        .check_invariants()
        .map_err(|problems| LedgerError::Validation(problems.join("; ")))
}

/// Trimmed, non-empty value of a required text field.
pub(crate) fn required(field: &str, value: &str) -> Result<String, LedgerError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(LedgerError::Validation(format!("{} must not be empty", field)))
    } else {
        Ok(trimmed.to_string())
    }
}
