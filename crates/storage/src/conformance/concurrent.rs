use std::future::Future;
use std::sync::Arc;

use super::{make_agreement, with_agreement_status, TestResult};
use crate::event::{verify_chain, LifecycleEvent};
use crate::record::{AgreementStatus, RecordKind};
use crate::{RecordStore, StorageError};

/// Number of concurrent tasks to spawn in each test.
const N: usize = 10;

pub(super) async fn run_concurrent_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_updates_exactly_one_wins",
        concurrent_updates_exactly_one_wins(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_create_exactly_one_wins",
        concurrent_create_exactly_one_wins(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_updates_different_records_all_succeed",
        concurrent_updates_different_records_all_succeed(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_appends_keep_chain_intact",
        concurrent_appends_keep_chain_intact(factory).await,
    ));

    results
}

// ── Concurrent update: exactly one wins ─────────────────────────────────────

/// N tasks each attempt to update the same record from version 0. Exactly
/// one succeeds; the rest must get VersionConflict.
async fn concurrent_updates_exactly_one_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    let base = storage
        .create(make_agreement("agr-1", "app-1"))
        .await
        .map_err(|e| format!("create: {e}"))?;

    let mut handles = Vec::new();
    for i in 0..N {
        let s = storage.clone();
        let mut record = with_agreement_status(base.clone(), AgreementStatus::Archived);
        record.owner_app_id = format!("writer-{i}");
        handles.push(tokio::spawn(async move {
            match s.update(record, 0).await {
                Ok(_) => Ok(true),
                Err(StorageError::VersionConflict { .. }) => Ok(false),
                Err(e) => Err(e),
            }
        }));
    }

    let mut winners = 0usize;
    let mut losers = 0usize;
    for handle in handles {
        let won = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: StorageError| format!("storage error: {e}"))?;
        if won {
            winners += 1;
        } else {
            losers += 1;
        }
    }

    if winners != 1 {
        return Err(format!("expected exactly 1 winner, got {winners}"));
    }
    if losers != N - 1 {
        return Err(format!("expected {} losers, got {losers}", N - 1));
    }

    let record = storage
        .get("agr-1")
        .await
        .map_err(|e| format!("get: {e}"))?;
    if record.version != 1 {
        return Err(format!(
            "expected version 1 after single winning update, got {}",
            record.version
        ));
    }
    Ok(())
}

// ── Concurrent create: exactly one wins ─────────────────────────────────────

async fn concurrent_create_exactly_one_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);

    let mut handles = Vec::new();
    for i in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            match s.create(make_agreement("agr-1", &format!("app-{i}"))).await {
                Ok(_) => Ok(true),
                Err(StorageError::AlreadyExists { .. }) => Ok(false),
                Err(e) => Err(e),
            }
        }));
    }

    let mut winners = 0usize;
    for handle in handles {
        let won = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: StorageError| format!("storage error: {e}"))?;
        if won {
            winners += 1;
        }
    }
    if winners != 1 {
        return Err(format!("expected exactly 1 winner, got {winners}"));
    }

    let listed = storage
        .list(RecordKind::Agreement, None)
        .await
        .map_err(|e| format!("list: {e}"))?;
    if listed.len() != 1 {
        return Err(format!("expected one listed record, got {}", listed.len()));
    }
    Ok(())
}

// ── Concurrent updates to different records: all succeed ────────────────────

async fn concurrent_updates_different_records_all_succeed<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    let mut bases = Vec::new();
    for i in 0..N {
        bases.push(
            storage
                .create(make_agreement(&format!("agr-{i}"), "app-1"))
                .await
                .map_err(|e| format!("create agr-{i}: {e}"))?,
        );
    }

    let mut handles = Vec::new();
    for base in bases {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            let record = with_agreement_status(base, AgreementStatus::Archived);
            s.update(record, 0).await.map(|_| ())
        }));
    }

    for (i, handle) in handles.into_iter().enumerate() {
        handle
            .await
            .map_err(|e| format!("task {i} panic: {e}"))?
            .map_err(|e| format!("task {i} failed: {e}"))?;
    }

    for i in 0..N {
        let record = storage
            .get(&format!("agr-{i}"))
            .await
            .map_err(|e| format!("get agr-{i}: {e}"))?;
        if record.status() != "archived" || record.version != 1 {
            return Err(format!(
                "agr-{i}: expected archived at version 1, got {} at {}",
                record.status(),
                record.version
            ));
        }
    }
    Ok(())
}

// ── Concurrent journal appends ──────────────────────────────────────────────

async fn concurrent_appends_keep_chain_intact<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);

    let mut handles = Vec::new();
    for i in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            s.append_event(LifecycleEvent::new(
                &format!("agr-{i}"),
                RecordKind::Agreement,
                "create",
                None,
                "created",
            ))
            .await
        }));
    }
    for handle in handles {
        handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e| format!("append: {e}"))?;
    }

    let events = storage
        .events(None)
        .await
        .map_err(|e| format!("events: {e}"))?;
    if events.len() != N {
        return Err(format!("expected {N} events, got {}", events.len()));
    }
    verify_chain(&events).map_err(|e| e.to_string())
}
