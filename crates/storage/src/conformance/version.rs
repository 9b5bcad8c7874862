use std::future::Future;

use super::{make_agreement, with_agreement_status, TestResult};
use crate::record::AgreementStatus;
use crate::{RecordStore, StorageError};

pub(super) async fn run_version_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "version",
        "version_starts_at_zero",
        version_starts_at_zero(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "version_increments_sequentially",
        version_increments_sequentially(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "update_with_wrong_version_returns_conflict",
        update_with_wrong_version_returns_conflict(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "conflict_does_not_change_record",
        conflict_does_not_change_record(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "stale_version_after_intervening_write",
        stale_version_after_intervening_write(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "update_missing_returns_not_found",
        update_missing_returns_not_found(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "update_stamps_updated_at_not_created_at",
        update_stamps_updated_at_not_created_at(factory).await,
    ));

    results
}

async fn version_starts_at_zero<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut record = make_agreement("agr-1", "app-1");
    record.version = 42;
    let stored = s.create(record).await.map_err(|e| e.to_string())?;
    if stored.version != 0 {
        return Err(format!("expected version 0, got {}", stored.version));
    }
    Ok(())
}

async fn version_increments_sequentially<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut current = s
        .create(make_agreement("agr-1", "app-1"))
        .await
        .map_err(|e| e.to_string())?;
    for expected in 1..=5u64 {
        let v = current.version;
        current = s.update(current, v).await.map_err(|e| e.to_string())?;
        if current.version != expected {
            return Err(format!("expected version {}, got {}", expected, current.version));
        }
    }
    let fetched = s.get("agr-1").await.map_err(|e| e.to_string())?;
    if fetched.version != 5 {
        return Err(format!("stored version {} after 5 updates", fetched.version));
    }
    Ok(())
}

async fn update_with_wrong_version_returns_conflict<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let stored = s
        .create(make_agreement("agr-1", "app-1"))
        .await
        .map_err(|e| e.to_string())?;
    match s.update(stored, 3).await {
        Err(StorageError::VersionConflict {
            id,
            expected_version,
            found_version,
        }) => {
            if id != "agr-1" || expected_version != 3 || found_version != 0 {
                return Err(format!(
                    "conflict fields wrong: id={}, expected={}, found={}",
                    id, expected_version, found_version
                ));
            }
            Ok(())
        }
        other => Err(format!("expected VersionConflict, got {:?}", other)),
    }
}

async fn conflict_does_not_change_record<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let stored = s
        .create(make_agreement("agr-1", "app-1"))
        .await
        .map_err(|e| e.to_string())?;
    let changed = with_agreement_status(stored.clone(), AgreementStatus::Archived);
    let _ = s.update(changed, 9).await;
    let fetched = s.get("agr-1").await.map_err(|e| e.to_string())?;
    if fetched != stored {
        return Err(format!("record changed after conflict: {:?}", fetched));
    }
    Ok(())
}

/// Two writers read version 0; the first update wins, the second is stale.
async fn stale_version_after_intervening_write<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let stored = s
        .create(make_agreement("agr-1", "app-1"))
        .await
        .map_err(|e| e.to_string())?;
    let writer_a = with_agreement_status(stored.clone(), AgreementStatus::Archived);
    let writer_b = stored;

    s.update(writer_a, 0).await.map_err(|e| e.to_string())?;
    match s.update(writer_b, 0).await {
        Err(StorageError::VersionConflict { found_version: 1, .. }) => {}
        other => return Err(format!("expected VersionConflict at 1, got {:?}", other)),
    }
    let fetched = s.get("agr-1").await.map_err(|e| e.to_string())?;
    if fetched.status() != "archived" {
        return Err(format!("winner's write lost, status {}", fetched.status()));
    }
    Ok(())
}

async fn update_missing_returns_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.update(make_agreement("ghost", "app-1"), 0).await {
        Err(StorageError::NotFound { id }) if id == "ghost" => Ok(()),
        other => Err(format!("expected NotFound, got {:?}", other)),
    }
}

async fn update_stamps_updated_at_not_created_at<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut record = make_agreement("agr-1", "app-1");
    record.created_at = "2020-01-01T00:00:00Z".to_string();
    record.updated_at = "2020-01-01T00:00:00Z".to_string();
    let stored = s.create(record).await.map_err(|e| e.to_string())?;
    if stored.created_at != "2020-01-01T00:00:00Z" {
        return Err(format!("create rewrote created_at to {}", stored.created_at));
    }
    if stored.updated_at == "2020-01-01T00:00:00Z" {
        return Err("create did not stamp updated_at".to_string());
    }

    let mut tampered = stored.clone();
    tampered.created_at = "2030-01-01T00:00:00Z".to_string();
    let updated = s.update(tampered, 0).await.map_err(|e| e.to_string())?;
    if updated.created_at != "2020-01-01T00:00:00Z" {
        return Err(format!("update changed created_at to {}", updated.created_at));
    }
    Ok(())
}
