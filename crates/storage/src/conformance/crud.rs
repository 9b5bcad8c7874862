use std::future::Future;

use super::{
    make_agreement, make_cluster, make_deployment, make_proof, with_agreement_status, TestResult,
};
use crate::record::AgreementStatus;
use crate::{RecordStore, StorageError};

pub(super) async fn run_crud_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "crud",
        "create_then_get_returns_record",
        create_then_get_returns_record(factory).await,
    ));
    results.push(TestResult::from_result(
        "crud",
        "create_duplicate_returns_already_exists",
        create_duplicate_returns_already_exists(factory).await,
    ));
    results.push(TestResult::from_result(
        "crud",
        "duplicate_create_does_not_overwrite",
        duplicate_create_does_not_overwrite(factory).await,
    ));
    results.push(TestResult::from_result(
        "crud",
        "get_missing_returns_not_found",
        get_missing_returns_not_found(factory).await,
    ));
    results.push(TestResult::from_result(
        "crud",
        "exists_reflects_store_contents",
        exists_reflects_store_contents(factory).await,
    ));
    results.push(TestResult::from_result(
        "crud",
        "upsert_inserts_new_record",
        upsert_inserts_new_record(factory).await,
    ));
    results.push(TestResult::from_result(
        "crud",
        "upsert_preserves_created_at",
        upsert_preserves_created_at(factory).await,
    ));
    results.push(TestResult::from_result(
        "crud",
        "records_of_different_kinds_coexist",
        records_of_different_kinds_coexist(factory).await,
    ));
    results.push(TestResult::from_result(
        "crud",
        "write_refuses_to_change_kind",
        write_refuses_to_change_kind(factory).await,
    ));

    results
}

async fn create_then_get_returns_record<S, F, Fut>(factory: &F) -> Result<(), String>
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
    let fetched = s.get("agr-1").await.map_err(|e| e.to_string())?;
    if fetched != stored {
        return Err(format!("fetched {:?} differs from stored {:?}", fetched, stored));
    }
    if fetched.status() != "created" {
        return Err(format!("expected status created, got {}", fetched.status()));
    }
    Ok(())
}

async fn create_duplicate_returns_already_exists<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.create(make_agreement("agr-1", "app-1"))
        .await
        .map_err(|e| e.to_string())?;
    match s.create(make_agreement("agr-1", "app-1")).await {
        Err(StorageError::AlreadyExists { id }) if id == "agr-1" => Ok(()),
        other => Err(format!("expected AlreadyExists(agr-1), got {:?}", other)),
    }
}

async fn duplicate_create_does_not_overwrite<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.create(make_agreement("agr-1", "app-1"))
        .await
        .map_err(|e| e.to_string())?;
    let other = with_agreement_status(make_agreement("agr-1", "app-2"), AgreementStatus::Archived);
    let _ = s.create(other).await;
    let fetched = s.get("agr-1").await.map_err(|e| e.to_string())?;
    if fetched.owner_app_id != "app-1" || fetched.status() != "created" {
        return Err(format!(
            "duplicate create overwrote the record: owner {}, status {}",
            fetched.owner_app_id,
            fetched.status()
        ));
    }
    Ok(())
}

async fn get_missing_returns_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.get("does-not-exist").await {
        Err(StorageError::NotFound { id }) if id == "does-not-exist" => Ok(()),
        other => Err(format!("expected NotFound, got {:?}", other)),
    }
}

async fn exists_reflects_store_contents<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    if s.exists("dep-1").await.map_err(|e| e.to_string())? {
        return Err("exists true on empty store".to_string());
    }
    s.create(make_deployment("dep-1", "app-1"))
        .await
        .map_err(|e| e.to_string())?;
    if !s.exists("dep-1").await.map_err(|e| e.to_string())? {
        return Err("exists false after create".to_string());
    }
    Ok(())
}

async fn upsert_inserts_new_record<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let stored = s
        .upsert(make_cluster("cl-1", "app-1"))
        .await
        .map_err(|e| e.to_string())?;
    if stored.version != 0 {
        return Err(format!("expected version 0 on insert, got {}", stored.version));
    }
    s.get("cl-1").await.map_err(|e| e.to_string())?;
    Ok(())
}

async fn upsert_preserves_created_at<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let first = s
        .create(make_agreement("agr-1", "app-1"))
        .await
        .map_err(|e| e.to_string())?;
    let mut replacement = with_agreement_status(make_agreement("agr-1", "app-1"), AgreementStatus::Archived);
    replacement.created_at = "2099-01-01T00:00:00Z".to_string();
    let second = s.upsert(replacement).await.map_err(|e| e.to_string())?;
    if second.created_at != first.created_at {
        return Err(format!(
            "created_at changed from {} to {}",
            first.created_at, second.created_at
        ));
    }
    if second.version != first.version + 1 {
        return Err(format!("expected version {}, got {}", first.version + 1, second.version));
    }
    if second.status() != "archived" {
        return Err(format!("expected archived, got {}", second.status()));
    }
    Ok(())
}

async fn records_of_different_kinds_coexist<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.create(make_agreement("r-1", "app-1"))
        .await
        .map_err(|e| e.to_string())?;
    s.create(make_deployment("r-2", "app-1"))
        .await
        .map_err(|e| e.to_string())?;
    s.create(make_cluster("r-3", "app-1"))
        .await
        .map_err(|e| e.to_string())?;
    let kinds: Vec<String> = vec![
        s.get("r-1").await.map_err(|e| e.to_string())?.kind().to_string(),
        s.get("r-2").await.map_err(|e| e.to_string())?.kind().to_string(),
        s.get("r-3").await.map_err(|e| e.to_string())?.kind().to_string(),
    ];
    if kinds != ["agreement", "deployment", "cluster_config"] {
        return Err(format!("unexpected kinds {:?}", kinds));
    }
    Ok(())
}

async fn write_refuses_to_change_kind<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let original = s
        .create(make_agreement("r-1", "app-1"))
        .await
        .map_err(|e| e.to_string())?;
    match s.upsert(make_proof("r-1", "app-1", "dep-9")).await {
        Err(StorageError::KindMismatch { .. }) => {}
        other => return Err(format!("upsert: expected KindMismatch, got {:?}", other)),
    }
    match s.update(make_deployment("r-1", "app-1"), 0).await {
        Err(StorageError::KindMismatch { .. }) => {}
        other => return Err(format!("update: expected KindMismatch, got {:?}", other)),
    }
    let stored = s.get("r-1").await.map_err(|e| e.to_string())?;
    if stored != original {
        return Err(format!("record changed to {:?}", stored));
    }
    Ok(())
}
