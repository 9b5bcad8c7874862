use std::future::Future;

use super::{make_agreement, with_agreement_status, TestResult};
use crate::event::{verify_chain, LifecycleEvent};
use crate::record::{AgreementStatus, RecordKind};
use crate::{RecordStore, StorageError};

pub(super) async fn run_commit_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "commit",
        "commit_stores_record_and_event",
        commit_stores_record_and_event(factory).await,
    ));
    results.push(TestResult::from_result(
        "commit",
        "duplicate_create_commits_nothing",
        duplicate_create_commits_nothing(factory).await,
    ));
    results.push(TestResult::from_result(
        "commit",
        "stale_version_commits_nothing",
        stale_version_commits_nothing(factory).await,
    ));
    results.push(TestResult::from_result(
        "commit",
        "commits_and_appends_share_one_chain",
        commits_and_appends_share_one_chain(factory).await,
    ));

    results
}

fn event(record_id: &str, op: &str, from: Option<&str>, to: &str) -> LifecycleEvent {
    LifecycleEvent::new(record_id, RecordKind::Agreement, op, from, to)
}

async fn commit_stores_record_and_event<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let (created, first) = s
        .commit(
            make_agreement("agr-1", "app-1"),
            None,
            event("agr-1", "create", None, "created"),
        )
        .await
        .map_err(|e| e.to_string())?;
    if created.version != 0 || first.seq != 1 {
        return Err(format!(
            "expected version 0 / seq 1, got {} / {}",
            created.version, first.seq
        ));
    }

    let next = with_agreement_status(created, AgreementStatus::Deployed);
    let (stored, second) = s
        .commit(next, Some(0), event("agr-1", "deploy", Some("created"), "deployed"))
        .await
        .map_err(|e| e.to_string())?;
    if stored.version != 1 || second.seq != 2 {
        return Err(format!(
            "expected version 1 / seq 2, got {} / {}",
            stored.version, second.seq
        ));
    }
    let read = s.get("agr-1").await.map_err(|e| e.to_string())?;
    if read != stored {
        return Err("get does not return the committed record".to_string());
    }
    let events = s.events(Some("agr-1")).await.map_err(|e| e.to_string())?;
    if events != vec![first, second] {
        return Err(format!("journal holds {:?}", events));
    }
    Ok(())
}

async fn duplicate_create_commits_nothing<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.create(make_agreement("agr-1", "app-1"))
        .await
        .map_err(|e| e.to_string())?;
    match s
        .commit(
            make_agreement("agr-1", "app-2"),
            None,
            event("agr-1", "create", None, "created"),
        )
        .await
    {
        Err(StorageError::AlreadyExists { .. }) => {}
        other => return Err(format!("expected AlreadyExists, got {:?}", other)),
    }
    let events = s.events(None).await.map_err(|e| e.to_string())?;
    if !events.is_empty() {
        return Err(format!("rejected commit left {} events", events.len()));
    }
    Ok(())
}

async fn stale_version_commits_nothing<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let r = s
        .create(make_agreement("agr-1", "app-1"))
        .await
        .map_err(|e| e.to_string())?;
    let current = s.update(r.clone(), 0).await.map_err(|e| e.to_string())?;

    let next = with_agreement_status(r, AgreementStatus::Deployed);
    match s
        .commit(next, Some(0), event("agr-1", "deploy", Some("created"), "deployed"))
        .await
    {
        Err(StorageError::VersionConflict { found_version: 1, .. }) => {}
        other => return Err(format!("expected VersionConflict, got {:?}", other)),
    }
    if s.get("agr-1").await.map_err(|e| e.to_string())? != current {
        return Err("conflicting commit changed the record".to_string());
    }
    if !s.events(None).await.map_err(|e| e.to_string())?.is_empty() {
        return Err("conflicting commit appended an event".to_string());
    }
    Ok(())
}

async fn commits_and_appends_share_one_chain<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.append_event(event("agr-0", "create", None, "created"))
        .await
        .map_err(|e| e.to_string())?;
    let (_, sealed) = s
        .commit(
            make_agreement("agr-1", "app-1"),
            None,
            event("agr-1", "create", None, "created"),
        )
        .await
        .map_err(|e| e.to_string())?;
    if sealed.seq != 2 {
        return Err(format!("expected seq 2, got {}", sealed.seq));
    }
    let all = s.events(None).await.map_err(|e| e.to_string())?;
    verify_chain(&all).map_err(|b| format!("chain broken at {}: {}", b.seq, b.reason))
}
