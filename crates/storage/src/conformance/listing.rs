use std::future::Future;

use super::{make_agreement, make_cluster, make_deployment, TestResult};
use crate::record::RecordKind;
use crate::RecordStore;

pub(super) async fn run_listing_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "listing",
        "list_empty_store",
        list_empty_store(factory).await,
    ));
    results.push(TestResult::from_result(
        "listing",
        "list_preserves_insertion_order",
        list_preserves_insertion_order(factory).await,
    ));
    results.push(TestResult::from_result(
        "listing",
        "list_filters_by_kind",
        list_filters_by_kind(factory).await,
    ));
    results.push(TestResult::from_result(
        "listing",
        "list_filters_by_owner",
        list_filters_by_owner(factory).await,
    ));
    results.push(TestResult::from_result(
        "listing",
        "update_keeps_list_position",
        update_keeps_list_position(factory).await,
    ));

    results
}

fn ids(records: &[crate::Record]) -> Vec<&str> {
    records.iter().map(|r| r.id.as_str()).collect()
}

async fn list_empty_store<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    for kind in RecordKind::ALL {
        let listed = s.list(kind, None).await.map_err(|e| e.to_string())?;
        if !listed.is_empty() {
            return Err(format!("expected no {} records, got {}", kind, listed.len()));
        }
    }
    Ok(())
}

/// Ids are deliberately not in lexical order so a backend that sorts by
/// id instead of insertion fails.
async fn list_preserves_insertion_order<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    for id in ["zeta", "alpha", "mid", "beta"] {
        s.create(make_agreement(id, "app-1"))
            .await
            .map_err(|e| e.to_string())?;
    }
    let listed = s
        .list(RecordKind::Agreement, None)
        .await
        .map_err(|e| e.to_string())?;
    if ids(&listed) != ["zeta", "alpha", "mid", "beta"] {
        return Err(format!("unexpected order {:?}", ids(&listed)));
    }
    Ok(())
}

async fn list_filters_by_kind<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.create(make_agreement("a-1", "app-1"))
        .await
        .map_err(|e| e.to_string())?;
    s.create(make_deployment("d-1", "app-1"))
        .await
        .map_err(|e| e.to_string())?;
    s.create(make_cluster("c-1", "app-1"))
        .await
        .map_err(|e| e.to_string())?;
    s.create(make_deployment("d-2", "app-1"))
        .await
        .map_err(|e| e.to_string())?;

    let deployments = s
        .list(RecordKind::Deployment, None)
        .await
        .map_err(|e| e.to_string())?;
    if ids(&deployments) != ["d-1", "d-2"] {
        return Err(format!("expected [d-1, d-2], got {:?}", ids(&deployments)));
    }
    let proofs = s
        .list(RecordKind::VerificationProof, None)
        .await
        .map_err(|e| e.to_string())?;
    if !proofs.is_empty() {
        return Err(format!("expected no proofs, got {:?}", ids(&proofs)));
    }
    Ok(())
}

async fn list_filters_by_owner<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.create(make_agreement("a-1", "app-1"))
        .await
        .map_err(|e| e.to_string())?;
    s.create(make_agreement("a-2", "app-2"))
        .await
        .map_err(|e| e.to_string())?;
    s.create(make_agreement("a-3", "app-1"))
        .await
        .map_err(|e| e.to_string())?;

    let app1 = s
        .list(RecordKind::Agreement, Some("app-1"))
        .await
        .map_err(|e| e.to_string())?;
    if ids(&app1) != ["a-1", "a-3"] {
        return Err(format!("expected [a-1, a-3], got {:?}", ids(&app1)));
    }
    let nobody = s
        .list(RecordKind::Agreement, Some("app-9"))
        .await
        .map_err(|e| e.to_string())?;
    if !nobody.is_empty() {
        return Err(format!("expected no records for app-9, got {:?}", ids(&nobody)));
    }
    Ok(())
}

async fn update_keeps_list_position<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let first = s
        .create(make_agreement("a-1", "app-1"))
        .await
        .map_err(|e| e.to_string())?;
    s.create(make_agreement("a-2", "app-1"))
        .await
        .map_err(|e| e.to_string())?;
    s.update(first, 0).await.map_err(|e| e.to_string())?;

    let listed = s
        .list(RecordKind::Agreement, None)
        .await
        .map_err(|e| e.to_string())?;
    if ids(&listed) != ["a-1", "a-2"] {
        return Err(format!("update moved the record: {:?}", ids(&listed)));
    }
    Ok(())
}
