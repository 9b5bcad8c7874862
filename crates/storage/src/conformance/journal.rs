use std::future::Future;

use super::TestResult;
use crate::event::{verify_chain, LifecycleEvent, GENESIS_HASH};
use crate::record::RecordKind;
use crate::RecordStore;

pub(super) async fn run_journal_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "journal",
        "empty_journal",
        empty_journal(factory).await,
    ));
    results.push(TestResult::from_result(
        "journal",
        "first_event_chains_from_genesis",
        first_event_chains_from_genesis(factory).await,
    ));
    results.push(TestResult::from_result(
        "journal",
        "events_are_sequenced_and_chained",
        events_are_sequenced_and_chained(factory).await,
    ));
    results.push(TestResult::from_result(
        "journal",
        "events_filter_by_record",
        events_filter_by_record(factory).await,
    ));

    results
}

fn event(record_id: &str, op: &str, from: Option<&str>, to: &str) -> LifecycleEvent {
    LifecycleEvent::new(record_id, RecordKind::Agreement, op, from, to)
}

async fn empty_journal<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let events = s.events(None).await.map_err(|e| e.to_string())?;
    if !events.is_empty() {
        return Err(format!("expected empty journal, got {} events", events.len()));
    }
    Ok(())
}

async fn first_event_chains_from_genesis<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let sealed = s
        .append_event(event("agr-1", "create", None, "created"))
        .await
        .map_err(|e| e.to_string())?;
    if sealed.seq != 1 {
        return Err(format!("expected seq 1, got {}", sealed.seq));
    }
    if sealed.prev_hash != GENESIS_HASH {
        return Err(format!("expected genesis prev_hash, got {}", sealed.prev_hash));
    }
    if sealed.hash != sealed.compute_hash() {
        return Err("returned event hash does not match content".to_string());
    }
    Ok(())
}

async fn events_are_sequenced_and_chained<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.append_event(event("agr-1", "create", None, "created"))
        .await
        .map_err(|e| e.to_string())?;
    s.append_event(event("agr-1", "deploy", Some("created"), "deployed").with_detail("blockchain_tx", "0xfeed"))
        .await
        .map_err(|e| e.to_string())?;
    s.append_event(event("agr-1", "verify", Some("deployed"), "verified"))
        .await
        .map_err(|e| e.to_string())?;

    let all = s.events(None).await.map_err(|e| e.to_string())?;
    if all.len() != 3 {
        return Err(format!("expected 3 events, got {}", all.len()));
    }
    verify_chain(&all).map_err(|e| e.to_string())?;
    if all[1].details.get("blockchain_tx").map(String::as_str) != Some("0xfeed") {
        return Err("event details not preserved".to_string());
    }
    Ok(())
}

async fn events_filter_by_record<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.append_event(event("agr-1", "create", None, "created"))
        .await
        .map_err(|e| e.to_string())?;
    s.append_event(event("agr-2", "create", None, "created"))
        .await
        .map_err(|e| e.to_string())?;
    s.append_event(event("agr-1", "deploy", Some("created"), "deployed"))
        .await
        .map_err(|e| e.to_string())?;

    let mine = s.events(Some("agr-1")).await.map_err(|e| e.to_string())?;
    let seqs: Vec<u64> = mine.iter().map(|e| e.seq).collect();
    if seqs != [1, 3] {
        return Err(format!("expected seqs [1, 3] for agr-1, got {:?}", seqs));
    }
    Ok(())
}
