use std::future::Future;

use super::{make_agreement, make_cluster, make_deployment, make_proof, TestResult};
use crate::record::{AgreementStatus, Record, RecordBody};
use crate::RecordStore;

pub(super) async fn run_roundtrip_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "roundtrip",
        "every_kind_reads_back_equal",
        every_kind_reads_back_equal(factory).await,
    ));
    results.push(TestResult::from_result(
        "roundtrip",
        "optional_and_map_fields_survive",
        optional_and_map_fields_survive(factory).await,
    ));

    results
}

async fn every_kind_reads_back_equal<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let records = vec![
        make_agreement("rt-a", "app-1"),
        make_deployment("rt-d", "app-1"),
        make_cluster("rt-c", "app-1"),
        make_proof("rt-p", "app-1", "rt-a"),
    ];
    for record in records {
        let stored = s.create(record).await.map_err(|e| e.to_string())?;
        let fetched = s.get(&stored.id).await.map_err(|e| e.to_string())?;
        if fetched != stored {
            return Err(format!(
                "{} {} did not round-trip:\n stored:  {:?}\n fetched: {:?}",
                stored.kind(),
                stored.id,
                stored,
                fetched
            ));
        }
    }
    Ok(())
}

async fn optional_and_map_fields_survive<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut record: Record = make_agreement("rt-a", "app-1");
    if let RecordBody::Agreement(a) = &mut record.body {
        a.status = AgreementStatus::Deployed;
        a.blockchain_tx = Some(format!("0x{}", "9f".repeat(32)));
        a.testnet_connected = true;
        a.meta.insert("note".to_string(), "quoted \"value\" with ünïcode".to_string());
        a.meta.insert("empty".to_string(), String::new());
    }
    let stored = s.create(record).await.map_err(|e| e.to_string())?;
    let fetched = s.get("rt-a").await.map_err(|e| e.to_string())?;
    if fetched != stored {
        return Err(format!("fields drifted: {:?} vs {:?}", fetched, stored));
    }
    Ok(())
}
