//! Conformance test suite for `RecordStore` implementations.
//!
//! This module provides a backend-agnostic test suite that any `RecordStore`
//! implementation can run to verify correctness. The suite covers:
//!
//! - **CRUD**: create, get, exists, upsert, duplicate detection
//! - **Listing**: kind and owner filters, insertion order
//! - **Versioning / CAS**: write stamping and compare-and-swap conflicts
//! - **Commit**: record and journal event stored together or not at all
//! - **Journal**: sequence numbering, hash chaining, per-record filtering
//! - **Concurrency**: racing writers on one id, independent ids
//! - **Round-trip**: every record kind reads back equal to what was written
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory function that
//! creates a fresh, empty storage instance for each test:
//!
//! ```ignore
//! use metaledger_storage::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn file_store_conformance() {
//!     let report = run_conformance_suite(|| async {
//!         FileStore::open(fresh_dir()).await.unwrap()
//!     }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod commit;
mod concurrent;
mod crud;
mod journal;
mod listing;
mod roundtrip;
mod version;

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;

use crate::record::{
    Agreement, AgreementStatus, ClusterConfig, ClusterNode, ClusterStatus, DeploymentConfig,
    DeploymentStatus, Network, NodeRole, ProofStatus, Record, RecordBody, VerificationProof,
};
use crate::RecordStore;

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "crud", "version", "journal").
    pub category: String,
    /// Test name (e.g. "create_then_get_returns_record").
    pub name: String,
    /// Whether the test passed.
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn pass(category: &str, name: &str) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: true,
            message: None,
        }
    }

    fn fail(category: &str, name: &str, msg: String) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: false,
            message: Some(msg),
        }
    }

    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self::pass(category, name),
            Err(msg) => Self::fail(category, name, msg),
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a storage backend.
///
/// The `factory` function is called once per test to create a fresh, empty
/// storage instance, ensuring test isolation.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: RecordStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(crud::run_crud_tests(&factory).await);
    results.extend(listing::run_listing_tests(&factory).await);
    results.extend(version::run_version_tests(&factory).await);
    results.extend(commit::run_commit_tests(&factory).await);
    results.extend(journal::run_journal_tests(&factory).await);
    results.extend(concurrent::run_concurrent_tests(&factory).await);
    results.extend(roundtrip::run_roundtrip_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers: record constructors with sensible defaults ──────────────────────

fn make_agreement(id: &str, app: &str) -> Record {
    let mut meta = BTreeMap::new();
    meta.insert("region".to_string(), "eu-west".to_string());
    Record::new(
        id,
        app,
        RecordBody::Agreement(Agreement {
            status: AgreementStatus::Created,
            agreement_type: "standard".to_string(),
            network: "testnet".to_string(),
            rpc_endpoint: "http://127.0.0.1:8545".to_string(),
            blockchain_tx: None,
            verified: false,
            testnet_connected: false,
            meta,
        }),
    )
}

fn make_deployment(id: &str, app: &str) -> Record {
    Record::new(
        id,
        app,
        RecordBody::Deployment(DeploymentConfig {
            status: DeploymentStatus::Created,
            app_path: "/srv/apps/demo".to_string(),
            network: Network::Mainnet,
            wallet_ref: Some("wallet-7".to_string()),
            algorithms: vec![
                "federated-average".to_string(),
                "secure-aggregation".to_string(),
            ],
            ipfs_gateway: "http://127.0.0.1:8080/ipfs".to_string(),
            failure_reason: None,
        }),
    )
}

fn make_cluster(id: &str, app: &str) -> Record {
    Record::new(
        id,
        app,
        RecordBody::ClusterConfig(ClusterConfig {
            status: ClusterStatus::Created,
            nodes: vec![
                ClusterNode {
                    node_id: "node1".to_string(),
                    port: 6001,
                    role: NodeRole::Validator,
                },
                ClusterNode {
                    node_id: "node2".to_string(),
                    port: 6002,
                    role: NodeRole::LightClient,
                },
                ClusterNode {
                    node_id: "node3".to_string(),
                    port: 6003,
                    role: NodeRole::Sync,
                },
            ],
            rpc_endpoint: "http://127.0.0.1:8545".to_string(),
        }),
    )
}

fn make_proof(id: &str, app: &str, subject: &str) -> Record {
    Record::new(
        id,
        app,
        RecordBody::VerificationProof(VerificationProof {
            status: ProofStatus::Verified,
            provider: "local".to_string(),
            subject_record_id: subject.to_string(),
            proof_hash: "ab".repeat(32),
            verified_at: Some("2025-01-01T00:00:00Z".to_string()),
        }),
    )
}

/// Replace the agreement status on a record built by [`make_agreement`].
fn with_agreement_status(mut record: Record, status: AgreementStatus) -> Record {
    if let RecordBody::Agreement(a) = &mut record.body {
        a.status = status;
    }
    record
}
