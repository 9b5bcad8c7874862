//! CLI integration tests for the `metaledger` binary.
//!
//! Every test runs against its own temporary store passed with `--store`,
//! and checks exit codes, stdout and stderr.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

/// Helper: a `metaledger` command bound to `store`, isolated from the
/// caller's environment. Logging is off so stderr holds only the error.
fn metaledger(store: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("metaledger");
    cmd.env_remove("METALEDGER_HOME")
        .env_remove("METALEDGER_RPC_ENDPOINT")
        .env("METALEDGER_LOG", "off")
        .arg("--store")
        .arg(store);
    cmd
}

/// Run with `--output json`, require `code`, and parse stdout.
fn json_out(store: &Path, args: &[&str], code: i32) -> Value {
    let out = metaledger(store)
        .args(args)
        .args(["--output", "json"])
        .assert()
        .code(code)
        .get_output()
        .stdout
        .clone();
    serde_json::from_slice(&out).unwrap_or_else(|e| {
        panic!(
            "stdout of {:?} is not JSON ({}): {}",
            args,
            e,
            String::from_utf8_lossy(&out)
        )
    })
}

/// Run with `--output json`, require `code`, and parse the stderr error.
fn json_err(store: &Path, args: &[&str], code: i32) -> Value {
    let err = metaledger(store)
        .args(args)
        .args(["--output", "json"])
        .assert()
        .code(code)
        .get_output()
        .stderr
        .clone();
    serde_json::from_slice(&err).unwrap_or_else(|e| {
        panic!(
            "stderr of {:?} is not JSON ({}): {}",
            args,
            e,
            String::from_utf8_lossy(&err)
        )
    })
}

fn create_agreement(store: &Path, app: &str) -> String {
    let rec = json_out(
        store,
        &[
            "agreement",
            "create",
            "--app",
            app,
            "--rpc",
            "http://127.0.0.1:1",
        ],
        0,
    );
    rec["id"].as_str().unwrap().to_string()
}

/// A port nothing listens on.
fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

/// Answer one HTTP request with `body`, then close.
fn serve_once(body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    std::thread::spawn(move || {
        let (mut conn, _) = listener.accept().unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = conn.read(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf).to_string();
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .find_map(|l| {
                        let (name, value) = l.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buf.len() >= header_end + 4 + content_length {
                    break;
                }
            }
        }
        let response = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        conn.write_all(response.as_bytes()).unwrap();
    });
    format!("http://{}", addr)
}

// ──────────────────────────────────────────────
// 1. Help and version
// ──────────────────────────────────────────────

#[test]
fn help_exits_0_with_description() {
    let dir = TempDir::new().unwrap();
    metaledger(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Deployment-record ledger"));
}

#[test]
fn version_exits_0() {
    let dir = TempDir::new().unwrap();
    metaledger(dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("metaledger"));
}

#[test]
fn unknown_kind_is_a_usage_error() {
    let dir = TempDir::new().unwrap();
    metaledger(dir.path())
        .args(["list", "ledgers"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("unknown record kind"));
}

// ──────────────────────────────────────────────
// 2. Agreement lifecycle
// ──────────────────────────────────────────────

#[test]
fn agreement_lifecycle_end_to_end() {
    let dir = TempDir::new().unwrap();
    let store = dir.path();

    let created = json_out(
        store,
        &[
            "agreement",
            "create",
            "--app",
            "app-1",
            "--type",
            "standard",
            "--meta",
            "region=eu",
        ],
        0,
    );
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["kind"], "agreement");
    assert_eq!(created["status"], "created");
    assert_eq!(created["blockchain_tx"], Value::Null);
    assert_eq!(created["meta"]["region"], "eu");
    assert_eq!(created["rpc_endpoint"], "http://159.203.17.36:8545");

    let deployed = json_out(store, &["agreement", "deploy", &id], 0);
    assert_eq!(deployed["status"], "deployed");
    let tx = deployed["blockchain_tx"].as_str().unwrap();
    assert!(tx.starts_with("0x"));
    assert_eq!(tx.len(), 66);

    let verified = json_out(store, &["agreement", "verify", &id], 0);
    assert_eq!(verified["status"], "verified");
    assert_eq!(verified["verified"], true);
    assert_eq!(verified["blockchain_tx"], deployed["blockchain_tx"]);

    let err = json_err(store, &["agreement", "deploy", &id], 3);
    assert_eq!(err["error"]["kind"], "invalid_transition");
    assert!(err["error"]["message"].as_str().unwrap().contains("verified"));

    let history = json_out(store, &["history", &id], 0);
    let ops: Vec<&str> = history
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["operation"].as_str().unwrap())
        .collect();
    assert_eq!(ops, ["create", "deploy", "verify"]);

    metaledger(store).arg("audit").assert().success();
}

#[test]
fn record_is_persisted_as_flat_json() {
    let dir = TempDir::new().unwrap();
    let id = create_agreement(dir.path(), "app-1");
    let path = dir.path().join("agreement").join(format!("{}.json", id));
    let doc: Value = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(doc["id"], id.as_str());
    assert_eq!(doc["kind"], "agreement");
    assert_eq!(doc["version"], 0);
    assert!(doc.get("body").is_none());
}

#[test]
fn quiet_text_prints_only_the_id() {
    let dir = TempDir::new().unwrap();
    let id = create_agreement(dir.path(), "app-1");
    metaledger(dir.path())
        .args(["status", &id, "--quiet"])
        .assert()
        .success()
        .stdout(predicate::str::diff(format!("{}\n", id)));
}

#[test]
fn text_status_shows_header_and_body() {
    let dir = TempDir::new().unwrap();
    let id = create_agreement(dir.path(), "app-1");
    metaledger(dir.path())
        .args(["status", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("id:"))
        .stdout(predicate::str::contains("agreement_type:"))
        .stdout(predicate::str::contains("blockchain_tx:"));
}

// ──────────────────────────────────────────────
// 3. Exit codes
// ──────────────────────────────────────────────

#[test]
fn unknown_id_exits_2() {
    let dir = TempDir::new().unwrap();
    let err = json_err(dir.path(), &["status", "does-not-exist"], 2);
    assert_eq!(err["error"]["kind"], "not_found");

    metaledger(dir.path())
        .args(["agreement", "deploy", "does-not-exist"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("record not found"));
}

#[test]
fn quiet_suppresses_error_text() {
    let dir = TempDir::new().unwrap();
    metaledger(dir.path())
        .args(["history", "nope", "--quiet"])
        .assert()
        .code(2)
        .stderr(predicate::str::is_empty());
}

#[test]
fn verify_before_deploy_exits_3() {
    let dir = TempDir::new().unwrap();
    let id = create_agreement(dir.path(), "app-1");
    metaledger(dir.path())
        .args(["agreement", "verify", &id])
        .assert()
        .code(3);
    let rec = json_out(dir.path(), &["status", &id], 0);
    assert_eq!(rec["status"], "created");
    assert_eq!(rec["version"], 0);
}

#[test]
fn mainnet_deployment_without_wallet_exits_4_and_stores_nothing() {
    let dir = TempDir::new().unwrap();
    let app_dir = TempDir::new().unwrap();
    let err = json_err(
        dir.path(),
        &[
            "deployment",
            "create",
            "--app",
            "app-1",
            "--path",
            app_dir.path().to_str().unwrap(),
            "--network",
            "mainnet",
        ],
        4,
    );
    assert_eq!(err["error"]["kind"], "validation");
    assert!(err["error"]["message"].as_str().unwrap().contains("wallet"));

    let list = json_out(dir.path(), &["list", "deployment"], 0);
    assert_eq!(list.as_array().unwrap().len(), 0);
}

#[test]
fn deployment_with_missing_path_is_stored_failed_and_exits_4() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("no-such-app");
    let rec = json_out(
        dir.path(),
        &[
            "deployment",
            "create",
            "--app",
            "app-1",
            "--path",
            missing.to_str().unwrap(),
            "--algorithm",
            "fedavg",
            "--algorithm",
            "fedavg",
        ],
        4,
    );
    assert_eq!(rec["status"], "failed");
    assert!(rec["failure_reason"].as_str().unwrap().contains("no-such-app"));
    assert_eq!(rec["algorithms"], serde_json::json!(["fedavg"]));
    assert_eq!(rec["ipfs_gateway"], "http://159.203.17.36:8080/ipfs");

    let id = rec["id"].as_str().unwrap();
    metaledger(dir.path())
        .args(["deployment", "activate", id])
        .assert()
        .code(3);
}

#[test]
fn duplicate_cluster_nodes_fail_configure_with_4() {
    let dir = TempDir::new().unwrap();
    let rec = json_out(
        dir.path(),
        &[
            "cluster",
            "create",
            "--app",
            "app-1",
            "--node",
            "node1:6001:validator",
            "--node",
            "node1:6002:sync",
        ],
        0,
    );
    let id = rec["id"].as_str().unwrap();
    let err = json_err(dir.path(), &["cluster", "configure", id], 4);
    assert!(err["error"]["message"].as_str().unwrap().contains("node1"));
    assert_eq!(json_out(dir.path(), &["status", id], 0)["status"], "created");
}

// ──────────────────────────────────────────────
// 4. Deployments, clusters, proofs
// ──────────────────────────────────────────────

#[test]
fn deployment_and_cluster_lifecycles() {
    let dir = TempDir::new().unwrap();
    let app_dir = TempDir::new().unwrap();
    let dep = json_out(
        dir.path(),
        &[
            "deployment",
            "create",
            "--app",
            "app-1",
            "--path",
            app_dir.path().to_str().unwrap(),
            "--network",
            "mainnet",
            "--wallet",
            "wallet-7",
        ],
        0,
    );
    let dep_id = dep["id"].as_str().unwrap();
    assert_eq!(dep["ipfs_gateway"], "https://ipfs.metanode.network");
    assert_eq!(
        json_out(dir.path(), &["deployment", "activate", dep_id], 0)["status"],
        "active"
    );
    assert_eq!(
        json_out(dir.path(), &["deployment", "archive", dep_id], 0)["status"],
        "archived"
    );

    let cluster = json_out(
        dir.path(),
        &["cluster", "create", "--app", "app-1", "--node", "n1:6001:validator"],
        0,
    );
    let cluster_id = cluster["id"].as_str().unwrap();
    assert_eq!(
        json_out(dir.path(), &["cluster", "configure", cluster_id], 0)["status"],
        "configured"
    );
    assert_eq!(
        json_out(dir.path(), &["cluster", "archive", cluster_id], 0)["status"],
        "archived"
    );
}

#[test]
fn proof_over_agreement_verifies_until_subject_changes() {
    let dir = TempDir::new().unwrap();
    let agreement = create_agreement(dir.path(), "app-9");

    let proof = json_out(dir.path(), &["proof", "create", &agreement], 0);
    assert_eq!(proof["owner_app_id"], "app-9");
    assert_eq!(proof["provider"], "local");
    let proof_id = proof["id"].as_str().unwrap().to_string();

    // A second proof, taken before the subject moves on.
    let stale = json_out(dir.path(), &["proof", "create", &agreement], 0);
    let stale_id = stale["id"].as_str().unwrap().to_string();

    let verified = json_out(dir.path(), &["proof", "verify", &proof_id], 0);
    assert_eq!(verified["status"], "verified");
    assert!(verified["verified_at"].is_string());

    json_out(dir.path(), &["agreement", "deploy", &agreement], 0);
    let err = json_err(dir.path(), &["proof", "verify", &stale_id], 4);
    assert_eq!(err["error"]["kind"], "validation");
}

#[test]
fn proof_of_missing_subject_exits_2() {
    let dir = TempDir::new().unwrap();
    metaledger(dir.path())
        .args(["proof", "create", "ghost"])
        .assert()
        .code(2);
}

// ──────────────────────────────────────────────
// 5. Listing
// ──────────────────────────────────────────────

#[test]
fn list_is_creation_ordered_and_filters_by_app() {
    let dir = TempDir::new().unwrap();
    let a = create_agreement(dir.path(), "app-1");
    let b = create_agreement(dir.path(), "app-2");
    let c = create_agreement(dir.path(), "app-1");

    let all = json_out(dir.path(), &["list", "agreements"], 0);
    let ids: Vec<&str> = all
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, [a.as_str(), b.as_str(), c.as_str()]);

    let mine = json_out(dir.path(), &["list", "agreement", "--app", "app-1"], 0);
    let ids: Vec<&str> = mine
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, [a.as_str(), c.as_str()]);

    metaledger(dir.path())
        .args(["list", "cluster"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no records"));
}

// ──────────────────────────────────────────────
// 6. Audit
// ──────────────────────────────────────────────

#[test]
fn audit_reports_out_of_band_edit() {
    let dir = TempDir::new().unwrap();
    let id = create_agreement(dir.path(), "app-1");

    let clean = json_out(dir.path(), &["audit"], 0);
    assert_eq!(clean["clean"], true);
    assert_eq!(clean["records_checked"], 1);
    assert_eq!(clean["files_validated"], 1);

    let path = dir.path().join("agreement").join(format!("{}.json", id));
    let mut doc: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    doc["status"] = Value::from("verified");
    doc["extra"] = Value::from(1);
    std::fs::write(&path, serde_json::to_string_pretty(&doc).unwrap()).unwrap();

    let dirty = json_out(dir.path(), &["audit"], 1);
    assert_eq!(dirty["clean"], false);
    let problems: Vec<&str> = dirty["findings"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["problem"].as_str().unwrap())
        .collect();
    assert!(problems.iter().any(|p| p.contains("journal ends at 'created'")));
    assert!(problems.iter().any(|p| p.starts_with("schema:")));
}

#[test]
fn audit_detects_tampered_journal() {
    let dir = TempDir::new().unwrap();
    let id = create_agreement(dir.path(), "app-1");
    json_out(dir.path(), &["agreement", "deploy", &id], 0);

    let journal = dir.path().join("events.jsonl");
    let text = std::fs::read_to_string(&journal).unwrap();
    std::fs::write(&journal, text.replacen("\"deploy\"", "\"verify\"", 1)).unwrap();

    let report = json_out(dir.path(), &["audit"], 1);
    assert_eq!(report["chain_break"]["seq"], 2);
}

// ──────────────────────────────────────────────
// 7. Probe and connect
// ──────────────────────────────────────────────

#[test]
fn probe_of_closed_port_exits_6_with_report() {
    let dir = TempDir::new().unwrap();
    let url = closed_port_url();
    let err = json_err(dir.path(), &["probe", &url, "--no-retry"], 6);
    assert_eq!(err["error"]["kind"], "connectivity");
    assert_eq!(err["error"]["probe"]["endpoint"], url.as_str());
    assert_eq!(err["error"]["probe"]["reachable"], false);
    assert!(err["error"]["probe"]["error"].is_string());
    // probe never opens the store
    assert!(!dir.path().join("agreement").exists());
}

#[test]
fn probe_reports_block_height() {
    let dir = TempDir::new().unwrap();
    let url = serve_once(r#"{"jsonrpc":"2.0","id":1,"result":"0x1b4"}"#);
    let report = json_out(dir.path(), &["probe", &url, "--no-retry"], 0);
    assert_eq!(report["reachable"], true);
    assert_eq!(report["height"], 436);
}

#[test]
fn connect_to_unreachable_endpoint_leaves_agreement_unchanged() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("metaledger.toml"),
        "[probe]\ntimeout_secs = 2\nmax_attempts = 2\ninitial_backoff_ms = 10\n",
    )
    .unwrap();
    let id = create_agreement(dir.path(), "app-1");
    json_out(dir.path(), &["agreement", "deploy", &id], 0);

    let url = closed_port_url();
    let err = json_err(dir.path(), &["agreement", "connect", &id, "--rpc", &url], 6);
    assert_eq!(err["error"]["probe"]["reachable"], false);

    let rec = json_out(dir.path(), &["status", &id], 0);
    assert_eq!(rec["testnet_connected"], false);
    assert_eq!(rec["rpc_endpoint"], "http://127.0.0.1:1");
}

#[test]
fn connect_refuses_undeployed_agreement_without_waiting_on_endpoint() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("metaledger.toml"),
        "[probe]\ntimeout_secs = 2\nmax_attempts = 4\ninitial_backoff_ms = 20000\n",
    )
    .unwrap();
    let id = create_agreement(dir.path(), "app-1");

    let url = closed_port_url();
    let started = std::time::Instant::now();
    let err = json_err(dir.path(), &["agreement", "connect", &id, "--rpc", &url], 3);
    assert!(started.elapsed() < std::time::Duration::from_secs(10));
    assert_eq!(err["error"]["kind"], "invalid_transition");

    let rec = json_out(dir.path(), &["status", &id], 0);
    assert_eq!(rec["status"], "created");
    assert_eq!(rec["testnet_connected"], false);
}

#[test]
fn connect_to_reachable_endpoint_marks_agreement() {
    let dir = TempDir::new().unwrap();
    let id = create_agreement(dir.path(), "app-1");
    json_out(dir.path(), &["agreement", "deploy", &id], 0);

    let url = serve_once(r#"{"jsonrpc":"2.0","id":1,"result":"0x10"}"#);
    let rec = json_out(dir.path(), &["agreement", "connect", &id, "--rpc", &url], 0);
    assert_eq!(rec["testnet_connected"], true);
    assert_eq!(rec["rpc_endpoint"], url.as_str());
    assert_eq!(rec["status"], "deployed");
}

// ──────────────────────────────────────────────
// 8. Configuration
// ──────────────────────────────────────────────

#[test]
fn config_shows_defaults() {
    let dir = TempDir::new().unwrap();
    let cfg = json_out(dir.path(), &["config"], 0);
    assert_eq!(cfg["config_loaded"], false);
    assert_eq!(cfg["probe"]["timeout_secs"], 10);
    assert_eq!(cfg["probe"]["max_attempts"], 3);
    assert_eq!(cfg["probe"]["initial_backoff_ms"], 500);
    assert_eq!(
        cfg["network"]["testnet"]["rpc_endpoint"],
        "http://159.203.17.36:8545"
    );
    assert_eq!(
        cfg["network"]["mainnet"]["rpc_endpoint"],
        "https://mainnet.metanode.network:8545"
    );
}

#[test]
fn config_file_and_env_override_defaults() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("metaledger.toml"),
        "[probe]\nmax_attempts = 7\n",
    )
    .unwrap();
    let out = metaledger(dir.path())
        .env("METALEDGER_RPC_ENDPOINT", "http://10.1.2.3:8545")
        .args(["config", "--output", "json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let cfg: Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(cfg["config_loaded"], true);
    assert_eq!(cfg["probe"]["max_attempts"], 7);
    assert_eq!(cfg["probe"]["timeout_secs"], 10);
    assert_eq!(cfg["network"]["testnet"]["rpc_endpoint"], "http://10.1.2.3:8545");

    metaledger(dir.path())
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("max_attempts = 7"));
}

#[test]
fn malformed_config_exits_1() {
    let dir = TempDir::new().unwrap();
    let cfg = dir.path().join("broken.toml");
    std::fs::write(&cfg, "[probe\n").unwrap();
    let err = json_err(
        dir.path(),
        &["status", "x", "--config", cfg.to_str().unwrap()],
        1,
    );
    assert_eq!(err["error"]["kind"], "config");
}
