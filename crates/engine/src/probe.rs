//! External connectivity probe.
//!
//! The probe answers "is this JSON-RPC endpoint reachable, and at what block
//! height" without trusting the answer for anything else. It never returns
//! an error and never touches the record store: an unreachable endpoint is
//! a report with `reachable = false` and `error` populated, which the
//! lifecycle engine then takes as an input.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Default bound on a single probe.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of one reachability check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeReport {
    pub endpoint: String,
    pub reachable: bool,
    /// Latest block number reported by the endpoint.
    pub height: Option<u64>,
    pub latency_ms: Option<u64>,
    pub error: Option<String>,
}

impl ProbeReport {
    pub fn reachable(endpoint: &str, height: u64, latency_ms: u64) -> Self {
        ProbeReport {
            endpoint: endpoint.to_string(),
            reachable: true,
            height: Some(height),
            latency_ms: Some(latency_ms),
            error: None,
        }
    }

    pub fn unreachable(endpoint: &str, error: impl Into<String>, latency_ms: Option<u64>) -> Self {
        ProbeReport {
            endpoint: endpoint.to_string(),
            reachable: false,
            height: None,
            latency_ms,
            error: Some(error.into()),
        }
    }
}

/// A replaceable reachability check.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    /// Check `endpoint`. Must return within the probe's timeout and must
    /// not panic; failures are reported, not raised.
    async fn check(&self, endpoint: &str) -> ProbeReport;
}

// ── JSON-RPC probe ───────────────────────────────────────────────────────────

#[derive(Serialize)]
struct RpcRequest {
    jsonrpc: &'static str,
    method: &'static str,
    params: [u8; 0],
    id: u32,
}

#[derive(Deserialize)]
struct RpcResponse {
    result: Option<serde_json::Value>,
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

/// Probe that sends `eth_blockNumber` to an Ethereum-style JSON-RPC endpoint.
#[derive(Debug, Clone)]
pub struct JsonRpcProbe {
    timeout: Duration,
}

impl JsonRpcProbe {
    pub fn new(timeout: Duration) -> Self {
        JsonRpcProbe { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for JsonRpcProbe {
    fn default() -> Self {
        JsonRpcProbe::new(DEFAULT_TIMEOUT)
    }
}

#[async_trait]
impl ConnectivityProbe for JsonRpcProbe {
    async fn check(&self, endpoint: &str) -> ProbeReport {
        if endpoint.trim().is_empty() {
            return ProbeReport::unreachable(endpoint, "no endpoint configured", None);
        }

        let started = Instant::now();
        let timeout = self.timeout;
        let target = endpoint.to_string();

        // ureq is synchronous, so wrap in spawn_blocking
        let call = tokio::task::spawn_blocking(move || request_block_number(&target, timeout));
        let outcome = tokio::time::timeout(timeout, call).await;
        let latency_ms = elapsed_ms(started);

        let report = match outcome {
            Err(_) => ProbeReport::unreachable(
                endpoint,
                format!("timed out after {} ms", timeout.as_millis()),
                Some(latency_ms),
            ),
            Ok(Err(join)) => ProbeReport::unreachable(
                endpoint,
                format!("probe task failed: {}", join),
                Some(latency_ms),
            ),
            Ok(Ok(Err(e))) => ProbeReport::unreachable(endpoint, e, Some(latency_ms)),
            Ok(Ok(Ok(height))) => ProbeReport::reachable(endpoint, height, latency_ms),
        };

        if report.reachable {
            tracing::debug!(endpoint, height = ?report.height, latency_ms, "endpoint reachable");
        } else {
            tracing::debug!(endpoint, error = ?report.error, latency_ms, "endpoint unreachable");
        }
        report
    }
}

/// One blocking `eth_blockNumber` round trip.
fn request_block_number(endpoint: &str, timeout: Duration) -> Result<u64, String> {
    let config = ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build();
    let agent = ureq::Agent::new_with_config(config);

    let request = RpcRequest {
        jsonrpc: "2.0",
        method: "eth_blockNumber",
        params: [],
        id: 1,
    };
    let response = agent
        .post(endpoint)
        .header("content-type", "application/json")
        .send_json(&request)
        .map_err(|e| format!("request failed: {}", e))?;

    let body: RpcResponse = response
        .into_body()
        .read_json()
        .map_err(|e| format!("invalid JSON-RPC response: {}", e))?;

    if let Some(err) = body.error {
        return Err(format!("JSON-RPC error {}: {}", err.code, err.message));
    }
    match body.result {
        Some(serde_json::Value::String(hex)) => parse_quantity(&hex),
        Some(other) => Err(format!("unexpected eth_blockNumber result: {}", other)),
        None => Err("JSON-RPC response has neither result nor error".to_string()),
    }
}

/// Parse an Ethereum hex quantity such as `0x1b4`.
pub fn parse_quantity(hex: &str) -> Result<u64, String> {
    let digits = hex
        .strip_prefix("0x")
        .or_else(|| hex.strip_prefix("0X"))
        .ok_or_else(|| format!("quantity '{}' is missing the 0x prefix", hex))?;
    if digits.is_empty() {
        return Err(format!("quantity '{}' has no digits", hex));
    }
    u64::from_str_radix(digits, 16).map_err(|e| format!("invalid quantity '{}': {}", hex, e))
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

// ── Static probe ─────────────────────────────────────────────────────────────

/// Probe returning preset reports, for tests and offline use.
///
/// Reports are handed out in order; the last one repeats once the queue is
/// down to a single entry. The endpoint of each returned report is set to
/// the endpoint asked for.
pub struct StaticProbe {
    reports: Mutex<VecDeque<ProbeReport>>,
    calls: AtomicUsize,
}

impl StaticProbe {
    pub fn sequence(reports: Vec<ProbeReport>) -> Self {
        StaticProbe {
            reports: Mutex::new(reports.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn reachable(height: u64) -> Self {
        Self::sequence(vec![ProbeReport::reachable("", height, 1)])
    }

    pub fn unreachable(error: &str) -> Self {
        Self::sequence(vec![ProbeReport::unreachable("", error, None)])
    }

    /// Number of `check` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConnectivityProbe for StaticProbe {
    async fn check(&self, endpoint: &str) -> ProbeReport {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = match self.reports.lock() {
            Ok(mut queue) => {
                if queue.len() > 1 {
                    queue.pop_front()
                } else {
                    queue.front().cloned()
                }
            }
            Err(_) => None,
        };
        let mut report = next
            .unwrap_or_else(|| ProbeReport::unreachable(endpoint, "static probe has no reports", None));
        report.endpoint = endpoint.to_string();
        report
    }
}

// ── Retry ────────────────────────────────────────────────────────────────────

/// Bounded exponential backoff for connectivity checks.
///
/// Connectivity failures are the only errors retried automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first; 0 is treated as 1.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles after each retry.
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        RetryPolicy {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
        }
    }
}

/// Check `endpoint` until it is reachable or the policy's attempts run out.
///
/// Returns the first reachable report, or the last unreachable one.
pub async fn check_with_retry<P>(probe: &P, endpoint: &str, policy: RetryPolicy) -> ProbeReport
where
    P: ConnectivityProbe + ?Sized,
{
    let attempts = policy.max_attempts.max(1);
    let mut backoff = policy.initial_backoff;
    let mut attempt = 1;
    loop {
        let report = probe.check(endpoint).await;
        if report.reachable || attempt >= attempts {
            return report;
        }
        tracing::warn!(
            endpoint,
            attempt,
            max_attempts = attempts,
            backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
            error = report.error.as_deref().unwrap_or(""),
            "endpoint unreachable, retrying"
        );
        tokio::time::sleep(backoff).await;
        backoff = backoff.saturating_mul(2);
        attempt += 1;
    }
}
