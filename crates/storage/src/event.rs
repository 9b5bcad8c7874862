use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::record::{timestamp_now, RecordKind};

/// `prev_hash` of the first event in a journal.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// One entry of the append-only lifecycle journal.
///
/// Events are chained: `hash` covers the event content and `prev_hash`, so
/// editing or dropping an earlier line breaks every later hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    /// Position in the journal, starting at 1. Assigned by the store.
    pub seq: u64,
    pub record_id: String,
    pub kind: RecordKind,
    /// Engine operation that produced the event (e.g. `deploy`).
    pub operation: String,
    /// `None` for the creation event.
    pub from_status: Option<String>,
    pub to_status: String,
    /// ISO 8601 / RFC 3339 timestamp string.
    pub at: String,
    #[serde(default)]
    pub details: BTreeMap<String, String>,
    pub prev_hash: String,
    pub hash: String,
}

impl LifecycleEvent {
    /// An unsealed event; the store fills `seq`, `prev_hash` and `hash`.
    pub fn new(
        record_id: &str,
        kind: RecordKind,
        operation: &str,
        from_status: Option<&str>,
        to_status: &str,
    ) -> Self {
        LifecycleEvent {
            seq: 0,
            record_id: record_id.to_string(),
            kind,
            operation: operation.to_string(),
            from_status: from_status.map(str::to_string),
            to_status: to_status.to_string(),
            at: timestamp_now(),
            details: BTreeMap::new(),
            prev_hash: String::new(),
            hash: String::new(),
        }
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<String>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    /// Assign the journal position and chain hash.
    pub fn seal(mut self, seq: u64, prev_hash: &str) -> Self {
        self.seq = seq;
        self.prev_hash = prev_hash.to_string();
        self.hash = self.compute_hash();
        self
    }

    /// SHA-256 over the event with an empty `hash` field.
    pub fn compute_hash(&self) -> String {
        let mut unhashed = self.clone();
        unhashed.hash = String::new();
        let canonical = serde_json::to_string(&unhashed).unwrap_or_default();
        format!("{:x}", Sha256::digest(canonical.as_bytes()))
    }
}

/// Where a journal stopped verifying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainBreak {
    pub seq: u64,
    pub reason: String,
}

impl std::fmt::Display for ChainBreak {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "journal broken at seq {}: {}", self.seq, self.reason)
    }
}

/// Verify sequence numbering and the hash chain of a full journal.
pub fn verify_chain(events: &[LifecycleEvent]) -> Result<(), ChainBreak> {
    let mut prev = GENESIS_HASH.to_string();
    for (i, event) in events.iter().enumerate() {
        let expected_seq = i as u64 + 1;
        if event.seq != expected_seq {
            return Err(ChainBreak {
                seq: event.seq,
                reason: format!("expected seq {}", expected_seq),
            });
        }
        if event.prev_hash != prev {
            return Err(ChainBreak {
                seq: event.seq,
                reason: "prev_hash does not match preceding event".to_string(),
            });
        }
        if event.compute_hash() != event.hash {
            return Err(ChainBreak {
                seq: event.seq,
                reason: "hash does not match event content".to_string(),
            });
        }
        prev = event.hash.clone();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(n: usize) -> Vec<LifecycleEvent> {
        let mut out: Vec<LifecycleEvent> = Vec::new();
        for i in 0..n {
            let prev = out.last().map(|e| e.hash.clone()).unwrap_or(GENESIS_HASH.to_string());
            out.push(
                LifecycleEvent::new(&format!("r{i}"), RecordKind::Agreement, "create", None, "created")
                    .seal(i as u64 + 1, &prev),
            );
        }
        out
    }

    #[test]
    fn intact_chain_verifies() {
        assert_eq!(verify_chain(&chain(5)), Ok(()));
        assert_eq!(verify_chain(&[]), Ok(()));
    }

    #[test]
    fn edited_event_breaks_chain() {
        let mut events = chain(4);
        events[1].to_status = "verified".to_string();
        let err = verify_chain(&events).unwrap_err();
        assert_eq!(err.seq, 2);
    }

    #[test]
    fn dropped_event_breaks_chain() {
        let mut events = chain(4);
        events.remove(2);
        let err = verify_chain(&events).unwrap_err();
        assert_eq!(err.seq, 4);
    }

    #[test]
    fn seal_is_deterministic_for_same_content() {
        let e = LifecycleEvent::new("r", RecordKind::Deployment, "activate", Some("created"), "active");
        let a = e.clone().seal(1, GENESIS_HASH);
        let b = e.seal(1, GENESIS_HASH);
        assert_eq!(a.hash, b.hash);
        assert_eq!(a.hash.len(), 64);
    }
}
