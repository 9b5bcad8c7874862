use std::collections::{HashMap, HashSet};

use metaledger_storage::{verify_chain, ChainBreak, RecordKind, RecordStore};
use serde::Serialize;

use super::Lifecycle;
use crate::error::LedgerError;

/// One problem found by [`Lifecycle::audit`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditFinding {
    pub record_id: String,
    pub problem: String,
}

#[derive(Debug, Clone, Default)]
pub struct AuditReport {
    pub records_checked: usize,
    pub events_checked: usize,
    /// First point where the journal's hash chain fails to verify.
    pub chain_break: Option<ChainBreak>,
    pub findings: Vec<AuditFinding>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.chain_break.is_none() && self.findings.is_empty()
    }
}

impl<S: RecordStore> Lifecycle<S> {
    /// Check the journal's hash chain and every stored record.
    ///
    /// Per record: the data-model invariants hold, the last journal event
    /// for it ends in its current status, and a proof's subject exists.
    /// Journal events naming unknown records are reported too.
    pub async fn audit(&self) -> Result<AuditReport, LedgerError> {
        let events = self.store.events(None).await?;
        let mut report = AuditReport {
            events_checked: events.len(),
            chain_break: verify_chain(&events).err(),
            ..AuditReport::default()
        };

        let mut last_status: HashMap<&str, &str> = HashMap::new();
        for event in &events {
            last_status.insert(event.record_id.as_str(), event.to_status.as_str());
        }

        let mut known: HashSet<String> = HashSet::new();
        for kind in RecordKind::ALL {
            for record in self.store.list(kind, None).await? {
                report.records_checked += 1;

                if let Err(problems) = record.check_invariants() {
                    for problem in problems {
                        report.findings.push(AuditFinding {
                            record_id: record.id.clone(),
                            problem,
                        });
                    }
                }

                match last_status.get(record.id.as_str()) {
                    None => report.findings.push(AuditFinding {
                        record_id: record.id.clone(),
                        problem: "no journal events".to_string(),
                    }),
                    Some(status) if *status != record.status() => {
                        report.findings.push(AuditFinding {
                            record_id: record.id.clone(),
                            problem: format!(
                                "status is '{}' but the journal ends at '{}'",
                                record.status(),
                                status
                            ),
                        })
                    }
                    Some(_) => {}
                }

                if let Some(proof) = record.as_proof() {
                    match self.store.get(&proof.subject_record_id).await {
                        Ok(subject)
                            if matches!(
                                subject.kind(),
                                RecordKind::Agreement | RecordKind::Deployment
                            ) => {}
                        Ok(subject) => report.findings.push(AuditFinding {
                            record_id: record.id.clone(),
                            problem: format!(
                                "proof subject {} is a {}",
                                subject.id,
                                subject.kind()
                            ),
                        }),
                        Err(e) => report.findings.push(AuditFinding {
                            record_id: record.id.clone(),
                            problem: format!("proof subject unreadable: {}", e),
                        }),
                    }
                }

                known.insert(record.id);
            }
        }

        let mut orphans: Vec<&str> = last_status
            .keys()
            .copied()
            .filter(|id| !known.contains(*id))
            .collect();
        orphans.sort_unstable();
        for id in orphans {
            report.findings.push(AuditFinding {
                record_id: id.to_string(),
                problem: "journal events for a record that is not stored".to_string(),
            });
        }

        if report.is_clean() {
            tracing::info!(
                records = report.records_checked,
                events = report.events_checked,
                "audit clean"
            );
        } else {
            tracing::warn!(
                findings = report.findings.len(),
                chain_intact = report.chain_break.is_none(),
                "audit found problems"
            );
        }
        Ok(report)
    }
}
