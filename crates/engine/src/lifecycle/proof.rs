use metaledger_storage::id::new_record_id;
use metaledger_storage::{
    timestamp_now, ProofStatus, Record, RecordBody, RecordKind, RecordStore, VerificationProof,
};

use super::{invalid, required, wrong_kind, Details, Lifecycle};
use crate::error::LedgerError;

fn proof_mut<'a>(record: &'a mut Record) -> Result<&'a mut VerificationProof, LedgerError> {
    let err = wrong_kind(record, RecordKind::VerificationProof);
    match &mut record.body {
        RecordBody::VerificationProof(p) => Ok(p),
        _ => Err(err),
    }
}

impl<S: RecordStore> Lifecycle<S> {
    /// Record a proof over the current content of `subject_id`.
    ///
    /// The subject must exist and be an agreement or a deployment. The proof
    /// belongs to the subject's owner and pins the subject's content digest.
    pub async fn create_proof(&self, provider: &str, subject_id: &str) -> Result<Record, LedgerError> {
        let provider = required("provider", provider)?;
        let subject = self.store.get(subject_id).await?;
        if !matches!(subject.kind(), RecordKind::Agreement | RecordKind::Deployment) {
            return Err(LedgerError::Validation(format!(
                "proof subject {} is a {}; only agreements and deployments can be proven",
                subject.id,
                subject.kind()
            )));
        }

        let proof_hash = subject.content_digest();
        let record = Record::new(
            new_record_id(),
            subject.owner_app_id.clone(),
            RecordBody::VerificationProof(VerificationProof {
                status: ProofStatus::Created,
                provider,
                subject_record_id: subject.id.clone(),
                proof_hash: proof_hash.clone(),
                verified_at: None,
            }),
        );
        let mut details = Details::new();
        details.insert("subject_record_id".to_string(), subject.id);
        details.insert("proof_hash".to_string(), proof_hash);
        self.insert(record, details).await
    }

    /// `created → verified`, if the subject still hashes to `proof_hash`.
    ///
    /// A subject that changed since the proof was taken is a validation
    /// failure and the proof stays `created`. The subject is re-read on
    /// every compare-and-swap pass.
    pub async fn verify_proof(&self, id: &str) -> Result<Record, LedgerError> {
        self.transition_with(id, "verify", |mut record| async move {
            let subject_id = match &record.body {
                RecordBody::VerificationProof(p) => p.subject_record_id.clone(),
                _ => return Err(wrong_kind(&record, RecordKind::VerificationProof)),
            };
            if proof_mut(&mut record)?.status != ProofStatus::Created {
                return Err(invalid(&record, "verify"));
            }
            let digest = self.store.get(&subject_id).await?.content_digest();

            let proof = proof_mut(&mut record)?;
            if proof.proof_hash != digest {
                return Err(LedgerError::Validation(format!(
                    "subject {} no longer matches proof hash {}",
                    proof.subject_record_id, proof.proof_hash
                )));
            }
            proof.status = ProofStatus::Verified;
            proof.verified_at = Some(timestamp_now());

            let mut details = Details::new();
            details.insert("proof_hash".to_string(), digest);
            Ok((record, details))
        })
        .await
    }
}
