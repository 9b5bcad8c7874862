use std::collections::BTreeMap;

use metaledger_storage::id::{new_record_id, new_tx_token};
use metaledger_storage::{Agreement, AgreementStatus, Record, RecordBody, RecordKind, RecordStore};

use super::{invalid, required, wrong_kind, Details, Lifecycle};
use crate::error::LedgerError;
use crate::probe::ProbeReport;

/// Inputs of `create_agreement`.
#[derive(Debug, Clone, Default)]
pub struct AgreementParams {
    pub owner_app_id: String,
    pub agreement_type: String,
    pub network: String,
    pub rpc_endpoint: String,
    pub meta: BTreeMap<String, String>,
}

fn agreement_mut<'a>(record: &'a mut Record) -> Result<&'a mut Agreement, LedgerError> {
    let err = wrong_kind(record, RecordKind::Agreement);
    match &mut record.body {
        RecordBody::Agreement(a) => Ok(a),
        _ => Err(err),
    }
}

fn check_connectable(record: &mut Record) -> Result<(), LedgerError> {
    if matches!(
        agreement_mut(record)?.status,
        AgreementStatus::Deployed | AgreementStatus::Verified
    ) {
        Ok(())
    } else {
        Err(invalid(record, "connect_testnet"))
    }
}

impl<S: RecordStore> Lifecycle<S> {
    /// Create an agreement in status `created`.
    pub async fn create_agreement(&self, params: AgreementParams) -> Result<Record, LedgerError> {
        let owner = required("owner_app_id", &params.owner_app_id)?;
        let agreement_type = required("agreement_type", &params.agreement_type)?;
        let network = required("network", &params.network)?;

        let record = Record::new(
            new_record_id(),
            owner,
            RecordBody::Agreement(Agreement {
                status: AgreementStatus::Created,
                agreement_type,
                network: network.clone(),
                rpc_endpoint: params.rpc_endpoint.trim().to_string(),
                blockchain_tx: None,
                verified: false,
                testnet_connected: false,
                meta: params.meta,
            }),
        );
        let mut details = Details::new();
        details.insert("network".to_string(), network);
        self.insert(record, details).await
    }

    /// `created → deployed`. Issues the agreement's transaction token.
    pub async fn deploy_agreement(&self, id: &str) -> Result<Record, LedgerError> {
        self.transition(id, "deploy", |record| {
            if agreement_mut(record)?.status != AgreementStatus::Created {
                return Err(invalid(record, "deploy"));
            }
            let tx = new_tx_token();
            let agreement = agreement_mut(record)?;
            agreement.status = AgreementStatus::Deployed;
            agreement.blockchain_tx = Some(tx.clone());

            let mut details = Details::new();
            details.insert("blockchain_tx".to_string(), tx);
            Ok(details)
        })
        .await
    }

    /// `deployed → verified`.
    pub async fn verify_agreement(&self, id: &str) -> Result<Record, LedgerError> {
        self.transition(id, "verify", |record| {
            if agreement_mut(record)?.status != AgreementStatus::Deployed {
                return Err(invalid(record, "verify"));
            }
            let agreement = agreement_mut(record)?;
            agreement.status = AgreementStatus::Verified;
            agreement.verified = true;
            Ok(Details::new())
        })
        .await
    }

    /// Read agreement `id` and check that `connect_testnet` accepts it in
    /// its current status, so callers can refuse before probing.
    pub async fn connectable_agreement(&self, id: &str) -> Result<Record, LedgerError> {
        let mut record = self.store.get(id).await?;
        check_connectable(&mut record)?;
        Ok(record)
    }

    /// Mark a deployed or verified agreement as connected to `rpc_endpoint`.
    ///
    /// `report` is the result of probing that endpoint; it must say the
    /// endpoint is reachable. Status does not change.
    pub async fn connect_testnet(
        &self,
        id: &str,
        rpc_endpoint: &str,
        report: &ProbeReport,
    ) -> Result<Record, LedgerError> {
        let endpoint = required("rpc_endpoint", rpc_endpoint)?;
        self.transition(id, "connect_testnet", |record| {
            check_connectable(record)?;
            if !report.reachable {
                return Err(LedgerError::Connectivity {
                    report: report.clone(),
                });
            }
            let agreement = agreement_mut(record)?;
            agreement.testnet_connected = true;
            agreement.rpc_endpoint = endpoint.clone();

            let mut details = Details::new();
            details.insert("rpc_endpoint".to_string(), endpoint.clone());
            if let Some(height) = report.height {
                details.insert("height".to_string(), height.to_string());
            }
            Ok(details)
        })
        .await
    }

    /// `created | deployed → archived`.
    ///
    /// An archived agreement holds no transaction token and is not
    /// connected; the cleared token is kept in the journal event.
    pub async fn archive_agreement(&self, id: &str) -> Result<Record, LedgerError> {
        self.transition(id, "archive", |record| {
            if !matches!(
                agreement_mut(record)?.status,
                AgreementStatus::Created | AgreementStatus::Deployed
            ) {
                return Err(invalid(record, "archive"));
            }
            let agreement = agreement_mut(record)?;
            agreement.status = AgreementStatus::Archived;
            agreement.testnet_connected = false;

            let mut details = Details::new();
            if let Some(tx) = agreement.blockchain_tx.take() {
                details.insert("blockchain_tx".to_string(), tx);
            }
            Ok(details)
        })
        .await
    }
}
