use std::path::Path;

use metaledger_storage::id::new_record_id;
use metaledger_storage::{
    DeploymentConfig, DeploymentStatus, Network, Record, RecordBody, RecordKind, RecordStore,
};

use super::{invalid, required, wrong_kind, Details, Lifecycle};
use crate::error::LedgerError;

/// Inputs of `create_deployment`.
#[derive(Debug, Clone)]
pub struct DeploymentParams {
    pub owner_app_id: String,
    /// Directory holding the application to deploy.
    pub app_path: String,
    pub network: Network,
    pub wallet_ref: Option<String>,
    /// Duplicates are dropped, first occurrence wins.
    pub algorithms: Vec<String>,
    pub ipfs_gateway: String,
}

fn deployment_mut<'a>(record: &'a mut Record) -> Result<&'a mut DeploymentConfig, LedgerError> {
    let err = wrong_kind(record, RecordKind::Deployment);
    match &mut record.body {
        RecordBody::Deployment(d) => Ok(d),
        _ => Err(err),
    }
}

/// Order-preserving dedupe; blank entries are dropped.
fn dedupe_algorithms(algorithms: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(algorithms.len());
    for alg in algorithms {
        let alg = alg.trim().to_string();
        if !alg.is_empty() && !out.contains(&alg) {
            out.push(alg);
        }
    }
    out
}

/// Why `app_path` cannot be deployed, if it cannot.
async fn app_path_problem(app_path: &str) -> Option<String> {
    match tokio::fs::metadata(Path::new(app_path)).await {
        Ok(meta) if meta.is_dir() => None,
        Ok(_) => Some(format!("app path {} is not a directory", app_path)),
        Err(e) => Some(format!("app path {} is not accessible: {}", app_path, e)),
    }
}

impl<S: RecordStore> Lifecycle<S> {
    /// Create a deployment config.
    ///
    /// A mainnet deployment without a wallet is rejected and nothing is
    /// stored. An app path that is not an existing directory does not
    /// reject the call: the record is created and immediately moved to
    /// `failed` with the reason recorded, and that record is returned.
    pub async fn create_deployment(&self, params: DeploymentParams) -> Result<Record, LedgerError> {
        let owner = required("owner_app_id", &params.owner_app_id)?;
        let app_path = required("app_path", &params.app_path)?;
        let wallet_ref = params
            .wallet_ref
            .map(|w| w.trim().to_string())
            .filter(|w| !w.is_empty());
        if params.network == Network::Mainnet && wallet_ref.is_none() {
            return Err(LedgerError::Validation(
                "mainnet deployment requires a wallet_ref".to_string(),
            ));
        }

        let record = Record::new(
            new_record_id(),
            owner,
            RecordBody::Deployment(DeploymentConfig {
                status: DeploymentStatus::Created,
                app_path: app_path.clone(),
                network: params.network,
                wallet_ref,
                algorithms: dedupe_algorithms(params.algorithms),
                ipfs_gateway: params.ipfs_gateway.trim().to_string(),
                failure_reason: None,
            }),
        );
        let mut details = Details::new();
        details.insert("network".to_string(), params.network.to_string());
        let created = self.insert(record, details).await?;

        let Some(reason) = app_path_problem(&app_path).await else {
            return Ok(created);
        };
        tracing::warn!(id = %created.id, app_path = %app_path, reason = %reason, "deployment failed validation");
        self.transition(&created.id, "fail", |record| {
            if deployment_mut(record)?.status != DeploymentStatus::Created {
                return Err(invalid(record, "fail"));
            }
            let deployment = deployment_mut(record)?;
            deployment.status = DeploymentStatus::Failed;
            deployment.failure_reason = Some(reason.clone());

            let mut details = Details::new();
            details.insert("failure_reason".to_string(), reason.clone());
            Ok(details)
        })
        .await
    }

    /// `created → active`.
    pub async fn activate_deployment(&self, id: &str) -> Result<Record, LedgerError> {
        self.transition(id, "activate", |record| {
            if deployment_mut(record)?.status != DeploymentStatus::Created {
                return Err(invalid(record, "activate"));
            }
            deployment_mut(record)?.status = DeploymentStatus::Active;
            Ok(Details::new())
        })
        .await
    }

    /// `active → archived`.
    pub async fn archive_deployment(&self, id: &str) -> Result<Record, LedgerError> {
        self.transition(id, "archive", |record| {
            if deployment_mut(record)?.status != DeploymentStatus::Active {
                return Err(invalid(record, "archive"));
            }
            deployment_mut(record)?.status = DeploymentStatus::Archived;
            Ok(Details::new())
        })
        .await
    }
}
