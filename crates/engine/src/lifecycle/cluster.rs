use metaledger_storage::id::new_record_id;
use metaledger_storage::{
    ClusterConfig, ClusterNode, ClusterStatus, Record, RecordBody, RecordKind, RecordStore,
};

use super::{invalid, required, wrong_kind, Details, Lifecycle};
use crate::error::LedgerError;

/// Inputs of `create_cluster`.
#[derive(Debug, Clone)]
pub struct ClusterParams {
    pub owner_app_id: String,
    pub nodes: Vec<ClusterNode>,
    pub rpc_endpoint: String,
}

fn cluster_mut<'a>(record: &'a mut Record) -> Result<&'a mut ClusterConfig, LedgerError> {
    let err = wrong_kind(record, RecordKind::ClusterConfig);
    match &mut record.body {
        RecordBody::ClusterConfig(c) => Ok(c),
        _ => Err(err),
    }
}

impl<S: RecordStore> Lifecycle<S> {
    /// Create a cluster config in status `created`.
    ///
    /// Node ids are not checked for uniqueness here; `configure_cluster`
    /// does that.
    pub async fn create_cluster(&self, params: ClusterParams) -> Result<Record, LedgerError> {
        let owner = required("owner_app_id", &params.owner_app_id)?;
        if params.nodes.is_empty() {
            return Err(LedgerError::Validation(
                "cluster needs at least one node".to_string(),
            ));
        }
        for node in &params.nodes {
            required("node_id", &node.node_id)?;
            if node.port == 0 {
                return Err(LedgerError::Validation(format!(
                    "node {} has port 0 (expected 1-65535)",
                    node.node_id
                )));
            }
        }

        let node_count = params.nodes.len();
        let record = Record::new(
            new_record_id(),
            owner,
            RecordBody::ClusterConfig(ClusterConfig {
                status: ClusterStatus::Created,
                nodes: params.nodes,
                rpc_endpoint: params.rpc_endpoint.trim().to_string(),
            }),
        );
        let mut details = Details::new();
        details.insert("nodes".to_string(), node_count.to_string());
        self.insert(record, details).await
    }

    /// `created → configured`, after checking node ids are unique.
    ///
    /// A cluster without a validator node is allowed but logged.
    pub async fn configure_cluster(&self, id: &str) -> Result<Record, LedgerError> {
        self.transition(id, "configure", |record| {
            if cluster_mut(record)?.status != ClusterStatus::Created {
                return Err(invalid(record, "configure"));
            }
            let cluster = cluster_mut(record)?;
            let dupes = cluster.duplicate_node_ids();
            if !dupes.is_empty() {
                return Err(LedgerError::Validation(format!(
                    "duplicate node_id in cluster: {}",
                    dupes.join(", ")
                )));
            }
            if !cluster.has_validator() {
                tracing::warn!(id = %record.id, "cluster has no validator node");
            }
            cluster_mut(record)?.status = ClusterStatus::Configured;
            Ok(Details::new())
        })
        .await
    }

    /// `configured → archived`.
    pub async fn archive_cluster(&self, id: &str) -> Result<Record, LedgerError> {
        self.transition(id, "archive", |record| {
            if cluster_mut(record)?.status != ClusterStatus::Configured {
                return Err(invalid(record, "archive"));
            }
            cluster_mut(record)?.status = ClusterStatus::Archived;
            Ok(Details::new())
        })
        .await
    }
}
