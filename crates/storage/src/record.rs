use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::StorageError;

/// Current UTC time as an RFC 3339 string.
pub fn timestamp_now() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

/// The four record kinds held by a ledger store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Agreement,
    Deployment,
    ClusterConfig,
    VerificationProof,
}

impl RecordKind {
    pub const ALL: [RecordKind; 4] = [
        RecordKind::Agreement,
        RecordKind::Deployment,
        RecordKind::ClusterConfig,
        RecordKind::VerificationProof,
    ];

    /// Wire name, also used as the store subdirectory.
    pub fn as_str(self) -> &'static str {
        match self {
            RecordKind::Agreement => "agreement",
            RecordKind::Deployment => "deployment",
            RecordKind::ClusterConfig => "cluster_config",
            RecordKind::VerificationProof => "verification_proof",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "agreement" | "agreements" => Ok(RecordKind::Agreement),
            "deployment" | "deployments" => Ok(RecordKind::Deployment),
            "cluster" | "cluster_config" | "clusters" => Ok(RecordKind::ClusterConfig),
            "proof" | "verification_proof" | "proofs" => Ok(RecordKind::VerificationProof),
            other => Err(format!(
                "unknown record kind '{}' (expected agreement, deployment, cluster, proof)",
                other
            )),
        }
    }
}

// ── Status enums ─────────────────────────────────────────────────────────────

macro_rules! status_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $wire:literal $(, terminal = $term:literal)?;)+ }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant,)+
        }

        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $wire,)+
                }
            }

            /// No transition leaves a terminal status.
            pub fn is_terminal(self) -> bool {
                match self {
                    $($name::$variant => false $(|| $term)?,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

status_enum! {
    /// `created → deployed → verified`, with abandonment to `archived`.
    AgreementStatus {
        Created => "created";
        Deployed => "deployed";
        Verified => "verified", terminal = true;
        Archived => "archived", terminal = true;
    }
}

status_enum! {
    /// `created → active → archived`, or `created → failed`.
    DeploymentStatus {
        Created => "created";
        Active => "active";
        Failed => "failed", terminal = true;
        Archived => "archived", terminal = true;
    }
}

status_enum! {
    /// `created → configured → archived`.
    ClusterStatus {
        Created => "created";
        Configured => "configured";
        Archived => "archived", terminal = true;
    }
}

status_enum! {
    /// `created → verified`. Verified proofs are immutable.
    ProofStatus {
        Created => "created";
        Verified => "verified", terminal = true;
    }
}

// ── Bodies ───────────────────────────────────────────────────────────────────

/// Network a deployment targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Network {
    Testnet,
    Mainnet,
}

impl Network {
    pub fn as_str(self) -> &'static str {
        match self {
            Network::Testnet => "testnet",
            Network::Mainnet => "mainnet",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "testnet" => Ok(Network::Testnet),
            "mainnet" => Ok(Network::Mainnet),
            other => Err(format!(
                "unknown network '{}' (expected testnet or mainnet)",
                other
            )),
        }
    }
}

/// An agreement between an application and the ledger network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agreement {
    pub status: AgreementStatus,
    pub agreement_type: String,
    pub network: String,
    pub rpc_endpoint: String,
    /// Set iff status is `deployed` or `verified`.
    pub blockchain_tx: Option<String>,
    pub verified: bool,
    pub testnet_connected: bool,
    #[serde(default)]
    pub meta: BTreeMap<String, String>,
}

/// Where and how an application is deployed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentConfig {
    pub status: DeploymentStatus,
    pub app_path: String,
    pub network: Network,
    pub wallet_ref: Option<String>,
    /// Ordered set: insertion order, no duplicates.
    #[serde(default)]
    pub algorithms: Vec<String>,
    pub ipfs_gateway: String,
    /// Set only when status is `failed`.
    #[serde(default)]
    pub failure_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    LightClient,
    Validator,
    Sync,
}

impl NodeRole {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeRole::LightClient => "light_client",
            NodeRole::Validator => "validator",
            NodeRole::Sync => "sync",
        }
    }
}

impl FromStr for NodeRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "light_client" | "light-client" | "light" => Ok(NodeRole::LightClient),
            "validator" => Ok(NodeRole::Validator),
            "sync" => Ok(NodeRole::Sync),
            other => Err(format!(
                "unknown node role '{}' (expected light_client, validator, sync)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterNode {
    pub node_id: String,
    pub port: u16,
    pub role: NodeRole,
}

impl FromStr for ClusterNode {
    type Err = String;

    /// Parses `node_id:port:role`, e.g. `node1:6001:validator`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 3 {
            return Err(format!(
                "invalid node spec '{}': expected node_id:port:role",
                s
            ));
        }
        let port = parts[1]
            .parse::<u16>()
            .map_err(|e| format!("invalid port in node spec '{}': {}", s, e))?;
        Ok(ClusterNode {
            node_id: parts[0].to_string(),
            port,
            role: parts[2].parse()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub status: ClusterStatus,
    pub nodes: Vec<ClusterNode>,
    pub rpc_endpoint: String,
}

impl ClusterConfig {
    /// Node ids appearing more than once, in first-seen order.
    pub fn duplicate_node_ids(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut dupes = Vec::new();
        for node in &self.nodes {
            if !seen.insert(node.node_id.as_str()) && !dupes.contains(&node.node_id) {
                dupes.push(node.node_id.clone());
            }
        }
        dupes
    }

    pub fn has_validator(&self) -> bool {
        self.nodes.iter().any(|n| n.role == NodeRole::Validator)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationProof {
    pub status: ProofStatus,
    pub provider: String,
    pub subject_record_id: String,
    /// SHA-256 of the subject's content digest input at proof creation.
    pub proof_hash: String,
    pub verified_at: Option<String>,
}

/// Kind-specific payload. The `kind` tag is flattened into the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordBody {
    Agreement(Agreement),
    Deployment(DeploymentConfig),
    ClusterConfig(ClusterConfig),
    VerificationProof(VerificationProof),
}

// ── Record ───────────────────────────────────────────────────────────────────

/// A persisted, identifier-keyed ledger document.
///
/// Serializes to a single flat JSON object: the header fields plus the
/// `kind` tag and every field of the body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub owner_app_id: String,
    /// RFC 3339. Immutable once the record is first stored.
    pub created_at: String,
    /// RFC 3339. Stamped by the store on every write.
    pub updated_at: String,
    /// Write counter maintained by the store; 0 at creation.
    #[serde(default)]
    pub version: u64,
    #[serde(flatten)]
    pub body: RecordBody,
}

impl Record {
    /// Build a fresh, not-yet-stored record.
    pub fn new(id: impl Into<String>, owner_app_id: impl Into<String>, body: RecordBody) -> Self {
        let now = timestamp_now();
        Record {
            id: id.into(),
            owner_app_id: owner_app_id.into(),
            created_at: now.clone(),
            updated_at: now,
            version: 0,
            body,
        }
    }

    /// Stamp `self` for writing over `existing` (or as a fresh record).
    ///
    /// Keeps the stored `created_at`, bumps the version and refuses to
    /// change the kind stored under an id.
    pub(crate) fn stamped(mut self, existing: Option<&Record>) -> Result<Record, StorageError> {
        match existing {
            Some(existing) if existing.kind() != self.kind() => {
                let given = self.kind();
                return Err(StorageError::KindMismatch {
                    id: self.id,
                    stored: existing.kind(),
                    given,
                })
            }
            Some(existing) => {
                self.created_at = existing.created_at.clone();
                self.version = existing.version + 1;
            }
            None => self.version = 0,
        }
        self.updated_at = timestamp_now();
        Ok(self)
    }

    pub fn kind(&self) -> RecordKind {
        match self.body {
            RecordBody::Agreement(_) => RecordKind::Agreement,
            RecordBody::Deployment(_) => RecordKind::Deployment,
            RecordBody::ClusterConfig(_) => RecordKind::ClusterConfig,
            RecordBody::VerificationProof(_) => RecordKind::VerificationProof,
        }
    }

    pub fn status(&self) -> &'static str {
        match &self.body {
            RecordBody::Agreement(a) => a.status.as_str(),
            RecordBody::Deployment(d) => d.status.as_str(),
            RecordBody::ClusterConfig(c) => c.status.as_str(),
            RecordBody::VerificationProof(p) => p.status.as_str(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        match &self.body {
            RecordBody::Agreement(a) => a.status.is_terminal(),
            RecordBody::Deployment(d) => d.status.is_terminal(),
            RecordBody::ClusterConfig(c) => c.status.is_terminal(),
            RecordBody::VerificationProof(p) => p.status.is_terminal(),
        }
    }

    /// Check the data-model invariants that hold in every status.
    ///
    /// Returns every violation found rather than stopping at the first.
    pub fn check_invariants(&self) -> Result<(), Vec<String>> {
        let mut problems = Vec::new();
        if self.id.is_empty() {
            problems.push("id must not be empty".to_string());
        }
        match &self.body {
            RecordBody::Agreement(a) => {
                let on_chain = matches!(
                    a.status,
                    AgreementStatus::Deployed | AgreementStatus::Verified
                );
                if a.blockchain_tx.is_some() != on_chain {
                    problems.push(format!(
                        "blockchain_tx must be set iff status is deployed or verified (status: {}, blockchain_tx: {})",
                        a.status,
                        if a.blockchain_tx.is_some() { "set" } else { "unset" }
                    ));
                }
                if a.verified && a.status != AgreementStatus::Verified {
                    problems.push(format!(
                        "verified=true requires status verified (status: {})",
                        a.status
                    ));
                }
                if a.testnet_connected && !on_chain {
                    problems.push(format!(
                        "testnet_connected=true requires status deployed or verified (status: {})",
                        a.status
                    ));
                }
            }
            RecordBody::Deployment(d) => {
                if d.network == Network::Mainnet
                    && d.wallet_ref.as_deref().map_or(true, |w| w.trim().is_empty())
                {
                    problems.push("mainnet deployment requires a non-empty wallet_ref".to_string());
                }
                let mut seen = std::collections::HashSet::new();
                if let Some(dup) = d.algorithms.iter().find(|a| !seen.insert(a.as_str())) {
                    problems.push(format!("algorithm '{}' listed more than once", dup));
                }
                if d.failure_reason.is_some() != (d.status == DeploymentStatus::Failed) {
                    problems.push("failure_reason must be set iff status is failed".to_string());
                }
            }
            RecordBody::ClusterConfig(c) => {
                if c.status == ClusterStatus::Configured || c.status == ClusterStatus::Archived {
                    let dupes = c.duplicate_node_ids();
                    if !dupes.is_empty() {
                        problems.push(format!(
                            "configured cluster has duplicate node ids: {}",
                            dupes.join(", ")
                        ));
                    }
                }
            }
            RecordBody::VerificationProof(p) => {
                if p.verified_at.is_some() != (p.status == ProofStatus::Verified) {
                    problems.push("verified_at must be set iff status is verified".to_string());
                }
                if p.subject_record_id.is_empty() {
                    problems.push("subject_record_id must not be empty".to_string());
                }
            }
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems)
        }
    }

    /// SHA-256 over the record's content, excluding the fields the store
    /// rewrites on every put (`updated_at`, `version`).
    ///
    /// Keys are hashed in sorted order: `serde_json::Map` is a `BTreeMap`
    /// without the `preserve_order` feature.
    pub fn content_digest(&self) -> String {
        let mut value = match serde_json::to_value(self) {
            Ok(v) => v,
            Err(e) => return format!("unserializable:{}", e),
        };
        if let Some(map) = value.as_object_mut() {
            map.remove("updated_at");
            map.remove("version");
        }
        let canonical = value.to_string();
        format!("{:x}", Sha256::digest(canonical.as_bytes()))
    }

    pub fn as_agreement(&self) -> Option<&Agreement> {
        match &self.body {
            RecordBody::Agreement(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_deployment(&self) -> Option<&DeploymentConfig> {
        match &self.body {
            RecordBody::Deployment(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_cluster(&self) -> Option<&ClusterConfig> {
        match &self.body {
            RecordBody::ClusterConfig(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_proof(&self) -> Option<&VerificationProof> {
        match &self.body {
            RecordBody::VerificationProof(p) => Some(p),
            _ => None,
        }
    }
}
