//! Record types, the `RecordStore` trait and its file and in-memory
//! backends for the metaledger deployment-record ledger.

pub mod conformance;
mod error;
mod event;
mod fs;
pub mod id;
mod memory;
mod record;
mod traits;

pub use error::StorageError;
pub use event::{verify_chain, ChainBreak, LifecycleEvent, GENESIS_HASH};
pub use fs::FileStore;
pub use memory::MemoryStore;
pub use record::{
    timestamp_now, Agreement, AgreementStatus, ClusterConfig, ClusterNode, ClusterStatus,
    DeploymentConfig, DeploymentStatus, Network, NodeRole, ProofStatus, Record, RecordBody,
    RecordKind, VerificationProof,
};
pub use traits::RecordStore;
