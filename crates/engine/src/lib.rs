//! Lifecycle engine and connectivity probe for the metaledger deployment
//! ledger.
//!
//! [`Lifecycle`] owns every status change of the records held in a
//! [`metaledger_storage::RecordStore`]. [`probe`] checks JSON-RPC endpoints;
//! its [`ProbeReport`] is an input to `connect_testnet`, never a writer.

mod error;
mod lifecycle;
pub mod probe;

pub use error::LedgerError;
pub use lifecycle::{
    AgreementParams, AuditFinding, AuditReport, ClusterParams, DeploymentParams, Lifecycle,
};
pub use probe::{
    check_with_retry, ConnectivityProbe, JsonRpcProbe, ProbeReport, RetryPolicy, StaticProbe,
};
