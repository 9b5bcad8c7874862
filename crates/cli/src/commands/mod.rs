pub(crate) mod agreement;
pub(crate) mod audit;
pub(crate) mod cluster;
pub(crate) mod config;
pub(crate) mod deployment;
pub(crate) mod probe;
pub(crate) mod proof;
pub(crate) mod query;

use metaledger_engine::{JsonRpcProbe, LedgerError, Lifecycle};
use metaledger_storage::FileStore;

use crate::config::Settings;
use crate::error::CliError;
use crate::OutputFormat;

/// Per-invocation state shared by every command.
pub(crate) struct Context {
    pub settings: Settings,
    pub output: OutputFormat,
    pub quiet: bool,
}

impl Context {
    /// Open the file store at the resolved root.
    ///
    /// Commands that never touch records (`probe`, `config`) do not call
    /// this, so they leave no store directory behind.
    pub async fn engine(&self) -> Result<Lifecycle<FileStore>, CliError> {
        let store = FileStore::open(self.settings.store_root.clone())
            .await
            .map_err(LedgerError::from)?;
        Ok(Lifecycle::new(store))
    }

    pub fn probe(&self) -> JsonRpcProbe {
        JsonRpcProbe::new(self.settings.config.probe.timeout())
    }
}
