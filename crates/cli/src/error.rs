use metaledger_engine::{LedgerError, ProbeReport};

use crate::config::ConfigError;

/// Anything that ends a command unsuccessfully.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A command that ran to completion but whose outcome is a failure,
    /// such as an unclean audit or an unreachable probe target.
    #[error("{message}")]
    Failed {
        code: i32,
        kind: &'static str,
        message: String,
    },
}

impl CliError {
    pub fn failed(code: i32, kind: &'static str, message: impl Into<String>) -> Self {
        CliError::Failed {
            code,
            kind,
            message: message.into(),
        }
    }

    /// Process exit status for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Ledger(e) => match e {
                LedgerError::NotFound { .. } => 2,
                LedgerError::InvalidTransition { .. } => 3,
                LedgerError::Validation(_) => 4,
                LedgerError::Conflict(_) => 5,
                LedgerError::Connectivity { .. } => 6,
                LedgerError::Storage(_) => 1,
            },
            CliError::Config(_) => 1,
            CliError::Failed { code, .. } => *code,
        }
    }

    /// Tag shown as `error.kind` in JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            CliError::Ledger(e) => e.kind(),
            CliError::Config(_) => "config",
            CliError::Failed { kind, .. } => kind,
        }
    }

    pub fn probe_report(&self) -> Option<&ProbeReport> {
        match self {
            CliError::Ledger(LedgerError::Connectivity { report }) => Some(report),
            _ => None,
        }
    }
}
