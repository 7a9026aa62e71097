use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::application::ApplicationStatus;

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Domain error taxonomy for the servicing ledger.
///
/// Every mutating command returns one of these instead of throwing across the
/// boundary. Infrastructure failures surface as `Internal` and fail the
/// current operation; they are never retried silently.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("invalid transition {from} -> {to}")]
    InvalidTransition {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },
    #[error("no next state from {0}")]
    NoNextState(ApplicationStatus),
    #[error("{entity} {id} already processed")]
    AlreadyProcessed { entity: &'static str, id: String },
    #[error("insufficient data: {0}")]
    InsufficientData(String),
    #[error("fee accrual for {0} is already running")]
    DuplicateRun(NaiveDate),
    #[error("invalid allocation: {0}")]
    Allocation(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn already_processed(entity: &'static str, id: impl ToString) -> Self {
        Self::AlreadyProcessed {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("serialization error: {err}"))
    }
}
