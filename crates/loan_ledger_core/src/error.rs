//! crates/loan_ledger_core/src/error.rs
//!
//! The outcomes a ledger operation can fail with.

use crate::ports::PortError;
use crate::validation::ValidationErrors;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Invalid input: {0}")]
    InvalidInput(ValidationErrors),

    #[error("A user with this phone number already exists")]
    DuplicatePhone,

    #[error("{0} not found")]
    NotFound(String),

    #[error("User not found")]
    UserNotFound,

    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("Token expired")]
    TokenExpired,

    #[error("Access forbidden")]
    Forbidden,

    #[error("Loan is already settled")]
    LoanAlreadySettled,

    /// Store or hashing failures; never the caller's fault.
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

impl From<ValidationErrors> for LedgerError {
    fn from(errors: ValidationErrors) -> Self {
        LedgerError::InvalidInput(errors)
    }
}

impl From<PortError> for LedgerError {
    fn from(e: PortError) -> Self {
        match e {
            PortError::NotFound(what) => LedgerError::NotFound(what),
            PortError::LoanSettled(_) => LedgerError::LoanAlreadySettled,
            PortError::Conflict(what) | PortError::Unexpected(what) => LedgerError::Internal(what),
        }
    }
}
