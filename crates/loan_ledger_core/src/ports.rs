//! crates/loan_ledger_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the concrete store and password hashing scheme.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    Loan, LoanId, NewLoan, NewPayment, NewUser, Payment, RecordedPayment, SessionToken, User,
    UserCredentials, UserId,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// A uniqueness constraint rejected the write.
    #[error("Conflict: {0}")]
    Conflict(String),
    /// The loan was already settled when the payment's transaction locked it.
    #[error("Loan {0} is already settled")]
    LoanSettled(LoanId),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Repository Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Inserts the user. Fails with `Conflict` when the phone is already taken.
    async fn create_user(&self, new_user: NewUser) -> PortResult<User>;

    async fn get_user(&self, user_id: UserId) -> PortResult<User>;

    async fn get_credentials_by_phone(&self, phone: &str) -> PortResult<UserCredentials>;

    /// Looks a user up by their current session token.
    async fn get_user_by_token(&self, token: &str) -> PortResult<(User, SessionToken)>;

    /// Replaces the user's token; `None` logs them out.
    async fn set_token(&self, user_id: UserId, token: Option<SessionToken>) -> PortResult<()>;

    /// Deletes the user, cascading to their loans and payments.
    async fn delete_user(&self, user_id: UserId) -> PortResult<()>;
}

#[async_trait]
pub trait LoanRepository: Send + Sync {
    async fn create_loan(&self, new_loan: NewLoan) -> PortResult<Loan>;

    async fn get_loan(&self, loan_id: LoanId) -> PortResult<Loan>;

    async fn get_loans_by_user(&self, user_id: UserId) -> PortResult<Vec<Loan>>;
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Inserts the payment and re-evaluates the loan's settlement as one atomic unit.
    ///
    /// Implementations must lock the loan for the duration, fail with
    /// `LoanSettled` if it is already settled, and flip the paid flag when the
    /// new total reaches the amount owed.
    async fn record_payment(&self, new_payment: NewPayment) -> PortResult<RecordedPayment>;

    /// Payments for a loan, oldest first.
    async fn get_payments_for_loan(&self, loan_id: LoanId) -> PortResult<Vec<Payment>>;
}

//=========================================================================================
// Credential Port
//=========================================================================================

pub trait CredentialService: Send + Sync {
    /// Produces an irreversible salted hash of the raw password.
    fn hash_password(&self, raw_password: &str) -> PortResult<String>;

    /// Checks a raw password against a stored hash.
    fn verify_password(&self, raw_password: &str, hashed_password: &str) -> PortResult<bool>;

    /// Generates a fresh unguessable session token.
    fn issue_token(&self) -> String;
}

/// Source of the current time, so token expiry can be tested.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
