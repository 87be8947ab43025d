//! crates/loan_ledger_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, NaiveDate, Utc};

pub type UserId = i64;
pub type LoanId = i64;
pub type PaymentId = i64;

/// A registered borrower, as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub phone: String,
    pub first_name: String,
    pub last_name: String,
    pub age: i32,
    pub monthly_earnings: i64,
    pub occupation: String,
    pub is_admin: bool,
}

// Only used internally for login - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: UserId,
    pub phone: String,
    pub hashed_password: String,
}

/// The session token currently attached to a user row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken {
    pub token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl SessionToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// The authenticated caller of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requester {
    pub user_id: UserId,
    pub is_admin: bool,
}

impl Requester {
    /// Owners and admins may act on a record.
    pub fn may_access(&self, owner_id: UserId) -> bool {
        self.is_admin || self.user_id == owner_id
    }
}

/// Everything needed to insert a user row. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub phone: String,
    pub hashed_password: String,
    pub first_name: String,
    pub last_name: String,
    pub age: i32,
    pub monthly_earnings: i64,
    pub occupation: String,
    pub is_admin: bool,
    pub token: SessionToken,
}

/// The public projection of a user: no id, no credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub phone: String,
    pub first_name: String,
    pub last_name: String,
    pub age: i32,
    pub monthly_earnings: i64,
    pub occupation: String,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            phone: user.phone,
            first_name: user.first_name,
            last_name: user.last_name,
            age: user.age,
            monthly_earnings: user.monthly_earnings,
            occupation: user.occupation,
        }
    }
}

/// A loan taken out by a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loan {
    pub id: LoanId,
    pub user_id: UserId,
    pub amount: i64,
    pub is_paid: bool,
    pub created_date: NaiveDate,
    pub months: i32,
}

#[derive(Debug, Clone)]
pub struct NewLoan {
    pub user_id: UserId,
    pub amount: i64,
    pub created_date: NaiveDate,
    pub months: i32,
}

/// A single payment made against a loan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payment {
    pub id: PaymentId,
    pub loan_id: LoanId,
    pub amount: i64,
    pub paid_date: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub loan_id: LoanId,
    pub amount: i64,
    pub paid_date: NaiveDate,
}

/// A loan together with the ids of its payments, in the order they were made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoanDetails {
    pub loan: Loan,
    pub payment_ids: Vec<PaymentId>,
    pub total_paid: i64,
}

impl LoanDetails {
    /// Outstanding balance, never negative.
    pub fn remaining(&self) -> i64 {
        (self.loan.amount - self.total_paid).max(0)
    }
}

/// What recording a payment produced: the payment and the loan as it stands afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedPayment {
    pub payment: Payment,
    pub loan: Loan,
}
