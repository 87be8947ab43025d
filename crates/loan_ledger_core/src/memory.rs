//! crates/loan_ledger_core/src/memory.rs
//!
//! An in-memory implementation of the repository ports. It keeps the same
//! guarantees as the PostgreSQL adapter: unique phones and tokens, cascading
//! deletes, and payment recording that is atomic with settlement. All state
//! sits behind one mutex, so every operation is serialized.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::domain::{
    Loan, LoanId, NewLoan, NewPayment, NewUser, Payment, PaymentId, RecordedPayment,
    SessionToken, User, UserCredentials, UserId,
};
use crate::ledger::total_paid;
use crate::ports::{
    LoanRepository, PaymentRepository, PortError, PortResult, UserRepository,
};

#[derive(Debug, Clone)]
struct UserRow {
    user: User,
    hashed_password: String,
    token: Option<SessionToken>,
}

#[derive(Debug, Default)]
struct Tables {
    next_id: i64,
    users: BTreeMap<UserId, UserRow>,
    loans: BTreeMap<LoanId, Loan>,
    payments: BTreeMap<PaymentId, Payment>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> PortResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| PortError::Unexpected("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create_user(&self, new_user: NewUser) -> PortResult<User> {
        let mut tables = self.lock()?;
        if tables.users.values().any(|row| row.user.phone == new_user.phone) {
            return Err(PortError::Conflict(format!(
                "phone {} already registered",
                new_user.phone
            )));
        }
        if tables
            .users
            .values()
            .any(|row| row.token.as_ref().is_some_and(|t| t.token == new_user.token.token))
        {
            return Err(PortError::Conflict("token already in use".to_string()));
        }

        let id = tables.next_id();
        let user = User {
            id,
            phone: new_user.phone,
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            age: new_user.age,
            monthly_earnings: new_user.monthly_earnings,
            occupation: new_user.occupation,
            is_admin: new_user.is_admin,
        };
        tables.users.insert(
            id,
            UserRow {
                user: user.clone(),
                hashed_password: new_user.hashed_password,
                token: Some(new_user.token),
            },
        );
        Ok(user)
    }

    async fn get_user(&self, user_id: UserId) -> PortResult<User> {
        self.lock()?
            .users
            .get(&user_id)
            .map(|row| row.user.clone())
            .ok_or_else(|| PortError::NotFound(format!("User {}", user_id)))
    }

    async fn get_credentials_by_phone(&self, phone: &str) -> PortResult<UserCredentials> {
        self.lock()?
            .users
            .values()
            .find(|row| row.user.phone == phone)
            .map(|row| UserCredentials {
                user_id: row.user.id,
                phone: row.user.phone.clone(),
                hashed_password: row.hashed_password.clone(),
            })
            .ok_or_else(|| PortError::NotFound("User".to_string()))
    }

    async fn get_user_by_token(&self, token: &str) -> PortResult<(User, SessionToken)> {
        self.lock()?
            .users
            .values()
            .find_map(|row| match &row.token {
                Some(t) if t.token == token => Some((row.user.clone(), t.clone())),
                _ => None,
            })
            .ok_or_else(|| PortError::NotFound("Token".to_string()))
    }

    async fn set_token(&self, user_id: UserId, token: Option<SessionToken>) -> PortResult<()> {
        let mut tables = self.lock()?;
        if let Some(new) = &token {
            let taken = tables.users.values().any(|row| {
                row.user.id != user_id && row.token.as_ref().is_some_and(|t| t.token == new.token)
            });
            if taken {
                return Err(PortError::Conflict("token already in use".to_string()));
            }
        }
        let row = tables
            .users
            .get_mut(&user_id)
            .ok_or_else(|| PortError::NotFound(format!("User {}", user_id)))?;
        row.token = token;
        Ok(())
    }

    async fn delete_user(&self, user_id: UserId) -> PortResult<()> {
        let mut tables = self.lock()?;
        if tables.users.remove(&user_id).is_none() {
            return Err(PortError::NotFound(format!("User {}", user_id)));
        }
        let owned: Vec<LoanId> = tables
            .loans
            .values()
            .filter(|loan| loan.user_id == user_id)
            .map(|loan| loan.id)
            .collect();
        tables.loans.retain(|_, loan| loan.user_id != user_id);
        tables.payments.retain(|_, p| !owned.contains(&p.loan_id));
        Ok(())
    }
}

#[async_trait]
impl LoanRepository for MemoryStore {
    async fn create_loan(&self, new_loan: NewLoan) -> PortResult<Loan> {
        let mut tables = self.lock()?;
        if !tables.users.contains_key(&new_loan.user_id) {
            return Err(PortError::NotFound(format!("User {}", new_loan.user_id)));
        }
        let id = tables.next_id();
        let loan = Loan {
            id,
            user_id: new_loan.user_id,
            amount: new_loan.amount,
            is_paid: false,
            created_date: new_loan.created_date,
            months: new_loan.months,
        };
        tables.loans.insert(id, loan.clone());
        Ok(loan)
    }

    async fn get_loan(&self, loan_id: LoanId) -> PortResult<Loan> {
        self.lock()?
            .loans
            .get(&loan_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Loan {}", loan_id)))
    }

    async fn get_loans_by_user(&self, user_id: UserId) -> PortResult<Vec<Loan>> {
        Ok(self
            .lock()?
            .loans
            .values()
            .filter(|loan| loan.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PaymentRepository for MemoryStore {
    async fn record_payment(&self, new_payment: NewPayment) -> PortResult<RecordedPayment> {
        let mut tables = self.lock()?;
        let mut loan = tables
            .loans
            .get(&new_payment.loan_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Loan {}", new_payment.loan_id)))?;
        if loan.state().is_settled() {
            return Err(PortError::LoanSettled(loan.id));
        }

        let id = tables.next_id();
        let payment = Payment {
            id,
            loan_id: new_payment.loan_id,
            amount: new_payment.amount,
            paid_date: new_payment.paid_date,
        };
        tables.payments.insert(id, payment.clone());

        let total_paid = total_paid(
            tables
                .payments
                .values()
                .filter(|p| p.loan_id == loan.id)
                .map(|p| p.amount),
        );
        if loan.apply_total_paid(total_paid) {
            tables.loans.insert(loan.id, loan.clone());
        }

        Ok(RecordedPayment { payment, loan })
    }

    async fn get_payments_for_loan(&self, loan_id: LoanId) -> PortResult<Vec<Payment>> {
        let tables = self.lock()?;
        if !tables.loans.contains_key(&loan_id) {
            return Err(PortError::NotFound(format!("Loan {}", loan_id)));
        }
        Ok(tables
            .payments
            .values()
            .filter(|p| p.loan_id == loan_id)
            .cloned()
            .collect())
    }
}
