//! crates/loan_ledger_core/src/service.rs
//!
//! The use-cases of the loan ledger: registration and sessions, loans, and
//! payments. Handlers call into `LedgerService`; it validates input, enforces
//! ownership, and drives the repository ports.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, info, warn};

use crate::domain::{
    Loan, LoanDetails, LoanId, NewLoan, NewPayment, NewUser, Payment, RecordedPayment, Requester,
    SessionToken, UserId, UserProfile,
};
use crate::error::{LedgerError, LedgerResult};
use crate::ledger::total_paid;
use crate::ports::{
    Clock, CredentialService, LoanRepository, PaymentRepository, PortError, SystemClock,
    UserRepository,
};
use crate::validation::{
    validate_loan, validate_login, validate_payment, validate_registration, LoanRequest,
    PaymentRequest, Registration,
};

/// Tunables that come from configuration.
#[derive(Debug, Clone, Default)]
pub struct LedgerSettings {
    /// Lifetime of an issued token; `None` means it lives until logout.
    pub token_ttl: Option<Duration>,
    /// Phones that are granted the admin flag on registration.
    pub admin_phones: HashSet<String>,
}

/// The result of registering or logging in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: UserId,
    pub token: String,
}

/// Parameter object for creating a new `LedgerService`.
pub struct NewLedgerService {
    pub users: Arc<dyn UserRepository>,
    pub loans: Arc<dyn LoanRepository>,
    pub payments: Arc<dyn PaymentRepository>,
    pub credentials: Arc<dyn CredentialService>,
    pub settings: LedgerSettings,
}

pub struct LedgerService {
    users: Arc<dyn UserRepository>,
    loans: Arc<dyn LoanRepository>,
    payments: Arc<dyn PaymentRepository>,
    credentials: Arc<dyn CredentialService>,
    clock: Arc<dyn Clock>,
    settings: LedgerSettings,
}

impl LedgerService {
    pub fn new(v: NewLedgerService) -> Self {
        Self {
            users: v.users,
            loans: v.loans,
            payments: v.payments,
            credentials: v.credentials,
            clock: Arc::new(SystemClock),
            settings: v.settings,
        }
    }

    /// Replaces the clock used for token expiry.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn new_token(&self) -> SessionToken {
        SessionToken {
            token: self.credentials.issue_token(),
            expires_at: self.settings.token_ttl.map(|ttl| self.clock.now() + ttl),
        }
    }

    //=====================================================================================
    // Account Directory
    //=====================================================================================

    /// Registers a user and hands back their first session.
    pub async fn create_user(&self, input: Registration) -> LedgerResult<Session> {
        let valid = validate_registration(input)?;
        let hashed_password = self
            .credentials
            .hash_password(&valid.password)
            .map_err(LedgerError::from)?;
        let token = self.new_token();
        let is_admin = self.settings.admin_phones.contains(&valid.phone);

        let user = self
            .users
            .create_user(NewUser {
                phone: valid.phone,
                hashed_password,
                first_name: valid.first_name,
                last_name: valid.last_name,
                age: valid.age,
                monthly_earnings: valid.monthly_earnings,
                occupation: valid.occupation,
                is_admin,
                token: token.clone(),
            })
            .await
            .map_err(|e| match e {
                PortError::Conflict(_) => LedgerError::DuplicatePhone,
                other => other.into(),
            })?;

        info!(user_id = user.id, is_admin, "user registered");
        Ok(Session {
            user_id: user.id,
            token: token.token,
        })
    }

    /// Checks a phone/password pair and rotates the user's token.
    pub async fn authenticate(&self, phone: &str, password: &str) -> LedgerResult<Session> {
        validate_login(phone, password)?;
        let creds = self
            .users
            .get_credentials_by_phone(phone)
            .await
            .map_err(|e| match e {
                PortError::NotFound(_) => LedgerError::UserNotFound,
                other => other.into(),
            })?;

        let valid = self
            .credentials
            .verify_password(password, &creds.hashed_password)
            .map_err(LedgerError::from)?;
        if !valid {
            warn!(user_id = creds.user_id, "login rejected: wrong password");
            return Err(LedgerError::AuthenticationFailed);
        }

        let token = self.new_token();
        self.users
            .set_token(creds.user_id, Some(token.clone()))
            .await?;
        info!(user_id = creds.user_id, "user logged in");
        Ok(Session {
            user_id: creds.user_id,
            token: token.token,
        })
    }

    /// Resolves a presented token to the caller it belongs to.
    pub async fn authenticate_token(&self, token: &str) -> LedgerResult<Requester> {
        let (user, session) = self
            .users
            .get_user_by_token(token)
            .await
            .map_err(|e| match e {
                PortError::NotFound(_) => LedgerError::AuthenticationFailed,
                other => other.into(),
            })?;
        if session.is_expired(self.clock.now()) {
            debug!(user_id = user.id, "token expired");
            return Err(LedgerError::TokenExpired);
        }
        Ok(Requester {
            user_id: user.id,
            is_admin: user.is_admin,
        })
    }

    /// Clears the caller's token so it no longer authenticates.
    pub async fn logout(&self, requester: Requester) -> LedgerResult<()> {
        self.users
            .set_token(requester.user_id, None)
            .await
            .map_err(|e| match e {
                PortError::NotFound(_) => LedgerError::UserNotFound,
                other => other.into(),
            })?;
        info!(user_id = requester.user_id, "user logged out");
        Ok(())
    }

    pub async fn get_user(&self, user_id: UserId, requester: Requester) -> LedgerResult<UserProfile> {
        let user = self.users.get_user(user_id).await?;
        if !requester.may_access(user.id) {
            return Err(LedgerError::Forbidden);
        }
        Ok(user.into())
    }

    /// Deletes a user and, through the store's cascade, their loans and payments.
    pub async fn delete_user(&self, user_id: UserId, requester: Requester) -> LedgerResult<()> {
        let user = self.users.get_user(user_id).await?;
        if !requester.may_access(user.id) {
            return Err(LedgerError::Forbidden);
        }
        self.users.delete_user(user.id).await?;
        info!(user_id, deleted_by = requester.user_id, "user deleted");
        Ok(())
    }

    pub async fn list_loans(&self, user_id: UserId, requester: Requester) -> LedgerResult<Vec<LoanDetails>> {
        let user = self.users.get_user(user_id).await?;
        if !requester.may_access(user.id) {
            return Err(LedgerError::Forbidden);
        }
        let loans = self.loans.get_loans_by_user(user.id).await?;

        let mut details = Vec::with_capacity(loans.len());
        for loan in loans {
            let payments = self.payments.get_payments_for_loan(loan.id).await?;
            details.push(loan_details(loan, &payments));
        }
        Ok(details)
    }

    //=====================================================================================
    // Loan Ledger
    //=====================================================================================

    /// Opens a new loan for the caller.
    pub async fn create_loan(&self, requester: Requester, input: LoanRequest) -> LedgerResult<LoanId> {
        let valid = validate_loan(input)?;
        let loan = self
            .loans
            .create_loan(NewLoan {
                user_id: requester.user_id,
                amount: valid.amount,
                created_date: valid.created_date,
                months: valid.months,
            })
            .await?;
        info!(loan_id = loan.id, user_id = loan.user_id, amount = loan.amount, "loan created");
        Ok(loan.id)
    }

    pub async fn get_loan(&self, loan_id: LoanId, requester: Requester) -> LedgerResult<LoanDetails> {
        let loan = self.loans.get_loan(loan_id).await?;
        if !requester.may_access(loan.user_id) {
            return Err(LedgerError::Forbidden);
        }
        let payments = self.payments.get_payments_for_loan(loan.id).await?;
        Ok(loan_details(loan, &payments))
    }

    //=====================================================================================
    // Payment Recorder
    //=====================================================================================

    /// Records a payment against an open loan owned by the caller, settling the
    /// loan if the payment covers what is left.
    pub async fn record_payment(
        &self,
        loan_id: LoanId,
        requester: Requester,
        input: PaymentRequest,
    ) -> LedgerResult<RecordedPayment> {
        let valid = validate_payment(input)?;
        let loan = self.loans.get_loan(loan_id).await?;
        if loan.state().is_settled() {
            return Err(LedgerError::LoanAlreadySettled);
        }
        if loan.user_id != requester.user_id {
            return Err(LedgerError::Forbidden);
        }

        let recorded = self
            .payments
            .record_payment(NewPayment {
                loan_id: loan.id,
                amount: valid.amount,
                paid_date: valid.paid_date,
            })
            .await?;

        info!(
            loan_id,
            payment_id = recorded.payment.id,
            amount = recorded.payment.amount,
            settled = recorded.loan.is_paid,
            "payment recorded"
        );
        Ok(recorded)
    }

    pub async fn list_payments(&self, loan_id: LoanId, requester: Requester) -> LedgerResult<Vec<Payment>> {
        let loan = self.loans.get_loan(loan_id).await?;
        if !requester.may_access(loan.user_id) {
            return Err(LedgerError::Forbidden);
        }
        Ok(self.payments.get_payments_for_loan(loan.id).await?)
    }
}

fn loan_details(loan: Loan, payments: &[Payment]) -> LoanDetails {
    LoanDetails {
        loan,
        payment_ids: payments.iter().map(|p| p.id).collect(),
        total_paid: total_paid(payments.iter().map(|p| p.amount)),
    }
}
