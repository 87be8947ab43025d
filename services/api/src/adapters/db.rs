//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the repository ports from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use loan_ledger_core::domain::{
    Loan, LoanId, NewLoan, NewPayment, NewUser, Payment, RecordedPayment, SessionToken, User,
    UserCredentials, UserId,
};
use loan_ledger_core::ports::{
    LoanRepository, PaymentRepository, PortError, PortResult, UserRepository,
};
use sqlx::{FromRow, PgPool};
use tracing::debug;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the repository ports.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Creates a new `PgStore`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

/// Maps a failed write, turning constraint violations into their port equivalents.
fn write_error(e: sqlx::Error, what: &str) -> PortError {
    match &e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            PortError::Conflict(format!("{} violates a unique constraint", what))
        }
        sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
            PortError::NotFound(format!("Owner of {}", what))
        }
        _ => unexpected(e),
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

const USER_COLUMNS: &str =
    "id, phone, first_name, last_name, age, monthly_earnings, occupation, is_admin";

#[derive(FromRow)]
struct UserRecord {
    id: i64,
    phone: String,
    first_name: String,
    last_name: String,
    age: i32,
    monthly_earnings: i64,
    occupation: String,
    is_admin: bool,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            id: self.id,
            phone: self.phone,
            first_name: self.first_name,
            last_name: self.last_name,
            age: self.age,
            monthly_earnings: self.monthly_earnings,
            occupation: self.occupation,
            is_admin: self.is_admin,
        }
    }
}

#[derive(FromRow)]
struct UserTokenRecord {
    #[sqlx(flatten)]
    user: UserRecord,
    token: String,
    token_expires_at: Option<DateTime<Utc>>,
}

#[derive(FromRow)]
struct CredentialsRecord {
    id: i64,
    phone: String,
    password_hash: String,
}

#[derive(FromRow)]
struct LoanRecord {
    id: i64,
    user_id: i64,
    amount: i64,
    is_paid: bool,
    created_date: NaiveDate,
    months: i32,
}
impl LoanRecord {
    fn to_domain(self) -> Loan {
        Loan {
            id: self.id,
            user_id: self.user_id,
            amount: self.amount,
            is_paid: self.is_paid,
            created_date: self.created_date,
            months: self.months,
        }
    }
}

#[derive(FromRow)]
struct PaymentRecord {
    id: i64,
    loan_id: i64,
    amount: i64,
    paid_date: NaiveDate,
}
impl PaymentRecord {
    fn to_domain(self) -> Payment {
        Payment {
            id: self.id,
            loan_id: self.loan_id,
            amount: self.amount,
            paid_date: self.paid_date,
        }
    }
}

//=========================================================================================
// `UserRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl UserRepository for PgStore {
    async fn create_user(&self, new_user: NewUser) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "INSERT INTO users (phone, password_hash, first_name, last_name, age, monthly_earnings, occupation, is_admin, token, token_expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {USER_COLUMNS}"
        ))
        .bind(&new_user.phone)
        .bind(&new_user.hashed_password)
        .bind(&new_user.first_name)
        .bind(&new_user.last_name)
        .bind(new_user.age)
        .bind(new_user.monthly_earnings)
        .bind(&new_user.occupation)
        .bind(new_user.is_admin)
        .bind(&new_user.token.token)
        .bind(new_user.token.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| write_error(e, "User"))?;
        Ok(record.to_domain())
    }

    async fn get_user(&self, user_id: UserId) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {}", user_id)),
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn get_credentials_by_phone(&self, phone: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT id, phone, password_hash FROM users WHERE phone = $1",
        )
        .bind(phone)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound("User".to_string()),
            _ => unexpected(e),
        })?;
        Ok(UserCredentials {
            user_id: record.id,
            phone: record.phone,
            hashed_password: record.password_hash,
        })
    }

    async fn get_user_by_token(&self, token: &str) -> PortResult<(User, SessionToken)> {
        let record = sqlx::query_as::<_, UserTokenRecord>(&format!(
            "SELECT {USER_COLUMNS}, token, token_expires_at FROM users WHERE token = $1"
        ))
        .bind(token)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound("Token".to_string()),
            _ => unexpected(e),
        })?;
        let session = SessionToken {
            token: record.token,
            expires_at: record.token_expires_at,
        };
        Ok((record.user.to_domain(), session))
    }

    async fn set_token(&self, user_id: UserId, token: Option<SessionToken>) -> PortResult<()> {
        let (token, expires_at) = match token {
            Some(t) => (Some(t.token), t.expires_at),
            None => (None, None),
        };
        let result = sqlx::query(
            "UPDATE users SET token = $1, token_expires_at = $2 WHERE id = $3",
        )
        .bind(token)
        .bind(expires_at)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| write_error(e, "Token"))?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("User {}", user_id)));
        }
        Ok(())
    }

    async fn delete_user(&self, user_id: UserId) -> PortResult<()> {
        // loans and payments go with it through ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("User {}", user_id)));
        }
        Ok(())
    }
}

//=========================================================================================
// `LoanRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl LoanRepository for PgStore {
    async fn create_loan(&self, new_loan: NewLoan) -> PortResult<Loan> {
        let record = sqlx::query_as::<_, LoanRecord>(
            "INSERT INTO loans (user_id, amount, is_paid, created_date, months) VALUES ($1, $2, FALSE, $3, $4) \
             RETURNING id, user_id, amount, is_paid, created_date, months",
        )
        .bind(new_loan.user_id)
        .bind(new_loan.amount)
        .bind(new_loan.created_date)
        .bind(new_loan.months)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| write_error(e, "Loan"))?;
        Ok(record.to_domain())
    }

    async fn get_loan(&self, loan_id: LoanId) -> PortResult<Loan> {
        let record = sqlx::query_as::<_, LoanRecord>(
            "SELECT id, user_id, amount, is_paid, created_date, months FROM loans WHERE id = $1",
        )
        .bind(loan_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("Loan {}", loan_id)),
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn get_loans_by_user(&self, user_id: UserId) -> PortResult<Vec<Loan>> {
        let records = sqlx::query_as::<_, LoanRecord>(
            "SELECT id, user_id, amount, is_paid, created_date, months FROM loans WHERE user_id = $1 ORDER BY id ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let loans = records.into_iter().map(|r| r.to_domain()).collect();
        Ok(loans)
    }
}

//=========================================================================================
// `PaymentRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl PaymentRepository for PgStore {
    async fn record_payment(&self, new_payment: NewPayment) -> PortResult<RecordedPayment> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        // The row lock serializes concurrent payments on the same loan.
        let mut loan = sqlx::query_as::<_, LoanRecord>(
            "SELECT id, user_id, amount, is_paid, created_date, months FROM loans WHERE id = $1 FOR UPDATE",
        )
        .bind(new_payment.loan_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("Loan {}", new_payment.loan_id)))?
        .to_domain();

        if loan.state().is_settled() {
            return Err(PortError::LoanSettled(loan.id));
        }

        let payment = sqlx::query_as::<_, PaymentRecord>(
            "INSERT INTO payments (loan_id, amount, paid_date) VALUES ($1, $2, $3) \
             RETURNING id, loan_id, amount, paid_date",
        )
        .bind(loan.id)
        .bind(new_payment.amount)
        .bind(new_payment.paid_date)
        .fetch_one(&mut *tx)
        .await
        .map_err(unexpected)?
        .to_domain();

        let total_paid: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount), 0)::BIGINT FROM payments WHERE loan_id = $1",
        )
        .bind(loan.id)
        .fetch_one(&mut *tx)
        .await
        .map_err(unexpected)?;

        if loan.apply_total_paid(total_paid) {
            sqlx::query("UPDATE loans SET is_paid = TRUE WHERE id = $1")
                .bind(loan.id)
                .execute(&mut *tx)
                .await
                .map_err(unexpected)?;
            debug!(loan_id = loan.id, total_paid, "loan settled");
        }

        tx.commit().await.map_err(unexpected)?;
        Ok(RecordedPayment { payment, loan })
    }

    async fn get_payments_for_loan(&self, loan_id: LoanId) -> PortResult<Vec<Payment>> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM loans WHERE id = $1)")
            .bind(loan_id)
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;
        if !exists {
            return Err(PortError::NotFound(format!("Loan {}", loan_id)));
        }

        let records = sqlx::query_as::<_, PaymentRecord>(
            "SELECT id, loan_id, amount, paid_date FROM payments WHERE loan_id = $1 ORDER BY id ASC",
        )
        .bind(loan_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let payments = records.into_iter().map(|r| r.to_domain()).collect();
        Ok(payments)
    }
}
