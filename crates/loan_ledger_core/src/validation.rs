//! crates/loan_ledger_core/src/validation.rs
//!
//! Field constraints for registration, loans and payments, expressed as pure
//! functions. Every violated field is reported, not just the first one.

use std::fmt;

use chrono::NaiveDate;

use crate::ledger::date_from_timestamp;

pub const PHONE_DIGITS: usize = 12;
pub const NAME_MIN_CHARS: usize = 3;
pub const NAME_MAX_CHARS: usize = 32;
pub const OCCUPATION_MAX_CHARS: usize = 32;
pub const PASSWORD_MAX_CHARS: usize = 128;
pub const MIN_AGE: i32 = 18;
/// Upper bound on loan and payment amounts.
pub const MAX_AMOUNT: i64 = i32::MAX as i64;

/// A single field that failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// All the fields that failed validation for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &'static str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.push(field, message);
        errors
    }

    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    /// `Ok(value)` when nothing was recorded, otherwise the collected errors.
    pub fn into_result<T>(self, value: T) -> Result<T, ValidationErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<&str> = self.errors.iter().map(|e| e.field).collect();
        write!(f, "invalid fields: {}", fields.join(", "))
    }
}

//=========================================================================================
// Raw inputs
//=========================================================================================

#[derive(Debug, Clone)]
pub struct Registration {
    pub phone: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub age: i32,
    pub monthly_earnings: i64,
    pub occupation: String,
}

#[derive(Debug, Clone, Copy)]
pub struct LoanRequest {
    pub amount: i64,
    pub created_at: i64,
    pub months: i32,
}

#[derive(Debug, Clone, Copy)]
pub struct PaymentRequest {
    pub amount: i64,
    pub paid_at: i64,
}

//=========================================================================================
// Single-field validators
//=========================================================================================

pub fn check_phone(errors: &mut ValidationErrors, phone: &str) {
    if phone.len() != PHONE_DIGITS || !phone.bytes().all(|b| b.is_ascii_digit()) {
        errors.push("phone", format!("must be exactly {PHONE_DIGITS} digits"));
    }
}

pub fn check_password(errors: &mut ValidationErrors, password: &str) {
    let len = password.chars().count();
    if len == 0 || len > PASSWORD_MAX_CHARS {
        errors.push(
            "password",
            format!("must be between 1 and {PASSWORD_MAX_CHARS} characters"),
        );
    }
}

pub fn check_name(errors: &mut ValidationErrors, field: &'static str, value: &str) {
    let len = value.trim().chars().count();
    if !(NAME_MIN_CHARS..=NAME_MAX_CHARS).contains(&len) {
        errors.push(
            field,
            format!("must be between {NAME_MIN_CHARS} and {NAME_MAX_CHARS} characters"),
        );
    }
}

pub fn check_age(errors: &mut ValidationErrors, age: i32) {
    if age < MIN_AGE {
        errors.push("age", format!("must be at least {MIN_AGE}"));
    }
}

pub fn check_occupation(errors: &mut ValidationErrors, occupation: &str) {
    if occupation.trim().chars().count() > OCCUPATION_MAX_CHARS {
        errors.push(
            "occupation",
            format!("must be at most {OCCUPATION_MAX_CHARS} characters"),
        );
    }
}

pub fn check_at_least(errors: &mut ValidationErrors, field: &'static str, value: i64, min: i64) {
    if value < min {
        errors.push(field, format!("must be at least {min}"));
    }
}

/// Loan and payment amounts: at least 1 and no more than `MAX_AMOUNT`.
pub fn check_amount(errors: &mut ValidationErrors, amount: i64) {
    if !(1..=MAX_AMOUNT).contains(&amount) {
        errors.push("amount", format!("must be between 1 and {MAX_AMOUNT}"));
    }
}

pub fn check_timestamp(
    errors: &mut ValidationErrors,
    field: &'static str,
    timestamp: i64,
) -> Option<NaiveDate> {
    let date = date_from_timestamp(timestamp);
    if date.is_none() {
        errors.push(field, "must be a valid unix timestamp");
    }
    date
}

//=========================================================================================
// Request validators
//=========================================================================================

/// A registration that passed validation, with names trimmed.
#[derive(Debug, Clone)]
pub struct ValidRegistration {
    pub phone: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub age: i32,
    pub monthly_earnings: i64,
    pub occupation: String,
}

pub fn validate_registration(input: Registration) -> Result<ValidRegistration, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    check_phone(&mut errors, &input.phone);
    check_password(&mut errors, &input.password);
    check_name(&mut errors, "firstName", &input.first_name);
    check_name(&mut errors, "lastName", &input.last_name);
    check_age(&mut errors, input.age);
    check_at_least(&mut errors, "monthlyEarnings", input.monthly_earnings, 0);
    check_occupation(&mut errors, &input.occupation);

    errors.into_result(ValidRegistration {
        phone: input.phone,
        password: input.password,
        first_name: input.first_name.trim().to_string(),
        last_name: input.last_name.trim().to_string(),
        age: input.age,
        monthly_earnings: input.monthly_earnings,
        occupation: input.occupation.trim().to_string(),
    })
}

/// Login only needs the shape of the credentials to be right.
pub fn validate_login(phone: &str, password: &str) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    check_phone(&mut errors, phone);
    check_password(&mut errors, password);
    errors.into_result(())
}

#[derive(Debug, Clone, Copy)]
pub struct ValidLoan {
    pub amount: i64,
    pub created_date: NaiveDate,
    pub months: i32,
}

pub fn validate_loan(input: LoanRequest) -> Result<ValidLoan, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    check_amount(&mut errors, input.amount);
    check_at_least(&mut errors, "months", i64::from(input.months), 1);
    let created_date = check_timestamp(&mut errors, "createdAt", input.created_at);

    match created_date {
        Some(created_date) if errors.is_empty() => Ok(ValidLoan {
            amount: input.amount,
            created_date,
            months: input.months,
        }),
        _ => Err(errors),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ValidPayment {
    pub amount: i64,
    pub paid_date: NaiveDate,
}

pub fn validate_payment(input: PaymentRequest) -> Result<ValidPayment, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    check_amount(&mut errors, input.amount);
    let paid_date = check_timestamp(&mut errors, "paidAt", input.paid_at);

    match paid_date {
        Some(paid_date) if errors.is_empty() => Ok(ValidPayment {
            amount: input.amount,
            paid_date,
        }),
        _ => Err(errors),
    }
}
