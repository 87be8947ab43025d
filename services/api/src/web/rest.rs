//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the user, loan and payment endpoints and the
//! master definition for the OpenAPI specification.

use crate::error::{ApiError, FieldErrorBody, MessageResponse};
use crate::web::auth::{self, LoginRequest, RegisterRequest, SessionResponse};
use crate::web::state::AppState;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::NaiveDate;
use loan_ledger_core::{LoanDetails, LoanRequest, Payment, PaymentRequest, Requester, UserProfile};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::register_handler,
        auth::login_handler,
        auth::logout_handler,
        get_user_handler,
        delete_user_handler,
        list_user_loans_handler,
        create_loan_handler,
        get_loan_handler,
        pay_loan_handler,
        list_payments_handler,
        health_handler,
    ),
    components(
        schemas(
            RegisterRequest, LoginRequest, SessionResponse, UserView,
            CreateLoanRequest, CreatedLoanResponse, LoanView,
            PayLoanRequest, RecordedPaymentResponse, PaymentView,
            MessageResponse, FieldErrorBody,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "Loan Ledger API", description = "Users, loans and the payments that settle them.")
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// What a user may see of an account: no id, no credentials.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    phone: String,
    first_name: String,
    last_name: String,
    age: i32,
    monthly_earnings: i64,
    occupation: String,
}

impl From<UserProfile> for UserView {
    fn from(p: UserProfile) -> Self {
        Self {
            phone: p.phone,
            first_name: p.first_name,
            last_name: p.last_name,
            age: p.age,
            monthly_earnings: p.monthly_earnings,
            occupation: p.occupation,
        }
    }
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateLoanRequest {
    #[schema(example = 100)]
    pub amount: i64,
    /// Unix timestamp (seconds) of when the loan was taken out.
    #[schema(example = 1709596800)]
    pub created_at: i64,
    #[schema(example = 3)]
    pub months: i32,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatedLoanResponse {
    loan_id: i64,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoanView {
    loan_id: i64,
    user_id: i64,
    amount: i64,
    is_paid: bool,
    #[schema(value_type = String, example = "2024-03-05")]
    created_date: NaiveDate,
    months: i32,
    total_paid: i64,
    remaining: i64,
    /// Payment ids, oldest first.
    payments: Vec<i64>,
}

impl From<LoanDetails> for LoanView {
    fn from(details: LoanDetails) -> Self {
        let remaining = details.remaining();
        Self {
            loan_id: details.loan.id,
            user_id: details.loan.user_id,
            amount: details.loan.amount,
            is_paid: details.loan.is_paid,
            created_date: details.loan.created_date,
            months: details.loan.months,
            total_paid: details.total_paid,
            remaining,
            payments: details.payment_ids,
        }
    }
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PayLoanRequest {
    #[schema(example = 50)]
    pub amount: i64,
    /// Unix timestamp (seconds) of the payment.
    #[schema(example = 1709683200)]
    pub paid_at: i64,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecordedPaymentResponse {
    payment_id: i64,
    /// Whether this payment settled the loan.
    is_paid: bool,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentView {
    payment_id: i64,
    loan_id: i64,
    amount: i64,
    #[schema(value_type = String, example = "2024-03-06")]
    paid_date: NaiveDate,
}

impl From<Payment> for PaymentView {
    fn from(p: Payment) -> Self {
        Self {
            payment_id: p.id,
            loan_id: p.loan_id,
            amount: p.amount,
            paid_date: p.paid_date,
        }
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// GET /user/{id} - Read a user's profile
#[utoipa::path(
    get,
    path = "/user/{id}",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "The user", body = UserView),
        (status = 400, description = "Malformed id", body = MessageResponse),
        (status = 401, description = "No valid token", body = MessageResponse),
        (status = 403, description = "Not this user and not an admin", body = MessageResponse),
        (status = 404, description = "No such user", body = MessageResponse)
    ),
    security(("bearer" = []))
)]
pub async fn get_user_handler(
    State(state): State<Arc<AppState>>,
    Extension(requester): Extension<Requester>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(user_id) = id?;
    let profile = state.ledger.get_user(user_id, requester).await?;
    Ok(Json(UserView::from(profile)))
}

/// DELETE /user/{id} - Delete a user together with their loans and payments
#[utoipa::path(
    delete,
    path = "/user/{id}",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "User deleted", body = MessageResponse),
        (status = 400, description = "Malformed id", body = MessageResponse),
        (status = 401, description = "No valid token", body = MessageResponse),
        (status = 403, description = "Not this user and not an admin", body = MessageResponse),
        (status = 404, description = "No such user", body = MessageResponse)
    ),
    security(("bearer" = []))
)]
pub async fn delete_user_handler(
    State(state): State<Arc<AppState>>,
    Extension(requester): Extension<Requester>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(user_id) = id?;
    state.ledger.delete_user(user_id, requester).await?;
    Ok(Json(MessageResponse::new("User deleted")))
}

/// GET /user/{id}/loans - List a user's loans
#[utoipa::path(
    get,
    path = "/user/{id}/loans",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "The user's loans", body = [LoanView]),
        (status = 400, description = "Malformed id", body = MessageResponse),
        (status = 401, description = "No valid token", body = MessageResponse),
        (status = 403, description = "Not this user and not an admin", body = MessageResponse),
        (status = 404, description = "No such user", body = MessageResponse)
    ),
    security(("bearer" = []))
)]
pub async fn list_user_loans_handler(
    State(state): State<Arc<AppState>>,
    Extension(requester): Extension<Requester>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(user_id) = id?;
    let loans = state.ledger.list_loans(user_id, requester).await?;
    let views: Vec<LoanView> = loans.into_iter().map(LoanView::from).collect();
    Ok(Json(views))
}

/// POST /loan - Take out a loan
#[utoipa::path(
    post,
    path = "/loan",
    request_body = CreateLoanRequest,
    responses(
        (status = 201, description = "Loan created", body = CreatedLoanResponse),
        (status = 400, description = "Invalid input", body = MessageResponse),
        (status = 401, description = "No valid token", body = MessageResponse)
    ),
    security(("bearer" = []))
)]
pub async fn create_loan_handler(
    State(state): State<Arc<AppState>>,
    Extension(requester): Extension<Requester>,
    payload: Result<Json<CreateLoanRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let loan_id = state
        .ledger
        .create_loan(
            requester,
            LoanRequest {
                amount: req.amount,
                created_at: req.created_at,
                months: req.months,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(CreatedLoanResponse { loan_id })))
}

/// GET /loan/{id} - Read a loan and the ids of its payments
#[utoipa::path(
    get,
    path = "/loan/{id}",
    params(("id" = i64, Path, description = "Loan id")),
    responses(
        (status = 200, description = "The loan", body = LoanView),
        (status = 400, description = "Malformed id", body = MessageResponse),
        (status = 401, description = "No valid token", body = MessageResponse),
        (status = 403, description = "Not the owner and not an admin", body = MessageResponse),
        (status = 404, description = "No such loan", body = MessageResponse)
    ),
    security(("bearer" = []))
)]
pub async fn get_loan_handler(
    State(state): State<Arc<AppState>>,
    Extension(requester): Extension<Requester>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(loan_id) = id?;
    let details = state.ledger.get_loan(loan_id, requester).await?;
    Ok(Json(LoanView::from(details)))
}

/// POST /pay/{id} - Pay towards a loan
#[utoipa::path(
    post,
    path = "/pay/{id}",
    params(("id" = i64, Path, description = "Loan id")),
    request_body = PayLoanRequest,
    responses(
        (status = 201, description = "Payment recorded", body = RecordedPaymentResponse),
        (status = 400, description = "Invalid input", body = MessageResponse),
        (status = 401, description = "No valid token", body = MessageResponse),
        (status = 403, description = "Not the owner", body = MessageResponse),
        (status = 404, description = "No such loan", body = MessageResponse),
        (status = 409, description = "Loan already settled", body = MessageResponse)
    ),
    security(("bearer" = []))
)]
pub async fn pay_loan_handler(
    State(state): State<Arc<AppState>>,
    Extension(requester): Extension<Requester>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<PayLoanRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(loan_id) = id?;
    let Json(req) = payload?;
    let recorded = state
        .ledger
        .record_payment(
            loan_id,
            requester,
            PaymentRequest {
                amount: req.amount,
                paid_at: req.paid_at,
            },
        )
        .await?;
    let response = RecordedPaymentResponse {
        payment_id: recorded.payment.id,
        is_paid: recorded.loan.is_paid,
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /pay/{id} - List the payments made against a loan
#[utoipa::path(
    get,
    path = "/pay/{id}",
    params(("id" = i64, Path, description = "Loan id")),
    responses(
        (status = 200, description = "Payments, oldest first", body = [PaymentView]),
        (status = 400, description = "Malformed id", body = MessageResponse),
        (status = 401, description = "No valid token", body = MessageResponse),
        (status = 403, description = "Not the owner and not an admin", body = MessageResponse),
        (status = 404, description = "No such loan", body = MessageResponse)
    ),
    security(("bearer" = []))
)]
pub async fn list_payments_handler(
    State(state): State<Arc<AppState>>,
    Extension(requester): Extension<Requester>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(loan_id) = id?;
    let payments = state.ledger.list_payments(loan_id, requester).await?;
    let views: Vec<PaymentView> = payments.into_iter().map(PaymentView::from).collect();
    Ok(Json(views))
}

/// GET /health - Liveness probe
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = MessageResponse))
)]
pub async fn health_handler() -> Json<MessageResponse> {
    Json(MessageResponse::new("ok"))
}
