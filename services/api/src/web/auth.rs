//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for registration, login, and logout.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use loan_ledger_core::{Registration, Requester, Session};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::error::{ApiError, MessageResponse};
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[schema(example = "380501234567")]
    pub phone: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub age: i32,
    pub monthly_earnings: i64,
    pub occupation: String,
}

impl From<RegisterRequest> for Registration {
    fn from(req: RegisterRequest) -> Self {
        Registration {
            phone: req.phone,
            password: req.password,
            first_name: req.first_name,
            last_name: req.last_name,
            age: req.age,
            monthly_earnings: req.monthly_earnings,
            occupation: req.occupation,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub phone: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user_id: i64,
    pub token: String,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        Self {
            user_id: session.user_id,
            token: session.token,
        }
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /user - Register a new user
#[utoipa::path(
    post,
    path = "/user",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User created", body = SessionResponse),
        (status = 400, description = "Invalid input", body = MessageResponse),
        (status = 409, description = "Phone already registered", body = MessageResponse),
        (status = 500, description = "Internal server error", body = MessageResponse)
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let session = state.ledger.create_user(req.into()).await?;
    Ok((StatusCode::CREATED, Json(SessionResponse::from(session))))
}

/// GET /user/login - Exchange phone and password for a fresh token
///
/// Credentials come from an `Authorization: Basic` header or a JSON body.
#[utoipa::path(
    get,
    path = "/user/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = SessionResponse),
        (status = 400, description = "Missing or malformed credentials", body = MessageResponse),
        (status = 401, description = "Wrong password", body = MessageResponse),
        (status = 404, description = "No user with this phone", body = MessageResponse)
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let creds = match basic_credentials(&headers)? {
        Some(creds) => creds,
        None if !body.is_empty() => serde_json::from_slice::<LoginRequest>(&body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid login body: {}", e)))?,
        None => return Err(ApiError::BadRequest("Missing credentials".to_string())),
    };

    let session = state
        .ledger
        .authenticate(&creds.phone, &creds.password)
        .await?;
    Ok((StatusCode::OK, Json(SessionResponse::from(session))))
}

/// GET /user/logout - Invalidate the caller's token
#[utoipa::path(
    get,
    path = "/user/logout",
    responses(
        (status = 200, description = "Logout successful", body = MessageResponse),
        (status = 401, description = "No valid token", body = MessageResponse)
    ),
    security(("bearer" = []))
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    Extension(requester): Extension<Requester>,
) -> Result<impl IntoResponse, ApiError> {
    state.ledger.logout(requester).await?;
    Ok((StatusCode::OK, Json(MessageResponse::new("Logged out"))))
}

/// Decodes `Authorization: Basic base64(phone:password)`, if present.
fn basic_credentials(headers: &HeaderMap) -> Result<Option<LoginRequest>, ApiError> {
    let Some(encoded) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Basic "))
    else {
        return Ok(None);
    };

    let malformed = || ApiError::BadRequest("Malformed basic auth header".to_string());
    let decoded = STANDARD.decode(encoded.trim()).map_err(|_| malformed())?;
    let decoded = String::from_utf8(decoded).map_err(|_| malformed())?;
    let (phone, password) = decoded.split_once(':').ok_or_else(malformed)?;

    Ok(Some(LoginRequest {
        phone: phone.to_string(),
        password: password.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn with_auth(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn decodes_basic_credentials() {
        let encoded = STANDARD.encode("380501234567:pa:ss");
        let creds = basic_credentials(&with_auth(&format!("Basic {encoded}")))
            .unwrap()
            .unwrap();
        assert_eq!(creds.phone, "380501234567");
        assert_eq!(creds.password, "pa:ss");
    }

    #[test]
    fn no_basic_header_is_not_an_error() {
        assert!(basic_credentials(&HeaderMap::new()).unwrap().is_none());
        assert!(basic_credentials(&with_auth("Bearer abc")).unwrap().is_none());
    }

    #[test]
    fn malformed_basic_header_is_rejected() {
        assert!(matches!(
            basic_credentials(&with_auth("Basic !!!")),
            Err(ApiError::BadRequest(_))
        ));
        let no_colon = STANDARD.encode("380501234567");
        assert!(basic_credentials(&with_auth(&format!("Basic {no_colon}"))).is_err());
    }
}
