//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use loan_ledger_core::LedgerError;
use std::sync::Arc;
use tracing::debug;

use crate::error::ApiError;
use crate::web::state::AppState;

/// Middleware that resolves the caller's token into a `Requester`.
///
/// The token is read from an `Authorization: Bearer` header, falling back to
/// the `api_key` query parameter. If valid, the requester is inserted into the
/// request extensions for handlers to use; otherwise the request is rejected
/// with 401.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // 1. Find the token
    let token = presented_token(&req).ok_or_else(|| {
        debug!(path = %req.uri().path(), "request without a token");
        ApiError::Ledger(LedgerError::AuthenticationFailed)
    })?;

    // 2. Resolve it to a user
    let requester = state.ledger.authenticate_token(&token).await?;

    // 3. Insert the requester into request extensions
    req.extensions_mut().insert(requester);

    // 4. Continue to the handler
    Ok(next.run(req).await)
}

fn presented_token(req: &Request) -> Option<String> {
    let from_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    let from_query = || {
        req.uri().query().and_then(|query| {
            query
                .split('&')
                .find_map(|pair| pair.strip_prefix("api_key="))
                .filter(|t| !t.is_empty())
        })
    };

    from_header.or_else(from_query).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request(uri: &str, auth: Option<&str>) -> Request {
        let mut builder = Request::builder().uri(uri);
        if let Some(value) = auth {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn reads_bearer_header() {
        let req = request("/loan/1", Some("Bearer abc123"));
        assert_eq!(presented_token(&req).as_deref(), Some("abc123"));
    }

    #[test]
    fn falls_back_to_api_key_query() {
        let req = request("/loan/1?foo=bar&api_key=abc123", None);
        assert_eq!(presented_token(&req).as_deref(), Some("abc123"));
    }

    #[test]
    fn ignores_other_schemes() {
        let req = request("/loan/1", Some("Basic YWJjOmRlZg=="));
        assert_eq!(presented_token(&req), None);
    }
}
