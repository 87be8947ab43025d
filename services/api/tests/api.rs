//! End-to-end tests of the HTTP surface over the in-memory store.

use std::sync::Arc;

use api_lib::adapters::Argon2Credentials;
use api_lib::config::Config;
use api_lib::web::{self, AppState};
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use loan_ledger_core::{LedgerService, MemoryStore, NewLedgerService};
use rstest::{fixture, rstest};
use serde_json::{json, Value};
use tower::ServiceExt;

const ADMIN_PHONE: &str = "380000000001";
const MARCH_5_2024: i64 = 1_709_596_800;

#[fixture]
fn app() -> Router {
    let config = Config::from_lookup(|key| match key {
        "DATABASE_URL" => Some("postgres://unused".to_string()),
        "ADMIN_PHONES" => Some(ADMIN_PHONE.to_string()),
        _ => None,
    })
    .unwrap();
    let store = Arc::new(MemoryStore::new());
    let ledger = LedgerService::new(NewLedgerService {
        users: store.clone(),
        loans: store.clone(),
        payments: store,
        credentials: Arc::new(Argon2Credentials::new()),
        settings: config.ledger_settings(),
    });
    web::router(Arc::new(AppState {
        ledger: Arc::new(ledger),
    }))
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

fn registration(phone: &str) -> Value {
    json!({
        "phone": phone,
        "password": "correct horse",
        "firstName": "Olena",
        "lastName": "Shevchenko",
        "age": 30,
        "monthlyEarnings": 2500,
        "occupation": "Engineer"
    })
}

/// Registers a user and returns `(user_id, token)`.
async fn register(app: &Router, phone: &str) -> (i64, String) {
    let (status, body) = send(app, json_request("POST", "/user", None, registration(phone))).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    (
        body["userId"].as_i64().unwrap(),
        body["token"].as_str().unwrap().to_string(),
    )
}

async fn take_loan(app: &Router, token: &str, amount: i64) -> i64 {
    let (status, body) = send(
        app,
        json_request(
            "POST",
            "/loan",
            Some(token),
            json!({ "amount": amount, "createdAt": MARCH_5_2024, "months": 3 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["loanId"].as_i64().unwrap()
}

fn payment(amount: i64) -> Value {
    json!({ "amount": amount, "paidAt": MARCH_5_2024 + 86_400 })
}

#[rstest]
#[tokio::test]
async fn health_is_public(app: Router) {
    let (status, body) = send(&app, get("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "ok");
}

#[rstest]
#[tokio::test]
async fn registration_rejects_duplicate_phone(app: Router) {
    register(&app, "380501234567").await;
    let (status, body) = send(
        &app,
        json_request("POST", "/user", None, registration("380501234567")),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["message"].is_string());
}

#[rstest]
#[tokio::test]
async fn registration_reports_every_invalid_field(app: Router) {
    let mut body = registration("12345");
    body["age"] = json!(17);
    body["firstName"] = json!("Al");
    let (status, body) = send(&app, json_request("POST", "/user", None, body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let fields: Vec<&str> = body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"phone"));
    assert!(fields.contains(&"age"));
    assert!(fields.contains(&"firstName"));
}

#[rstest]
#[tokio::test]
async fn malformed_json_is_a_bad_request(app: Router) {
    let req = Request::builder()
        .method("POST")
        .uri("/user")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"phone\": "))
        .unwrap();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].is_string());
}

#[rstest]
#[tokio::test]
async fn login_rotates_token_and_logout_revokes_it(app: Router) {
    let (user_id, first_token) = register(&app, "380501234567").await;

    let basic = STANDARD.encode("380501234567:correct horse");
    let req = Request::builder()
        .method("GET")
        .uri("/user/login")
        .header(header::AUTHORIZATION, format!("Basic {basic}"))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["userId"].as_i64(), Some(user_id));
    let token = body["token"].as_str().unwrap().to_string();
    assert_ne!(token, first_token);

    let (status, _) = send(&app, get(&format!("/user/{user_id}"), Some(&first_token))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, get("/user/logout", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, get(&format!("/user/{user_id}"), Some(&token))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[rstest]
#[tokio::test]
async fn login_accepts_json_body(app: Router) {
    register(&app, "380501234567").await;
    let req = json_request(
        "GET",
        "/user/login",
        None,
        json!({ "phone": "380501234567", "password": "correct horse" }),
    );
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].is_string());
}

#[rstest]
#[case("380501234567", "wrong password", StatusCode::UNAUTHORIZED)]
#[case("380509999999", "correct horse", StatusCode::NOT_FOUND)]
#[tokio::test]
async fn login_failures(
    app: Router,
    #[case] phone: &str,
    #[case] password: &str,
    #[case] expected: StatusCode,
) {
    register(&app, "380501234567").await;
    let req = json_request(
        "GET",
        "/user/login",
        None,
        json!({ "phone": phone, "password": password }),
    );
    let (status, _) = send(&app, req).await;
    assert_eq!(status, expected);
}

#[rstest]
#[tokio::test]
async fn protected_routes_require_a_token(app: Router) {
    let (status, body) = send(&app, get("/loan/1", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["message"].is_string());

    let (status, _) = send(&app, get("/loan/1", Some("not-a-token"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[rstest]
#[tokio::test]
async fn token_can_be_passed_as_query_parameter(app: Router) {
    let (user_id, token) = register(&app, "380501234567").await;
    let (status, body) = send(&app, get(&format!("/user/{user_id}?api_key={token}"), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["phone"], "380501234567");
    assert!(body.get("password").is_none());
}

#[rstest]
#[tokio::test]
async fn payments_settle_a_loan(app: Router) {
    let (user_id, token) = register(&app, "380501234567").await;
    let loan_id = take_loan(&app, &token, 100).await;

    let (status, body) = send(
        &app,
        json_request("POST", &format!("/pay/{loan_id}"), Some(&token), payment(50)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["isPaid"], false);

    let (status, body) = send(
        &app,
        json_request("POST", &format!("/pay/{loan_id}"), Some(&token), payment(50)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["isPaid"], true);

    let (status, _) = send(
        &app,
        json_request("POST", &format!("/pay/{loan_id}"), Some(&token), payment(1)),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, loan) = send(&app, get(&format!("/loan/{loan_id}"), Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(loan["isPaid"], true);
    assert_eq!(loan["createdDate"], "2024-03-05");
    assert_eq!(loan["totalPaid"], 100);
    assert_eq!(loan["remaining"], 0);
    assert_eq!(loan["payments"].as_array().unwrap().len(), 2);

    let (status, payments) = send(&app, get(&format!("/pay/{loan_id}"), Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    let payments = payments.as_array().unwrap();
    assert_eq!(payments.len(), 2);
    assert_eq!(payments[0]["paidDate"], "2024-03-06");

    let (status, loans) = send(&app, get(&format!("/user/{user_id}/loans"), Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(loans.as_array().unwrap().len(), 1);
}

#[rstest]
#[tokio::test]
async fn strangers_are_forbidden_but_admins_may_read(app: Router) {
    let (owner_id, owner) = register(&app, "380501234567").await;
    let (_, stranger) = register(&app, "380507654321").await;
    let (_, admin) = register(&app, ADMIN_PHONE).await;
    let loan_id = take_loan(&app, &owner, 100).await;

    let (status, _) = send(&app, get(&format!("/loan/{loan_id}"), Some(&stranger))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app, get(&format!("/user/{owner_id}"), Some(&stranger))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(
        &app,
        json_request("POST", &format!("/pay/{loan_id}"), Some(&stranger), payment(10)),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, get(&format!("/loan/{loan_id}"), Some(&admin))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(
        &app,
        json_request("POST", &format!("/pay/{loan_id}"), Some(&admin), payment(10)),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[rstest]
#[tokio::test]
async fn deleting_a_user_removes_their_loans(app: Router) {
    let (owner_id, owner) = register(&app, "380501234567").await;
    let (_, admin) = register(&app, ADMIN_PHONE).await;
    let loan_id = take_loan(&app, &owner, 100).await;

    let req = Request::builder()
        .method("DELETE")
        .uri(format!("/user/{owner_id}"))
        .header(header::AUTHORIZATION, format!("Bearer {owner}"))
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, get(&format!("/loan/{loan_id}"), Some(&admin))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, get(&format!("/user/{owner_id}"), Some(&admin))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[rstest]
#[case(json!({ "amount": 0, "createdAt": MARCH_5_2024, "months": 3 }))]
#[case(json!({ "amount": 100, "createdAt": MARCH_5_2024, "months": 0 }))]
#[case(json!({ "amount": "lots", "createdAt": MARCH_5_2024, "months": 3 }))]
#[case(json!({ "amount": i64::MAX, "createdAt": MARCH_5_2024, "months": 3 }))]
#[tokio::test]
async fn invalid_loans_are_rejected(app: Router, #[case] body: Value) {
    let (_, token) = register(&app, "380501234567").await;
    let (status, _) = send(&app, json_request("POST", "/loan", Some(&token), body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[rstest]
#[tokio::test]
async fn malformed_ids_and_missing_loans(app: Router) {
    let (_, token) = register(&app, "380501234567").await;

    let (status, _) = send(&app, get("/loan/abc", Some(&token))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, get("/loan/9999", Some(&token))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        json_request("POST", "/pay/9999", Some(&token), payment(10)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
