//! End-to-end tests for forms, the customer directory, message templates,
//! and the audit trail.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use dashmap::DashMap;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use opsdesk::api::{build_app, AppState};

const TEST_SECRET: &str = "test-jwt-secret-for-directory-e2e-tests-32chars!!";

async fn setup() -> (Router, Arc<AppState>, String) {
    // A single connection keeps every query on the same in-memory database
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect(":memory:")
        .await
        .expect("Failed to create in-memory SQLite pool");

    sqlx::migrate!("./src/db/migrations")
        .run(&pool)
        .await
        .expect("Migration failed");

    let admin_id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    let password_hash = opsdesk::auth::password::hash("admin").expect("Failed to hash password");
    sqlx::query(
        "INSERT INTO users (id, username, password, role, is_active, created_at, updated_at)
         VALUES (?, 'admin', ?, 'super_admin', 1, ?, ?)"
    )
    .bind(&admin_id)
    .bind(&password_hash)
    .bind(&now)
    .bind(&now)
    .execute(&pool)
    .await
    .expect("Failed to seed admin user");

    let state = Arc::new(AppState {
        db: pool,
        jwt_secret: TEST_SECRET.to_string(),
        jwt_expiry_hours: 1,
        login_attempts: DashMap::new(),
    });
    let app = build_app(state.clone(), tower_http::cors::CorsLayer::new());
    let token = opsdesk::auth::jwt::generate(&admin_id, "admin", "super_admin", TEST_SECRET, 1)
        .expect("Failed to generate token");
    (app, state, token)
}

async fn request(
    app: &Router,
    method: &str,
    path: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let req = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(req).await.expect("Request failed");
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

fn customer_body(name: &str, email: &str) -> Value {
    json!({
        "name": name,
        "phone": "555-010-2030",
        "email": email,
        "address": {
            "line1": "12 Main St",
            "city": "Springfield",
            "state": "IL",
            "postal_code": "62701",
        },
    })
}

// ── Forms ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn form_name_and_url_collide_jointly() {
    let (app, _state, token) = setup().await;

    let (status, first) = request(
        &app,
        "POST",
        "/api/v1/forms",
        Some(&token),
        Some(json!({ "name": "Intake", "url": "/forms/intake" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Same name, different URL
    let (status, _) = request(
        &app,
        "POST",
        "/api/v1/forms",
        Some(&token),
        Some(json!({ "name": "Intake", "url": "/forms/other" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Different name, same URL
    let (status, _) = request(
        &app,
        "POST",
        "/api/v1/forms",
        Some(&token),
        Some(json!({ "name": "Other", "url": "/forms/intake" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Both unique
    let (status, second) = request(
        &app,
        "POST",
        "/api/v1/forms",
        Some(&token),
        Some(json!({ "name": "Feedback", "url": "/forms/feedback" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Updating onto another record's URL collides; own values do not
    let second_id = second["id"].as_str().unwrap();
    let (status, _) = request(
        &app,
        "PUT",
        &format!("/api/v1/forms/{}", second_id),
        Some(&token),
        Some(json!({ "name": "Feedback", "url": "/forms/intake" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = request(
        &app,
        "PUT",
        &format!("/api/v1/forms/{}", second_id),
        Some(&token),
        Some(json!({ "name": "Feedback", "url": "/forms/feedback" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let first_id = first["id"].as_str().unwrap();
    let (status, _) = request(&app, "DELETE", &format!("/api/v1/forms/{}", first_id), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = request(&app, "DELETE", &format!("/api/v1/forms/{}", first_id), Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn form_requires_name_and_url() {
    let (app, _state, token) = setup().await;

    let (status, _) = request(
        &app,
        "POST",
        "/api/v1/forms",
        Some(&token),
        Some(json!({ "name": "  ", "url": "/x" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = request(
        &app,
        "POST",
        "/api/v1/forms",
        Some(&token),
        Some(json!({ "name": "X", "url": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ── Customers ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn customer_service_url_is_normalized() {
    let (app, state, token) = setup().await;

    let mut body = customer_body("Jane Smith", "jane@example.com");
    body["service_category_url"] = json!("example.com/plumbing");
    let (status, created) = request(&app, "POST", "/api/v1/customers", Some(&token), Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["service_category_url"], "https://example.com/plumbing");

    // Empty string means the link is absent, stored as NULL
    let mut body = customer_body("Joe Bloggs", "joe@example.com");
    body["service_category_url"] = json!("");
    let (status, created) = request(&app, "POST", "/api/v1/customers", Some(&token), Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(created["service_category_url"].is_null());

    let stored: Option<String> = sqlx::query_scalar(
        "SELECT service_category_url FROM customers WHERE email = 'joe@example.com'"
    )
    .fetch_one(&state.db)
    .await
    .expect("Customer should exist");
    assert!(stored.is_none());

    // An explicit scheme is left alone
    let mut body = customer_body("Ann Oth", "ann@example.com");
    body["service_category_url"] = json!("http://legacy.example.com");
    let (_, created) = request(&app, "POST", "/api/v1/customers", Some(&token), Some(body)).await;
    assert_eq!(created["service_category_url"], "http://legacy.example.com");
}

#[tokio::test]
async fn customer_validation_reports_per_field_messages() {
    let (app, _state, token) = setup().await;

    let (status, body) = request(
        &app,
        "POST",
        "/api/v1/customers",
        Some(&token),
        Some(json!({
            "name": "",
            "phone": "123",
            "email": "not-an-email",
            "address": { "line1": "12 Main St", "city": "", "state": "IL" },
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Validation failed");
    assert!(body["fields"]["name"].is_string());
    assert!(body["fields"]["phone"].is_string());
    assert!(body["fields"]["email"].is_string());
    assert!(body["fields"]["address.city"].is_string());
    assert!(body["fields"]["address.line1"].is_null());
}

#[tokio::test]
async fn customer_email_must_be_unique() {
    let (app, _state, token) = setup().await;

    let (status, _) = request(
        &app,
        "POST",
        "/api/v1/customers",
        Some(&token),
        Some(customer_body("Jane Smith", "jane@example.com")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = request(
        &app,
        "POST",
        "/api/v1/customers",
        Some(&token),
        Some(customer_body("Other Jane", "jane@example.com")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("email"));

    // Updating a record keeping its own email is fine
    let (_, list) = request(&app, "GET", "/api/v1/customers", None, None).await;
    let id = list["data"][0]["id"].as_str().unwrap();
    let (status, _) = request(
        &app,
        "PUT",
        &format!("/api/v1/customers/{}", id),
        Some(&token),
        Some(customer_body("Jane Smith-Jones", "jane@example.com")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn customer_search_is_case_insensitive_and_capped() {
    let (app, _state, token) = setup().await;

    // Empty query is rejected outright
    let (status, _) = request(&app, "GET", "/api/v1/customers/search?q=", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = request(&app, "GET", "/api/v1/customers/search", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    for i in 0..12 {
        let (status, _) = request(
            &app,
            "POST",
            "/api/v1/customers",
            Some(&token),
            Some(customer_body(&format!("Smith Family {}", i), &format!("smith{}@example.com", i))),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }
    let (status, _) = request(
        &app,
        "POST",
        "/api/v1/customers",
        Some(&token),
        Some(customer_body("Pat Jones", "pat@example.com")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // 13 records match "smith" via name/email, but results are capped at 10
    let (status, body) = request(&app, "GET", "/api/v1/customers/search?q=SMITH", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 10);

    // Projection: contact card only, no internal id
    let first = &body["data"][0];
    assert!(first["name"].is_string());
    assert!(first["phone"].is_string());
    assert!(first["email"].is_string());
    assert!(first["address"]["city"].is_string());
    assert!(first.get("id").is_none());

    // Address fields are searched too
    let (_, body) = request(&app, "GET", "/api/v1/customers/search?q=springfield", None, None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 10);

    let (_, body) = request(&app, "GET", "/api/v1/customers/search?q=zzz-no-match", None, None).await;
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn customer_get_update_delete_missing_returns_404() {
    let (app, _state, token) = setup().await;

    let (status, _) = request(&app, "GET", "/api/v1/customers/no-such-id", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = request(
        &app,
        "PUT",
        "/api/v1/customers/no-such-id",
        Some(&token),
        Some(customer_body("Ghost", "ghost@example.com")),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = request(&app, "DELETE", "/api/v1/customers/no-such-id", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ── Message templates ─────────────────────────────────────────────────────────

#[tokio::test]
async fn template_create_requires_name_subject_content() {
    let (app, _state, token) = setup().await;

    let (status, body) = request(
        &app,
        "POST",
        "/api/v1/message-templates",
        Some(&token),
        Some(json!({ "subject": "Hello" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error = body["error"].as_str().unwrap();
    assert!(error.contains("name"));
    assert!(error.contains("content"));
    assert!(!error.contains("subject"));
}

#[tokio::test]
async fn template_type_defaults_to_alert_and_is_validated() {
    let (app, _state, token) = setup().await;

    let (status, created) = request(
        &app,
        "POST",
        "/api/v1/message-templates",
        Some(&token),
        Some(json!({ "name": "Welcome", "subject": "Hi", "content": "Welcome aboard" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["type"], "ALERT");

    let (status, _) = request(
        &app,
        "POST",
        "/api/v1/message-templates",
        Some(&token),
        Some(json!({ "name": "Sale", "subject": "Deals", "content": "...", "type": "PROMOTIONAL" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = request(
        &app,
        "POST",
        "/api/v1/message-templates",
        Some(&token),
        Some(json!({ "name": "Bad", "subject": "x", "content": "y", "type": "SPAM" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn template_partial_update_touches_only_provided_fields() {
    let (app, _state, token) = setup().await;

    let (_, created) = request(
        &app,
        "POST",
        "/api/v1/message-templates",
        Some(&token),
        Some(json!({ "name": "Reminder", "subject": "Old subject", "content": "Body text" })),
    )
    .await;
    let id = created["id"].as_str().unwrap();

    let (status, updated) = request(
        &app,
        "PUT",
        &format!("/api/v1/message-templates/{}", id),
        Some(&token),
        Some(json!({ "subject": "New subject" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["subject"], "New subject");
    assert_eq!(updated["name"], "Reminder");
    assert_eq!(updated["content"], "Body text");
    assert_ne!(updated["updated_at"], created["updated_at"]);

    let (status, _) = request(
        &app,
        "PUT",
        "/api/v1/message-templates/no-such-id",
        Some(&token),
        Some(json!({ "subject": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn template_send_test_echoes_without_dispatching() {
    let (app, _state, token) = setup().await;

    let (_, created) = request(
        &app,
        "POST",
        "/api/v1/message-templates",
        Some(&token),
        Some(json!({ "name": "Outage", "subject": "Service interruption", "content": "We will be offline." })),
    )
    .await;
    let id = created["id"].as_str().unwrap();

    let (status, body) = request(
        &app,
        "POST",
        &format!("/api/v1/message-templates/{}/test", id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["subject"], "Service interruption");
    assert_eq!(body["content"], "We will be offline.");

    let (status, _) = request(
        &app,
        "POST",
        "/api/v1/message-templates/no-such-id/test",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn template_delete_missing_returns_404() {
    let (app, _state, token) = setup().await;

    let (status, _) = request(
        &app,
        "DELETE",
        "/api/v1/message-templates/no-such-id",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ── Audit trail ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn mutations_are_audited() {
    let (app, _state, token) = setup().await;

    let (status, _) = request(
        &app,
        "POST",
        "/api/v1/forms",
        Some(&token),
        Some(json!({ "name": "Intake", "url": "/forms/intake" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // The audit write is fire-and-forget; give it a moment to land
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let (status, body) = request(&app, "GET", "/api/v1/audit-log?resource=form", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["data"][0]["action"], "create");
    assert_eq!(body["data"][0]["username"], "admin");
}
