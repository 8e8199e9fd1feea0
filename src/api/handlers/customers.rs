use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::middleware::auth::AuthUser;
use crate::api::middleware::rbac::require_permission;
use crate::api::validators::customer::{normalize_service_url, CustomerPayload, CustomerValidator};
use crate::api::AppState;
use crate::auth::rbac::Permission;
use crate::db::audit;
use crate::error::{AppError, AppResult};

/// Search results are capped; the admin UI shows a "refine your query" hint
/// beyond this.
const SEARCH_LIMIT: i64 = 10;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

type CustomerRow = (
    String, String, String, String,
    String, String, String, Option<String>,
    Option<String>, String, String,
);

const CUSTOMER_COLUMNS: &str =
    "id, name, phone, email, address_line1, address_city, address_state, address_postal_code,
     service_category_url, created_at, updated_at";

fn customer_json(row: CustomerRow) -> Value {
    let (id, name, phone, email, line1, city, state, postal_code, service_category_url, created_at, updated_at) = row;
    json!({
        "id": id,
        "name": name,
        "phone": phone,
        "email": email,
        "address": {
            "line1": line1,
            "city": city,
            "state": state,
            "postal_code": postal_code,
        },
        "service_category_url": service_category_url,
        "created_at": created_at,
        "updated_at": updated_at,
    })
}

pub async fn list(State(state): State<Arc<AppState>>) -> AppResult<Json<Value>> {
    let rows: Vec<CustomerRow> = sqlx::query_as(&format!(
        "SELECT {} FROM customers ORDER BY created_at DESC",
        CUSTOMER_COLUMNS
    ))
    .fetch_all(&state.db)
    .await?;

    let data: Vec<Value> = rows.into_iter().map(customer_json).collect();
    let count = data.len();
    Ok(Json(json!({ "data": data, "total": count })))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let row: Option<CustomerRow> = sqlx::query_as(&format!(
        "SELECT {} FROM customers WHERE id = ?",
        CUSTOMER_COLUMNS
    ))
    .bind(&id)
    .fetch_optional(&state.db)
    .await?;

    let row = row.ok_or_else(|| AppError::NotFound(format!("Customer {} not found", id)))?;
    Ok(Json(customer_json(row)))
}

/// Case-insensitive substring search across name, phone, email, and the
/// address line/city/state, capped at SEARCH_LIMIT rows and projected to the
/// contact card shape.
pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> AppResult<Json<Value>> {
    let query = params.q.unwrap_or_default();
    let query = query.trim();
    if query.is_empty() {
        return Err(AppError::Validation("Search query is required".to_string()));
    }

    let pattern = format!("%{}%", query.to_lowercase());

    let rows: Vec<(String, String, String, String, String, String, Option<String>)> = sqlx::query_as(
        "SELECT name, phone, email, address_line1, address_city, address_state, address_postal_code
         FROM customers
         WHERE LOWER(name) LIKE ?
            OR LOWER(phone) LIKE ?
            OR LOWER(email) LIKE ?
            OR LOWER(address_line1) LIKE ?
            OR LOWER(address_city) LIKE ?
            OR LOWER(address_state) LIKE ?
         ORDER BY created_at DESC
         LIMIT ?"
    )
    .bind(&pattern)
    .bind(&pattern)
    .bind(&pattern)
    .bind(&pattern)
    .bind(&pattern)
    .bind(&pattern)
    .bind(SEARCH_LIMIT)
    .fetch_all(&state.db)
    .await?;

    let data: Vec<Value> = rows
        .into_iter()
        .map(|(name, phone, email, line1, city, state, postal_code)| {
            json!({
                "name": name,
                "phone": phone,
                "email": email,
                "address": {
                    "line1": line1,
                    "city": city,
                    "state": state,
                    "postal_code": postal_code,
                },
            })
        })
        .collect();
    let count = data.len();
    Ok(Json(json!({ "data": data, "total": count })))
}

async fn check_email_unique(state: &AppState, email: &str, exclude_id: Option<&str>) -> AppResult<()> {
    let existing: Option<String> = match exclude_id {
        Some(id) => {
            sqlx::query_scalar("SELECT id FROM customers WHERE email = ? AND id != ?")
                .bind(email)
                .bind(id)
                .fetch_optional(&state.db)
                .await?
        }
        None => {
            sqlx::query_scalar("SELECT id FROM customers WHERE email = ?")
                .bind(email)
                .fetch_optional(&state.db)
                .await?
        }
    };

    if existing.is_some() {
        return Err(AppError::Duplicate(format!(
            "A customer with email '{}' already exists",
            email
        )));
    }
    Ok(())
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Json(body): Json<CustomerPayload>,
) -> AppResult<(StatusCode, Json<Value>)> {
    require_permission(&claims, Permission::ManageCustomers)?;

    let errors = CustomerValidator::new().validate(&body);
    if !errors.is_empty() {
        return Err(AppError::FieldErrors(errors));
    }

    let email = body.email.trim().to_string();
    check_email_unique(&state, &email, None).await?;

    let service_category_url = normalize_service_url(body.service_category_url.as_deref());

    let id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO customers
            (id, name, phone, email, address_line1, address_city, address_state, address_postal_code,
             service_category_url, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
    )
    .bind(&id)
    .bind(body.name.trim())
    .bind(body.phone.trim())
    .bind(&email)
    .bind(body.address.line1.trim())
    .bind(body.address.city.trim())
    .bind(body.address.state.trim())
    .bind(&body.address.postal_code)
    .bind(&service_category_url)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    audit::log_action(
        state.db.clone(),
        claims.sub.clone(),
        claims.username.clone(),
        "create",
        "customer",
        Some(id.clone()),
        Some(email.clone()),
    );

    Ok((StatusCode::CREATED, Json(json!({
        "id": id,
        "name": body.name.trim(),
        "phone": body.phone.trim(),
        "email": email,
        "address": {
            "line1": body.address.line1.trim(),
            "city": body.address.city.trim(),
            "state": body.address.state.trim(),
            "postal_code": body.address.postal_code,
        },
        "service_category_url": service_category_url,
        "created_at": now,
        "updated_at": now,
    }))))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(id): Path<String>,
    Json(body): Json<CustomerPayload>,
) -> AppResult<Json<Value>> {
    require_permission(&claims, Permission::ManageCustomers)?;

    let existing: Option<(String,)> = sqlx::query_as("SELECT created_at FROM customers WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?;

    let (created_at,) = existing
        .ok_or_else(|| AppError::NotFound(format!("Customer {} not found", id)))?;

    let errors = CustomerValidator::new().validate(&body);
    if !errors.is_empty() {
        return Err(AppError::FieldErrors(errors));
    }

    let email = body.email.trim().to_string();
    check_email_unique(&state, &email, Some(&id)).await?;

    let service_category_url = normalize_service_url(body.service_category_url.as_deref());
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        "UPDATE customers
         SET name = ?, phone = ?, email = ?, address_line1 = ?, address_city = ?, address_state = ?,
             address_postal_code = ?, service_category_url = ?, updated_at = ?
         WHERE id = ?"
    )
    .bind(body.name.trim())
    .bind(body.phone.trim())
    .bind(&email)
    .bind(body.address.line1.trim())
    .bind(body.address.city.trim())
    .bind(body.address.state.trim())
    .bind(&body.address.postal_code)
    .bind(&service_category_url)
    .bind(&now)
    .bind(&id)
    .execute(&state.db)
    .await?;

    audit::log_action(
        state.db.clone(),
        claims.sub.clone(),
        claims.username.clone(),
        "update",
        "customer",
        Some(id.clone()),
        Some(email.clone()),
    );

    Ok(Json(json!({
        "id": id,
        "name": body.name.trim(),
        "phone": body.phone.trim(),
        "email": email,
        "address": {
            "line1": body.address.line1.trim(),
            "city": body.address.city.trim(),
            "state": body.address.state.trim(),
            "postal_code": body.address.postal_code,
        },
        "service_category_url": service_category_url,
        "created_at": created_at,
        "updated_at": now,
    })))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    require_permission(&claims, Permission::ManageCustomers)?;

    let result = sqlx::query("DELETE FROM customers WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Customer {} not found", id)));
    }

    audit::log_action(
        state.db.clone(),
        claims.sub.clone(),
        claims.username.clone(),
        "delete",
        "customer",
        Some(id.clone()),
        None,
    );

    Ok(Json(json!({ "message": "Customer deleted successfully" })))
}
