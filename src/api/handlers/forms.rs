use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::middleware::auth::AuthUser;
use crate::api::middleware::rbac::require_permission;
use crate::api::AppState;
use crate::auth::rbac::Permission;
use crate::db::audit;
use crate::error::{AppError, AppResult};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FormRequest {
    pub name: String,
    pub url: String,
}

pub async fn list(State(state): State<Arc<AppState>>) -> AppResult<Json<Value>> {
    let rows: Vec<(String, String, String, String, String)> = sqlx::query_as(
        "SELECT id, name, url, created_at, updated_at FROM forms ORDER BY created_at DESC"
    )
    .fetch_all(&state.db)
    .await?;

    let data: Vec<Value> = rows
        .into_iter()
        .map(|(id, name, url, created_at, updated_at)| {
            json!({
                "id": id,
                "name": name,
                "url": url,
                "created_at": created_at,
                "updated_at": updated_at,
            })
        })
        .collect();
    let count = data.len();
    Ok(Json(json!({ "data": data, "total": count })))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Json(body): Json<FormRequest>,
) -> AppResult<Json<Value>> {
    require_permission(&claims, Permission::ManageForms)?;

    let name = body.name.trim().to_string();
    let url = body.url.trim().to_string();
    if name.is_empty() {
        return Err(AppError::Validation("Form name cannot be empty".to_string()));
    }
    if url.is_empty() {
        return Err(AppError::Validation("Form URL cannot be empty".to_string()));
    }

    // Name and URL are checked jointly: a collision on either blocks the create
    let collision: Option<String> = sqlx::query_scalar(
        "SELECT id FROM forms WHERE name = ? OR url = ?"
    )
    .bind(&name)
    .bind(&url)
    .fetch_optional(&state.db)
    .await?;

    if collision.is_some() {
        return Err(AppError::Duplicate(
            "A form with this name or URL already exists".to_string(),
        ));
    }

    let id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO forms (id, name, url, created_at, updated_at) VALUES (?, ?, ?, ?, ?)"
    )
    .bind(&id)
    .bind(&name)
    .bind(&url)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    audit::log_action(
        state.db.clone(),
        claims.sub.clone(),
        claims.username.clone(),
        "create",
        "form",
        Some(id.clone()),
        Some(name.clone()),
    );

    Ok(Json(json!({
        "id": id,
        "name": name,
        "url": url,
        "created_at": now,
        "updated_at": now,
    })))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(id): Path<String>,
    Json(body): Json<FormRequest>,
) -> AppResult<Json<Value>> {
    require_permission(&claims, Permission::ManageForms)?;

    let existing: Option<(String,)> = sqlx::query_as("SELECT created_at FROM forms WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?;

    let (created_at,) = existing
        .ok_or_else(|| AppError::NotFound(format!("Form {} not found", id)))?;

    let name = body.name.trim().to_string();
    let url = body.url.trim().to_string();
    if name.is_empty() {
        return Err(AppError::Validation("Form name cannot be empty".to_string()));
    }
    if url.is_empty() {
        return Err(AppError::Validation("Form URL cannot be empty".to_string()));
    }

    let collision: Option<String> = sqlx::query_scalar(
        "SELECT id FROM forms WHERE (name = ? OR url = ?) AND id != ?"
    )
    .bind(&name)
    .bind(&url)
    .bind(&id)
    .fetch_optional(&state.db)
    .await?;

    if collision.is_some() {
        return Err(AppError::Duplicate(
            "A form with this name or URL already exists".to_string(),
        ));
    }

    let now = Utc::now().to_rfc3339();

    sqlx::query("UPDATE forms SET name = ?, url = ?, updated_at = ? WHERE id = ?")
        .bind(&name)
        .bind(&url)
        .bind(&now)
        .bind(&id)
        .execute(&state.db)
        .await?;

    audit::log_action(
        state.db.clone(),
        claims.sub.clone(),
        claims.username.clone(),
        "update",
        "form",
        Some(id.clone()),
        Some(name.clone()),
    );

    Ok(Json(json!({
        "id": id,
        "name": name,
        "url": url,
        "created_at": created_at,
        "updated_at": now,
    })))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    require_permission(&claims, Permission::ManageForms)?;

    let result = sqlx::query("DELETE FROM forms WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Form {} not found", id)));
    }

    audit::log_action(
        state.db.clone(),
        claims.sub.clone(),
        claims.username.clone(),
        "delete",
        "form",
        Some(id.clone()),
        None,
    );

    Ok(Json(json!({ "message": "Form deleted successfully" })))
}
