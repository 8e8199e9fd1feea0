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
pub struct CreateCategoryRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateCategoryRequest {
    pub name: String,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

fn user_ref(id: Option<&str>, username: Option<&str>) -> Value {
    match id {
        Some(id) => json!({ "id": id, "username": username }),
        None => Value::Null,
    }
}

pub async fn list(State(state): State<Arc<AppState>>) -> AppResult<Json<Value>> {
    let rows: Vec<(
        String, String, Option<String>, i64,
        String, Option<String>, Option<String>, Option<String>,
        String, String,
    )> = sqlx::query_as(
        "SELECT c.id, c.name, c.description, c.is_active,
                c.created_by, cu.username, c.updated_by, uu.username,
                c.created_at, c.updated_at
         FROM form_categories c
         LEFT JOIN users cu ON cu.id = c.created_by
         LEFT JOIN users uu ON uu.id = c.updated_by
         ORDER BY c.created_at DESC"
    )
    .fetch_all(&state.db)
    .await?;

    let data: Vec<Value> = rows
        .into_iter()
        .map(|(id, name, description, is_active, created_by, creator, updated_by, updater, created_at, updated_at)| {
            json!({
                "id": id,
                "name": name,
                "description": description,
                "is_active": is_active == 1,
                "created_by": user_ref(Some(created_by.as_str()), creator.as_deref()),
                "updated_by": user_ref(updated_by.as_deref(), updater.as_deref()),
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
    Json(body): Json<CreateCategoryRequest>,
) -> AppResult<Json<Value>> {
    require_permission(&claims, Permission::ManageTaxonomy)?;

    let name = body.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::Validation("Category name cannot be empty".to_string()));
    }

    // Exact-match uniqueness, case-sensitive
    let existing: Option<String> = sqlx::query_scalar("SELECT id FROM form_categories WHERE name = ?")
        .bind(&name)
        .fetch_optional(&state.db)
        .await?;

    if existing.is_some() {
        return Err(AppError::Duplicate(format!("Category '{}' already exists", name)));
    }

    let id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO form_categories (id, name, description, is_active, created_by, created_at, updated_at)
         VALUES (?, ?, ?, 1, ?, ?, ?)"
    )
    .bind(&id)
    .bind(&name)
    .bind(&body.description)
    .bind(&claims.sub)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    audit::log_action(
        state.db.clone(),
        claims.sub.clone(),
        claims.username.clone(),
        "create",
        "category",
        Some(id.clone()),
        Some(name.clone()),
    );

    Ok(Json(json!({
        "id": id,
        "name": name,
        "description": body.description,
        "is_active": true,
        "created_by": user_ref(Some(claims.sub.as_str()), Some(claims.username.as_str())),
        "updated_by": Value::Null,
        "created_at": now,
        "updated_at": now,
    })))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(id): Path<String>,
    Json(body): Json<UpdateCategoryRequest>,
) -> AppResult<Json<Value>> {
    require_permission(&claims, Permission::ManageTaxonomy)?;

    let existing: Option<(String, Option<String>, i64, String, Option<String>, String)> = sqlx::query_as(
        "SELECT c.name, c.description, c.is_active, c.created_by, cu.username, c.created_at
         FROM form_categories c
         LEFT JOIN users cu ON cu.id = c.created_by
         WHERE c.id = ?"
    )
    .bind(&id)
    .fetch_optional(&state.db)
    .await?;

    let (old_name, old_description, old_is_active, created_by, creator, created_at) = existing
        .ok_or_else(|| AppError::NotFound(format!("Category {} not found", id)))?;

    let name = body.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::Validation("Category name cannot be empty".to_string()));
    }

    // Re-check uniqueness only when the name actually changes, excluding self
    if name != old_name {
        let collision: Option<String> =
            sqlx::query_scalar("SELECT id FROM form_categories WHERE name = ? AND id != ?")
                .bind(&name)
                .bind(&id)
                .fetch_optional(&state.db)
                .await?;

        if collision.is_some() {
            return Err(AppError::Duplicate(format!("Category '{}' already exists", name)));
        }
    }

    let description = body.description.or(old_description);
    let is_active = body.is_active.map(|b| b as i64).unwrap_or(old_is_active);
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        "UPDATE form_categories SET name = ?, description = ?, is_active = ?, updated_by = ?, updated_at = ?
         WHERE id = ?"
    )
    .bind(&name)
    .bind(&description)
    .bind(is_active)
    .bind(&claims.sub)
    .bind(&now)
    .bind(&id)
    .execute(&state.db)
    .await?;

    audit::log_action(
        state.db.clone(),
        claims.sub.clone(),
        claims.username.clone(),
        "update",
        "category",
        Some(id.clone()),
        Some(name.clone()),
    );

    Ok(Json(json!({
        "id": id,
        "name": name,
        "description": description,
        "is_active": is_active == 1,
        "created_by": user_ref(Some(created_by.as_str()), creator.as_deref()),
        "updated_by": user_ref(Some(claims.sub.as_str()), Some(claims.username.as_str())),
        "created_at": created_at,
        "updated_at": now,
    })))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    require_permission(&claims, Permission::ManageTaxonomy)?;

    let existing: Option<(String,)> = sqlx::query_as("SELECT name FROM form_categories WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?;

    let (name,) = existing
        .ok_or_else(|| AppError::NotFound(format!("Category {} not found", id)))?;

    // A category that still owns subcategories cannot be removed
    let dependents: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM form_subcategories WHERE category_id = ?"
    )
    .bind(&id)
    .fetch_one(&state.db)
    .await?;

    if dependents > 0 {
        return Err(AppError::DependentsExist(format!(
            "Category '{}' still has {} subcategories",
            name, dependents
        )));
    }

    sqlx::query("DELETE FROM form_categories WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;

    audit::log_action(
        state.db.clone(),
        claims.sub.clone(),
        claims.username.clone(),
        "delete",
        "category",
        Some(id.clone()),
        Some(name.clone()),
    );

    Ok(Json(json!({ "message": format!("Category '{}' deleted successfully", name) })))
}
