use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::middleware::auth::AuthUser;
use crate::api::middleware::rbac::require_permission;
use crate::api::validators::field::{FieldDefinition, FieldValidator};
use crate::api::AppState;
use crate::auth::rbac::Permission;
use crate::db::audit;
use crate::error::{AppError, AppResult};

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub category_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateSubcategoryRequest {
    pub name: String,
    pub category_id: String,
    pub description: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateSubcategoryRequest {
    pub name: String,
    pub category_id: String,
    pub description: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
    pub is_active: Option<bool>,
}

fn user_ref(id: Option<&str>, username: Option<&str>) -> Value {
    match id {
        Some(id) => json!({ "id": id, "username": username }),
        None => Value::Null,
    }
}

fn parse_fields(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| json!([]))
}

/// Field names are stored trimmed; validation has already passed at this point.
fn normalize_fields(fields: Vec<FieldDefinition>) -> Vec<FieldDefinition> {
    fields
        .into_iter()
        .map(|mut f| {
            f.name = f.name.trim().to_string();
            f.field_type = f.field_type.trim().to_string();
            f
        })
        .collect()
}

async fn category_name(state: &AppState, category_id: &str) -> AppResult<String> {
    let name: Option<String> = sqlx::query_scalar("SELECT name FROM form_categories WHERE id = ?")
        .bind(category_id)
        .fetch_optional(&state.db)
        .await?;
    name.ok_or_else(|| AppError::NotFound(format!("Category {} not found", category_id)))
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> AppResult<Json<Value>> {
    let base = "SELECT s.id, s.name, s.category_id, c.name, s.description, s.is_active, s.fields,
                       s.created_by, cu.username, s.updated_by, uu.username,
                       s.created_at, s.updated_at
                FROM form_subcategories s
                JOIN form_categories c ON c.id = s.category_id
                LEFT JOIN users cu ON cu.id = s.created_by
                LEFT JOIN users uu ON uu.id = s.updated_by";

    type Row = (
        String, String, String, String, Option<String>, i64, String,
        String, Option<String>, Option<String>, Option<String>,
        String, String,
    );

    let rows: Vec<Row> = if let Some(ref category_id) = params.category_id {
        sqlx::query_as(&format!("{} WHERE s.category_id = ? ORDER BY s.created_at DESC", base))
            .bind(category_id)
            .fetch_all(&state.db)
            .await?
    } else {
        sqlx::query_as(&format!("{} ORDER BY s.created_at DESC", base))
            .fetch_all(&state.db)
            .await?
    };

    let data: Vec<Value> = rows
        .into_iter()
        .map(|(id, name, category_id, category, description, is_active, fields,
               created_by, creator, updated_by, updater, created_at, updated_at)| {
            json!({
                "id": id,
                "name": name,
                "category_id": category_id,
                "category_name": category,
                "description": description,
                "is_active": is_active == 1,
                "fields": parse_fields(&fields),
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

pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let row: Option<(
        String, String, String, String, Option<String>, i64, String,
        String, Option<String>, Option<String>, Option<String>,
        String, String,
    )> = sqlx::query_as(
        "SELECT s.id, s.name, s.category_id, c.name, s.description, s.is_active, s.fields,
                s.created_by, cu.username, s.updated_by, uu.username,
                s.created_at, s.updated_at
         FROM form_subcategories s
         JOIN form_categories c ON c.id = s.category_id
         LEFT JOIN users cu ON cu.id = s.created_by
         LEFT JOIN users uu ON uu.id = s.updated_by
         WHERE s.id = ?"
    )
    .bind(&id)
    .fetch_optional(&state.db)
    .await?;

    let (id, name, category_id, category, description, is_active, fields,
         created_by, creator, updated_by, updater, created_at, updated_at) = row
        .ok_or_else(|| AppError::NotFound(format!("Subcategory {} not found", id)))?;

    Ok(Json(json!({
        "id": id,
        "name": name,
        "category_id": category_id,
        "category_name": category,
        "description": description,
        "is_active": is_active == 1,
        "fields": parse_fields(&fields),
        "created_by": user_ref(Some(created_by.as_str()), creator.as_deref()),
        "updated_by": user_ref(updated_by.as_deref(), updater.as_deref()),
        "created_at": created_at,
        "updated_at": updated_at,
    })))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Json(body): Json<CreateSubcategoryRequest>,
) -> AppResult<Json<Value>> {
    require_permission(&claims, Permission::ManageTaxonomy)?;

    let name = body.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::Validation("Subcategory name cannot be empty".to_string()));
    }

    // Parent must resolve before anything else
    let category = category_name(&state, &body.category_id).await?;

    // (name, category) pair uniqueness; the same name may exist in another category
    let collision: Option<String> = sqlx::query_scalar(
        "SELECT id FROM form_subcategories WHERE name = ? AND category_id = ?"
    )
    .bind(&name)
    .bind(&body.category_id)
    .fetch_optional(&state.db)
    .await?;

    if collision.is_some() {
        return Err(AppError::Duplicate(format!(
            "Subcategory '{}' already exists in category '{}'",
            name, category
        )));
    }

    FieldValidator::new().validate(&body.fields)?;
    let fields = normalize_fields(body.fields);
    let fields_json = serde_json::to_string(&fields)?;

    let id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO form_subcategories
            (id, name, category_id, description, is_active, fields, created_by, created_at, updated_at)
         VALUES (?, ?, ?, ?, 1, ?, ?, ?, ?)"
    )
    .bind(&id)
    .bind(&name)
    .bind(&body.category_id)
    .bind(&body.description)
    .bind(&fields_json)
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
        "subcategory",
        Some(id.clone()),
        Some(name.clone()),
    );

    Ok(Json(json!({
        "id": id,
        "name": name,
        "category_id": body.category_id,
        "category_name": category,
        "description": body.description,
        "is_active": true,
        "fields": serde_json::to_value(&fields)?,
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
    Json(body): Json<UpdateSubcategoryRequest>,
) -> AppResult<Json<Value>> {
    require_permission(&claims, Permission::ManageTaxonomy)?;

    let existing: Option<(String, String, Option<String>, i64, String, Option<String>, String)> = sqlx::query_as(
        "SELECT s.name, s.category_id, s.description, s.is_active, s.created_by, cu.username, s.created_at
         FROM form_subcategories s
         LEFT JOIN users cu ON cu.id = s.created_by
         WHERE s.id = ?"
    )
    .bind(&id)
    .fetch_optional(&state.db)
    .await?;

    let (old_name, old_category_id, old_description, old_is_active, created_by, creator, created_at) = existing
        .ok_or_else(|| AppError::NotFound(format!("Subcategory {} not found", id)))?;

    let name = body.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::Validation("Subcategory name cannot be empty".to_string()));
    }

    let category = category_name(&state, &body.category_id).await?;

    // Re-check pair uniqueness only when name or parent changed, excluding self
    if name != old_name || body.category_id != old_category_id {
        let collision: Option<String> = sqlx::query_scalar(
            "SELECT id FROM form_subcategories WHERE name = ? AND category_id = ? AND id != ?"
        )
        .bind(&name)
        .bind(&body.category_id)
        .bind(&id)
        .fetch_optional(&state.db)
        .await?;

        if collision.is_some() {
            return Err(AppError::Duplicate(format!(
                "Subcategory '{}' already exists in category '{}'",
                name, category
            )));
        }
    }

    // The full replacement field list is re-validated, not a diff
    FieldValidator::new().validate(&body.fields)?;
    let fields = normalize_fields(body.fields);
    let fields_json = serde_json::to_string(&fields)?;

    let description = body.description.or(old_description);
    let is_active = body.is_active.map(|b| b as i64).unwrap_or(old_is_active);
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        "UPDATE form_subcategories
         SET name = ?, category_id = ?, description = ?, is_active = ?, fields = ?, updated_by = ?, updated_at = ?
         WHERE id = ?"
    )
    .bind(&name)
    .bind(&body.category_id)
    .bind(&description)
    .bind(is_active)
    .bind(&fields_json)
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
        "subcategory",
        Some(id.clone()),
        Some(name.clone()),
    );

    Ok(Json(json!({
        "id": id,
        "name": name,
        "category_id": body.category_id,
        "category_name": category,
        "description": description,
        "is_active": is_active == 1,
        "fields": serde_json::to_value(&fields)?,
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

    let existing: Option<(String,)> = sqlx::query_as("SELECT name FROM form_subcategories WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?;

    let (name,) = existing
        .ok_or_else(|| AppError::NotFound(format!("Subcategory {} not found", id)))?;

    // Unconditional: form records carry no subcategory reference, so there
    // is nothing to protect here (unlike category deletion).
    sqlx::query("DELETE FROM form_subcategories WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;

    audit::log_action(
        state.db.clone(),
        claims.sub.clone(),
        claims.username.clone(),
        "delete",
        "subcategory",
        Some(id.clone()),
        Some(name.clone()),
    );

    Ok(Json(json!({ "message": format!("Subcategory '{}' deleted successfully", name) })))
}
