use axum::{
    extract::{Path, State},
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
use crate::api::AppState;
use crate::auth::rbac::Permission;
use crate::db::audit;
use crate::error::{AppError, AppResult};

pub const TEMPLATE_TYPES: [&str; 3] = ["ALERT", "NOTIFICATION", "PROMOTIONAL"];

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateTemplateRequest {
    pub name: Option<String>,
    pub subject: Option<String>,
    pub content: Option<String>,
    #[serde(rename = "type")]
    pub template_type: Option<String>,
}

/// Partial update: fields absent from the request are left untouched,
/// which is distinct from a field explicitly set to an empty string.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateTemplateRequest {
    pub name: Option<String>,
    pub subject: Option<String>,
    pub content: Option<String>,
    #[serde(rename = "type")]
    pub template_type: Option<String>,
}

fn validate_template_type(template_type: &str) -> AppResult<()> {
    if TEMPLATE_TYPES.contains(&template_type) {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "Invalid template type: {}. Must be one of: {}",
            template_type,
            TEMPLATE_TYPES.join(", ")
        )))
    }
}

pub async fn list(State(state): State<Arc<AppState>>) -> AppResult<Json<Value>> {
    let rows: Vec<(String, String, String, String, String, String, String)> = sqlx::query_as(
        "SELECT id, name, subject, content, template_type, created_at, updated_at
         FROM message_templates ORDER BY created_at DESC"
    )
    .fetch_all(&state.db)
    .await?;

    let data: Vec<Value> = rows
        .into_iter()
        .map(|(id, name, subject, content, template_type, created_at, updated_at)| {
            json!({
                "id": id,
                "name": name,
                "subject": subject,
                "content": content,
                "type": template_type,
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
    Json(body): Json<CreateTemplateRequest>,
) -> AppResult<(StatusCode, Json<Value>)> {
    require_permission(&claims, Permission::ManageTemplates)?;

    // name, subject, content are all mandatory
    let mut missing: Vec<&str> = Vec::new();
    if body.name.as_deref().map(str::trim).unwrap_or_default().is_empty() {
        missing.push("name");
    }
    if body.subject.as_deref().map(str::trim).unwrap_or_default().is_empty() {
        missing.push("subject");
    }
    if body.content.as_deref().map(str::trim).unwrap_or_default().is_empty() {
        missing.push("content");
    }
    if !missing.is_empty() {
        return Err(AppError::Validation(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )));
    }

    let name = body.name.unwrap_or_default().trim().to_string();
    let subject = body.subject.unwrap_or_default().trim().to_string();
    let content = body.content.unwrap_or_default();
    let template_type = body.template_type.unwrap_or_else(|| "ALERT".to_string());
    validate_template_type(&template_type)?;

    let id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO message_templates (id, name, subject, content, template_type, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)"
    )
    .bind(&id)
    .bind(&name)
    .bind(&subject)
    .bind(&content)
    .bind(&template_type)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    audit::log_action(
        state.db.clone(),
        claims.sub.clone(),
        claims.username.clone(),
        "create",
        "message_template",
        Some(id.clone()),
        Some(name.clone()),
    );

    Ok((StatusCode::CREATED, Json(json!({
        "id": id,
        "name": name,
        "subject": subject,
        "content": content,
        "type": template_type,
        "created_at": now,
        "updated_at": now,
    }))))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(id): Path<String>,
    Json(body): Json<UpdateTemplateRequest>,
) -> AppResult<Json<Value>> {
    require_permission(&claims, Permission::ManageTemplates)?;

    let existing: Option<(String, String, String, String, String)> = sqlx::query_as(
        "SELECT name, subject, content, template_type, created_at
         FROM message_templates WHERE id = ?"
    )
    .bind(&id)
    .fetch_optional(&state.db)
    .await?;

    let (old_name, old_subject, old_content, old_type, created_at) = existing
        .ok_or_else(|| AppError::NotFound(format!("Message template {} not found", id)))?;

    if let Some(ref template_type) = body.template_type {
        validate_template_type(template_type)?;
    }

    let name = body.name.unwrap_or(old_name);
    let subject = body.subject.unwrap_or(old_subject);
    let content = body.content.unwrap_or(old_content);
    let template_type = body.template_type.unwrap_or(old_type);
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        "UPDATE message_templates SET name = ?, subject = ?, content = ?, template_type = ?, updated_at = ?
         WHERE id = ?"
    )
    .bind(&name)
    .bind(&subject)
    .bind(&content)
    .bind(&template_type)
    .bind(&now)
    .bind(&id)
    .execute(&state.db)
    .await?;

    audit::log_action(
        state.db.clone(),
        claims.sub.clone(),
        claims.username.clone(),
        "update",
        "message_template",
        Some(id.clone()),
        Some(name.clone()),
    );

    Ok(Json(json!({
        "id": id,
        "name": name,
        "subject": subject,
        "content": content,
        "type": template_type,
        "created_at": created_at,
        "updated_at": now,
    })))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    require_permission(&claims, Permission::ManageTemplates)?;

    let result = sqlx::query("DELETE FROM message_templates WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Message template {} not found", id)));
    }

    audit::log_action(
        state.db.clone(),
        claims.sub.clone(),
        claims.username.clone(),
        "delete",
        "message_template",
        Some(id.clone()),
        None,
    );

    Ok(Json(json!({ "message": "Message template deleted successfully" })))
}

/// Dry-run: echoes what would be sent. Actual delivery is handled by an
/// external service, never from here.
pub async fn send_test(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    require_permission(&claims, Permission::ManageTemplates)?;

    let row: Option<(String, String, String, String)> = sqlx::query_as(
        "SELECT name, subject, content, template_type FROM message_templates WHERE id = ?"
    )
    .bind(&id)
    .fetch_optional(&state.db)
    .await?;

    let (name, subject, content, template_type) = row
        .ok_or_else(|| AppError::NotFound(format!("Message template {} not found", id)))?;

    audit::log_action(
        state.db.clone(),
        claims.sub.clone(),
        claims.username.clone(),
        "send_test",
        "message_template",
        Some(id.clone()),
        Some(name.clone()),
    );

    Ok(Json(json!({
        "message": format!("Test message generated for template '{}'", name),
        "subject": subject,
        "content": content,
        "type": template_type,
    })))
}
