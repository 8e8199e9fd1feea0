use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use crate::api::AppState;
use crate::error::{AppError, AppResult};

const MAX_LOGIN_FAILURES: u32 = 5;
const LOGIN_WINDOW: Duration = Duration::from_secs(15 * 60);

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    username: String,
    password: String,
}

fn check_rate_limit(state: &AppState, username: &str) -> AppResult<()> {
    if let Some(entry) = state.login_attempts.get(username) {
        let (failures, window_start) = *entry;
        if failures >= MAX_LOGIN_FAILURES && window_start.elapsed() < LOGIN_WINDOW {
            return Err(AppError::TooManyRequests);
        }
    }
    Ok(())
}

fn record_failure(state: &AppState, username: &str) {
    let mut entry = state
        .login_attempts
        .entry(username.to_string())
        .or_insert((0, Instant::now()));
    if entry.1.elapsed() >= LOGIN_WINDOW {
        *entry = (1, Instant::now());
    } else {
        entry.0 += 1;
    }
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<Value>> {
    check_rate_limit(&state, &req.username)?;

    let row: Option<(String, String, String, i64)> = sqlx::query_as(
        "SELECT id, password, role, is_active FROM users WHERE username = ?"
    )
    .bind(&req.username)
    .fetch_optional(&state.db)
    .await?;

    let Some((user_id, password_hash, role, is_active)) = row else {
        record_failure(&state, &req.username);
        return Err(AppError::AuthFailed);
    };

    if is_active == 0 || !crate::auth::password::verify(&req.password, &password_hash) {
        record_failure(&state, &req.username);
        return Err(AppError::AuthFailed);
    }

    state.login_attempts.remove(&req.username);

    let token = crate::auth::jwt::generate(
        &user_id,
        &req.username,
        &role,
        &state.jwt_secret,
        state.jwt_expiry_hours,
    )
    .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(json!({
        "token": token,
        "expires_in": state.jwt_expiry_hours * 3600,
        "role": role,
    })))
}

pub async fn logout() -> AppResult<Json<Value>> {
    // JWT is stateless; client just discards the token.
    Ok(Json(json!({"success": true})))
}
