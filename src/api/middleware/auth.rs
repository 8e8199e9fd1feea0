use axum::{
    extract::FromRequestParts,
    http::request::Parts,
};
use std::sync::Arc;
use crate::auth::jwt::Claims;
use crate::error::AppError;
use crate::api::AppState;

/// Axum extractor that validates a Bearer JWT token.
/// The credential is taken from the Authorization header, falling back to a
/// `token` cookie for browser clients. Add this as a handler parameter to
/// require authentication.
pub struct AuthUser(pub Claims);

fn bearer_token(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

fn cookie_token(parts: &Parts) -> Option<String> {
    let cookies = parts.headers.get("cookie")?.to_str().ok()?;
    cookies
        .split(';')
        .find_map(|pair| pair.trim().strip_prefix("token="))
        .map(str::to_string)
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .or_else(|| cookie_token(parts))
            .ok_or(AppError::AuthFailed)?;

        let claims = crate::auth::jwt::verify(&token, &state.jwt_secret)
            .map_err(|_| AppError::AuthFailed)?;

        Ok(AuthUser(claims))
    }
}
