use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::sync::Arc;
use crate::auth::jwt::Claims;
use crate::auth::rbac::{has_permission, Permission};
use crate::error::AppError;
use crate::api::AppState;
use super::auth::AuthUser;

/// Axum extractor that requires the caller to have `admin` or `super_admin` role.
/// Returns 403 Forbidden if the authenticated user has an insufficient role.
pub struct AdminUser(pub Claims);

impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let AuthUser(claims) = AuthUser::from_request_parts(parts, state).await?;
        match claims.role.as_str() {
            "admin" | "super_admin" => Ok(AdminUser(claims)),
            _ => Err(AppError::Forbidden(
                "Admin or super_admin role required".to_string(),
            )),
        }
    }
}

/// Role check used inside mutation handlers once the caller is authenticated.
pub fn require_permission(claims: &Claims, permission: Permission) -> Result<(), AppError> {
    if has_permission(&claims.role, &permission) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "Role '{}' may not perform this action",
            claims.role
        )))
    }
}
