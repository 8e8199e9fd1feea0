use axum::{routing::{get, post, put, delete}, Router};
use std::sync::Arc;
use tower_http::services::{ServeDir, ServeFile};
use super::AppState;
use super::handlers;

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        // Health (public)
        .route("/health", get(handlers::health::health_check))
        // Auth (public)
        .route("/api/v1/auth/login", post(handlers::auth::login))
        .route("/api/v1/auth/logout", post(handlers::auth::logout))
        // Form categories (reads public, mutations protected)
        .route("/api/v1/categories", get(handlers::categories::list).post(handlers::categories::create))
        .route("/api/v1/categories/{id}", put(handlers::categories::update).delete(handlers::categories::delete))
        // Form subcategories
        .route("/api/v1/subcategories", get(handlers::subcategories::list).post(handlers::subcategories::create))
        .route("/api/v1/subcategories/{id}", get(handlers::subcategories::get))
        .route("/api/v1/subcategories/{id}", put(handlers::subcategories::update).delete(handlers::subcategories::delete))
        // Forms
        .route("/api/v1/forms", get(handlers::forms::list).post(handlers::forms::create))
        .route("/api/v1/forms/{id}", put(handlers::forms::update).delete(handlers::forms::delete))
        // Customers
        .route("/api/v1/customers", get(handlers::customers::list).post(handlers::customers::create))
        .route("/api/v1/customers/search", get(handlers::customers::search))
        .route("/api/v1/customers/{id}", get(handlers::customers::get))
        .route("/api/v1/customers/{id}", put(handlers::customers::update).delete(handlers::customers::delete))
        // Message templates
        .route("/api/v1/message-templates", get(handlers::message_templates::list).post(handlers::message_templates::create))
        .route("/api/v1/message-templates/{id}", put(handlers::message_templates::update).delete(handlers::message_templates::delete))
        .route("/api/v1/message-templates/{id}/test", post(handlers::message_templates::send_test))
        // Users (admin only)
        .route("/api/v1/users", get(handlers::users::list).post(handlers::users::create))
        .route("/api/v1/users/{id}/role", put(handlers::users::update_role))
        // Audit log (admin only)
        .route("/api/v1/audit-log", get(handlers::audit_log::list))
        .with_state(state)
        // Admin SPA static files + fallback (must come after with_state)
        .fallback_service(
            ServeDir::new("web/dist")
                .fallback(ServeFile::new("web/dist/index.html"))
        )
}
