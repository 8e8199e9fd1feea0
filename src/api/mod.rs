use anyhow::Result;
use axum::Router;
use axum::http::{HeaderValue, Method, header};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use std::sync::Arc;
use std::time::Instant;
use dashmap::DashMap;
use crate::config::Config;
use crate::db::DbPool;

pub mod router;
pub mod middleware;
pub mod handlers;
pub mod validators;

pub struct AppState {
    pub db: DbPool,
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    /// Login failure tracking: username → (failure_count, window_start)
    pub login_attempts: DashMap<String, (u32, Instant)>,
}

pub async fn serve(cfg: Config, db: DbPool) -> Result<()> {
    let bind_addr = format!("{}:{}", cfg.api.bind, cfg.api.port);
    let state = Arc::new(AppState {
        db,
        jwt_secret: cfg.auth.jwt_secret.clone(),
        jwt_expiry_hours: cfg.auth.jwt_expiry_hours,
        login_attempts: DashMap::new(),
    });
    let cors = build_cors_layer(&cfg.api.cors_allowed_origins);
    let app = build_app(state, cors);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Management API listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

fn build_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    if origins.is_empty() {
        tracing::warn!("No valid CORS origins configured; CORS will block all cross-origin requests");
        return CorsLayer::new();
    }

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

pub fn build_app(state: Arc<AppState>, cors: CorsLayer) -> Router {
    Router::new()
        .merge(router::routes(state))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
