use anyhow::Result;

mod api;
mod auth;
mod config;
mod db;
mod error;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("opsdesk=info".parse()?)
        )
        .init();

    tracing::info!("Starting OpsDesk v{}", env!("CARGO_PKG_VERSION"));

    let cfg = config::load()?;
    tracing::info!("Configuration loaded");

    let db_pool = db::init(&cfg).await?;
    tracing::info!("Database initialized");

    // Seed initial admin user if none exist
    db::seed_admin(&db_pool).await?;

    // Demo records are only seeded when explicitly enabled in configuration
    if cfg.seed.demo_data {
        db::seed_demo(&db_pool).await?;
    }

    api::serve(cfg, db_pool).await?;

    Ok(())
}
