use anyhow::Result;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;
use crate::config::Config;
use std::str::FromStr;

pub mod audit;

pub type DbPool = SqlitePool;

pub async fn init(cfg: &Config) -> Result<DbPool> {
    let db_url = format!("sqlite://{}?mode=rwc", cfg.database.path);

    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(20)
        .connect_with(
            sqlx::sqlite::SqliteConnectOptions::from_str(&db_url)?
                .create_if_missing(true)
        )
        .await?;

    sqlx::migrate!("./src/db/migrations").run(&pool).await?;

    // WAL keeps readers unblocked while admin mutations write
    sqlx::query("PRAGMA journal_mode=WAL")
        .execute(&pool)
        .await?;

    sqlx::query("PRAGMA synchronous=NORMAL")
        .execute(&pool)
        .await?;

    tracing::info!("Database connected: {}", cfg.database.path);
    Ok(pool)
}

/// Create default admin user if no users exist yet.
pub async fn seed_admin(pool: &DbPool) -> Result<()> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;

    if count.0 == 0 {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let password = crate::auth::password::hash("admin")?;

        sqlx::query(
            "INSERT INTO users (id, username, password, role, is_active, created_at, updated_at)
             VALUES (?, ?, ?, 'super_admin', 1, ?, ?)"
        )
        .bind(&id)
        .bind("admin")
        .bind(&password)
        .bind(&now)
        .bind(&now)
        .execute(pool)
        .await?;

        tracing::warn!(
            "Created default admin user (username: admin, password: admin). \
             Change immediately in production!"
        );
    }

    Ok(())
}

/// Insert a handful of demo records for local development.
/// Idempotent: does nothing once any category exists. Only invoked when
/// seed.demo_data is enabled in configuration.
pub async fn seed_demo(pool: &DbPool) -> Result<()> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM form_categories")
        .fetch_one(pool)
        .await?;
    if count.0 > 0 {
        return Ok(());
    }

    let admin_id: Option<String> =
        sqlx::query_scalar("SELECT id FROM users ORDER BY created_at ASC LIMIT 1")
            .fetch_optional(pool)
            .await?;
    let Some(admin_id) = admin_id else {
        anyhow::bail!("Cannot seed demo data: no users exist");
    };

    let now = Utc::now().to_rfc3339();

    let category_id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO form_categories (id, name, description, is_active, created_by, created_at, updated_at)
         VALUES (?, 'Plumbing', 'Plumbing service requests', 1, ?, ?, ?)"
    )
    .bind(&category_id)
    .bind(&admin_id)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    let fields = serde_json::json!([
        { "name": "Issue description", "field_type": "textarea", "required": true },
        { "name": "Urgency", "field_type": "select", "options": ["Low", "Medium", "High"], "required": true },
        { "name": "Preferred date", "field_type": "date", "required": false }
    ]);
    sqlx::query(
        "INSERT INTO form_subcategories (id, name, category_id, description, is_active, fields, created_by, created_at, updated_at)
         VALUES (?, 'Leak repair', ?, NULL, 1, ?, ?, ?, ?)"
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&category_id)
    .bind(fields.to_string())
    .bind(&admin_id)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    sqlx::query(
        "INSERT INTO message_templates (id, name, subject, content, template_type, created_at, updated_at)
         VALUES (?, 'Appointment reminder', 'Your upcoming appointment', 'Hi {name}, this is a reminder about your appointment.', 'NOTIFICATION', ?, ?)"
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    tracing::info!("Seeded demo data");
    Ok(())
}
