//! # Database Migrations
//!
//! Embedded SQL migrations for Costify.
//!
//! ## Schema
//! ```text
//! ┌──────────────────┐      ┌──────────────────────┐      ┌──────────────┐
//! │   ingredients    │◄─────┤  recipe_ingredients  ├─────►│   recipes    │
//! │  price in cents  │      │ (recipe_id, position)│      │ total_cost   │
//! └──────────────────┘      └──────────────────────┘      │ version      │
//!                                                         └──────────────┘
//! ┌──────────────────────────────────────────────────┐
//! │ ingredient_events (outbox)                        │
//! │ written with the ingredient row, claimed once     │
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! Files live in `migrations/sqlite/` as `NNN_description.sql` and are
//! append-only: a schema change is a new file, never an edit.

use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;

/// Embedded migrations from the workspace `migrations/sqlite` directory.
///
/// `sqlx::migrate!()` embeds the SQL files at compile time; nothing is read
/// from disk at runtime.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Runs all pending database migrations.
///
/// Idempotent. Each migration runs in its own transaction, in filename
/// order, and is recorded in `_sqlx_migrations`.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    info!("Checking for pending migrations");

    MIGRATOR.run(pool).await?;

    info!("All migrations applied successfully");
    Ok(())
}

/// Returns `(total_migrations, applied_migrations)` for diagnostics.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let total = MIGRATOR.migrations.len();

    // The table is missing until the first run
    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
        .unwrap_or(0);

    Ok((total, applied as usize))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_status_before_and_after() {
        let db = Database::new(DbConfig::in_memory().run_migrations(false))
            .await
            .unwrap();
        let (total, applied) = migration_status(db.pool()).await.unwrap();
        assert!(total >= 1);
        assert_eq!(applied, 0);

        db.run_migrations().await.unwrap();
        // Second run is a no-op
        db.run_migrations().await.unwrap();
        let (total, applied) = migration_status(db.pool()).await.unwrap();
        assert_eq!(total, applied);
    }
}
