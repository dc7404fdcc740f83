//! # Ingredient Repository
//!
//! Database operations for ingredients.
//!
//! ## Update = Row + Outbox, One Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  update_with_event(previous, ingredient, event)                         │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │    UPDATE ingredients SET ... WHERE id = ? AND <row still = previous>   │
//! │      0 rows → NotFound, or StaleSnapshot if another update won          │
//! │    INSERT INTO ingredient_events (id, ingredient_id, payload, ...)      │
//! │  COMMIT  ← both rows or neither                                         │
//! │                                                                         │
//! │  Rollback (error or drop) leaves no event row behind, so nothing can    │
//! │  ever deliver a price change that did not happen.                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::outbox::insert_event;
use costify_core::{Id, Ingredient, IngredientUpdated, Money, Unit};

/// Raw `ingredients` row.
#[derive(Debug, FromRow)]
struct IngredientRow {
    id: String,
    name: String,
    package_quantity: f64,
    package_price_cents: i64,
    package_unit: String,
}

impl TryFrom<IngredientRow> for Ingredient {
    type Error = DbError;

    fn try_from(row: IngredientRow) -> DbResult<Self> {
        let unit: Unit = row.package_unit.parse()?;
        Ok(Ingredient::new(
            Id::new(row.id)?,
            &row.name,
            row.package_quantity,
            Money::from_cents(row.package_price_cents)?,
            unit,
        )?)
    }
}

/// Repository for ingredient database operations.
#[derive(Debug, Clone)]
pub struct IngredientRepository {
    pool: SqlitePool,
}

impl IngredientRepository {
    /// Creates a new IngredientRepository.
    pub fn new(pool: SqlitePool) -> Self {
        IngredientRepository { pool }
    }

    /// Gets an ingredient by id.
    ///
    /// ## Returns
    /// * `Ok(Some(Ingredient))` - Ingredient found
    /// * `Ok(None)` - No such id
    pub async fn get_by_id(&self, id: &Id) -> DbResult<Option<Ingredient>> {
        let row: Option<IngredientRow> = sqlx::query_as(
            r#"
            SELECT id, name, package_quantity, package_price_cents, package_unit
            FROM ingredients
            WHERE id = ?1
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Ingredient::try_from).transpose()
    }

    /// Lists all ingredients ordered by name, ignoring case.
    pub async fn list(&self) -> DbResult<Vec<Ingredient>> {
        let rows: Vec<IngredientRow> = sqlx::query_as(
            r#"
            SELECT id, name, package_quantity, package_price_cents, package_unit
            FROM ingredients
            ORDER BY name COLLATE NOCASE
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Ingredient::try_from).collect()
    }

    /// Case-insensitive name lookup.
    pub async fn exists_by_name(&self, name: &str) -> DbResult<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM ingredients WHERE name = ?1 COLLATE NOCASE")
                .bind(name.trim())
                .fetch_one(&self.pool)
                .await?;

        Ok(count > 0)
    }

    /// Inserts a new ingredient.
    pub async fn insert(&self, ingredient: &Ingredient) -> DbResult<()> {
        let now = Utc::now();

        debug!(id = %ingredient.id(), name = %ingredient.name(), "Inserting ingredient");

        sqlx::query(
            r#"
            INSERT INTO ingredients (
                id, name, package_quantity, package_price_cents, package_unit,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            "#,
        )
        .bind(ingredient.id().as_str())
        .bind(ingredient.name())
        .bind(ingredient.package_quantity())
        .bind(ingredient.package_price().cents()?)
        .bind(ingredient.package_unit().code())
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Replaces an ingredient snapshot and records its event atomically.
    ///
    /// The row is only written while it still matches `previous`, the
    /// snapshot the change was computed from.
    ///
    /// ## Errors
    /// * `NotFound` - no ingredient with that id; nothing is written
    /// * `StaleSnapshot` - the row changed since `previous` was read; nothing is written
    pub async fn update_with_event(
        &self,
        previous: &Ingredient,
        ingredient: &Ingredient,
        event: &IngredientUpdated,
    ) -> DbResult<()> {
        let now = Utc::now();

        debug!(
            id = %ingredient.id(),
            event_id = %event.event_id,
            "Updating ingredient with outbox event"
        );

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE ingredients SET
                name = ?2,
                package_quantity = ?3,
                package_price_cents = ?4,
                package_unit = ?5,
                updated_at = ?6
            WHERE id = ?1
            AND name = ?7
            AND package_quantity = ?8
            AND package_price_cents = ?9
            AND package_unit = ?10
            "#,
        )
        .bind(ingredient.id().as_str())
        .bind(ingredient.name())
        .bind(ingredient.package_quantity())
        .bind(ingredient.package_price().cents()?)
        .bind(ingredient.package_unit().code())
        .bind(now)
        .bind(previous.name())
        .bind(previous.package_quantity())
        .bind(previous.package_price().cents()?)
        .bind(previous.package_unit().code())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            let exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ingredients WHERE id = ?1")
                .bind(ingredient.id().as_str())
                .fetch_one(&mut *tx)
                .await?;

            // tx drops here → rollback
            return Err(if exists == 0 {
                DbError::not_found("Ingredient", ingredient.id().as_str())
            } else {
                DbError::StaleSnapshot {
                    entity: "Ingredient".to_string(),
                    id: ingredient.id().to_string(),
                }
            });
        }

        insert_event(&mut *tx, event).await?;

        tx.commit().await?;
        Ok(())
    }

    /// Counts ingredients.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ingredients")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
