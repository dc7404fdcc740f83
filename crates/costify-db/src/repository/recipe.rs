//! # Recipe Repository
//!
//! Database operations for recipes and their ordered ingredient lines.
//!
//! ## Version-Guarded Save
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  save(recipe @ version N)                                               │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │    UPDATE recipes SET ..., version = N + 1                              │
//! │    WHERE id = ? AND version = N                                         │
//! │       │                                                                 │
//! │       ├── 1 row  → rewrite lines, COMMIT, return recipe @ N + 1         │
//! │       │                                                                 │
//! │       └── 0 rows → row gone?      → NotFound                            │
//! │                    version moved? → VersionConflict (caller re-reads)   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Two cascades racing on the same recipe cannot silently overwrite each
//! other: the loser sees `VersionConflict` and recomputes from fresh rows.

use chrono::Utc;
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use costify_core::{Id, Money, Recipe, RecipeIngredient, Unit};

#[derive(Debug, FromRow)]
struct RecipeRow {
    id: String,
    name: String,
    total_cost_cents: i64,
    version: i64,
}

#[derive(Debug, FromRow)]
struct LineRow {
    ingredient_id: String,
    quantity: f64,
    unit: String,
}

impl TryFrom<LineRow> for RecipeIngredient {
    type Error = DbError;

    fn try_from(row: LineRow) -> DbResult<Self> {
        let unit: Unit = row.unit.parse()?;
        Ok(RecipeIngredient::new(Id::new(row.ingredient_id)?, row.quantity, unit)?)
    }
}

/// Repository for recipe database operations.
#[derive(Debug, Clone)]
pub struct RecipeRepository {
    pool: SqlitePool,
}

impl RecipeRepository {
    /// Creates a new RecipeRepository.
    pub fn new(pool: SqlitePool) -> Self {
        RecipeRepository { pool }
    }

    /// Gets a recipe with its lines.
    pub async fn get_by_id(&self, id: &Id) -> DbResult<Option<Recipe>> {
        let row: Option<RecipeRow> = sqlx::query_as(
            "SELECT id, name, total_cost_cents, version FROM recipes WHERE id = ?1",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    /// Every recipe with at least one line using `ingredient_id`.
    pub async fn find_by_ingredient_id(&self, ingredient_id: &Id) -> DbResult<Vec<Recipe>> {
        let rows: Vec<RecipeRow> = sqlx::query_as(
            r#"
            SELECT id, name, total_cost_cents, version
            FROM recipes
            WHERE id IN (
                SELECT recipe_id FROM recipe_ingredients WHERE ingredient_id = ?1
            )
            ORDER BY name COLLATE NOCASE
            "#,
        )
        .bind(ingredient_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        debug!(ingredient_id = %ingredient_id, count = rows.len(), "Found recipes using ingredient");

        let mut recipes = Vec::with_capacity(rows.len());
        for row in rows {
            recipes.push(self.hydrate(row).await?);
        }
        Ok(recipes)
    }

    /// Lists all recipes ordered by name, ignoring case.
    pub async fn list(&self) -> DbResult<Vec<Recipe>> {
        let rows: Vec<RecipeRow> = sqlx::query_as(
            "SELECT id, name, total_cost_cents, version FROM recipes ORDER BY name COLLATE NOCASE",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut recipes = Vec::with_capacity(rows.len());
        for row in rows {
            recipes.push(self.hydrate(row).await?);
        }
        Ok(recipes)
    }

    /// Case-insensitive name lookup.
    pub async fn exists_by_name(&self, name: &str) -> DbResult<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM recipes WHERE name = ?1 COLLATE NOCASE")
                .bind(name.trim())
                .fetch_one(&self.pool)
                .await?;

        Ok(count > 0)
    }

    /// Inserts a new recipe and its lines. The stored version is the
    /// recipe's current version.
    ///
    /// ## Errors
    /// * `ForeignKeyViolation` - a line references an unknown ingredient
    pub async fn insert(&self, recipe: &Recipe) -> DbResult<Recipe> {
        let now = Utc::now();

        debug!(id = %recipe.id(), name = %recipe.name(), "Inserting recipe");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO recipes (id, name, total_cost_cents, version, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            "#,
        )
        .bind(recipe.id().as_str())
        .bind(recipe.name())
        .bind(recipe.total_cost().cents()?)
        .bind(recipe.version())
        .bind(now)
        .execute(&mut *tx)
        .await?;

        write_lines(&mut *tx, recipe).await?;

        tx.commit().await?;
        Ok(recipe.clone())
    }

    /// Saves name, lines and total if the stored version still matches.
    ///
    /// ## Returns
    /// The saved recipe carrying its new version.
    ///
    /// ## Errors
    /// * `NotFound` - the recipe was deleted
    /// * `VersionConflict` - someone saved it since it was read
    pub async fn save(&self, recipe: &Recipe) -> DbResult<Recipe> {
        let now = Utc::now();
        let expected = recipe.version();

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE recipes SET
                name = ?2,
                total_cost_cents = ?3,
                version = version + 1,
                updated_at = ?4
            WHERE id = ?1 AND version = ?5
            "#,
        )
        .bind(recipe.id().as_str())
        .bind(recipe.name())
        .bind(recipe.total_cost().cents()?)
        .bind(now)
        .bind(expected)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            let exists: Option<i64> = sqlx::query_scalar("SELECT version FROM recipes WHERE id = ?1")
                .bind(recipe.id().as_str())
                .fetch_optional(&mut *tx)
                .await?;

            return Err(match exists {
                None => DbError::not_found("Recipe", recipe.id().as_str()),
                Some(_) => DbError::VersionConflict {
                    entity: "Recipe".to_string(),
                    id: recipe.id().to_string(),
                    expected,
                },
            });
        }

        sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = ?1")
            .bind(recipe.id().as_str())
            .execute(&mut *tx)
            .await?;
        write_lines(&mut *tx, recipe).await?;

        tx.commit().await?;

        debug!(
            id = %recipe.id(),
            version = expected + 1,
            total_cost = %recipe.total_cost(),
            "Saved recipe"
        );

        let mut saved = recipe.clone();
        saved.set_version(expected + 1);
        Ok(saved)
    }

    /// Deletes a recipe and its lines.
    pub async fn delete(&self, id: &Id) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM recipes WHERE id = ?1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Recipe", id.as_str()));
        }
        Ok(())
    }

    /// Counts recipes.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM recipes")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Loads the lines of a recipe row and builds the domain value.
    async fn hydrate(&self, row: RecipeRow) -> DbResult<Recipe> {
        let lines: Vec<LineRow> = sqlx::query_as(
            r#"
            SELECT ingredient_id, quantity, unit
            FROM recipe_ingredients
            WHERE recipe_id = ?1
            ORDER BY position
            "#,
        )
        .bind(row.id.as_str())
        .fetch_all(&self.pool)
        .await?;

        let lines = lines
            .into_iter()
            .map(RecipeIngredient::try_from)
            .collect::<DbResult<Vec<_>>>()?;

        Ok(Recipe::restore(
            Id::new(row.id)?,
            &row.name,
            lines,
            Money::from_cents(row.total_cost_cents)?,
            row.version,
        )?)
    }
}

async fn write_lines(conn: &mut SqliteConnection, recipe: &Recipe) -> DbResult<()> {
    for (position, line) in recipe.ingredients().iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO recipe_ingredients (recipe_id, position, ingredient_id, quantity, unit)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(recipe.id().as_str())
        .bind(position as i64)
        .bind(line.ingredient_id().as_str())
        .bind(line.quantity())
        .bind(line.unit().code())
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use costify_core::Ingredient;

    fn id(value: &str) -> Id {
        Id::new(value).unwrap()
    }

    async fn seeded() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        for (key, unit) in [("milk", Unit::L), ("sugar", Unit::Kg), ("flour", Unit::Kg)] {
            let ingredient =
                Ingredient::new(id(key), key, 1.0, Money::of(3.0).unwrap(), unit).unwrap();
            db.ingredients().insert(&ingredient).await.unwrap();
        }
        db
    }

    fn custard() -> Recipe {
        Recipe::new(
            id("custard"),
            "Custard",
            vec![
                RecipeIngredient::new(id("milk"), 0.5, Unit::L).unwrap(),
                RecipeIngredient::new(id("sugar"), 0.2, Unit::Kg).unwrap(),
                RecipeIngredient::new(id("milk"), 50.0, Unit::Ml).unwrap(),
            ],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_insert_round_trips_lines_in_order() {
        let db = seeded().await;
        let repo = db.recipes();
        repo.insert(&custard()).await.unwrap();

        let loaded = repo.get_by_id(&id("custard")).await.unwrap().unwrap();
        assert_eq!(loaded, custard());
        assert_eq!(loaded.ingredients()[2].unit(), Unit::Ml);
        assert!(repo.exists_by_name("custard").await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_ingredient_rejected() {
        let db = seeded().await;
        let recipe = Recipe::new(
            id("r"),
            "Mystery",
            vec![RecipeIngredient::new(id("unobtainium"), 1.0, Unit::G).unwrap()],
        )
        .unwrap();

        let err = db.recipes().insert(&recipe).await.unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
        assert_eq!(db.recipes().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_find_by_ingredient_id() {
        let db = seeded().await;
        let repo = db.recipes();
        repo.insert(&custard()).await.unwrap();
        repo.insert(
            &Recipe::new(
                id("bread"),
                "Bread",
                vec![RecipeIngredient::new(id("flour"), 0.5, Unit::Kg).unwrap()],
            )
            .unwrap(),
        )
        .await
        .unwrap();

        let with_milk = repo.find_by_ingredient_id(&id("milk")).await.unwrap();
        assert_eq!(with_milk.len(), 1);
        assert_eq!(with_milk[0].id().as_str(), "custard");

        assert!(repo.find_by_ingredient_id(&id("salt")).await.unwrap().is_empty());
        assert_eq!(repo.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_lists_order_names_ignoring_case() {
        let db = seeded().await;
        let repo = db.recipes();
        for (key, name) in [("b", "Buttered Milk"), ("a", "almond milk"), ("c", "cocoa")] {
            let recipe = Recipe::new(
                id(key),
                name,
                vec![RecipeIngredient::new(id("milk"), 0.2, Unit::L).unwrap()],
            )
            .unwrap();
            repo.insert(&recipe).await.unwrap();
        }

        let expected = ["almond milk", "Buttered Milk", "cocoa"];
        let names = |recipes: Vec<Recipe>| -> Vec<String> {
            recipes.iter().map(|r| r.name().to_string()).collect()
        };
        assert_eq!(names(repo.list().await.unwrap()), expected);
        assert_eq!(names(repo.find_by_ingredient_id(&id("milk")).await.unwrap()), expected);
    }

    #[tokio::test]
    async fn test_save_bumps_version_and_detects_conflict() {
        let db = seeded().await;
        let repo = db.recipes();
        let stored = repo.insert(&custard()).await.unwrap();

        let mut first = stored.clone();
        first.update_total_cost(Money::of(4.6).unwrap());
        let saved = repo.save(&first).await.unwrap();
        assert_eq!(saved.version(), 1);

        // Second writer still holds version 0
        let mut stale = stored.clone();
        stale.update_total_cost(Money::of(9.99).unwrap());
        let err = repo.save(&stale).await.unwrap_err();
        assert!(matches!(err, DbError::VersionConflict { expected: 0, .. }));

        let loaded = repo.get_by_id(&id("custard")).await.unwrap().unwrap();
        assert_eq!(loaded.total_cost(), Money::of(4.6).unwrap());
        assert_eq!(loaded.version(), 1);
    }

    #[tokio::test]
    async fn test_save_replaces_lines() {
        let db = seeded().await;
        let repo = db.recipes();
        let mut recipe = repo.insert(&custard()).await.unwrap();

        recipe.remove_ingredient(&id("milk")).unwrap();
        recipe.rename("Sweet Nothing").unwrap();
        repo.save(&recipe).await.unwrap();

        let loaded = repo.get_by_id(&id("custard")).await.unwrap().unwrap();
        assert_eq!(loaded.name(), "Sweet Nothing");
        assert_eq!(loaded.ingredient_ids(), vec![id("sugar")]);
    }

    #[tokio::test]
    async fn test_save_after_delete_is_not_found() {
        let db = seeded().await;
        let repo = db.recipes();
        let recipe = repo.insert(&custard()).await.unwrap();

        repo.delete(recipe.id()).await.unwrap();
        assert!(matches!(repo.save(&recipe).await, Err(DbError::NotFound { .. })));
        assert!(matches!(repo.delete(recipe.id()).await, Err(DbError::NotFound { .. })));
    }
}
