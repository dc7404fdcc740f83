//! # SQLite Adapter
//!
//! Implements every port on top of the `costify-db` repositories.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use costify_core::{Id, Ingredient, IngredientUpdated, Recipe};
use costify_db::{Database, OutboxEntry};

use crate::error::StoreResult;
use crate::ports::{EventOutbox, IngredientSource, IngredientStore, RecipeStore};

/// All ports backed by one SQLite database.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        SqliteStore { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl IngredientSource for SqliteStore {
    async fn find_ingredient(&self, id: &Id) -> StoreResult<Option<Ingredient>> {
        Ok(self.db.ingredients().get_by_id(id).await?)
    }
}

#[async_trait]
impl IngredientStore for SqliteStore {
    async fn list_ingredients(&self) -> StoreResult<Vec<Ingredient>> {
        Ok(self.db.ingredients().list().await?)
    }

    async fn ingredient_name_taken(&self, name: &str) -> StoreResult<bool> {
        Ok(self.db.ingredients().exists_by_name(name).await?)
    }

    async fn insert_ingredient(&self, ingredient: &Ingredient) -> StoreResult<()> {
        Ok(self.db.ingredients().insert(ingredient).await?)
    }

    async fn update_ingredient(
        &self,
        previous: &Ingredient,
        ingredient: &Ingredient,
        event: &IngredientUpdated,
    ) -> StoreResult<()> {
        Ok(self
            .db
            .ingredients()
            .update_with_event(previous, ingredient, event)
            .await?)
    }
}

#[async_trait]
impl RecipeStore for SqliteStore {
    async fn find_recipe(&self, id: &Id) -> StoreResult<Option<Recipe>> {
        Ok(self.db.recipes().get_by_id(id).await?)
    }

    async fn find_recipes_by_ingredient(&self, ingredient_id: &Id) -> StoreResult<Vec<Recipe>> {
        Ok(self.db.recipes().find_by_ingredient_id(ingredient_id).await?)
    }

    async fn list_recipes(&self) -> StoreResult<Vec<Recipe>> {
        Ok(self.db.recipes().list().await?)
    }

    async fn recipe_name_taken(&self, name: &str) -> StoreResult<bool> {
        Ok(self.db.recipes().exists_by_name(name).await?)
    }

    async fn insert_recipe(&self, recipe: &Recipe) -> StoreResult<Recipe> {
        Ok(self.db.recipes().insert(recipe).await?)
    }

    async fn save_recipe(&self, recipe: &Recipe) -> StoreResult<Recipe> {
        Ok(self.db.recipes().save(recipe).await?)
    }
}

#[async_trait]
impl EventOutbox for SqliteStore {
    async fn entry(&self, event_id: Uuid) -> StoreResult<Option<OutboxEntry>> {
        Ok(self.db.outbox().get(event_id).await?)
    }

    async fn claim(&self, event_id: Uuid, stale_before: DateTime<Utc>) -> StoreResult<bool> {
        Ok(self.db.outbox().claim(event_id, stale_before).await?)
    }

    async fn pending(
        &self,
        older_than: DateTime<Utc>,
        stale_before: DateTime<Utc>,
        limit: u32,
    ) -> StoreResult<Vec<OutboxEntry>> {
        Ok(self.db.outbox().pending(older_than, stale_before, limit).await?)
    }

    async fn release(&self, event_id: Uuid, error: &str) -> StoreResult<()> {
        Ok(self.db.outbox().release(event_id, error).await?)
    }

    async fn mark_dispatched(&self, event_id: Uuid) -> StoreResult<()> {
        Ok(self.db.outbox().mark_dispatched(event_id).await?)
    }

    async fn mark_failed(&self, event_id: Uuid, error: &str) -> StoreResult<()> {
        Ok(self.db.outbox().mark_failed(event_id, error).await?)
    }

    async fn prune(&self, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        Ok(self.db.outbox().prune_dispatched(cutoff).await?)
    }
}
