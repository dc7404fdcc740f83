//! # Collaborator Ports
//!
//! The capabilities the cascade, the dispatcher and the use cases need from
//! storage. [`crate::store::SqliteStore`] backs them with SQLite and
//! [`crate::memory::InMemoryStore`] with plain maps.
//!
//! ```text
//! IngredientChangeCascade ──► IngredientSource + RecipeStore
//! EventDispatcher         ──► EventOutbox
//! CostingService          ──► IngredientStore + RecipeStore
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use costify_core::{Id, Ingredient, IngredientUpdated, Recipe};
use costify_db::OutboxEntry;

use crate::error::StoreResult;

/// Read access to the current ingredient snapshots.
#[async_trait]
pub trait IngredientSource: Send + Sync {
    async fn find_ingredient(&self, id: &Id) -> StoreResult<Option<Ingredient>>;
}

/// Ingredient writes. An update and its event commit together or not at all.
#[async_trait]
pub trait IngredientStore: IngredientSource {
    async fn list_ingredients(&self) -> StoreResult<Vec<Ingredient>>;

    /// Case-insensitive.
    async fn ingredient_name_taken(&self, name: &str) -> StoreResult<bool>;

    async fn insert_ingredient(&self, ingredient: &Ingredient) -> StoreResult<()>;

    /// Replaces the snapshot and records `event` in the outbox atomically.
    ///
    /// ## Errors
    /// * `NotFound` - the ingredient does not exist
    /// * `Conflict` - the stored ingredient no longer equals `previous`
    async fn update_ingredient(
        &self,
        previous: &Ingredient,
        ingredient: &Ingredient,
        event: &IngredientUpdated,
    ) -> StoreResult<()>;
}

/// Recipe reads and version-guarded writes.
#[async_trait]
pub trait RecipeStore: Send + Sync {
    async fn find_recipe(&self, id: &Id) -> StoreResult<Option<Recipe>>;

    /// Every recipe with at least one line using `ingredient_id`.
    async fn find_recipes_by_ingredient(&self, ingredient_id: &Id) -> StoreResult<Vec<Recipe>>;

    async fn list_recipes(&self) -> StoreResult<Vec<Recipe>>;

    /// Case-insensitive.
    async fn recipe_name_taken(&self, name: &str) -> StoreResult<bool>;

    async fn insert_recipe(&self, recipe: &Recipe) -> StoreResult<Recipe>;

    /// Persists `recipe` if the stored version equals `recipe.version()`.
    ///
    /// ## Errors
    /// * `NotFound` - the recipe was deleted
    /// * `Conflict` - someone saved it since it was read
    async fn save_recipe(&self, recipe: &Recipe) -> StoreResult<Recipe>;
}

/// Delivery bookkeeping for committed ingredient events.
#[async_trait]
pub trait EventOutbox: Send + Sync {
    async fn entry(&self, event_id: Uuid) -> StoreResult<Option<OutboxEntry>>;

    /// `true` for exactly one caller per undispatched event, unless the
    /// holder's claim dates from `stale_before` or earlier and is taken over.
    async fn claim(&self, event_id: Uuid, stale_before: DateTime<Utc>) -> StoreResult<bool>;

    /// Undispatched entries created at or before `older_than` with no live
    /// claim, oldest first.
    async fn pending(
        &self,
        older_than: DateTime<Utc>,
        stale_before: DateTime<Utc>,
        limit: u32,
    ) -> StoreResult<Vec<OutboxEntry>>;

    /// Drops the claim so the event can be claimed again.
    async fn release(&self, event_id: Uuid, error: &str) -> StoreResult<()>;

    /// Delivery finished.
    async fn mark_dispatched(&self, event_id: Uuid) -> StoreResult<()>;

    /// Delivery finished with an error; the event is not delivered again.
    async fn mark_failed(&self, event_id: Uuid, error: &str) -> StoreResult<()>;

    /// Deletes dispatched entries older than `cutoff`.
    async fn prune(&self, cutoff: DateTime<Utc>) -> StoreResult<u64>;
}
