//! # Ingredient Change Cascade
//!
//! Brings every recipe that uses an ingredient back in line with that
//! ingredient's current price.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    on_ingredient_changed(id)                            │
//! │                                                                         │
//! │  1. find_recipes_by_ingredient(id) ── none ──► empty report, no writes │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  2. for each recipe (up to max_concurrent_recipes at once):            │
//! │                                                                         │
//! │     ┌──────────────────────────────────────────────────────────────┐   │
//! │     │ load every referenced ingredient from the source of truth    │   │
//! │     │ calculate ── total unchanged ──► Unchanged (no write)        │   │
//! │     │ save_recipe(version-guarded)                                 │   │
//! │     │   Ok        ──► Updated                                      │   │
//! │     │   NotFound  ──► Deleted (skipped)                            │   │
//! │     │   Conflict  ──► re-read recipe, start over                   │   │
//! │     │                 (at most max_conflict_retries times)         │   │
//! │     │   other     ──► failure recorded, siblings carry on          │   │
//! │     └──────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  3. CascadeReport: updated / unchanged / deleted / failures            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A retry always re-reads the ingredients, so the last write for a recipe
//! is computed from prices that were committed before it started.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use tracing::{debug, error, info, warn};

use costify_core::{CoreError, CostCalculator, Id, Ingredient, Money, Recipe};

use crate::config::CascadeSettings;
use crate::error::{CascadeError, StoreError, StoreResult};
use crate::ports::{IngredientSource, RecipeStore};

// =============================================================================
// Report
// =============================================================================

/// A recipe whose stored total changed.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeUpdate {
    pub recipe_id: Id,
    pub previous_total: Money,
    pub new_total: Money,
    pub version: i64,
}

/// A recipe the cascade could not bring up to date.
#[derive(Debug)]
pub struct RecipeFailure {
    pub recipe_id: Id,
    pub error: CascadeError,
}

/// Outcome of one cascade run.
#[derive(Debug)]
pub struct CascadeReport {
    pub ingredient_id: Id,
    pub updated: Vec<RecipeUpdate>,
    /// Already carrying the right total.
    pub unchanged: Vec<Id>,
    /// Deleted while the cascade ran.
    pub deleted: Vec<Id>,
    pub failures: Vec<RecipeFailure>,
}

impl CascadeReport {
    fn new(ingredient_id: Id) -> Self {
        CascadeReport {
            ingredient_id,
            updated: Vec::new(),
            unchanged: Vec::new(),
            deleted: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Number of affected recipes.
    pub fn affected(&self) -> usize {
        self.updated.len() + self.unchanged.len() + self.deleted.len() + self.failures.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// One line per failure, for the outbox `last_error` column.
    pub fn failure_summary(&self) -> Option<String> {
        if self.failures.is_empty() {
            return None;
        }
        Some(
            self.failures
                .iter()
                .map(|f| format!("{}: {}", f.recipe_id, f.error))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    fn record(&mut self, recipe_id: Id, outcome: Result<RecipeOutcome, CascadeError>) {
        match outcome {
            Ok(RecipeOutcome::Updated(update)) => self.updated.push(update),
            Ok(RecipeOutcome::Unchanged) => self.unchanged.push(recipe_id),
            Ok(RecipeOutcome::Deleted) => self.deleted.push(recipe_id),
            Err(error) => self.failures.push(RecipeFailure { recipe_id, error }),
        }
    }
}

enum RecipeOutcome {
    Updated(RecipeUpdate),
    Unchanged,
    Deleted,
}

// =============================================================================
// Cascade
// =============================================================================

/// Recomputes and persists the totals of recipes affected by an ingredient
/// change.
pub struct IngredientChangeCascade {
    ingredients: Arc<dyn IngredientSource>,
    recipes: Arc<dyn RecipeStore>,
    calculator: CostCalculator,
    settings: CascadeSettings,
}

impl IngredientChangeCascade {
    pub fn new(
        ingredients: Arc<dyn IngredientSource>,
        recipes: Arc<dyn RecipeStore>,
        settings: CascadeSettings,
    ) -> Self {
        IngredientChangeCascade {
            ingredients,
            recipes,
            calculator: CostCalculator::new(),
            settings,
        }
    }

    /// Runs the cascade for one ingredient.
    ///
    /// Per-recipe failures never abort siblings; they are logged and listed
    /// in the report.
    ///
    /// ## Errors
    /// Only when the affected recipes cannot be looked up at all. Nothing
    /// has been written in that case.
    pub async fn on_ingredient_changed(&self, ingredient_id: &Id) -> StoreResult<CascadeReport> {
        let affected = self.recipes.find_recipes_by_ingredient(ingredient_id).await?;
        let mut report = CascadeReport::new(ingredient_id.clone());

        if affected.is_empty() {
            debug!(ingredient_id = %ingredient_id, "No recipes use ingredient");
            return Ok(report);
        }

        debug!(
            ingredient_id = %ingredient_id,
            count = affected.len(),
            "Recomputing affected recipes"
        );

        let outcomes: Vec<(Id, Result<RecipeOutcome, CascadeError>)> = stream::iter(affected)
            .map(|recipe| async move {
                let recipe_id = recipe.id().clone();
                (recipe_id, self.recompute(recipe).await)
            })
            .buffer_unordered(self.settings.max_concurrent_recipes.max(1))
            .collect()
            .await;

        for (recipe_id, outcome) in outcomes {
            if let Err(e) = &outcome {
                error!(
                    ingredient_id = %ingredient_id,
                    recipe_id = %recipe_id,
                    kind = %e.kind(),
                    error = %e,
                    "Recipe recalculation failed"
                );
            }
            report.record(recipe_id, outcome);
        }

        info!(
            ingredient_id = %ingredient_id,
            updated = report.updated.len(),
            unchanged = report.unchanged.len(),
            deleted = report.deleted.len(),
            failed = report.failures.len(),
            "Cascade finished"
        );

        Ok(report)
    }

    /// Read-recompute-write for one recipe, retrying on version conflicts.
    async fn recompute(&self, mut recipe: Recipe) -> Result<RecipeOutcome, CascadeError> {
        let mut conflicts = 0u32;

        loop {
            let ingredients = self.load_ingredients(&recipe).await?;
            let cost = self.calculator.calculate(&recipe, &ingredients)?;

            let previous_total = recipe.total_cost();
            if cost.total_cost == previous_total {
                return Ok(RecipeOutcome::Unchanged);
            }

            recipe.update_total_cost(cost.total_cost);
            match self.recipes.save_recipe(&recipe).await {
                Ok(saved) => {
                    debug!(
                        recipe_id = %saved.id(),
                        previous = %previous_total,
                        total = %saved.total_cost(),
                        version = saved.version(),
                        "Recipe total updated"
                    );
                    return Ok(RecipeOutcome::Updated(RecipeUpdate {
                        recipe_id: saved.id().clone(),
                        previous_total,
                        new_total: saved.total_cost(),
                        version: saved.version(),
                    }));
                }
                Err(StoreError::NotFound { .. }) => {
                    warn!(recipe_id = %recipe.id(), "Recipe deleted during cascade, skipping");
                    return Ok(RecipeOutcome::Deleted);
                }
                Err(StoreError::Conflict { .. }) => {
                    conflicts += 1;
                    if conflicts > self.settings.max_conflict_retries {
                        return Err(CascadeError::ConflictRetriesExhausted {
                            recipe_id: recipe.id().clone(),
                            attempts: conflicts,
                        });
                    }
                    debug!(recipe_id = %recipe.id(), conflicts, "Version conflict, re-reading recipe");
                    match self.recipes.find_recipe(recipe.id()).await? {
                        Some(fresh) => recipe = fresh,
                        None => return Ok(RecipeOutcome::Deleted),
                    }
                }
                Err(other) => return Err(other.into()),
            }
        }
    }

    /// Reads every ingredient the recipe references.
    async fn load_ingredients(&self, recipe: &Recipe) -> Result<HashMap<Id, Ingredient>, CascadeError> {
        let mut loaded = HashMap::new();
        for id in recipe.ingredient_ids() {
            let ingredient = self
                .ingredients
                .find_ingredient(&id)
                .await?
                .ok_or_else(|| CoreError::IngredientNotFound(id.clone()))?;
            loaded.insert(id, ingredient);
        }
        Ok(loaded)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use crate::ports::{IngredientStore, RecipeStore};
    use async_trait::async_trait;
    use costify_core::{IngredientChanges, RecipeIngredient, Unit};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn id(value: &str) -> Id {
        Id::new(value).unwrap()
    }

    fn money(value: f64) -> Money {
        Money::of(value).unwrap()
    }

    fn line(ingredient: &str, quantity: f64, unit: Unit) -> RecipeIngredient {
        RecipeIngredient::new(id(ingredient), quantity, unit).unwrap()
    }

    /// Milk $5.00/L, sugar $3.00/kg, flour $5.00/kg; custard, hot milk and bread.
    async fn pantry() -> InMemoryStore {
        let store = InMemoryStore::new();
        for (key, name, price, unit) in [
            ("milk", "Milk", 5.0, Unit::L),
            ("sugar", "Sugar", 3.0, Unit::Kg),
            ("flour", "Flour", 5.0, Unit::Kg),
        ] {
            let ingredient = Ingredient::new(id(key), name, 1.0, money(price), unit).unwrap();
            store.insert_ingredient(&ingredient).await.unwrap();
        }

        let recipes = [
            ("custard", "Custard", vec![line("milk", 0.5, Unit::L), line("sugar", 0.2, Unit::Kg)], 3.10),
            ("hot-milk", "Hot Milk", vec![line("milk", 0.3, Unit::L)], 1.50),
            ("bread", "Bread", vec![line("flour", 300.0, Unit::G)], 1.50),
        ];
        for (key, name, lines, total) in recipes {
            let mut recipe = Recipe::new(id(key), name, lines).unwrap();
            recipe.update_total_cost(money(total));
            store.insert_recipe(&recipe).await.unwrap();
        }
        store
    }

    async fn set_price(store: &InMemoryStore, key: &str, price: f64) {
        let current = store.find_ingredient(&id(key)).await.unwrap().unwrap();
        let (updated, event) = current.apply(IngredientChanges::price(money(price))).unwrap();
        store.update_ingredient(&current, &updated, &event).await.unwrap();
    }

    fn cascade_over(store: &InMemoryStore) -> IngredientChangeCascade {
        IngredientChangeCascade::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            CascadeSettings::default(),
        )
    }

    async fn total(store: &InMemoryStore, key: &str) -> Money {
        store.find_recipe(&id(key)).await.unwrap().unwrap().total_cost()
    }

    #[tokio::test]
    async fn test_price_change_updates_only_affected_recipes() {
        let store = pantry().await;
        set_price(&store, "milk", 8.0).await;

        let report = cascade_over(&store)
            .on_ingredient_changed(&id("milk"))
            .await
            .unwrap();

        assert_eq!(report.updated.len(), 2);
        assert!(report.is_clean());
        assert_eq!(total(&store, "custard").await, money(4.60));
        assert_eq!(total(&store, "hot-milk").await, money(2.40));

        let bread = store.find_recipe(&id("bread")).await.unwrap().unwrap();
        assert_eq!(bread.total_cost(), money(1.50));
        assert_eq!(bread.version(), 0);
    }

    #[tokio::test]
    async fn test_rerun_writes_nothing() {
        let store = pantry().await;
        set_price(&store, "milk", 8.0).await;
        let cascade = cascade_over(&store);

        cascade.on_ingredient_changed(&id("milk")).await.unwrap();
        let report = cascade.on_ingredient_changed(&id("milk")).await.unwrap();

        assert!(report.updated.is_empty());
        assert_eq!(report.unchanged.len(), 2);
        let custard = store.find_recipe(&id("custard")).await.unwrap().unwrap();
        assert_eq!(custard.version(), 1);
    }

    /// Counts every recipe-store call.
    struct CountingRecipes {
        inner: InMemoryStore,
        lookups: AtomicUsize,
        finds: AtomicUsize,
        saves: AtomicUsize,
    }

    impl CountingRecipes {
        fn new(inner: InMemoryStore) -> Self {
            CountingRecipes {
                inner,
                lookups: AtomicUsize::new(0),
                finds: AtomicUsize::new(0),
                saves: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl RecipeStore for CountingRecipes {
        async fn find_recipe(&self, id: &Id) -> StoreResult<Option<Recipe>> {
            self.finds.fetch_add(1, Ordering::SeqCst);
            self.inner.find_recipe(id).await
        }

        async fn find_recipes_by_ingredient(&self, ingredient_id: &Id) -> StoreResult<Vec<Recipe>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.find_recipes_by_ingredient(ingredient_id).await
        }

        async fn list_recipes(&self) -> StoreResult<Vec<Recipe>> {
            self.inner.list_recipes().await
        }

        async fn recipe_name_taken(&self, name: &str) -> StoreResult<bool> {
            self.inner.recipe_name_taken(name).await
        }

        async fn insert_recipe(&self, recipe: &Recipe) -> StoreResult<Recipe> {
            self.inner.insert_recipe(recipe).await
        }

        async fn save_recipe(&self, recipe: &Recipe) -> StoreResult<Recipe> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            self.inner.save_recipe(recipe).await
        }
    }

    #[tokio::test]
    async fn test_unused_ingredient_is_a_single_lookup() {
        let store = pantry().await;
        let eggs = Ingredient::new(id("eggs"), "Eggs", 12.0, money(3.60), Unit::Un).unwrap();
        store.insert_ingredient(&eggs).await.unwrap();

        let recipes = Arc::new(CountingRecipes::new(store.clone()));
        let cascade = IngredientChangeCascade::new(
            Arc::new(store.clone()),
            recipes.clone(),
            CascadeSettings::default(),
        );

        let report = cascade.on_ingredient_changed(&id("eggs")).await.unwrap();

        assert_eq!(report.affected(), 0);
        assert_eq!(recipes.lookups.load(Ordering::SeqCst), 1);
        assert_eq!(recipes.finds.load(Ordering::SeqCst), 0);
        assert_eq!(recipes.saves.load(Ordering::SeqCst), 0);
    }

    /// Fails every save of one recipe.
    struct BrokenSaves {
        inner: InMemoryStore,
        broken: Id,
    }

    #[async_trait]
    impl RecipeStore for BrokenSaves {
        async fn find_recipe(&self, id: &Id) -> StoreResult<Option<Recipe>> {
            self.inner.find_recipe(id).await
        }

        async fn find_recipes_by_ingredient(&self, ingredient_id: &Id) -> StoreResult<Vec<Recipe>> {
            self.inner.find_recipes_by_ingredient(ingredient_id).await
        }

        async fn list_recipes(&self) -> StoreResult<Vec<Recipe>> {
            self.inner.list_recipes().await
        }

        async fn recipe_name_taken(&self, name: &str) -> StoreResult<bool> {
            self.inner.recipe_name_taken(name).await
        }

        async fn insert_recipe(&self, recipe: &Recipe) -> StoreResult<Recipe> {
            self.inner.insert_recipe(recipe).await
        }

        async fn save_recipe(&self, recipe: &Recipe) -> StoreResult<Recipe> {
            if recipe.id() == &self.broken {
                return Err(StoreError::Backend("disk I/O error".into()));
            }
            self.inner.save_recipe(recipe).await
        }
    }

    #[tokio::test]
    async fn test_failed_save_does_not_stop_siblings() {
        let store = pantry().await;
        set_price(&store, "milk", 8.0).await;

        let cascade = IngredientChangeCascade::new(
            Arc::new(store.clone()),
            Arc::new(BrokenSaves {
                inner: store.clone(),
                broken: id("custard"),
            }),
            CascadeSettings::default(),
        );

        let report = cascade.on_ingredient_changed(&id("milk")).await.unwrap();

        assert_eq!(report.updated.len(), 1);
        assert_eq!(report.updated[0].recipe_id, id("hot-milk"));
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].recipe_id, id("custard"));
        assert!(report.failure_summary().unwrap().contains("disk I/O error"));

        assert_eq!(total(&store, "hot-milk").await, money(2.40));
        assert_eq!(total(&store, "custard").await, money(3.10));
    }

    #[tokio::test]
    async fn test_missing_ingredient_fails_only_that_recipe() {
        let store = pantry().await;
        set_price(&store, "milk", 8.0).await;

        // A recipe referencing an ingredient the source cannot find
        let ghost_source = InMemoryStore::new();
        for key in ["milk", "sugar"] {
            let ingredient = store.find_ingredient(&id(key)).await.unwrap().unwrap();
            ghost_source.insert_ingredient(&ingredient).await.unwrap();
        }
        let mut latte = Recipe::new(
            id("latte"),
            "Latte",
            vec![line("milk", 0.2, Unit::L), line("flour", 10.0, Unit::G)],
        )
        .unwrap();
        latte.update_total_cost(money(1.05));
        store.insert_recipe(&latte).await.unwrap();

        let cascade = IngredientChangeCascade::new(
            Arc::new(ghost_source),
            Arc::new(store.clone()),
            CascadeSettings::default(),
        );
        let report = cascade.on_ingredient_changed(&id("milk")).await.unwrap();

        assert_eq!(report.updated.len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert!(matches!(
            &report.failures[0].error,
            CascadeError::Calculation(CoreError::IngredientNotFound(missing)) if missing == &id("flour")
        ));
    }

    /// Bumps the stored version behind the cascade's back on the first save.
    struct RacingSaves {
        inner: InMemoryStore,
        raced: AtomicUsize,
    }

    #[async_trait]
    impl RecipeStore for RacingSaves {
        async fn find_recipe(&self, id: &Id) -> StoreResult<Option<Recipe>> {
            self.inner.find_recipe(id).await
        }

        async fn find_recipes_by_ingredient(&self, ingredient_id: &Id) -> StoreResult<Vec<Recipe>> {
            self.inner.find_recipes_by_ingredient(ingredient_id).await
        }

        async fn list_recipes(&self) -> StoreResult<Vec<Recipe>> {
            self.inner.list_recipes().await
        }

        async fn recipe_name_taken(&self, name: &str) -> StoreResult<bool> {
            self.inner.recipe_name_taken(name).await
        }

        async fn insert_recipe(&self, recipe: &Recipe) -> StoreResult<Recipe> {
            self.inner.insert_recipe(recipe).await
        }

        async fn save_recipe(&self, recipe: &Recipe) -> StoreResult<Recipe> {
            if self.raced.fetch_add(1, Ordering::SeqCst) == 0 {
                let stored = self.inner.find_recipe(recipe.id()).await?.unwrap();
                self.inner.save_recipe(&stored).await?;
            }
            self.inner.save_recipe(recipe).await
        }
    }

    #[tokio::test]
    async fn test_conflict_is_retried_from_fresh_read() {
        let store = pantry().await;
        set_price(&store, "flour", 10.0).await;

        let cascade = IngredientChangeCascade::new(
            Arc::new(store.clone()),
            Arc::new(RacingSaves {
                inner: store.clone(),
                raced: AtomicUsize::new(0),
            }),
            CascadeSettings::default(),
        );
        let report = cascade.on_ingredient_changed(&id("flour")).await.unwrap();

        assert!(report.is_clean());
        assert_eq!(report.updated.len(), 1);
        assert_eq!(report.updated[0].new_total, money(3.00));
        assert_eq!(report.updated[0].version, 2);
    }

    #[tokio::test]
    async fn test_conflicts_past_the_limit_are_reported() {
        let store = pantry().await;
        set_price(&store, "flour", 10.0).await;

        let settings = CascadeSettings {
            max_conflict_retries: 0,
            ..CascadeSettings::default()
        };
        let cascade = IngredientChangeCascade::new(
            Arc::new(store.clone()),
            Arc::new(RacingSaves {
                inner: store.clone(),
                raced: AtomicUsize::new(0),
            }),
            settings,
        );
        let report = cascade.on_ingredient_changed(&id("flour")).await.unwrap();

        assert!(matches!(
            report.failures[0].error,
            CascadeError::ConflictRetriesExhausted { attempts: 1, .. }
        ));
        assert_eq!(total(&store, "bread").await, money(1.50));
    }

    #[tokio::test]
    async fn test_deleted_recipe_is_skipped() {
        let store = pantry().await;
        set_price(&store, "milk", 8.0).await;

        /// Lists a recipe that is deleted before it can be saved.
        struct Vanishing(InMemoryStore);

        #[async_trait]
        impl RecipeStore for Vanishing {
            async fn find_recipe(&self, id: &Id) -> StoreResult<Option<Recipe>> {
                self.0.find_recipe(id).await
            }
            async fn find_recipes_by_ingredient(&self, ingredient_id: &Id) -> StoreResult<Vec<Recipe>> {
                let found = self.0.find_recipes_by_ingredient(ingredient_id).await?;
                self.0.delete_recipe(&Id::new("hot-milk").unwrap()).await?;
                Ok(found)
            }
            async fn list_recipes(&self) -> StoreResult<Vec<Recipe>> {
                self.0.list_recipes().await
            }
            async fn recipe_name_taken(&self, name: &str) -> StoreResult<bool> {
                self.0.recipe_name_taken(name).await
            }
            async fn insert_recipe(&self, recipe: &Recipe) -> StoreResult<Recipe> {
                self.0.insert_recipe(recipe).await
            }
            async fn save_recipe(&self, recipe: &Recipe) -> StoreResult<Recipe> {
                self.0.save_recipe(recipe).await
            }
        }

        let cascade = IngredientChangeCascade::new(
            Arc::new(store.clone()),
            Arc::new(Vanishing(store.clone())),
            CascadeSettings::default(),
        );
        let report = cascade.on_ingredient_changed(&id("milk")).await.unwrap();

        assert_eq!(report.deleted, vec![id("hot-milk")]);
        assert_eq!(report.updated.len(), 1);
        assert!(report.is_clean());
    }
}
