//! # Costing Use Cases
//!
//! Registration, edits and queries for ingredients and recipes. Every write
//! that affects a recipe total recomputes it before persisting; ingredient
//! updates hand their event to the gateway only after the write commits.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use costify_core::{
    CostCalculator, Id, Ingredient, IngredientChanges, Money, Recipe, RecipeCost, RecipeIngredient,
    Unit,
};

use crate::error::{ServiceError, ServiceResult, StoreError};
use crate::gateway::GatewayHandle;
use crate::ports::{IngredientStore, RecipeStore};

/// Reads and writes one ingredient update may take when others keep winning.
const MAX_UPDATE_ATTEMPTS: u32 = 3;

/// Entry point for callers (CLI, tests, a future HTTP layer).
pub struct CostingService {
    ingredients: Arc<dyn IngredientStore>,
    recipes: Arc<dyn RecipeStore>,
    gateway: GatewayHandle,
    calculator: CostCalculator,
}

impl CostingService {
    pub fn new(
        ingredients: Arc<dyn IngredientStore>,
        recipes: Arc<dyn RecipeStore>,
        gateway: GatewayHandle,
    ) -> Self {
        CostingService {
            ingredients,
            recipes,
            gateway,
            calculator: CostCalculator::new(),
        }
    }

    // =========================================================================
    // Ingredients
    // =========================================================================

    /// Registers a new ingredient under a generated id.
    ///
    /// ## Errors
    /// * `IngredientAlreadyExists` - the name is taken (case-insensitive)
    /// * `Core` - invalid name or quantity
    pub async fn register_ingredient(
        &self,
        name: &str,
        package_quantity: f64,
        package_price: Money,
        package_unit: Unit,
    ) -> ServiceResult<Ingredient> {
        let ingredient = Ingredient::new(Id::generate(), name, package_quantity, package_price, package_unit)?;

        if self.ingredients.ingredient_name_taken(ingredient.name()).await? {
            return Err(ServiceError::IngredientAlreadyExists(ingredient.name().to_string()));
        }

        self.ingredients.insert_ingredient(&ingredient).await?;
        info!(id = %ingredient.id(), name = %ingredient.name(), "Ingredient registered");
        Ok(ingredient)
    }

    /// Applies a partial update and schedules the cascade.
    ///
    /// The cascade runs after this returns; recipe totals are eventually
    /// consistent with the new price. An empty change set writes nothing.
    /// If another update commits between the read and the write, the change
    /// set is re-applied to the fresh snapshot, so neither update is lost.
    pub async fn update_ingredient(&self, id: &Id, changes: IngredientChanges) -> ServiceResult<Ingredient> {
        let mut attempt = 1;
        loop {
            match self.try_update_ingredient(id, changes.clone()).await {
                Err(ServiceError::Store(StoreError::Conflict { .. })) if attempt < MAX_UPDATE_ATTEMPTS => {
                    debug!(id = %id, attempt, "Ingredient changed underneath update, retrying");
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn try_update_ingredient(&self, id: &Id, changes: IngredientChanges) -> ServiceResult<Ingredient> {
        let current = self
            .ingredients
            .find_ingredient(id)
            .await?
            .ok_or_else(|| ServiceError::IngredientNotFound(id.clone()))?;

        if changes.is_empty() {
            return Ok(current);
        }

        let (updated, event) = current.apply(changes)?;

        if !updated.name().eq_ignore_ascii_case(current.name())
            && self.ingredients.ingredient_name_taken(updated.name()).await?
        {
            return Err(ServiceError::IngredientAlreadyExists(updated.name().to_string()));
        }

        let mut pending = self.gateway.pending();
        pending.record(event.clone());

        // On error `pending` is dropped and the event never leaves
        self.ingredients.update_ingredient(&current, &updated, &event).await?;
        pending.release();

        info!(
            id = %updated.id(),
            event_id = %event.event_id,
            price = %updated.package_price(),
            "Ingredient updated"
        );
        Ok(updated)
    }

    pub async fn get_ingredient(&self, id: &Id) -> ServiceResult<Ingredient> {
        self.ingredients
            .find_ingredient(id)
            .await?
            .ok_or_else(|| ServiceError::IngredientNotFound(id.clone()))
    }

    pub async fn list_ingredients(&self) -> ServiceResult<Vec<Ingredient>> {
        Ok(self.ingredients.list_ingredients().await?)
    }

    // =========================================================================
    // Recipes
    // =========================================================================

    /// Registers a recipe with its initial cost computed.
    ///
    /// ## Errors
    /// * `RecipeAlreadyExists` - the name is taken (case-insensitive)
    /// * `IngredientNotFound` - a line references an unknown ingredient
    /// * `Core` - empty recipe, invalid name, unit mismatch
    pub async fn register_recipe(&self, name: &str, lines: Vec<RecipeIngredient>) -> ServiceResult<Recipe> {
        let mut recipe = Recipe::new(Id::generate(), name, lines)?;

        if self.recipes.recipe_name_taken(recipe.name()).await? {
            return Err(ServiceError::RecipeAlreadyExists(recipe.name().to_string()));
        }

        let cost = self.cost_of(&recipe).await?;
        recipe.update_total_cost(cost.total_cost);

        let saved = self.recipes.insert_recipe(&recipe).await?;
        info!(id = %saved.id(), name = %saved.name(), total = %saved.total_cost(), "Recipe registered");
        Ok(saved)
    }

    /// Replaces name and lines, recomputing the total before saving.
    ///
    /// ## Errors
    /// * `RecipeNotFound`
    /// * `Store(Conflict)` - the recipe changed since it was read
    pub async fn update_recipe(
        &self,
        id: &Id,
        name: &str,
        lines: Vec<RecipeIngredient>,
    ) -> ServiceResult<Recipe> {
        let mut recipe = self.get_recipe(id).await?;
        let previous_name = recipe.name().to_string();

        recipe.rename(name)?;
        recipe.replace_ingredients(lines)?;

        if !recipe.name().eq_ignore_ascii_case(&previous_name)
            && self.recipes.recipe_name_taken(recipe.name()).await?
        {
            return Err(ServiceError::RecipeAlreadyExists(recipe.name().to_string()));
        }

        let cost = self.cost_of(&recipe).await?;
        recipe.update_total_cost(cost.total_cost);

        let saved = self.recipes.save_recipe(&recipe).await?;
        info!(id = %saved.id(), total = %saved.total_cost(), version = saved.version(), "Recipe updated");
        Ok(saved)
    }

    pub async fn get_recipe(&self, id: &Id) -> ServiceResult<Recipe> {
        self.recipes
            .find_recipe(id)
            .await?
            .ok_or_else(|| ServiceError::RecipeNotFound(id.clone()))
    }

    pub async fn list_recipes(&self) -> ServiceResult<Vec<Recipe>> {
        Ok(self.recipes.list_recipes().await?)
    }

    /// Line-by-line cost of a stored recipe at current prices.
    pub async fn recipe_cost(&self, id: &Id) -> ServiceResult<RecipeCost> {
        let recipe = self.get_recipe(id).await?;
        self.cost_of(&recipe).await
    }

    pub fn list_units(&self) -> &'static [Unit] {
        &Unit::ALL
    }

    /// Loads the recipe's ingredients and runs the calculator.
    async fn cost_of(&self, recipe: &Recipe) -> ServiceResult<RecipeCost> {
        let mut loaded = HashMap::new();
        for id in recipe.ingredient_ids() {
            let ingredient = self
                .ingredients
                .find_ingredient(&id)
                .await?
                .ok_or_else(|| ServiceError::IngredientNotFound(id.clone()))?;
            loaded.insert(id, ingredient);
        }

        let cost = self.calculator.calculate(recipe, &loaded)?;
        debug!(recipe_id = %recipe.id(), total = %cost.total_cost, "Recipe costed");
        Ok(cost)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cascade::IngredientChangeCascade;
    use crate::config::{CascadeSettings, GatewaySettings};
    use crate::gateway::{DeliveryOutcome, EventDispatcher};
    use crate::memory::InMemoryStore;
    use crate::error::StoreResult;
    use crate::ports::{EventOutbox, IngredientSource};
    use crate::store::SqliteStore;
    use async_trait::async_trait;
    use costify_core::{CoreError, ErrorKind, IngredientUpdated};
    use std::sync::atomic::{AtomicBool, Ordering};
    use costify_db::{Database, DbConfig};

    fn money(value: f64) -> Money {
        Money::of(value).unwrap()
    }

    fn wire<S>(store: Arc<S>) -> (CostingService, EventDispatcher)
    where
        S: IngredientStore + RecipeStore + EventOutbox + 'static,
    {
        let cascade = IngredientChangeCascade::new(store.clone(), store.clone(), CascadeSettings::default());
        let (dispatcher, handle) =
            EventDispatcher::new(Arc::new(cascade), store.clone(), GatewaySettings::default());
        (CostingService::new(store.clone(), store, handle), dispatcher)
    }

    fn in_memory() -> (CostingService, EventDispatcher, InMemoryStore) {
        let store = InMemoryStore::new();
        let (service, dispatcher) = wire(Arc::new(store.clone()));
        (service, dispatcher, store)
    }

    async fn sqlite() -> (CostingService, EventDispatcher, Database) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (service, dispatcher) = wire(Arc::new(SqliteStore::new(db.clone())));
        (service, dispatcher, db)
    }

    #[tokio::test]
    async fn test_register_recipe_computes_initial_cost() {
        let (service, _dispatcher, _store) = in_memory();
        let flour = service
            .register_ingredient("Flour", 1.0, money(5.0), Unit::Kg)
            .await
            .unwrap();
        let sugar = service
            .register_ingredient("Sugar", 500.0, money(3.0), Unit::G)
            .await
            .unwrap();

        let recipe = service
            .register_recipe(
                "Cookies",
                vec![
                    RecipeIngredient::new(flour.id().clone(), 300.0, Unit::G).unwrap(),
                    RecipeIngredient::new(sugar.id().clone(), 100.0, Unit::G).unwrap(),
                ],
            )
            .await
            .unwrap();

        assert_eq!(recipe.total_cost(), money(2.10));

        let cost = service.recipe_cost(recipe.id()).await.unwrap();
        assert_eq!(cost.ingredient_costs.len(), 2);
        assert_eq!(cost.ingredient_costs[0].cost, money(1.50));
        assert_eq!(cost.ingredient_costs[1].cost, money(0.60));
    }

    #[tokio::test]
    async fn test_duplicate_names_are_rejected() {
        let (service, _dispatcher, _store) = in_memory();
        let milk = service
            .register_ingredient("Milk", 1.0, money(5.0), Unit::L)
            .await
            .unwrap();
        let err = service
            .register_ingredient("  milk ", 2.0, money(9.0), Unit::L)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::IngredientAlreadyExists(_)));

        let line = || vec![RecipeIngredient::new(milk.id().clone(), 0.3, Unit::L).unwrap()];
        service.register_recipe("Hot Milk", line()).await.unwrap();
        let err = service.register_recipe("HOT MILK", line()).await.unwrap_err();
        assert!(matches!(err, ServiceError::RecipeAlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_unknown_ingredient_and_unit_mismatch() {
        let (service, _dispatcher, _store) = in_memory();
        let milk = service
            .register_ingredient("Milk", 1.0, money(5.0), Unit::L)
            .await
            .unwrap();

        let ghost = Id::new("ghost").unwrap();
        let err = service
            .register_recipe("Ghost", vec![RecipeIngredient::new(ghost.clone(), 1.0, Unit::G).unwrap()])
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::IngredientNotFound(ref id) if id == &ghost));

        let err = service
            .register_recipe("Heavy Milk", vec![RecipeIngredient::new(milk.id().clone(), 100.0, Unit::G).unwrap()])
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Core(CoreError::DimensionMismatch { .. })));
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(service.list_recipes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_recipe_recomputes_and_checks_existence() {
        let (service, _dispatcher, _store) = in_memory();
        let milk = service
            .register_ingredient("Milk", 1.0, money(5.0), Unit::L)
            .await
            .unwrap();
        let recipe = service
            .register_recipe("Hot Milk", vec![RecipeIngredient::new(milk.id().clone(), 0.3, Unit::L).unwrap()])
            .await
            .unwrap();

        let updated = service
            .update_recipe(
                recipe.id(),
                "Big Hot Milk",
                vec![RecipeIngredient::new(milk.id().clone(), 500.0, Unit::Ml).unwrap()],
            )
            .await
            .unwrap();
        assert_eq!(updated.name(), "Big Hot Milk");
        assert_eq!(updated.total_cost(), money(2.50));
        assert_eq!(updated.version(), 1);

        let missing = Id::new("nope").unwrap();
        let err = service
            .update_recipe(&missing, "X", vec![RecipeIngredient::new(milk.id().clone(), 1.0, Unit::L).unwrap()])
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::RecipeNotFound(_)));
    }

    #[tokio::test]
    async fn test_price_update_cascades_after_commit() {
        let (service, mut dispatcher, _db) = sqlite().await;

        let milk = service.register_ingredient("Milk", 1.0, money(5.0), Unit::L).await.unwrap();
        let sugar = service.register_ingredient("Sugar", 1.0, money(3.0), Unit::Kg).await.unwrap();
        let flour = service.register_ingredient("Flour", 1.0, money(5.0), Unit::Kg).await.unwrap();

        let custard = service
            .register_recipe(
                "Custard",
                vec![
                    RecipeIngredient::new(milk.id().clone(), 0.5, Unit::L).unwrap(),
                    RecipeIngredient::new(sugar.id().clone(), 0.2, Unit::Kg).unwrap(),
                ],
            )
            .await
            .unwrap();
        let hot_milk = service
            .register_recipe("Hot Milk", vec![RecipeIngredient::new(milk.id().clone(), 0.3, Unit::L).unwrap()])
            .await
            .unwrap();
        let bread = service
            .register_recipe("Bread", vec![RecipeIngredient::new(flour.id().clone(), 300.0, Unit::G).unwrap()])
            .await
            .unwrap();
        assert_eq!(custard.total_cost(), money(3.10));

        service
            .update_ingredient(milk.id(), IngredientChanges::price(money(8.0)))
            .await
            .unwrap();

        // Not yet delivered: the stored totals are stale
        assert_eq!(service.get_recipe(custard.id()).await.unwrap().total_cost(), money(3.10));

        let outcomes = dispatcher.drain().await.unwrap();
        assert_eq!(outcomes.len(), 1);
        match &outcomes[0] {
            DeliveryOutcome::Delivered(report) => assert_eq!(report.updated.len(), 2),
            other => panic!("unexpected outcome: {:?}", other),
        }

        assert_eq!(service.get_recipe(custard.id()).await.unwrap().total_cost(), money(4.60));
        assert_eq!(service.get_recipe(hot_milk.id()).await.unwrap().total_cost(), money(2.40));
        let bread_now = service.get_recipe(bread.id()).await.unwrap();
        assert_eq!(bread_now.total_cost(), money(1.50));
        assert_eq!(bread_now.version(), 0);
    }

    #[tokio::test]
    async fn test_failed_update_releases_nothing() {
        let (service, mut dispatcher, db) = sqlite().await;
        service.register_ingredient("Milk", 1.0, money(5.0), Unit::L).await.unwrap();
        let cream = service.register_ingredient("Cream", 1.0, money(6.0), Unit::L).await.unwrap();

        // Renaming onto a taken name is refused before any write
        let err = service
            .update_ingredient(
                cream.id(),
                IngredientChanges {
                    name: Some("MILK".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::IngredientAlreadyExists(_)));

        let missing = Id::new("ghost").unwrap();
        let err = service
            .update_ingredient(&missing, IngredientChanges::price(money(1.0)))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::IngredientNotFound(_)));

        assert!(dispatcher.drain().await.unwrap().is_empty());
        assert_eq!(db.outbox().count_pending().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_empty_change_set_writes_nothing() {
        let (service, mut dispatcher, store) = in_memory();
        let milk = service.register_ingredient("Milk", 1.0, money(5.0), Unit::L).await.unwrap();

        let same = service
            .update_ingredient(milk.id(), IngredientChanges::default())
            .await
            .unwrap();
        assert_eq!(same, milk);
        assert!(store.outbox_entries().await.is_empty());
        assert!(dispatcher.drain().await.unwrap().is_empty());
    }

    /// Commits a rename of its own just before the first update it forwards.
    struct RenamedUnderneath {
        inner: InMemoryStore,
        raced: AtomicBool,
    }

    #[async_trait]
    impl IngredientSource for RenamedUnderneath {
        async fn find_ingredient(&self, id: &Id) -> StoreResult<Option<Ingredient>> {
            self.inner.find_ingredient(id).await
        }
    }

    #[async_trait]
    impl IngredientStore for RenamedUnderneath {
        async fn list_ingredients(&self) -> StoreResult<Vec<Ingredient>> {
            self.inner.list_ingredients().await
        }

        async fn ingredient_name_taken(&self, name: &str) -> StoreResult<bool> {
            self.inner.ingredient_name_taken(name).await
        }

        async fn insert_ingredient(&self, ingredient: &Ingredient) -> StoreResult<()> {
            self.inner.insert_ingredient(ingredient).await
        }

        async fn update_ingredient(
            &self,
            previous: &Ingredient,
            ingredient: &Ingredient,
            event: &IngredientUpdated,
        ) -> StoreResult<()> {
            if !self.raced.swap(true, Ordering::SeqCst) {
                let stored = self.inner.find_ingredient(ingredient.id()).await?.unwrap();
                let (renamed, rename_event) = stored
                    .apply(IngredientChanges {
                        name: Some("Whole Milk".into()),
                        ..Default::default()
                    })
                    .unwrap();
                self.inner.update_ingredient(&stored, &renamed, &rename_event).await?;
            }
            self.inner.update_ingredient(previous, ingredient, event).await
        }
    }

    #[tokio::test]
    async fn test_concurrent_updates_are_both_kept() {
        let inner = InMemoryStore::new();
        let store = Arc::new(RenamedUnderneath {
            inner: inner.clone(),
            raced: AtomicBool::new(false),
        });
        let (_dispatcher, handle) = EventDispatcher::new(
            Arc::new(IngredientChangeCascade::new(
                Arc::new(inner.clone()),
                Arc::new(inner.clone()),
                CascadeSettings::default(),
            )),
            Arc::new(inner.clone()),
            GatewaySettings::default(),
        );
        let service = CostingService::new(store, Arc::new(inner.clone()), handle);

        let milk = service.register_ingredient("Milk", 1.0, money(5.0), Unit::L).await.unwrap();
        let updated = service
            .update_ingredient(milk.id(), IngredientChanges::price(money(8.0)))
            .await
            .unwrap();

        // The price change was re-applied on top of the rename that won
        assert_eq!(updated.name(), "Whole Milk");
        assert_eq!(updated.package_price(), money(8.0));
        assert_eq!(inner.find_ingredient(milk.id()).await.unwrap().unwrap(), updated);
        assert_eq!(inner.outbox_entries().await.len(), 2);
    }

    #[test]
    fn test_list_units() {
        let store = Arc::new(InMemoryStore::new());
        let (_, handle) = EventDispatcher::new(
            Arc::new(IngredientChangeCascade::new(store.clone(), store.clone(), CascadeSettings::default())),
            store.clone(),
            GatewaySettings::default(),
        );
        let service = CostingService::new(store.clone(), store, handle);
        assert_eq!(service.list_units().len(), 7);
        assert!(service.list_units().contains(&Unit::TbspButter));
    }
}
