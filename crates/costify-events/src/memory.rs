//! # In-Memory Adapter
//!
//! Map-backed implementation of every port. Each call takes the lock once,
//! so an ingredient update and its outbox entry land together the same way
//! they do in one SQLite transaction.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use costify_core::{Id, Ingredient, IngredientUpdated, Recipe};
use costify_db::OutboxEntry;

use crate::error::{StoreError, StoreResult};
use crate::ports::{EventOutbox, IngredientSource, IngredientStore, RecipeStore};

#[derive(Debug, Default)]
struct MemoryState {
    ingredients: HashMap<Id, Ingredient>,
    recipes: HashMap<Id, Recipe>,
    outbox: Vec<OutboxEntry>,
}

impl MemoryState {
    fn outbox_entry_mut(&mut self, event_id: Uuid) -> Option<&mut OutboxEntry> {
        self.outbox.iter_mut().find(|entry| entry.event_id() == event_id)
    }

    fn check_references(&self, recipe: &Recipe) -> StoreResult<()> {
        match recipe
            .ingredient_ids()
            .into_iter()
            .find(|id| !self.ingredients.contains_key(id))
        {
            Some(missing) => Err(StoreError::Integrity(format!(
                "recipe {} references unknown ingredient {}",
                recipe.id(),
                missing
            ))),
            None => Ok(()),
        }
    }
}

/// Shared, cloneable in-memory store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes a recipe outright.
    pub async fn delete_recipe(&self, id: &Id) -> StoreResult<()> {
        self.state
            .write()
            .await
            .recipes
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found("Recipe", id.as_str()))
    }

    pub async fn outbox_entries(&self) -> Vec<OutboxEntry> {
        self.state.read().await.outbox.clone()
    }
}

fn sorted_by_name<T>(mut items: Vec<T>, name: impl Fn(&T) -> &str) -> Vec<T> {
    items.sort_by(|a, b| name(a).to_lowercase().cmp(&name(b).to_lowercase()));
    items
}

#[async_trait]
impl IngredientSource for InMemoryStore {
    async fn find_ingredient(&self, id: &Id) -> StoreResult<Option<Ingredient>> {
        Ok(self.state.read().await.ingredients.get(id).cloned())
    }
}

#[async_trait]
impl IngredientStore for InMemoryStore {
    async fn list_ingredients(&self) -> StoreResult<Vec<Ingredient>> {
        let all = self.state.read().await.ingredients.values().cloned().collect();
        Ok(sorted_by_name(all, Ingredient::name))
    }

    async fn ingredient_name_taken(&self, name: &str) -> StoreResult<bool> {
        let state = self.state.read().await;
        Ok(state
            .ingredients
            .values()
            .any(|ingredient| ingredient.name().eq_ignore_ascii_case(name.trim())))
    }

    async fn insert_ingredient(&self, ingredient: &Ingredient) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if state.ingredients.contains_key(ingredient.id()) {
            return Err(StoreError::Duplicate {
                field: "id".into(),
                value: ingredient.id().to_string(),
            });
        }
        state
            .ingredients
            .insert(ingredient.id().clone(), ingredient.clone());
        Ok(())
    }

    async fn update_ingredient(
        &self,
        previous: &Ingredient,
        ingredient: &Ingredient,
        event: &IngredientUpdated,
    ) -> StoreResult<()> {
        let mut state = self.state.write().await;
        match state.ingredients.get(ingredient.id()) {
            None => return Err(StoreError::not_found("Ingredient", ingredient.id().as_str())),
            Some(stored) if stored != previous => {
                return Err(StoreError::conflict("Ingredient", ingredient.id().as_str()));
            }
            Some(_) => {}
        }
        state
            .ingredients
            .insert(ingredient.id().clone(), ingredient.clone());
        state.outbox.push(OutboxEntry {
            event: event.clone(),
            created_at: Utc::now(),
            claimed_at: None,
            dispatched_at: None,
            attempts: 0,
            last_error: None,
        });
        Ok(())
    }
}

#[async_trait]
impl RecipeStore for InMemoryStore {
    async fn find_recipe(&self, id: &Id) -> StoreResult<Option<Recipe>> {
        Ok(self.state.read().await.recipes.get(id).cloned())
    }

    async fn find_recipes_by_ingredient(&self, ingredient_id: &Id) -> StoreResult<Vec<Recipe>> {
        let matching = self
            .state
            .read()
            .await
            .recipes
            .values()
            .filter(|recipe| recipe.references(ingredient_id))
            .cloned()
            .collect();
        Ok(sorted_by_name(matching, Recipe::name))
    }

    async fn list_recipes(&self) -> StoreResult<Vec<Recipe>> {
        let all = self.state.read().await.recipes.values().cloned().collect();
        Ok(sorted_by_name(all, Recipe::name))
    }

    async fn recipe_name_taken(&self, name: &str) -> StoreResult<bool> {
        let state = self.state.read().await;
        Ok(state
            .recipes
            .values()
            .any(|recipe| recipe.name().eq_ignore_ascii_case(name.trim())))
    }

    async fn insert_recipe(&self, recipe: &Recipe) -> StoreResult<Recipe> {
        let mut state = self.state.write().await;
        if state.recipes.contains_key(recipe.id()) {
            return Err(StoreError::Duplicate {
                field: "id".into(),
                value: recipe.id().to_string(),
            });
        }
        state.check_references(recipe)?;
        state.recipes.insert(recipe.id().clone(), recipe.clone());
        Ok(recipe.clone())
    }

    async fn save_recipe(&self, recipe: &Recipe) -> StoreResult<Recipe> {
        let mut state = self.state.write().await;
        let stored_version = state
            .recipes
            .get(recipe.id())
            .map(Recipe::version)
            .ok_or_else(|| StoreError::not_found("Recipe", recipe.id().as_str()))?;
        if stored_version != recipe.version() {
            return Err(StoreError::conflict("Recipe", recipe.id().as_str()));
        }
        state.check_references(recipe)?;

        let mut saved = recipe.clone();
        saved.set_version(stored_version + 1);
        state.recipes.insert(saved.id().clone(), saved.clone());
        Ok(saved)
    }
}

#[async_trait]
impl EventOutbox for InMemoryStore {
    async fn entry(&self, event_id: Uuid) -> StoreResult<Option<OutboxEntry>> {
        let state = self.state.read().await;
        Ok(state
            .outbox
            .iter()
            .find(|entry| entry.event_id() == event_id)
            .cloned())
    }

    async fn claim(&self, event_id: Uuid, stale_before: DateTime<Utc>) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        match state.outbox_entry_mut(event_id) {
            Some(entry) if claimable(entry, stale_before) => {
                entry.claimed_at = Some(Utc::now());
                entry.attempts += 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn pending(
        &self,
        older_than: DateTime<Utc>,
        stale_before: DateTime<Utc>,
        limit: u32,
    ) -> StoreResult<Vec<OutboxEntry>> {
        let state = self.state.read().await;
        let mut pending: Vec<OutboxEntry> = state
            .outbox
            .iter()
            .filter(|entry| entry.created_at <= older_than && claimable(entry, stale_before))
            .cloned()
            .collect();
        pending.sort_by_key(|entry| entry.created_at);
        pending.truncate(limit as usize);
        Ok(pending)
    }

    async fn release(&self, event_id: Uuid, error: &str) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if let Some(entry) = state.outbox_entry_mut(event_id) {
            if entry.dispatched_at.is_none() {
                entry.claimed_at = None;
                entry.last_error = Some(error.to_string());
            }
        }
        Ok(())
    }

    async fn mark_dispatched(&self, event_id: Uuid) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if let Some(entry) = state.outbox_entry_mut(event_id) {
            entry.dispatched_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn mark_failed(&self, event_id: Uuid, error: &str) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if let Some(entry) = state.outbox_entry_mut(event_id) {
            entry.dispatched_at = Some(Utc::now());
            entry.last_error = Some(error.to_string());
        }
        Ok(())
    }

    async fn prune(&self, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        let mut state = self.state.write().await;
        let before = state.outbox.len();
        state
            .outbox
            .retain(|entry| !matches!(entry.dispatched_at, Some(at) if at < cutoff));
        Ok((before - state.outbox.len()) as u64)
    }
}

/// Undispatched, and unclaimed or holding a claim from `stale_before` or earlier.
fn claimable(entry: &OutboxEntry, stale_before: DateTime<Utc>) -> bool {
    entry.dispatched_at.is_none() && entry.claimed_at.map_or(true, |at| at <= stale_before)
}

#[cfg(test)]
mod tests {
    use super::*;
    use costify_core::{Money, RecipeIngredient, Unit};

    fn milk() -> Ingredient {
        Ingredient::new(
            Id::new("milk").unwrap(),
            "Milk",
            1.0,
            Money::of(5.0).unwrap(),
            Unit::L,
        )
        .unwrap()
    }

    fn hot_milk() -> Recipe {
        Recipe::new(
            Id::new("hot-milk").unwrap(),
            "Hot Milk",
            vec![RecipeIngredient::new(Id::new("milk").unwrap(), 0.3, Unit::L).unwrap()],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_save_bumps_version_and_detects_conflicts() {
        let store = InMemoryStore::new();
        store.insert_ingredient(&milk()).await.unwrap();
        let recipe = store.insert_recipe(&hot_milk()).await.unwrap();

        let saved = store.save_recipe(&recipe).await.unwrap();
        assert_eq!(saved.version(), 1);

        // The stale copy still carries version 0
        let err = store.save_recipe(&recipe).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));

        store.delete_recipe(recipe.id()).await.unwrap();
        let err = store.save_recipe(&saved).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_insert_recipe_requires_known_ingredients() {
        let store = InMemoryStore::new();
        let err = store.insert_recipe(&hot_milk()).await.unwrap_err();
        assert!(matches!(err, StoreError::Integrity(_)));
    }

    #[tokio::test]
    async fn test_update_writes_outbox_entry() {
        let store = InMemoryStore::new();
        let milk = milk();
        store.insert_ingredient(&milk).await.unwrap();

        let (updated, event) = milk
            .apply(costify_core::IngredientChanges::price(Money::of(8.0).unwrap()))
            .unwrap();
        store.update_ingredient(&milk, &updated, &event).await.unwrap();

        let entries = store.outbox_entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event_id(), event.event_id);

        let lease_start = Utc::now() - chrono::Duration::minutes(5);
        assert!(store.claim(event.event_id, lease_start).await.unwrap());
        assert!(!store.claim(event.event_id, lease_start).await.unwrap());

        // An abandoned claim is taken over once it is older than the lease
        let expired = Utc::now() + chrono::Duration::seconds(1);
        assert!(store.claim(event.event_id, expired).await.unwrap());

        store.mark_dispatched(event.event_id).await.unwrap();
        assert!(!store.claim(event.event_id, expired).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_from_stale_snapshot_is_a_conflict() {
        let store = InMemoryStore::new();
        let milk = milk();
        store.insert_ingredient(&milk).await.unwrap();

        let (first, first_event) = milk
            .apply(costify_core::IngredientChanges::price(Money::of(6.0).unwrap()))
            .unwrap();
        let (second, second_event) = milk
            .apply(costify_core::IngredientChanges::price(Money::of(7.0).unwrap()))
            .unwrap();

        store.update_ingredient(&milk, &first, &first_event).await.unwrap();
        let err = store
            .update_ingredient(&milk, &second, &second_event)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
        assert_eq!(store.outbox_entries().await.len(), 1);
    }
}
