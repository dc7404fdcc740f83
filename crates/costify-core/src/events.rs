//! # Domain Events
//!
//! Facts announced by the domain after a write commits.
//!
//! The payload is a snapshot of the ingredient at the moment it changed.
//! Consumers treat it as a hint: the cascade always re-reads the ingredient
//! from the store, because further edits may have committed since.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::money::Money;
use crate::types::{Id, Ingredient};
use crate::unit::Unit;

/// An ingredient was replaced by a new snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientUpdated {
    /// Unique per commit. Doubles as the outbox row id.
    pub event_id: Uuid,
    pub ingredient_id: Id,
    pub name: String,
    pub package_quantity: f64,
    pub package_price: Money,
    pub package_unit: Unit,
    pub occurred_on: DateTime<Utc>,
}

impl IngredientUpdated {
    pub const EVENT_TYPE: &'static str = "IngredientUpdated";

    pub fn from_snapshot(ingredient: &Ingredient) -> Self {
        IngredientUpdated {
            event_id: Uuid::new_v4(),
            ingredient_id: ingredient.id().clone(),
            name: ingredient.name().to_string(),
            package_quantity: ingredient.package_quantity(),
            package_price: ingredient.package_price(),
            package_unit: ingredient.package_unit(),
            occurred_on: Utc::now(),
        }
    }

    pub fn event_type(&self) -> &'static str {
        Self::EVENT_TYPE
    }
}
