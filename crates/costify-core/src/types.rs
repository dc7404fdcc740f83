//! # Domain Types
//!
//! Core domain types used throughout Costify.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────────┐          ┌─────────────────────┐               │
//! │  │    Ingredient       │          │      Recipe         │               │
//! │  │  ─────────────────  │          │  ─────────────────  │               │
//! │  │  id (Id)            │◄─────┐   │  id (Id)            │               │
//! │  │  name               │      │   │  name               │               │
//! │  │  package_quantity   │      │   │  ingredients ───────┼──┐            │
//! │  │  package_price      │      │   │  total_cost (Money) │  │            │
//! │  │  package_unit       │      │   │  version            │  │            │
//! │  └─────────────────────┘      │   └─────────────────────┘  │            │
//! │                               │                            ▼            │
//! │                               │   ┌─────────────────────────────┐       │
//! │                               └───┤  RecipeIngredient (value)   │       │
//! │                                   │  ingredient_id, qty, unit   │       │
//! │                                   └─────────────────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Snapshot Semantics
//! An `Ingredient` is a value snapshot fetched by id. Changing it produces a
//! NEW snapshot with the same id ([`Ingredient::apply`]); nothing is mutated
//! in place.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreResult, MoneyError, ValidationError};
use crate::events::IngredientUpdated;
use crate::money::{decimal_from_f64, Money};
use crate::unit::Unit;
use crate::validation::{validate_name, validate_quantity, ValidationResult};

// =============================================================================
// Id
// =============================================================================

/// Opaque, non-blank identifier. Immutable once assigned.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Id(String);

impl Id {
    /// Wraps a caller-assigned id.
    pub fn new(value: impl Into<String>) -> ValidationResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "id".to_string(),
            });
        }
        Ok(Id(value))
    }

    /// Generates a fresh UUID v4 id.
    pub fn generate() -> Self {
        Id(Uuid::new_v4().to_string())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Id {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Id::new(value)
    }
}

impl From<Id> for String {
    fn from(id: Id) -> Self {
        id.0
    }
}

// =============================================================================
// Ingredient
// =============================================================================

/// A packaged good with a price.
///
/// ## Invariants
/// - `name` is non-blank
/// - `package_quantity` is finite and > 0
/// - `package_price` is ≥ 0 (guaranteed by [`Money`])
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ingredient {
    id: Id,
    name: String,
    package_quantity: f64,
    package_price: Money,
    package_unit: Unit,
}

impl Ingredient {
    pub fn new(
        id: Id,
        name: &str,
        package_quantity: f64,
        package_price: Money,
        package_unit: Unit,
    ) -> ValidationResult<Self> {
        Ok(Ingredient {
            id,
            name: validate_name("name", name)?,
            package_quantity: validate_quantity("package_quantity", package_quantity)?,
            package_price,
            package_unit,
        })
    }

    pub fn id(&self) -> &Id {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn package_quantity(&self) -> f64 {
        self.package_quantity
    }

    pub fn package_price(&self) -> Money {
        self.package_price
    }

    pub fn package_unit(&self) -> Unit {
        self.package_unit
    }

    /// Price per base unit (per gram, per milliliter, per each), unrounded.
    ///
    /// ## Example
    /// ```rust
    /// use costify_core::{Id, Ingredient, Money, Unit};
    /// use rust_decimal::Decimal;
    ///
    /// let flour = Ingredient::new(
    ///     Id::new("flour").unwrap(), "Flour", 1.0, Money::of(5.00).unwrap(), Unit::Kg,
    /// ).unwrap();
    /// assert_eq!(flour.unit_cost().unwrap(), Decimal::new(5, 3)); // 0.005 per gram
    /// ```
    pub fn unit_cost(&self) -> CoreResult<Decimal> {
        let base_quantity = decimal_from_f64(self.package_unit.to_base(self.package_quantity))?;
        let cost = self
            .package_price
            .amount()
            .checked_div(base_quantity)
            .ok_or(MoneyError::DivideByZero)?;
        Ok(cost)
    }

    /// Produces the replacement snapshot and the event announcing it.
    ///
    /// Fields absent from `changes` keep their current value. The result is
    /// validated exactly like a fresh ingredient.
    pub fn apply(&self, changes: IngredientChanges) -> ValidationResult<(Ingredient, IngredientUpdated)> {
        let updated = Ingredient::new(
            self.id.clone(),
            changes.name.as_deref().unwrap_or(&self.name),
            changes.package_quantity.unwrap_or(self.package_quantity),
            changes.package_price.unwrap_or(self.package_price),
            changes.package_unit.unwrap_or(self.package_unit),
        )?;
        let event = IngredientUpdated::from_snapshot(&updated);
        Ok((updated, event))
    }
}

/// Partial update of an ingredient. `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngredientChanges {
    pub name: Option<String>,
    pub package_quantity: Option<f64>,
    pub package_price: Option<Money>,
    pub package_unit: Option<Unit>,
}

impl IngredientChanges {
    /// A price-only change.
    pub fn price(price: Money) -> Self {
        IngredientChanges {
            package_price: Some(price),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.package_quantity.is_none()
            && self.package_price.is_none()
            && self.package_unit.is_none()
    }
}

// =============================================================================
// Recipe Ingredient
// =============================================================================

/// One line of a recipe. Value object: equality is structural.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecipeIngredient {
    ingredient_id: Id,
    quantity: f64,
    unit: Unit,
}

impl RecipeIngredient {
    pub fn new(ingredient_id: Id, quantity: f64, unit: Unit) -> ValidationResult<Self> {
        Ok(RecipeIngredient {
            ingredient_id,
            quantity: validate_quantity("quantity", quantity)?,
            unit,
        })
    }

    pub fn ingredient_id(&self) -> &Id {
        &self.ingredient_id
    }

    pub fn quantity(&self) -> f64 {
        self.quantity
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }
}

// =============================================================================
// Recipe
// =============================================================================

/// A named, ordered composition of ingredient quantities.
///
/// `total_cost` is a cached value. It may be stale between an ingredient
/// price change and the next cascade pass; every edit made through this
/// type must be followed by a recomputation before the recipe is saved.
///
/// `version` is the optimistic concurrency token. It starts at 0 and the
/// store bumps it on every successful save.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recipe {
    id: Id,
    name: String,
    ingredients: Vec<RecipeIngredient>,
    total_cost: Money,
    version: i64,
}

impl Recipe {
    /// Creates an unsaved recipe with a zero total.
    pub fn new(id: Id, name: &str, ingredients: Vec<RecipeIngredient>) -> ValidationResult<Self> {
        Self::restore(id, name, ingredients, Money::zero(), 0)
    }

    /// Rebuilds a recipe from storage.
    pub fn restore(
        id: Id,
        name: &str,
        ingredients: Vec<RecipeIngredient>,
        total_cost: Money,
        version: i64,
    ) -> ValidationResult<Self> {
        if ingredients.is_empty() {
            return Err(ValidationError::EmptyRecipe);
        }
        Ok(Recipe {
            id,
            name: validate_name("name", name)?,
            ingredients,
            total_cost,
            version,
        })
    }

    pub fn id(&self) -> &Id {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ingredients(&self) -> &[RecipeIngredient] {
        &self.ingredients
    }

    pub fn total_cost(&self) -> Money {
        self.total_cost
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    // ===== Edits =====

    pub fn rename(&mut self, name: &str) -> ValidationResult<()> {
        self.name = validate_name("name", name)?;
        Ok(())
    }

    pub fn replace_ingredients(&mut self, ingredients: Vec<RecipeIngredient>) -> ValidationResult<()> {
        if ingredients.is_empty() {
            return Err(ValidationError::EmptyRecipe);
        }
        self.ingredients = ingredients;
        Ok(())
    }

    pub fn add_ingredient(&mut self, line: RecipeIngredient) {
        self.ingredients.push(line);
    }

    /// Removes every line referencing `ingredient_id`, returning how many
    /// were removed. Fails (and leaves the recipe untouched) if no line
    /// would remain.
    pub fn remove_ingredient(&mut self, ingredient_id: &Id) -> ValidationResult<usize> {
        let remaining = self
            .ingredients
            .iter()
            .filter(|line| line.ingredient_id() != ingredient_id)
            .count();
        if remaining == 0 {
            return Err(ValidationError::EmptyRecipe);
        }
        let removed = self.ingredients.len() - remaining;
        self.ingredients.retain(|line| line.ingredient_id() != ingredient_id);
        Ok(removed)
    }

    pub fn update_total_cost(&mut self, total_cost: Money) {
        self.total_cost = total_cost;
    }

    /// Called by stores after a successful save.
    pub fn set_version(&mut self, version: i64) {
        self.version = version;
    }

    // ===== Queries =====

    /// Whether any line uses the ingredient.
    pub fn references(&self, ingredient_id: &Id) -> bool {
        self.ingredients
            .iter()
            .any(|line| line.ingredient_id() == ingredient_id)
    }

    /// Distinct ingredient ids in first-seen order.
    pub fn ingredient_ids(&self) -> Vec<Id> {
        let mut ids: Vec<Id> = Vec::with_capacity(self.ingredients.len());
        for line in &self.ingredients {
            if !ids.contains(line.ingredient_id()) {
                ids.push(line.ingredient_id().clone());
            }
        }
        ids
    }

    /// Equal in everything but `version`.
    pub fn same_content(&self, other: &Recipe) -> bool {
        self.id == other.id
            && self.name == other.name
            && self.ingredients == other.ingredients
            && self.total_cost == other.total_cost
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn id(value: &str) -> Id {
        Id::new(value).unwrap()
    }

    fn line(ingredient: &str, quantity: f64, unit: Unit) -> RecipeIngredient {
        RecipeIngredient::new(id(ingredient), quantity, unit).unwrap()
    }

    fn milk() -> Ingredient {
        Ingredient::new(id("milk"), "Milk", 1.0, Money::of(2.50).unwrap(), Unit::L).unwrap()
    }

    #[test]
    fn test_id_rejects_blank() {
        assert!(Id::new("").is_err());
        assert!(Id::new("   ").is_err());
        assert_ne!(Id::generate(), Id::generate());
        assert!(serde_json::from_str::<Id>("\"\"").is_err());
    }

    #[test]
    fn test_ingredient_validation() {
        let price = Money::of(1.0).unwrap();
        assert!(Ingredient::new(id("a"), " ", 1.0, price, Unit::G).is_err());
        assert!(Ingredient::new(id("a"), "A", 0.0, price, Unit::G).is_err());
        assert!(Ingredient::new(id("a"), "A", f64::NAN, price, Unit::G).is_err());
        assert!(Ingredient::new(id("a"), "A", 1.0, Money::zero(), Unit::G).is_ok());
    }

    #[test]
    fn test_unit_cost() {
        assert_eq!(milk().unit_cost().unwrap(), dec!(0.0025));
    }

    #[test]
    fn test_apply_replaces_snapshot() {
        let original = milk();
        let (updated, event) = original
            .apply(IngredientChanges::price(Money::of(8.0).unwrap()))
            .unwrap();

        assert_eq!(original.package_price(), Money::of(2.50).unwrap());
        assert_eq!(updated.package_price(), Money::of(8.0).unwrap());
        assert_eq!(updated.name(), "Milk");
        assert_eq!(event.ingredient_id, *original.id());
        assert_eq!(event.package_price, updated.package_price());
    }

    #[test]
    fn test_apply_validates() {
        let changes = IngredientChanges {
            package_quantity: Some(-1.0),
            ..Default::default()
        };
        assert!(milk().apply(changes).is_err());
        assert!(IngredientChanges::default().is_empty());
    }

    #[test]
    fn test_recipe_requires_lines() {
        assert_eq!(
            Recipe::new(id("r"), "Bread", vec![]).unwrap_err(),
            ValidationError::EmptyRecipe
        );
        assert!(RecipeIngredient::new(id("flour"), 0.0, Unit::G).is_err());
    }

    #[test]
    fn test_recipe_edits() {
        let mut recipe = Recipe::new(
            id("r"),
            "Bread",
            vec![line("flour", 300.0, Unit::G), line("salt", 5.0, Unit::G)],
        )
        .unwrap();
        assert_eq!(recipe.version(), 0);
        assert!(recipe.total_cost().is_zero());

        recipe.add_ingredient(line("flour", 20.0, Unit::G));
        assert_eq!(recipe.ingredient_ids(), vec![id("flour"), id("salt")]);
        assert!(recipe.references(&id("salt")));

        assert_eq!(recipe.remove_ingredient(&id("flour")).unwrap(), 2);
        assert_eq!(
            recipe.remove_ingredient(&id("salt")).unwrap_err(),
            ValidationError::EmptyRecipe
        );
        assert_eq!(recipe.ingredients().len(), 1);
        assert_eq!(recipe.remove_ingredient(&id("yeast")).unwrap(), 0);

        assert!(recipe.rename("").is_err());
        recipe.rename("Flatbread").unwrap();
        assert_eq!(recipe.name(), "Flatbread");
        assert!(recipe.replace_ingredients(vec![]).is_err());
    }

    #[test]
    fn test_same_content_ignores_version() {
        let recipe = Recipe::new(id("r"), "Bread", vec![line("flour", 1.0, Unit::Kg)]).unwrap();
        let mut saved = recipe.clone();
        saved.set_version(4);
        assert!(recipe.same_content(&saved));
        assert_ne!(recipe, saved);
    }
}
