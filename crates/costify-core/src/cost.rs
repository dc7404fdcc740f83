//! # Recipe Costing
//!
//! Pure computation of what a recipe costs at current ingredient prices.
//!
//! ## Calculation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     CostCalculator::calculate                           │
//! │                                                                         │
//! │  for each line (in order, duplicates kept):                             │
//! │                                                                         │
//! │   line.ingredient_id ──► ingredients map ──► missing? IngredientNotFound │
//! │                                │                                        │
//! │                                ▼                                        │
//! │            same dimension as package unit? ──no──► DimensionMismatch    │
//! │                                │                                        │
//! │                                ▼                                        │
//! │   unit_cost (price / package base qty) × line base qty   (Decimal)      │
//! │                                │                                        │
//! │                                ▼                                        │
//! │              Money::from_decimal  ──► rounded once, half-up             │
//! │                                                                         │
//! │  total = Money::add over line costs (rounded sum of rounded lines)      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Either the whole recipe is costed or the call fails. There is no partial
//! [`RecipeCost`].

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::{CoreError, CoreResult, MoneyError};
use crate::money::{decimal_from_f64, Money};
use crate::types::{Id, Ingredient, Recipe, RecipeIngredient};
use crate::unit::Unit;

// =============================================================================
// Results
// =============================================================================

/// The cost of one recipe line. Quantity and unit are the line's own, not
/// converted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngredientCost {
    pub ingredient_id: Id,
    pub ingredient_name: String,
    pub quantity_used: f64,
    pub unit: Unit,
    pub cost: Money,
}

/// Per-line breakdown plus total. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecipeCost {
    pub recipe_id: Id,
    pub recipe_name: String,
    pub ingredient_costs: Vec<IngredientCost>,
    pub total_cost: Money,
}

impl RecipeCost {
    /// Builds the result, deriving the total from the lines.
    pub fn new(recipe_id: Id, recipe_name: String, ingredient_costs: Vec<IngredientCost>) -> Self {
        let total_cost = ingredient_costs
            .iter()
            .fold(Money::zero(), |total, line| total.add(line.cost));
        RecipeCost {
            recipe_id,
            recipe_name,
            ingredient_costs,
            total_cost,
        }
    }
}

// =============================================================================
// Calculator
// =============================================================================

/// Stateless recipe cost calculator.
#[derive(Debug, Clone, Copy, Default)]
pub struct CostCalculator;

impl CostCalculator {
    pub fn new() -> Self {
        CostCalculator
    }

    /// Costs every line of `recipe` using the snapshots in `ingredients`.
    ///
    /// ## Errors
    /// - `IngredientNotFound` naming the first line whose ingredient is
    ///   absent from the map
    /// - `DimensionMismatch` if a line's unit cannot measure the ingredient's
    ///   package (grams of something sold by the liter)
    /// - `Money` if an amount leaves the decimal range
    ///
    /// ## Example
    /// ```rust
    /// use std::collections::HashMap;
    /// use costify_core::{CostCalculator, Id, Ingredient, Money, Recipe, RecipeIngredient, Unit};
    ///
    /// let flour = Ingredient::new(
    ///     Id::new("flour").unwrap(), "Flour", 1.0, Money::of(5.00).unwrap(), Unit::Kg,
    /// ).unwrap();
    /// let recipe = Recipe::new(
    ///     Id::new("bread").unwrap(),
    ///     "Bread",
    ///     vec![RecipeIngredient::new(flour.id().clone(), 300.0, Unit::G).unwrap()],
    /// ).unwrap();
    ///
    /// let ingredients = HashMap::from([(flour.id().clone(), flour)]);
    /// let cost = CostCalculator::new().calculate(&recipe, &ingredients).unwrap();
    /// assert_eq!(cost.total_cost, Money::of(1.50).unwrap());
    /// ```
    pub fn calculate(
        &self,
        recipe: &Recipe,
        ingredients: &HashMap<Id, Ingredient>,
    ) -> CoreResult<RecipeCost> {
        let ingredient_costs = recipe
            .ingredients()
            .iter()
            .map(|line| {
                let ingredient = ingredients
                    .get(line.ingredient_id())
                    .ok_or_else(|| CoreError::IngredientNotFound(line.ingredient_id().clone()))?;
                self.line_cost(ingredient, line)
            })
            .collect::<CoreResult<Vec<_>>>()?;

        Ok(RecipeCost::new(
            recipe.id().clone(),
            recipe.name().to_string(),
            ingredient_costs,
        ))
    }

    /// Costs one line against one ingredient snapshot.
    pub fn line_cost(&self, ingredient: &Ingredient, line: &RecipeIngredient) -> CoreResult<IngredientCost> {
        let package_unit = ingredient.package_unit();
        if !line.unit().is_compatible_with(package_unit) {
            return Err(CoreError::DimensionMismatch {
                ingredient_id: ingredient.id().clone(),
                line_unit: line.unit(),
                line_dimension: line.unit().dimension(),
                package_unit,
                package_dimension: package_unit.dimension(),
            });
        }

        // price × used / package, multiplied first: dividing first truncates
        // repeating unit costs and a half cent can round down
        let used: Decimal = decimal_from_f64(line.unit().to_base(line.quantity()))?;
        let package: Decimal = decimal_from_f64(package_unit.to_base(ingredient.package_quantity()))?;
        let raw = ingredient
            .package_price()
            .amount()
            .checked_mul(used)
            .ok_or(MoneyError::Overflow)?
            .checked_div(package)
            .ok_or(MoneyError::DivideByZero)?;

        Ok(IngredientCost {
            ingredient_id: ingredient.id().clone(),
            ingredient_name: ingredient.name().to_string(),
            quantity_used: line.quantity(),
            unit: line.unit(),
            cost: Money::from_decimal(raw)?,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
