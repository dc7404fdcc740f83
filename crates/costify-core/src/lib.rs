//! # costify-core: Pure Business Logic for Costify
//!
//! This crate is the **heart** of Costify. It contains the money model, the
//! unit model and the recipe cost calculation as pure functions with zero
//! I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Costify Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              costify-events (orchestration)                     │   │
//! │  │   CostingService ──► EventGateway ──► IngredientChangeCascade   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ costify-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │   unit    │  │   cost    │  │   │
//! │  │   │ Ingredient│  │   Money   │  │   Unit    │  │ Calculator│  │   │
//! │  │   │  Recipe   │  │  rounding │  │ Dimension │  │ RecipeCost│  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  costify-db (Database Layer)                    │   │
//! │  │          SQLite queries, migrations, repositories, outbox       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Id, Ingredient, RecipeIngredient, Recipe)
//! - [`money`] - Non-negative decimal Money, 2 places, half-up
//! - [`unit`] - Units of measure and their dimensions
//! - [`cost`] - CostCalculator, IngredientCost, RecipeCost
//! - [`events`] - IngredientUpdated
//! - [`error`] - Domain error types
//! - [`validation`] - Construction-time checks
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Decimal Money**: rounded once per operation, never through f64
//! 4. **Explicit Errors**: All errors are typed, never strings or panics
//!
//! ## Example Usage
//!
//! ```rust
//! use std::collections::HashMap;
//! use costify_core::{CostCalculator, Id, Ingredient, Money, Recipe, RecipeIngredient, Unit};
//!
//! let milk = Ingredient::new(
//!     Id::new("milk").unwrap(), "Milk", 1.0, Money::of(2.50).unwrap(), Unit::L,
//! ).unwrap();
//! let latte = Recipe::new(
//!     Id::new("latte").unwrap(),
//!     "Latte",
//!     vec![RecipeIngredient::new(milk.id().clone(), 250.0, Unit::Ml).unwrap()],
//! ).unwrap();
//!
//! let ingredients = HashMap::from([(milk.id().clone(), milk)]);
//! let cost = CostCalculator::new().calculate(&latte, &ingredients).unwrap();
//!
//! // 0.0025/mL × 250 mL = 0.625 → 0.63 (half-up)
//! assert_eq!(cost.total_cost.to_string(), "$0.63");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cost;
pub mod error;
pub mod events;
pub mod money;
pub mod types;
pub mod unit;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use costify_core::Money` instead of
// `use costify_core::money::Money`

pub use cost::{CostCalculator, IngredientCost, RecipeCost};
pub use error::{CoreError, CoreResult, ErrorKind, MoneyError, ValidationError};
pub use events::IngredientUpdated;
pub use money::Money;
pub use types::*;
pub use unit::{Dimension, Unit};
