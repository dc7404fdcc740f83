//! # Repository Module
//!
//! Database repository implementations for Costify.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CostingService / IngredientChangeCascade                               │
//! │       │                                                                 │
//! │       │  db.recipes().find_by_ingredient_id(&milk)                      │
//! │       ▼                                                                 │
//! │  RecipeRepository                                                       │
//! │  ├── get_by_id / find_by_ingredient_id / list                           │
//! │  ├── insert                                                             │
//! │  └── save (version-guarded)                                             │
//! │       │                                                                 │
//! │       │  SQL Query → Row struct → validated domain type                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Rows are read into plain `FromRow` structs and converted into domain types
//! through their validating constructors, so a corrupt row surfaces as
//! `DbError::InvalidData` instead of an invalid value.
//!
//! ## Available Repositories
//!
//! - [`IngredientRepository`](ingredient::IngredientRepository) - Ingredient CRUD, update + outbox in one transaction
//! - [`RecipeRepository`](recipe::RecipeRepository) - Recipes with their ordered lines
//! - [`EventOutboxRepository`](outbox::EventOutboxRepository) - Claim / relay of ingredient events

pub mod ingredient;
pub mod outbox;
pub mod recipe;
