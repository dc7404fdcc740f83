//! # costify-db: Database Layer for Costify
//!
//! This crate provides database access for Costify.
//! It uses SQLite for local storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Costify Data Flow                                │
//! │                                                                         │
//! │  CostingService / EventDispatcher (costify-events)                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   costify-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐    ┌──────────────┐ │   │
//! │  │   │   Database    │    │  Repositories  │    │  Migrations  │ │   │
//! │  │   │   (pool.rs)   │    │                │    │  (embedded)  │ │   │
//! │  │   │               │    │ IngredientRepo │    │ 001_initial  │ │   │
//! │  │   │ SqlitePool    │◄───│ RecipeRepo     │    │   _schema    │ │   │
//! │  │   │               │    │ EventOutbox    │    │              │ │   │
//! │  │   └───────────────┘    └────────────────┘    └──────────────┘ │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database file (or :memory: in tests)                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Ingredient, recipe and outbox repositories
//!
//! ## Usage
//!
//! ```rust,ignore
//! use costify_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/costify.db")).await?;
//! let recipes = db.recipes().find_by_ingredient_id(&milk_id).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::ingredient::IngredientRepository;
pub use repository::outbox::{EventOutboxRepository, OutboxEntry};
pub use repository::recipe::RecipeRepository;
