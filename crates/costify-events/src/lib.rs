//! # costify-events: Cascade and Post-Commit Delivery for Costify
//!
//! This crate keeps stored recipe totals in step with ingredient prices. It
//! owns what happens after an ingredient write commits, and when.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Costify Orchestration                           │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                     CostingService (use cases)                   │  │
//! │  │  register / update / get / list ingredients and recipes          │  │
//! │  │  update_ingredient: write + outbox row in one transaction,       │  │
//! │  │                     PendingEvents released after commit          │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │ mpsc (try_send)                         │
//! │                               ▼                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                   EventDispatcher (gateway.rs)                   │  │
//! │  │  claim outbox row ──► IngredientChangeCascade                    │  │
//! │  │  relay sweep for rows the hot path never delivered               │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               ▼                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │               IngredientChangeCascade (cascade.rs)               │  │
//! │  │  affected recipes ──► CostCalculator ──► version-guarded save    │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! │  Ports (ports.rs) ◄── SqliteStore (store.rs) / InMemoryStore (memory.rs)│
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`cascade`] - `IngredientChangeCascade` and its report
//! - [`config`] - TOML + environment configuration
//! - [`error`] - Store, cascade, service and config errors
//! - [`gateway`] - `PendingEvents`, `EventDispatcher`, `GatewayHandle`
//! - [`logging`] - tracing subscriber setup
//! - [`memory`] - In-memory adapter
//! - [`ports`] - Storage traits
//! - [`service`] - `CostingService`
//! - [`store`] - SQLite adapter
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use costify_events::{CostifyConfig, CostingService, EventDispatcher, IngredientChangeCascade, SqliteStore};
//!
//! let config = CostifyConfig::load_or_default(None);
//! let store = Arc::new(SqliteStore::new(database));
//! let cascade = IngredientChangeCascade::new(store.clone(), store.clone(), config.cascade.clone());
//! let (dispatcher, gateway) = EventDispatcher::new(Arc::new(cascade), store.clone(), config.gateway.clone());
//! let task = dispatcher.spawn();
//!
//! let service = CostingService::new(store.clone(), store, gateway.clone());
//! service.update_ingredient(&milk_id, IngredientChanges::price(Money::of(8.0)?)).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cascade;
pub mod config;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod memory;
pub mod ports;
pub mod service;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use cascade::{CascadeReport, IngredientChangeCascade, RecipeFailure, RecipeUpdate};
pub use config::{CascadeSettings, CostifyConfig, DatabaseSettings, GatewaySettings, LoggingSettings};
pub use error::{
    CascadeError, ConfigError, ConfigResult, ServiceError, ServiceResult, StoreError, StoreResult,
};
pub use gateway::{DeliveryOutcome, EventDispatcher, GatewayHandle, PendingEvents};
pub use logging::init_logging;
pub use memory::InMemoryStore;
pub use ports::{EventOutbox, IngredientSource, IngredientStore, RecipeStore};
pub use service::CostingService;
pub use store::SqliteStore;
