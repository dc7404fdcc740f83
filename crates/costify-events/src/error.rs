//! # Orchestration Error Types
//!
//! Error types for the ports, the cascade, the use cases and configuration.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Orchestration Error Categories                      │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │   StoreError    │  │  CascadeError   │  │     ServiceError        │ │
//! │  │   (ports)       │  │  (per recipe)   │  │     (use cases)         │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  NotFound       │  │  Store          │  │  IngredientNotFound     │ │
//! │  │  Conflict       │  │  Calculation    │  │  RecipeNotFound         │ │
//! │  │  Duplicate      │  │  Conflict-      │  │  ...AlreadyExists       │ │
//! │  │  Integrity      │  │   Exhausted     │  │  Core / Store           │ │
//! │  │  Backend        │  │                 │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐                                                   │
//! │  │   ConfigError   │  Every error reports an ErrorKind:                │
//! │  │                 │  Validation, NotFound, Arithmetic, Persistence   │
//! │  │  Load / Save    │                                                   │
//! │  │  Invalid        │                                                   │
//! │  └─────────────────┘                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use costify_core::{CoreError, ErrorKind, Id, MoneyError, ValidationError};
use costify_db::DbError;

/// Result type alias for port operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type alias for use cases.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Result type alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Store Errors
// =============================================================================

/// Failure reported by a storage adapter.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The entity does not exist (or no longer exists).
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A version-guarded save lost the race.
    #[error("{entity} {id} was modified concurrently")]
    Conflict { entity: String, id: String },

    /// A unique field is already taken.
    #[error("Duplicate {field}: '{value}' already exists")]
    Duplicate { field: String, value: String },

    /// A reference points at something that does not exist.
    #[error("Integrity violation: {0}")]
    Integrity(String),

    /// Anything else the backend reports.
    #[error("Storage failure: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn conflict(entity: impl Into<String>, id: impl Into<String>) -> Self {
        StoreError::Conflict {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::NotFound { .. } => ErrorKind::NotFound,
            StoreError::Duplicate { .. } => ErrorKind::Validation,
            StoreError::Conflict { .. } | StoreError::Integrity(_) | StoreError::Backend(_) => {
                ErrorKind::Persistence
            }
        }
    }
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => StoreError::NotFound { entity, id },
            DbError::VersionConflict { entity, id, .. } | DbError::StaleSnapshot { entity, id } => {
                StoreError::Conflict { entity, id }
            }
            DbError::UniqueViolation { field, value } => StoreError::Duplicate { field, value },
            DbError::ForeignKeyViolation { message } => StoreError::Integrity(message),
            other => StoreError::Backend(other.to_string()),
        }
    }
}

// =============================================================================
// Cascade Errors
// =============================================================================

/// Why one recipe could not be brought up to date.
#[derive(Debug, Error)]
pub enum CascadeError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Missing ingredient, unit mismatch, or an amount out of range.
    #[error("Recalculation failed: {0}")]
    Calculation(#[from] CoreError),

    #[error("Recipe {recipe_id} still conflicting after {attempts} attempts")]
    ConflictRetriesExhausted { recipe_id: Id, attempts: u32 },
}

impl CascadeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CascadeError::Store(err) => err.kind(),
            CascadeError::Calculation(err) => err.kind(),
            CascadeError::ConflictRetriesExhausted { .. } => ErrorKind::Persistence,
        }
    }
}

// =============================================================================
// Service Errors
// =============================================================================

/// Errors returned by [`crate::CostingService`].
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Ingredient not found: {0}")]
    IngredientNotFound(Id),

    #[error("Recipe not found: {0}")]
    RecipeNotFound(Id),

    #[error("An ingredient named '{0}' already exists")]
    IngredientAlreadyExists(String),

    #[error("A recipe named '{0}' already exists")]
    RecipeAlreadyExists(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::IngredientNotFound(_) | ServiceError::RecipeNotFound(_) => {
                ErrorKind::NotFound
            }
            ServiceError::IngredientAlreadyExists(_) | ServiceError::RecipeAlreadyExists(_) => {
                ErrorKind::Validation
            }
            ServiceError::Core(err) => err.kind(),
            ServiceError::Store(err) => err.kind(),
        }
    }
}

impl From<ValidationError> for ServiceError {
    fn from(err: ValidationError) -> Self {
        ServiceError::Core(err.into())
    }
}

impl From<MoneyError> for ServiceError {
    fn from(err: MoneyError) -> Self {
        ServiceError::Core(err.into())
    }
}

// =============================================================================
// Configuration Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    LoadFailed(String),

    #[error("Failed to save config: {0}")]
    SaveFailed(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::LoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::LoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for ConfigError {
    fn from(err: toml::ser::Error) -> Self {
        ConfigError::SaveFailed(err.to_string())
    }
}
