//! # Error Types
//!
//! Domain-specific error types for costify-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  costify-core errors (this file)                                       │
//! │  ├── CoreError        - Calculation and domain rule failures           │
//! │  ├── ValidationError  - Construction-time input failures               │
//! │  └── MoneyError       - Money construction and arithmetic failures     │
//! │                                                                         │
//! │  costify-db errors (separate crate)                                    │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  costify-events errors (separate crate)                                │
//! │  └── StoreError / CascadeError / ServiceError                          │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ServiceError → caller             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (ingredient id, field name, amount)
//! 3. Errors are closed enums, never String
//! 4. Every error maps to one machine-readable [`ErrorKind`]

use std::fmt;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::types::Id;
use crate::unit::Unit;

// =============================================================================
// Error Kind
// =============================================================================

/// Machine-readable category shared by every error in the workspace.
///
/// Callers that need to branch (HTTP status mapping, retry decisions)
/// should match on this instead of on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad input at construction time. Never retried.
    Validation,
    /// A referenced entity does not exist.
    NotFound,
    /// Money arithmetic would leave the valid domain.
    Arithmetic,
    /// The storage layer failed or rejected a write.
    Persistence,
}

impl ErrorKind {
    /// Stable code for logs and API payloads.
    pub const fn code(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Arithmetic => "ARITHMETIC",
            ErrorKind::Persistence => "PERSISTENCE",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These errors abort a single unit of work (one calculation, one entity
/// construction) and are never retried: they point at bad data or a caller
/// that broke its contract.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A recipe line references an ingredient missing from the lookup map.
    ///
    /// ## User Workflow
    /// ```text
    /// calculate(recipe, ingredients)
    ///      │
    ///      ▼
    /// line 2 → ingredient "butter" not in map
    ///      │
    ///      ▼
    /// IngredientNotFound("butter") - no partial RecipeCost is produced
    /// ```
    #[error("Ingredient not found: {0}")]
    IngredientNotFound(Id),

    /// A recipe line and the ingredient package use units of different
    /// dimensions (e.g. grams of milk packaged in liters).
    #[error(
        "Unit mismatch for ingredient {ingredient_id}: recipe uses {line_unit} ({line_dimension}), package uses {package_unit} ({package_dimension})"
    )]
    DimensionMismatch {
        ingredient_id: Id,
        line_unit: Unit,
        line_dimension: crate::unit::Dimension,
        package_unit: Unit,
        package_dimension: crate::unit::Dimension,
    },

    /// Money construction or arithmetic failed.
    #[error("Money error: {0}")]
    Money(#[from] MoneyError),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Returns the machine-readable category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::IngredientNotFound(_) => ErrorKind::NotFound,
            CoreError::DimensionMismatch { .. } => ErrorKind::Validation,
            CoreError::Money(err) => err.kind(),
            CoreError::Validation(_) => ErrorKind::Validation,
        }
    }
}

// =============================================================================
// Money Error
// =============================================================================

/// Failures of the [`Money`](crate::money::Money) value type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    /// Construction from a negative amount.
    #[error("Money cannot be negative: {0}")]
    Negative(Decimal),

    /// Construction from NaN or an infinity.
    #[error("Money requires a finite amount")]
    NotFinite,

    /// Subtraction or scaling would go below zero.
    #[error("Operation would result in negative money: {0}")]
    NegativeResult(Decimal),

    /// Division by zero.
    #[error("Cannot divide money by zero")]
    DivideByZero,

    /// Result does not fit the decimal range.
    #[error("Money amount out of range")]
    Overflow,

    /// Text that does not parse as a decimal amount.
    #[error("Invalid money amount: {0}")]
    InvalidAmount(String),
}

impl MoneyError {
    /// Negative or non-finite input is a validation failure; the rest are
    /// arithmetic failures.
    pub fn kind(&self) -> ErrorKind {
        match self {
            MoneyError::Negative(_) | MoneyError::NotFinite | MoneyError::InvalidAmount(_) => {
                ErrorKind::Validation
            }
            MoneyError::NegativeResult(_) | MoneyError::DivideByZero | MoneyError::Overflow => {
                ErrorKind::Arithmetic
            }
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised at the point of construction; values are never silently coerced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or blank.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must be strictly positive (and finite).
    #[error("{field} must be greater than zero")]
    MustBePositive { field: String },

    /// A recipe must keep at least one ingredient line.
    #[error("Recipe must have at least one ingredient")]
    EmptyRecipe,

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

/// Convenience type alias for Money operations.
pub type MoneyResult<T> = Result<T, MoneyError>;

// =============================================================================
// Unit Tests
// =============================================================================
