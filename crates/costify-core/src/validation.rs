//! # Validation Module
//!
//! Construction-time checks shared by the entity constructors.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Entity constructors (THIS MODULE)                            │
//! │  ├── Blank names, non-positive quantities, NaN                         │
//! │  └── Fail immediately, never coerce                                    │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Database (SQLite)                                            │
//! │  ├── NOT NULL / CHECK constraints                                      │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use costify_core::validation::{validate_name, validate_quantity};
//!
//! validate_name("name", "Flour").unwrap();
//! validate_quantity("quantity", 0.25).unwrap();
//! assert!(validate_quantity("quantity", 0.0).is_err());
//! ```

use crate::error::ValidationError;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest name accepted for ingredients and recipes.
pub const MAX_NAME_LENGTH: usize = 200;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a display name and returns it trimmed.
///
/// ## Rules
/// - Must not be blank
/// - At most [`MAX_NAME_LENGTH`] characters after trimming
pub fn validate_name(field: &str, name: &str) -> ValidationResult<String> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NAME_LENGTH,
        });
    }

    Ok(name.to_string())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a quantity: finite and strictly positive.
///
/// ## Example
/// ```rust
/// use costify_core::validation::validate_quantity;
///
/// assert!(validate_quantity("package_quantity", 1.0).is_ok());
/// assert!(validate_quantity("package_quantity", -1.0).is_err());
/// assert!(validate_quantity("package_quantity", f64::NAN).is_err());
/// ```
pub fn validate_quantity(field: &str, quantity: f64) -> ValidationResult<f64> {
    // NaN fails the comparison too
    if !(quantity.is_finite() && quantity > 0.0) {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    Ok(quantity)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name("name", "  Flour ").unwrap(), "Flour");
        assert!(matches!(
            validate_name("name", "   "),
            Err(ValidationError::Required { .. })
        ));
        assert!(matches!(
            validate_name("name", &"x".repeat(MAX_NAME_LENGTH + 1)),
            Err(ValidationError::TooLong { .. })
        ));
    }

    #[test]
    fn test_validate_quantity() {
        assert_eq!(validate_quantity("q", 0.5).unwrap(), 0.5);
        assert!(validate_quantity("q", 0.0).is_err());
        assert!(validate_quantity("q", -2.0).is_err());
        assert!(validate_quantity("q", f64::INFINITY).is_err());
        assert!(validate_quantity("q", f64::NAN).is_err());
    }
}
