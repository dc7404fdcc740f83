//! # Units of Measure
//!
//! The fixed set of units an ingredient can be packaged in or a recipe can
//! use, each tagged with a [`Dimension`] and a factor to that dimension's
//! base unit.
//!
//! ## Unit Table
//! ```text
//! ┌──────────────┬───────────┬──────────────┬──────────────────────────────┐
//! │ Unit         │ Dimension │ Factor       │ Notes                        │
//! ├──────────────┼───────────┼──────────────┼──────────────────────────────┤
//! │ ML           │ Volume    │ 1            │ base unit for volume         │
//! │ L            │ Volume    │ 1000         │                              │
//! │ TBSP         │ Volume    │ 15           │ liquid tablespoon            │
//! │ G            │ Weight    │ 1            │ base unit for weight         │
//! │ KG           │ Weight    │ 1000         │                              │
//! │ TBSP_BUTTER  │ Weight    │ 14           │ tablespoon of fat, by weight │
//! │ UN           │ Count     │ 1            │ each                         │
//! └──────────────┴───────────┴──────────────┴──────────────────────────────┘
//! ```
//!
//! Units are static facts. The table is a compile-time constant; there is
//! no registry to populate and nothing to persist beyond the unit code.
//!
//! ## Dimension Safety
//! Conversions only happen within a dimension. [`Unit::convert`] fails with
//! `DimensionMismatch` when asked to go from grams to liters.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::Id;

// =============================================================================
// Dimension
// =============================================================================

/// A category of measurement. Units convert only within one dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Dimension {
    Volume,
    Weight,
    Count,
}

impl Dimension {
    /// The smallest unit of the dimension (factor 1).
    pub const fn base_unit(&self) -> Unit {
        match self {
            Dimension::Volume => Unit::Ml,
            Dimension::Weight => Unit::G,
            Dimension::Count => Unit::Un,
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dimension::Volume => "VOLUME",
            Dimension::Weight => "WEIGHT",
            Dimension::Count => "COUNT",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Unit
// =============================================================================

/// A unit of measure.
///
/// Serialized (and stored) as its upper-case code, e.g. `"KG"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "&'static str", try_from = "String")]
pub enum Unit {
    /// Milliliter.
    Ml,
    /// Liter.
    L,
    /// Tablespoon of liquid (15 mL).
    Tbsp,
    /// Gram.
    G,
    /// Kilogram.
    Kg,
    /// Tablespoon of butter or other fat (14 g).
    TbspButter,
    /// Each.
    Un,
}

impl Unit {
    /// Every unit, in table order.
    pub const ALL: [Unit; 7] = [
        Unit::Ml,
        Unit::L,
        Unit::Tbsp,
        Unit::G,
        Unit::Kg,
        Unit::TbspButter,
        Unit::Un,
    ];

    pub const fn dimension(&self) -> Dimension {
        match self {
            Unit::Ml | Unit::L | Unit::Tbsp => Dimension::Volume,
            Unit::G | Unit::Kg | Unit::TbspButter => Dimension::Weight,
            Unit::Un => Dimension::Count,
        }
    }

    /// Multiplier from this unit to the dimension's base unit.
    pub const fn factor_to_base(&self) -> f64 {
        match self {
            Unit::Ml => 1.0,
            Unit::L => 1000.0,
            Unit::Tbsp => 15.0,
            Unit::G => 1.0,
            Unit::Kg => 1000.0,
            Unit::TbspButter => 14.0,
            Unit::Un => 1.0,
        }
    }

    /// Persisted code.
    pub const fn code(&self) -> &'static str {
        match self {
            Unit::Ml => "ML",
            Unit::L => "L",
            Unit::Tbsp => "TBSP",
            Unit::G => "G",
            Unit::Kg => "KG",
            Unit::TbspButter => "TBSP_BUTTER",
            Unit::Un => "UN",
        }
    }

    /// Converts a quantity in this unit to the base unit.
    ///
    /// ## Example
    /// ```rust
    /// use costify_core::unit::Unit;
    ///
    /// assert_eq!(Unit::Kg.to_base(0.3), 300.0);
    /// assert_eq!(Unit::Tbsp.to_base(2.0), 30.0);
    /// ```
    #[inline]
    pub fn to_base(&self, quantity: f64) -> f64 {
        quantity * self.factor_to_base()
    }

    /// Whether quantities in `self` and `other` can be compared.
    #[inline]
    pub fn is_compatible_with(&self, other: Unit) -> bool {
        self.dimension() == other.dimension()
    }

    /// Converts `quantity` from this unit into `target`.
    ///
    /// ## Errors
    /// `DimensionMismatch` if the units measure different things. The
    /// `ingredient_id` only labels the error.
    pub fn convert(&self, quantity: f64, target: Unit, ingredient_id: &Id) -> CoreResult<f64> {
        if !self.is_compatible_with(target) {
            return Err(CoreError::DimensionMismatch {
                ingredient_id: ingredient_id.clone(),
                line_unit: *self,
                line_dimension: self.dimension(),
                package_unit: target,
                package_dimension: target.dimension(),
            });
        }
        Ok(self.to_base(quantity) / target.factor_to_base())
    }

    /// Units of one dimension, in table order.
    pub fn units_of(dimension: Dimension) -> impl Iterator<Item = Unit> {
        Unit::ALL.into_iter().filter(move |u| u.dimension() == dimension)
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Accepts the code in any case, plus a few long names.
impl FromStr for Unit {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace([' ', '-'], "_");
        let unit = match normalized.as_str() {
            "ML" | "MILLILITER" | "MILLILITRE" => Unit::Ml,
            "L" | "LITER" | "LITRE" => Unit::L,
            "TBSP" | "TABLESPOON" => Unit::Tbsp,
            "G" | "GRAM" => Unit::G,
            "KG" | "KILOGRAM" => Unit::Kg,
            "TBSP_BUTTER" | "TABLESPOON_BUTTER" => Unit::TbspButter,
            "UN" | "EACH" | "UNIT" => Unit::Un,
            _ => {
                return Err(ValidationError::NotAllowed {
                    field: "unit".to_string(),
                    allowed: Unit::ALL.iter().map(|u| u.code().to_string()).collect(),
                })
            }
        };
        Ok(unit)
    }
}

impl From<Unit> for &'static str {
    fn from(unit: Unit) -> Self {
        unit.code()
    }
}

impl TryFrom<String> for Unit {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_table() {
        assert_eq!(Unit::L.to_base(1.0), 1000.0);
        assert_eq!(Unit::Kg.to_base(0.5), 500.0);
        assert_eq!(Unit::TbspButter.to_base(2.0), 28.0);
        assert_eq!(Unit::Un.to_base(3.0), 3.0);
        for dimension in [Dimension::Volume, Dimension::Weight, Dimension::Count] {
            assert_eq!(dimension.base_unit().factor_to_base(), 1.0);
            assert_eq!(dimension.base_unit().dimension(), dimension);
        }
    }

    #[test]
    fn test_units_of() {
        let weights: Vec<Unit> = Unit::units_of(Dimension::Weight).collect();
        assert_eq!(weights, vec![Unit::G, Unit::Kg, Unit::TbspButter]);
    }

    #[test]
    fn test_parse() {
        assert_eq!("kg".parse::<Unit>().unwrap(), Unit::Kg);
        assert_eq!("Kilogram".parse::<Unit>().unwrap(), Unit::Kg);
        assert_eq!("tbsp-butter".parse::<Unit>().unwrap(), Unit::TbspButter);
        assert!("cup".parse::<Unit>().is_err());
        for unit in Unit::ALL {
            assert_eq!(unit.code().parse::<Unit>().unwrap(), unit);
        }
    }

    #[test]
    fn test_convert_same_dimension() {
        let id = Id::new("milk").unwrap();
        assert_eq!(Unit::Ml.convert(250.0, Unit::L, &id).unwrap(), 0.25);
        assert_eq!(Unit::Kg.convert(0.2, Unit::G, &id).unwrap(), 200.0);
    }

    #[test]
    fn test_convert_across_dimensions_fails() {
        let id = Id::new("milk").unwrap();
        let err = Unit::G.convert(100.0, Unit::L, &id).unwrap_err();
        match err {
            CoreError::DimensionMismatch {
                ingredient_id,
                line_unit,
                package_unit,
                ..
            } => {
                assert_eq!(ingredient_id.as_str(), "milk");
                assert_eq!(line_unit, Unit::G);
                assert_eq!(package_unit, Unit::L);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_serde_uses_code() {
        let json = serde_json::to_string(&Unit::TbspButter).unwrap();
        assert_eq!(json, "\"TBSP_BUTTER\"");
        let back: Unit = serde_json::from_str("\"l\"").unwrap();
        assert_eq!(back, Unit::L);
    }

    proptest! {
        // Factors are small integers, so sums of dyadic quantities stay exact.
        #[test]
        fn prop_to_base_is_linear(a in 0u32..1_000_000, b in 0u32..1_000_000) {
            let q1 = a as f64 / 1024.0;
            let q2 = b as f64 / 1024.0;
            for unit in Unit::ALL {
                prop_assert_eq!(unit.to_base(q1 + q2), unit.to_base(q1) + unit.to_base(q2));
            }
        }

        #[test]
        fn prop_to_base_linear_within_tolerance(q1 in 0.0f64..1e6, q2 in 0.0f64..1e6) {
            for unit in Unit::ALL {
                let lhs = unit.to_base(q1 + q2);
                let rhs = unit.to_base(q1) + unit.to_base(q2);
                prop_assert!((lhs - rhs).abs() <= 1e-9 * lhs.abs().max(1.0));
            }
        }
    }
}
