//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Decimal Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In binary floating point:                                              │
//! │    0.0025 * 250 = 0.625 → stored as 0.62499999...  → rounds to 0.62 ❌  │
//! │                                                                         │
//! │  Recipe costing divides package prices down to fractions of a cent     │
//! │  per gram, then multiplies back up. Binary floats drift at every step. │
//! │                                                                         │
//! │  OUR SOLUTION: Base-10 Decimal, 2 places, half-up                       │
//! │    2.50 / 1000 = 0.0025 exactly                                         │
//! │    0.0025 * 250 = 0.625 exactly → 0.63 ✅                               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Rounding Contract
//! Every constructor and every arithmetic result is rounded ONCE to 2
//! fractional digits, half-up. No hidden extra precision survives between
//! operations: `a.add(b).add(c)` rounds twice.
//!
//! ## Usage
//! ```rust
//! use costify_core::money::Money;
//!
//! let price = Money::of(15.575).unwrap();
//! assert_eq!(price.to_string(), "$15.58");
//!
//! let total = price.add(Money::of(0.42).unwrap());
//! assert_eq!(total.to_string(), "$16.00");
//!
//! assert!(Money::of(-0.01).is_err());
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::iter::Sum;
use std::ops::Add;
use std::str::FromStr;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::{MoneyError, MoneyResult};

/// Number of fractional digits every Money value carries.
pub const MONEY_SCALE: u32 = 2;

// =============================================================================
// Money Type
// =============================================================================

/// A non-negative currency amount with exactly two fractional digits.
///
/// ## Design Decisions
/// - **Decimal (not f64)**: exact base-10 arithmetic, so 0.625 stays 0.625
/// - **Non-negative**: a price or a cost can never go below zero
/// - **Single implied currency**: there is no currency code
/// - **Serialized as a string** (`"12.34"`) so JSON never round-trips
///   through a binary float
///
/// ## Where Money is Used
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Ingredient.package_price ──► unit_cost (Decimal, unrounded)            │
/// │                                     │                                   │
/// │                                     ▼                                   │
/// │            unit_cost × base quantity ──► IngredientCost.cost (Money)    │
/// │                                                  │                      │
/// │                                                  ▼                      │
/// │                         Σ Money::add ──► RecipeCost.total_cost          │
/// │                                                  │                      │
/// │                                                  ▼                      │
/// │                                   Recipe.total_cost (stored as cents)   │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Money(Decimal);

impl Money {
    /// Creates Money from a float, rounding half-up to 2 places.
    ///
    /// The float is read through its shortest round-trip decimal rendering,
    /// so literals behave the way they are written: `1.005` is treated as
    /// exactly 1.005 and rounds to 1.01.
    ///
    /// ## Errors
    /// - `NotFinite` for NaN or an infinity
    /// - `Negative` for any amount below zero
    ///
    /// ## Example
    /// ```rust
    /// use costify_core::money::Money;
    ///
    /// assert_eq!(Money::of(2.345).unwrap().to_string(), "$2.35");
    /// assert_eq!(Money::of(0.625).unwrap().to_string(), "$0.63");
    /// ```
    pub fn of(value: f64) -> MoneyResult<Self> {
        Self::from_decimal(decimal_from_f64(value)?)
    }

    /// Creates Money from an exact decimal, rounding half-up to 2 places.
    pub fn from_decimal(amount: Decimal) -> MoneyResult<Self> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(MoneyError::Negative(amount));
        }
        Ok(Money(round(amount)))
    }

    /// Creates Money from integer cents (the storage representation).
    ///
    /// ## Example
    /// ```rust
    /// use costify_core::money::Money;
    ///
    /// let price = Money::from_cents(1099).unwrap();
    /// assert_eq!(price.to_string(), "$10.99");
    /// ```
    pub fn from_cents(cents: i64) -> MoneyResult<Self> {
        if cents < 0 {
            return Err(MoneyError::Negative(Decimal::new(cents, MONEY_SCALE)));
        }
        Ok(Money(Decimal::new(cents, MONEY_SCALE)))
    }

    /// Zero money, `$0.00`.
    pub fn zero() -> Self {
        Money(Decimal::new(0, MONEY_SCALE))
    }

    /// Returns the exact amount (always scale 2).
    #[inline]
    pub fn amount(&self) -> Decimal {
        self.0
    }

    /// Returns the amount in cents.
    ///
    /// Fails with `Overflow` only for amounts beyond the i64 cent range.
    pub fn cents(&self) -> MoneyResult<i64> {
        // Scale is pinned at 2, so the mantissa is the cent count.
        i64::try_from(self.0.mantissa()).map_err(|_| MoneyError::Overflow)
    }

    /// Checks if the value is zero.
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    // ===== Arithmetic =====

    /// Adds two amounts.
    ///
    /// Infallible: the sum of two non-negative amounts is non-negative.
    /// Saturates at the top of the decimal range.
    pub fn add(self, other: Money) -> Money {
        match self.0.checked_add(other.0) {
            Some(sum) => Money(round(sum)),
            None => Money(round(Decimal::MAX)),
        }
    }

    /// Subtracts `other`, failing with `NegativeResult` if it is larger.
    ///
    /// ## Example
    /// ```rust
    /// use costify_core::money::Money;
    ///
    /// let a = Money::of(5.00).unwrap();
    /// let b = Money::of(7.50).unwrap();
    /// assert!(a.subtract(b).is_err());
    /// assert_eq!(b.subtract(a).unwrap().to_string(), "$2.50");
    /// ```
    pub fn subtract(self, other: Money) -> MoneyResult<Money> {
        let diff = self.0 - other.0;
        if diff.is_sign_negative() && !diff.is_zero() {
            return Err(MoneyError::NegativeResult(diff));
        }
        Ok(Money(round(diff)))
    }

    /// Multiplies by a scalar, rounding the result.
    pub fn multiply(self, factor: f64) -> MoneyResult<Money> {
        let factor = decimal_from_f64(factor)?;
        if factor.is_sign_negative() && !factor.is_zero() {
            return Err(MoneyError::NegativeResult(factor));
        }
        let product = self.0.checked_mul(factor).ok_or(MoneyError::Overflow)?;
        Ok(Money(round(product)))
    }

    /// Divides by a scalar, rounding the result.
    ///
    /// ## Example
    /// ```rust
    /// use costify_core::money::Money;
    ///
    /// let price = Money::of(10.00).unwrap();
    /// assert_eq!(price.divide(3.0).unwrap().to_string(), "$3.33");
    /// assert!(price.divide(0.0).is_err());
    /// ```
    pub fn divide(self, divisor: f64) -> MoneyResult<Money> {
        let divisor = decimal_from_f64(divisor)?;
        if divisor.is_zero() {
            return Err(MoneyError::DivideByZero);
        }
        if divisor.is_sign_negative() {
            return Err(MoneyError::NegativeResult(-self.0));
        }
        let quotient = self.0.checked_div(divisor).ok_or(MoneyError::Overflow)?;
        Ok(Money(round(quotient)))
    }

    // ===== Comparison =====

    pub fn is_greater_than(&self, other: &Money) -> bool {
        self.0 > other.0
    }

    pub fn is_less_than(&self, other: &Money) -> bool {
        self.0 < other.0
    }

    /// Numeric equality of the rounded amounts.
    pub fn equals_value(&self, other: &Money) -> bool {
        self.0 == other.0
    }
}

/// Rounds half-up to the money scale and pins the scale at 2.
///
/// For the non-negative domain, `MidpointAwayFromZero` is exactly half-up.
fn round(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero);
    if rounded.is_zero() {
        return Decimal::new(0, MONEY_SCALE);
    }
    rounded.rescale(MONEY_SCALE);
    rounded
}

/// Converts a float to Decimal via its shortest round-trip rendering.
pub(crate) fn decimal_from_f64(value: f64) -> MoneyResult<Decimal> {
    if !value.is_finite() {
        return Err(MoneyError::NotFinite);
    }
    Decimal::from_str(&value.to_string())
        .ok()
        .or_else(|| Decimal::from_f64(value))
        .ok_or(MoneyError::Overflow)
}

// =============================================================================
// Trait Implementations
// =============================================================================

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.0)
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl PartialOrd for Money {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Money {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

/// Operator form of [`Money::add`].
impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money::add(self, other)
    }
}

/// Sums with `Money::add` semantics (rounded at every step).
impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Money::add)
    }
}

/// Parses `"12.34"` or `"$12.34"`.
impl FromStr for Money {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed.strip_prefix('$').unwrap_or(trimmed);
        let amount =
            Decimal::from_str(digits).map_err(|_| MoneyError::InvalidAmount(s.to_string()))?;
        Money::from_decimal(amount)
    }
}

impl TryFrom<String> for Money {
    type Error = MoneyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Money> for String {
    fn from(money: Money) -> Self {
        money.0.to_string()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
