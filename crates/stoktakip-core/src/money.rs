//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In binary floating point:                                              │
//! │    45.00 × 1.15 = 51.74999999999999  ❌ WRONG!                          │
//! │                                                                         │
//! │  OUR SOLUTION: Integer kuruş + exact decimal input                      │
//! │    "45.00" ──rust_decimal──► 4500 kuruş                                 │
//! │    4500 × 1.15 (exact) = 5175 kuruş                                     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every balance, price and payment is stored as an `i64` number of minor
//! units (kuruş). Decimal strings from forms are parsed with
//! [`rust_decimal`] and converted exactly; nothing ever passes through `f64`.
//!
//! ## Usage
//! ```rust
//! use stoktakip_core::money::Money;
//!
//! let price = Money::from_cents(6750); // ₺67.50
//! let total = price * 2i64 + Money::from_cents(500);
//! assert_eq!(total.cents(), 14000);
//!
//! let parsed = Money::parse("amount", "45.00").unwrap();
//! assert_eq!(parsed.cents(), 4500);
//! ```

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (kuruş for TRY).
///
/// ## Design Decisions
/// - **i64 (signed)**: open-account balances go negative when a customer
///   has credit with the store
/// - **Single field tuple struct**: zero-cost abstraction over i64
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from minor units.
    ///
    /// ```rust
    /// use stoktakip_core::money::Money;
    ///
    /// let price = Money::from_cents(1099); // ₺10.99
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from major and minor units.
    ///
    /// For negative amounts only the major unit should be negative:
    /// `from_major_minor(-5, 50)` is -₺5.50.
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Converts an exact decimal to Money, rounding to 2 fractional digits
    /// (midpoint away from zero).
    ///
    /// Returns `None` if the value does not fit in an `i64` of minor units.
    ///
    /// ```rust
    /// use rust_decimal::Decimal;
    /// use stoktakip_core::money::Money;
    ///
    /// let d = Decimal::new(51745, 3); // 51.745
    /// assert_eq!(Money::from_decimal(d).unwrap().cents(), 5175);
    /// ```
    pub fn from_decimal(value: Decimal) -> Option<Self> {
        let minor = value
            .checked_mul(Decimal::ONE_HUNDRED)?
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        minor.to_i64().map(Money)
    }

    /// Parses a user-entered decimal string ("45.00", "45,5", "120").
    ///
    /// A comma is accepted as the decimal separator when no dot is present.
    /// More than two fractional digits are rounded.
    pub fn parse(field: &str, raw: &str) -> Result<Self, ValidationError> {
        let value = parse_decimal(field, raw)?;
        Money::from_decimal(value).ok_or_else(|| ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "amount is out of range".to_string(),
        })
    }

    /// Returns the value as an exact decimal with 2 fractional digits.
    #[inline]
    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.0, 2)
    }

    /// Returns the value in minor units.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit (lira) portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Multiplies money by a quantity.
    ///
    /// ```rust
    /// use stoktakip_core::money::Money;
    ///
    /// let unit_price = Money::from_cents(29900); // ₺299.00
    /// assert_eq!(unit_price.multiply_quantity(3).cents(), 89700);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Adds two amounts, returning `None` on overflow.
    #[inline]
    pub const fn checked_add(self, other: Money) -> Option<Money> {
        match self.0.checked_add(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Multiplies by a quantity, returning `None` on overflow.
    ///
    /// ```rust
    /// use stoktakip_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(6750).checked_mul(2), Some(Money::from_cents(13500)));
    /// assert_eq!(Money::from_cents(i64::MAX / 2).checked_mul(3), None);
    /// ```
    #[inline]
    pub const fn checked_mul(self, qty: i64) -> Option<Money> {
        match self.0.checked_mul(qty) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Sums amounts, returning `None` if any partial sum overflows.
    pub fn checked_sum<I: IntoIterator<Item = Money>>(amounts: I) -> Option<Money> {
        amounts
            .into_iter()
            .try_fold(Money::zero(), |acc, amount| acc.checked_add(amount))
    }
}

/// Parses a decimal string the way the back office forms send them.
pub(crate) fn parse_decimal(field: &str, raw: &str) -> Result<Decimal, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    let normalized = if trimmed.contains('.') {
        trimmed.to_string()
    } else {
        trimmed.replace(',', ".")
    };

    Decimal::from_str(&normalized).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: format!("'{}' is not a decimal number", trimmed),
    })
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Debug-friendly display ("₺67.50"). Front ends format for their locale.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}₺{}.{:02}", sign, self.major().abs(), self.cents_part())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(1099);
        assert_eq!(money.cents(), 1099);
        assert_eq!(money.major(), 10);
        assert_eq!(money.cents_part(), 99);
    }

    #[test]
    fn test_from_major_minor() {
        assert_eq!(Money::from_major_minor(10, 99).cents(), 1099);
        assert_eq!(Money::from_major_minor(-5, 50).cents(), -550);
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(6750).to_string(), "₺67.50");
        assert_eq!(Money::from_cents(-550).to_string(), "-₺5.50");
        assert_eq!(Money::from_cents(0).to_string(), "₺0.00");
    }

    #[test]
    fn test_decimal_round_trip_is_exact() {
        assert_eq!(Money::from_decimal(dec!(45.00)).unwrap().cents(), 4500);
        assert_eq!(Money::from_cents(4500).to_decimal(), dec!(45.00));
        // 0.1 + 0.2 stays exact in decimal arithmetic
        let sum = dec!(0.1) + dec!(0.2);
        assert_eq!(Money::from_decimal(sum).unwrap().cents(), 30);
    }

    #[test]
    fn test_from_decimal_rounds_midpoint_away_from_zero() {
        assert_eq!(Money::from_decimal(dec!(51.745)).unwrap().cents(), 5175);
        assert_eq!(Money::from_decimal(dec!(51.744)).unwrap().cents(), 5174);
        assert_eq!(Money::from_decimal(dec!(-0.005)).unwrap().cents(), -1);
    }

    #[test]
    fn test_parse() {
        assert_eq!(Money::parse("cost", "45.00").unwrap().cents(), 4500);
        assert_eq!(Money::parse("cost", " 45,5 ").unwrap().cents(), 4550);
        assert_eq!(Money::parse("cost", "120").unwrap().cents(), 12000);
        assert!(matches!(
            Money::parse("cost", ""),
            Err(ValidationError::Required { .. })
        ));
        assert!(matches!(
            Money::parse("cost", "abc"),
            Err(ValidationError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!((-a).cents(), -1000);
        assert_eq!((a * 3i64).cents(), 3000);

        let total: Money = vec![a, b, -b].into_iter().sum();
        assert_eq!(total.cents(), 1000);
    }

    #[test]
    fn test_checked_arithmetic() {
        let price = Money::from_cents(4_000_000_000_000_000_000);
        assert_eq!(price.checked_mul(2), Some(Money::from_cents(8_000_000_000_000_000_000)));
        assert_eq!(price.checked_mul(3), None);
        assert_eq!(price.checked_add(price), Some(Money::from_cents(8_000_000_000_000_000_000)));
        assert_eq!(Money::from_cents(i64::MAX).checked_add(Money::from_cents(1)), None);

        assert_eq!(
            Money::checked_sum([Money::from_cents(1000), Money::from_cents(500)]),
            Some(Money::from_cents(1500))
        );
        assert_eq!(Money::checked_sum([price, price, price]), None);
        assert_eq!(Money::checked_sum(Vec::new()), Some(Money::zero()));
    }

    #[test]
    fn test_zero_and_checks() {
        let zero = Money::zero();
        assert!(zero.is_zero());
        assert!(!zero.is_positive());
        assert!(!zero.is_negative());
        assert!(Money::from_cents(-100).is_negative());
        assert_eq!(Money::from_cents(-100).abs().cents(), 100);
    }
}
