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
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  Ledger lines are recomputed on every quantity update:                  │
//! │    total = unit_price × qty, utility = total − unit_cost × qty          │
//! │  Floats drift a little on every pass.                                   │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents (fixed point, scale 2)                     │
//! │    29.99 × 3 = 2999 × 3 = 8997 cents = "89.97" exactly                 │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Format
//! Money crosses the API boundary as a decimal **string** with exactly two
//! fractional digits (`"59.98"`). Input accepts a string or a JSON number.
//!
//! ## Usage
//! ```rust
//! use tally_core::money::Money;
//!
//! let price: Money = "29.99".parse().unwrap();
//! let total = price * 2;
//! assert_eq!(total.to_string(), "59.98");
//! ```

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use std::str::FromStr;
use thiserror::Error;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// ## Design Decisions
/// - **i64 (signed)**: utility can be negative when a product sells below cost
/// - **Single field tuple struct**: zero-cost abstraction over i64
/// - **Stored as INTEGER**: the database never sees a float
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::money::Money;
    ///
    /// let price = Money::from_cents(2999);
    /// assert_eq!(price.cents(), 2999);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion (truncated toward zero).
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor(&self) -> i64 {
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

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies money by a quantity, `None` on overflow.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::money::Money;
    ///
    /// let unit_price = Money::from_cents(2999);
    /// assert_eq!(unit_price.checked_mul_quantity(3), Some(Money::from_cents(8997)));
    /// assert_eq!(Money::from_cents(i64::MAX).checked_mul_quantity(2), None);
    /// ```
    #[inline]
    pub fn checked_mul_quantity(&self, qty: i64) -> Option<Self> {
        self.0.checked_mul(qty).map(Money)
    }

    /// Adds two amounts, `None` on overflow.
    #[inline]
    pub fn checked_add(&self, other: Money) -> Option<Self> {
        self.0.checked_add(other.0).map(Money)
    }

    /// Converts a JSON float into cents, rounding half away from zero.
    ///
    /// Only used at the deserialization edge; every computation after that
    /// stays in integer cents.
    fn from_f64_lossy(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        let cents = (value * 100.0).round();
        if cents.abs() > i64::MAX as f64 {
            return None;
        }
        Some(Money(cents as i64))
    }
}

// =============================================================================
// Parsing
// =============================================================================

/// Error returned when a decimal string is not a valid money amount.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyParseError {
    #[error("amount is empty")]
    Empty,

    #[error("amount has more than two decimal places")]
    TooPrecise,

    #[error("amount is not a decimal number")]
    Invalid,

    #[error("amount is out of range")]
    Overflow,
}

impl FromStr for Money {
    type Err = MoneyParseError;

    /// Parses `"29.99"`, `"29.9"`, `"29"` and `"-1.50"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(MoneyParseError::Empty);
        }

        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };

        let (major_str, minor_str) = match digits.split_once('.') {
            Some((major, minor)) => (major, minor),
            None => (digits, ""),
        };

        if major_str.is_empty() && minor_str.is_empty() {
            return Err(MoneyParseError::Invalid);
        }
        if minor_str.len() > 2 {
            return Err(MoneyParseError::TooPrecise);
        }
        if !major_str.chars().all(|c| c.is_ascii_digit())
            || !minor_str.chars().all(|c| c.is_ascii_digit())
        {
            return Err(MoneyParseError::Invalid);
        }

        let major: i64 = if major_str.is_empty() {
            0
        } else {
            major_str.parse().map_err(|_| MoneyParseError::Overflow)?
        };
        let minor: i64 = match minor_str.len() {
            0 => 0,
            1 => minor_str.parse::<i64>().map_err(|_| MoneyParseError::Invalid)? * 10,
            _ => minor_str.parse().map_err(|_| MoneyParseError::Invalid)?,
        };

        let cents = major
            .checked_mul(100)
            .and_then(|c| c.checked_add(minor))
            .ok_or(MoneyParseError::Overflow)?;

        Ok(Money(if negative { -cents } else { cents }))
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Renders as a plain two-decimal string: `59.98`, `-5.50`, `0.00`.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor())
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

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(MoneyVisitor)
    }
}

struct MoneyVisitor;

impl<'de> Visitor<'de> for MoneyVisitor {
    type Value = Money;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a decimal amount as a string or number")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Money, E> {
        v.parse().map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Money, E> {
        v.checked_mul(100)
            .map(Money)
            .ok_or_else(|| E::custom(MoneyParseError::Overflow))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Money, E> {
        i64::try_from(v)
            .ok()
            .and_then(|v| v.checked_mul(100))
            .map(Money)
            .ok_or_else(|| E::custom(MoneyParseError::Overflow))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Money, E> {
        Money::from_f64_lossy(v).ok_or_else(|| E::custom(MoneyParseError::Overflow))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(2999);
        assert_eq!(money.cents(), 2999);
        assert_eq!(money.major(), 29);
        assert_eq!(money.minor(), 99);
    }

    #[test]
    fn test_checked_arithmetic_reports_overflow() {
        let huge = "92233720368547758.07".parse::<Money>().unwrap();
        assert_eq!(huge.checked_mul_quantity(1), Some(huge));
        assert_eq!(huge.checked_mul_quantity(2), None);
        assert_eq!(huge.checked_add(Money::from_cents(1)), None);
        assert_eq!(
            Money::from_cents(2999).checked_add(Money::from_cents(1)),
            Some(Money::from_cents(3000))
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(5998).to_string(), "59.98");
        assert_eq!(Money::from_cents(500).to_string(), "5.00");
        assert_eq!(Money::from_cents(-550).to_string(), "-5.50");
        assert_eq!(Money::from_cents(-5).to_string(), "-0.05");
        assert_eq!(Money::zero().to_string(), "0.00");
    }

    #[test]
    fn test_parse() {
        assert_eq!("29.99".parse::<Money>().unwrap().cents(), 2999);
        assert_eq!("29.9".parse::<Money>().unwrap().cents(), 2990);
        assert_eq!("29".parse::<Money>().unwrap().cents(), 2900);
        assert_eq!(".5".parse::<Money>().unwrap().cents(), 50);
        assert_eq!("-1.50".parse::<Money>().unwrap().cents(), -150);

        assert_eq!("".parse::<Money>(), Err(MoneyParseError::Empty));
        assert_eq!("1.999".parse::<Money>(), Err(MoneyParseError::TooPrecise));
        assert_eq!("abc".parse::<Money>(), Err(MoneyParseError::Invalid));
        assert_eq!("1.x".parse::<Money>(), Err(MoneyParseError::Invalid));
        assert_eq!("-".parse::<Money>(), Err(MoneyParseError::Invalid));
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!((a * 3).cents(), 3000);

        let total: Money = [a, b, b].iter().sum();
        assert_eq!(total.cents(), 2000);
    }

    #[test]
    fn test_repeated_recomputation_does_not_drift() {
        let unit_price: Money = "29.99".parse().unwrap();
        let unit_cost: Money = "15.00".parse().unwrap();

        for qty in [2, 3, 2, 7, 2] {
            let total = unit_price * qty;
            let utility = total - unit_cost * qty;
            assert_eq!(total.cents(), 2999 * qty);
            assert_eq!(utility.cents(), 1499 * qty);
        }
    }

    #[test]
    fn test_serde_string_and_number() {
        let money = Money::from_cents(5998);
        assert_eq!(serde_json::to_string(&money).unwrap(), "\"59.98\"");

        let from_str: Money = serde_json::from_str("\"29.99\"").unwrap();
        let from_float: Money = serde_json::from_str("29.99").unwrap();
        let from_int: Money = serde_json::from_str("15").unwrap();
        assert_eq!(from_str.cents(), 2999);
        assert_eq!(from_float.cents(), 2999);
        assert_eq!(from_int.cents(), 1500);

        assert!(serde_json::from_str::<Money>("\"1.001\"").is_err());
    }
}
