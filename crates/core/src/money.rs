//! Fixed-point monetary amounts.
//!
//! All amounts carry exactly two decimal places. There is a single implicit
//! currency; conversions are not modelled.

use core::fmt;
use core::iter::Sum;
use core::ops::{Add, Sub};
use core::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::value_object::ValueObject;

/// Number of decimal places carried by every [`Money`] value.
pub const MONEY_SCALE: u32 = 2;

/// A non-currency-aware decimal amount with two fractional digits.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// Build from an amount expressed in cents.
    pub fn from_minor(minor: i64) -> Self {
        Self(Decimal::new(minor, MONEY_SCALE))
    }

    /// Build from a decimal, rejecting anything finer than a cent.
    pub fn try_from_decimal(value: Decimal) -> Result<Self, DomainError> {
        if value.normalize().scale() > MONEY_SCALE {
            return Err(DomainError::validation(format!(
                "amount {value} has more than {MONEY_SCALE} decimal places"
            )));
        }
        Self::exact(value)
            .ok_or_else(|| DomainError::validation(format!("amount {value} is out of range")))
    }

    /// `value` at exactly two places, or `None` if it does not fit.
    fn exact(value: Decimal) -> Option<Self> {
        let mut value = value.normalize();
        if value.scale() > MONEY_SCALE {
            return None;
        }
        value.rescale(MONEY_SCALE);
        (value.scale() == MONEY_SCALE).then_some(Self(value))
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Multiply by a line quantity, or `None` if the result is out of range.
    pub fn checked_times(&self, quantity: u32) -> Option<Self> {
        self.0.checked_mul(Decimal::from(quantity)).and_then(Self::exact)
    }

    pub fn checked_add(&self, rhs: Money) -> Option<Self> {
        self.0.checked_add(rhs.0).and_then(Self::exact)
    }

    pub fn checked_sub(&self, rhs: Money) -> Option<Self> {
        self.0.checked_sub(rhs.0).and_then(Self::exact)
    }

    /// Sum of `amounts`, or `None` on overflow.
    pub fn checked_sum<I: IntoIterator<Item = Money>>(amounts: I) -> Option<Self> {
        amounts
            .into_iter()
            .try_fold(Money::ZERO, |acc, m| acc.checked_add(m))
    }

    /// True when the two amounts differ by strictly less than one cent.
    pub fn within_cent_of(&self, other: Money) -> bool {
        self.checked_sub(other)
            .is_some_and(|diff| diff.0.abs() < Decimal::new(1, MONEY_SCALE))
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::ZERO
    }
}

impl ValueObject for Money {}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl TryFrom<Decimal> for Money {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::try_from_decimal(value)
    }
}

impl From<Money> for Decimal {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl FromStr for Money {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = Decimal::from_str(s.trim())
            .map_err(|e| DomainError::validation(format!("invalid amount '{s}': {e}")))?;
        Self::try_from_decimal(value)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Money {
        iter.copied().sum()
    }
}
