//! Value Objects for the marketplace

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Percentage in the closed range 0..=100 (discounts, tax rates)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Percent(Decimal);

impl Percent {
    pub const ZERO: Percent = Percent(Decimal::ZERO);

    pub fn new(value: Decimal) -> Result<Self, PercentError> {
        if value.is_sign_negative() && !value.is_zero() { return Err(PercentError::Negative); }
        if value > Decimal::ONE_HUNDRED { return Err(PercentError::AboveHundred); }
        Ok(Self(value))
    }
    pub fn value(&self) -> Decimal { self.0 }
    /// The percentage as a fraction of one (`10%` is `0.1`).
    pub fn fraction(&self) -> Decimal { self.0 / Decimal::ONE_HUNDRED }
    pub fn is_zero(&self) -> bool { self.0.is_zero() }
}

impl TryFrom<Decimal> for Percent {
    type Error = PercentError;
    fn try_from(value: Decimal) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<Percent> for Decimal {
    fn from(p: Percent) -> Self { p.0 }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}%", self.0) }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum PercentError { Negative, AboveHundred }
impl std::error::Error for PercentError {}
impl fmt::Display for PercentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Negative => write!(f, "percentage cannot be negative"),
            Self::AboveHundred => write!(f, "percentage cannot exceed 100"),
        }
    }
}

/// Line quantity, always at least one
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    pub const ONE: Quantity = Quantity(1);

    pub fn new(value: u32) -> Result<Self, QuantityError> {
        if value == 0 { return Err(QuantityError::BelowOne); }
        Ok(Self(value))
    }
    pub fn value(&self) -> u32 { self.0 }
    pub fn add(&self, other: Quantity) -> Self { Self(self.0.saturating_add(other.0)) }
}

impl Default for Quantity { fn default() -> Self { Self::ONE } }

impl TryFrom<u32> for Quantity {
    type Error = QuantityError;
    fn try_from(value: u32) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<Quantity> for u32 {
    fn from(q: Quantity) -> Self { q.0 }
}

impl From<Quantity> for Decimal {
    fn from(q: Quantity) -> Self { Decimal::from(q.0) }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum QuantityError { BelowOne }
impl std::error::Error for QuantityError {}
impl fmt::Display for QuantityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "Quantity must be at least 1") }
}

/// Rounds a monetary amount to two decimal places, halves away from zero.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_percent_bounds() {
        assert!(Percent::new(dec!(0)).is_ok());
        assert!(Percent::new(dec!(100)).is_ok());
        assert_eq!(Percent::new(dec!(-1)), Err(PercentError::Negative));
        assert_eq!(Percent::new(dec!(100.01)), Err(PercentError::AboveHundred));
        assert_eq!(Percent::new(dec!(12.5)).unwrap().fraction(), dec!(0.125));
    }

    #[test]
    fn test_percent_rejects_out_of_range_json() {
        assert!(serde_json::from_str::<Percent>("150").is_err());
        assert_eq!(serde_json::from_str::<Percent>("10").unwrap().value(), dec!(10));
    }

    #[test]
    fn test_quantity() {
        assert_eq!(Quantity::new(0), Err(QuantityError::BelowOne));
        let q = Quantity::new(2).unwrap();
        assert_eq!(q.add(Quantity::new(3).unwrap()).value(), 5);
        assert!(serde_json::from_str::<Quantity>("0").is_err());
    }

    #[test]
    fn test_round_money_half_up() {
        assert_eq!(round_money(dec!(1.005)), dec!(1.01));
        assert_eq!(round_money(dec!(1.004)), dec!(1.00));
        assert_eq!(round_money(dec!(188.99999)), dec!(189.00));
    }
}
