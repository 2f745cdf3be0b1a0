//! Pricing calculator
//!
//! Line price = unit price × (1 − discount) × (1 + tax) × quantity. The VAT
//! flag carried by cart lines is informational only: VAT is already part of
//! the tax percentage and never changes the arithmetic here.

use rust_decimal::Decimal;

use crate::domain::value_objects::{round_money, Percent, Quantity};

/// Pricing attributes of a single line.
pub trait Priced {
    fn unit_price(&self) -> Decimal;
    fn quantity(&self) -> Quantity;
    fn discount(&self) -> Percent;
    fn tax(&self) -> Percent;
}

/// Unit price after discount and tax, unrounded.
pub fn effective_unit_price(unit_price: Decimal, discount: Percent, tax: Percent) -> Decimal {
    unit_price * (Decimal::ONE - discount.fraction()) * (Decimal::ONE + tax.fraction())
}

/// Exact line amount. Aggregates sum these before rounding.
pub fn line_amount(unit_price: Decimal, quantity: Quantity, discount: Percent, tax: Percent) -> Decimal {
    effective_unit_price(unit_price, discount, tax) * Decimal::from(quantity)
}

/// Line total rounded to two decimals.
pub fn line_total(unit_price: Decimal, quantity: Quantity, discount: Percent, tax: Percent) -> Decimal {
    round_money(line_amount(unit_price, quantity, discount, tax))
}

/// Sum of exact line amounts, rounded once at the end.
pub fn total<'a, L, I>(lines: I) -> Decimal
where
    L: Priced + 'a,
    I: IntoIterator<Item = &'a L>,
{
    let sum: Decimal = lines
        .into_iter()
        .map(|l| line_amount(l.unit_price(), l.quantity(), l.discount(), l.tax()))
        .sum();
    round_money(sum)
}
