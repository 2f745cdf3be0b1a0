//! Cart Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use crate::domain::aggregates::product::Product;
use crate::domain::pricing::{self, Priced};
use crate::domain::value_objects::{Percent, Quantity};

/// One user's in-progress cart. Stored as a single document keyed by user.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    user_id: String,
    items: Vec<CartLine>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: String,
    pub name: String,
    pub price: Decimal,
    pub image_url: String,
    pub category: String,
    pub unit: String,
    pub quantity: Quantity,
    pub discount: Percent,
    pub tax: Percent,
    #[serde(rename = "hasVAT")]
    pub has_vat: bool,
    pub added_at: DateTime<Utc>,
}

impl CartLine {
    fn from_product(product_id: &str, product: &Product, quantity: Quantity, now: DateTime<Utc>) -> Self {
        Self {
            product_id: product_id.to_string(), name: product.name.clone(), price: product.price,
            image_url: product.image_url.clone(), category: product.category.clone(), unit: product.unit.clone(),
            quantity, discount: product.discount, tax: product.tax, has_vat: product.has_vat, added_at: now,
        }
    }

    pub fn line_total(&self) -> Decimal { pricing::line_total(self.price, self.quantity, self.discount, self.tax) }
}

impl Priced for CartLine {
    fn unit_price(&self) -> Decimal { self.price }
    fn quantity(&self) -> Quantity { self.quantity }
    fn discount(&self) -> Percent { self.discount }
    fn tax(&self) -> Percent { self.tax }
}

impl Cart {
    pub fn new(user_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self { user_id: user_id.into(), items: vec![], created_at: now, updated_at: now }
    }

    pub fn user_id(&self) -> &str { &self.user_id }
    pub fn items(&self) -> &[CartLine] { &self.items }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }
    pub fn total_items(&self) -> u64 { self.items.iter().map(|i| u64::from(i.quantity.value())).sum() }
    pub fn total_price(&self) -> Decimal { pricing::total(&self.items) }

    /// Adds `quantity` of a product. An existing line grows and picks up the
    /// catalog's current discount, tax and VAT flag; name and price stay as
    /// first captured.
    pub fn add_product(&mut self, product_id: &str, product: &Product, quantity: Quantity, now: DateTime<Utc>) {
        if let Some(existing) = self.items.iter_mut().find(|i| i.product_id == product_id) {
            existing.quantity = existing.quantity.add(quantity);
            existing.discount = product.discount;
            existing.tax = product.tax;
            existing.has_vat = product.has_vat;
            existing.added_at = now;
        } else {
            self.items.push(CartLine::from_product(product_id, product, quantity, now));
        }
        self.updated_at = now;
    }

    pub fn update_quantity(&mut self, product_id: &str, quantity: Quantity, now: DateTime<Utc>) -> Result<(), CartError> {
        let item = self.items.iter_mut().find(|i| i.product_id == product_id).ok_or(CartError::ItemNotFound)?;
        item.quantity = quantity;
        item.added_at = now;
        self.updated_at = now;
        Ok(())
    }

    pub fn remove_item(&mut self, product_id: &str, now: DateTime<Utc>) -> Result<(), CartError> {
        let before = self.items.len();
        self.items.retain(|i| i.product_id != product_id);
        if self.items.len() == before { return Err(CartError::ItemNotFound); }
        self.updated_at = now;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum CartError { ItemNotFound }
impl std::error::Error for CartError {}
impl std::fmt::Display for CartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "Item not found in cart") }
}
