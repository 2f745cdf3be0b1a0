//! Catalog product, as seen by carts and checkout

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::value_objects::Percent;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    pub category: String,
    #[serde(default)]
    pub image_url: String,
    /// Units in stock, as reported by the seller.
    #[serde(default)]
    pub quantity: u32,
    pub unit: String,
    pub seller_id: String,
    pub seller_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_name: Option<String>,
    #[serde(default)]
    pub discount: Percent,
    #[serde(default)]
    pub tax: Percent,
    #[serde(default, rename = "hasVAT")]
    pub has_vat: bool,
    #[serde(default = "available")]
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn available() -> bool { true }

/// The part of a listing its seller controls.
#[derive(Clone, Debug, PartialEq)]
pub struct ProductDetails {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub category: String,
    pub image_url: String,
    pub quantity: u32,
    pub unit: String,
    pub discount: Percent,
    pub tax: Percent,
    pub has_vat: bool,
}

/// Who a listing belongs to. Fixed once the listing exists.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SellerRef {
    pub id: String,
    pub name: String,
    pub store_name: Option<String>,
}

impl Product {
    /// A new, visible listing.
    pub fn list_new(details: ProductDetails, seller: SellerRef, now: DateTime<Utc>) -> Self {
        let mut product = Self {
            id: Uuid::now_v7().to_string(), name: String::new(), description: String::new(), price: Decimal::ZERO,
            category: String::new(), image_url: String::new(), quantity: 0, unit: String::new(),
            seller_id: seller.id, seller_name: seller.name, store_name: seller.store_name,
            discount: Percent::ZERO, tax: Percent::ZERO, has_vat: false, is_available: true,
            created_at: now, updated_at: now,
        };
        product.revise(details, now);
        product
    }

    /// Replaces the seller-controlled fields; ownership and availability stay.
    pub fn revise(&mut self, details: ProductDetails, now: DateTime<Utc>) {
        let ProductDetails { name, description, price, category, image_url, quantity, unit, discount, tax, has_vat } = details;
        self.name = name;
        self.description = description;
        self.price = price;
        self.category = category;
        self.image_url = image_url;
        self.quantity = quantity;
        self.unit = unit;
        self.discount = discount;
        self.tax = tax;
        self.has_vat = has_vat;
        self.updated_at = now;
    }

    pub fn is_listed_by(&self, seller_id: &str) -> bool { self.seller_id == seller_id }

    /// Case-insensitive match used by catalog listing filters.
    pub fn matches(&self, category: Option<&str>, search: Option<&str>) -> bool {
        let contains = |haystack: &str, needle: &str| haystack.to_lowercase().contains(&needle.to_lowercase());
        let category_ok = category.map_or(true, |c| contains(&self.category, c));
        let search_ok = search.map_or(true, |s| {
            contains(&self.name, s) || contains(&self.description, s) || contains(&self.category, s)
        });
        category_ok && search_ok
    }

    pub fn set_availability(&mut self, available: bool) {
        self.is_available = available;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
pub(crate) fn sample(id: &str, price: Decimal, discount: Decimal, tax: Decimal) -> Product {
    let now = Utc::now();
    Product {
        id: id.into(), name: format!("Product {id}"), description: "Fresh".into(), price,
        category: "Groceries".into(), image_url: String::new(), quantity: 50, unit: "kg".into(),
        seller_id: "seller-1".into(), seller_name: "Green Farm".into(), store_name: None,
        discount: Percent::new(discount).unwrap(), tax: Percent::new(tax).unwrap(),
        has_vat: false, is_available: true, created_at: now, updated_at: now,
    }
}
