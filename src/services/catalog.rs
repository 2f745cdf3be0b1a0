use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use validator::{Validate, ValidationError};

use super::{page_limit, OrInternal};
use crate::auth::{Identity, Role};
use crate::domain::aggregates::{Product, ProductDetails, SellerRef};
use crate::domain::value_objects::Percent;
use crate::store::{bounded, Catalog, Page, ProductQuery};
use crate::{MarketplaceError, Result};

const REQUIRED: &str = "All required fields must be provided";
/// Category filter value that means "no filter".
const ALL_CATEGORIES: &str = "all";

fn not_blank(value: &str) -> std::result::Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("required");
        err.message = Some(REQUIRED.into());
        return Err(err);
    }
    Ok(())
}

fn positive_price(value: &Decimal) -> std::result::Result<(), ValidationError> {
    if *value > Decimal::ZERO { return Ok(()); }
    let mut err = ValidationError::new("range");
    err.message = Some("Price must be greater than 0".into());
    Err(err)
}

fn percentage(value: &Decimal) -> std::result::Result<(), ValidationError> {
    Percent::new(*value).map(|_| ()).map_err(|e| {
        let mut err = ValidationError::new("range");
        err.message = Some(format!("Discount and tax must be between 0 and 100: {e}").into());
        err
    })
}

/// Listing body used by sellers and admins alike.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ItemRequest {
    #[validate(custom = "not_blank")]
    #[validate(length(max = 200, message = "Name cannot exceed 200 characters"))]
    pub name: String,
    #[validate(custom = "not_blank")]
    pub description: String,
    #[validate(custom = "positive_price")]
    pub price: Decimal,
    #[validate(custom = "not_blank")]
    pub category: String,
    #[serde(default)]
    pub image_url: String,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: u32,
    #[validate(custom = "not_blank")]
    pub unit: String,
    #[serde(default)]
    #[validate(custom = "percentage")]
    pub discount: Decimal,
    #[serde(default)]
    #[validate(custom = "percentage")]
    pub tax: Decimal,
    #[serde(default, rename = "hasVAT")]
    pub has_vat: bool,
}

impl ItemRequest {
    fn into_details(self) -> Result<ProductDetails> {
        let percent = |v: Decimal| Percent::new(v).map_err(|e| MarketplaceError::invalid(e.to_string()));
        Ok(ProductDetails {
            name: self.name.trim().to_string(), description: self.description.trim().to_string(), price: self.price,
            category: self.category.trim().to_string(), image_url: self.image_url.trim().to_string(),
            quantity: self.quantity, unit: self.unit.trim().to_string(),
            discount: percent(self.discount)?, tax: percent(self.tax)?, has_vat: self.has_vat,
        })
    }
}

fn blank_to_none(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// The catalog: public browsing, seller listings and admin moderation.
#[derive(Clone)]
pub struct CatalogService {
    catalog: Arc<dyn Catalog>,
    timeout: Duration,
}

impl CatalogService {
    pub fn new(catalog: Arc<dyn Catalog>, timeout: Duration) -> Self { Self { catalog, timeout } }

    async fn query(&self, query: ProductQuery, operation: &'static str) -> Result<Page<Product>> {
        bounded(self.timeout, self.catalog.list(&query)).await.or_internal(operation, query.seller_id.as_deref().unwrap_or(""))
    }

    async fn store(&self, product: &Product, operation: &'static str) -> Result<()> {
        bounded(self.timeout, self.catalog.save(product)).await.or_internal(operation, &product.id)
    }

    async fn find(&self, id: &str, operation: &'static str) -> Result<Option<Product>> {
        bounded(self.timeout, self.catalog.get_product(id)).await.or_internal(operation, id)
    }

    /// Available items only, newest first.
    pub async fn list(&self, category: Option<String>, search: Option<String>, page: Option<u32>, limit: Option<u32>) -> Result<Page<Product>> {
        let query = ProductQuery {
            category: blank_to_none(category), search: blank_to_none(search), seller_id: None, include_unavailable: false,
            page: page.unwrap_or(1).max(1), limit: page_limit(limit, 20),
        };
        self.query(query, "catalog.list").await
    }

    /// Every item, hidden ones included. A category of `all` means no filter.
    pub async fn admin_list(
        &self,
        caller: &Identity,
        category: Option<String>,
        search: Option<String>,
        page: Option<u32>,
        limit: Option<u32>,
    ) -> Result<Page<Product>> {
        caller.ensure_admin()?;
        let category = blank_to_none(category).filter(|c| !c.eq_ignore_ascii_case(ALL_CATEGORIES));
        let query = ProductQuery {
            category, search: blank_to_none(search), seller_id: None, include_unavailable: true,
            page: page.unwrap_or(1).max(1), limit: page_limit(limit, 100),
        };
        self.query(query, "catalog.admin_list").await
    }

    pub async fn get(&self, id: &str) -> Result<Product> {
        self.find(id, "catalog.get").await?.ok_or_else(|| MarketplaceError::not_found("Item not found"))
    }

    pub async fn categories(&self) -> Result<Vec<String>> {
        bounded(self.timeout, self.catalog.categories()).await.or_internal("catalog.categories", "")
    }

    /// Sellers list under their own name; admins may list too.
    pub async fn create_item(&self, caller: &Identity, request: ItemRequest) -> Result<Product> {
        if !matches!(caller.role, Role::Seller | Role::Admin) {
            return Err(MarketplaceError::forbidden("Only approved sellers and admins can add items"));
        }
        let product = Product::list_new(request.into_details()?, seller_of(caller), Utc::now());
        self.store(&product, "catalog.create").await?;
        tracing::info!(item_id = %product.id, seller_id = %product.seller_id, category = %product.category, "item listed");
        Ok(product)
    }

    /// The caller's own listings, hidden ones included, newest first.
    pub async fn seller_items(&self, caller: &Identity, page: Option<u32>, limit: Option<u32>) -> Result<Page<Product>> {
        if !matches!(caller.role, Role::Seller | Role::Admin) {
            return Err(MarketplaceError::forbidden("Only sellers can view their items"));
        }
        let query = ProductQuery {
            category: None, search: None, seller_id: Some(caller.user_id.clone()), include_unavailable: true,
            page: page.unwrap_or(1).max(1), limit: page_limit(limit, 100),
        };
        self.query(query, "catalog.seller_items").await
    }

    /// Someone else's item reads as missing.
    pub async fn update_item(&self, caller: &Identity, id: &str, request: ItemRequest) -> Result<Product> {
        let details = request.into_details()?;
        let mut product = self
            .find(id, "catalog.update")
            .await?
            .filter(|p| p.is_listed_by(&caller.user_id))
            .ok_or_else(|| MarketplaceError::not_found("Item not found or you are not authorized to update it"))?;
        product.revise(details, Utc::now());
        self.store(&product, "catalog.update").await?;
        tracing::info!(item_id = id, seller_id = %caller.user_id, "item updated");
        Ok(product)
    }

    pub async fn delete_item(&self, caller: &Identity, id: &str) -> Result<()> {
        let owned = self.find(id, "catalog.delete").await?.is_some_and(|p| p.is_listed_by(&caller.user_id));
        if !owned {
            return Err(MarketplaceError::not_found("Item not found or you are not authorized to delete it"));
        }
        bounded(self.timeout, self.catalog.delete(id)).await.or_internal("catalog.delete", id)?;
        tracing::info!(item_id = id, seller_id = %caller.user_id, "item deleted");
        Ok(())
    }

    /// Admin-only entry point; the admin becomes the listing's seller.
    pub async fn admin_create_item(&self, caller: &Identity, request: ItemRequest) -> Result<Product> {
        caller.ensure_admin()?;
        self.create_item(caller, request).await
    }

    /// Admin edit of any listing; the seller stays the same.
    pub async fn admin_update_item(&self, caller: &Identity, id: &str, request: ItemRequest) -> Result<Product> {
        caller.ensure_admin()?;
        let details = request.into_details()?;
        let mut product = self.find(id, "catalog.admin_update").await?.ok_or_else(product_not_found)?;
        product.revise(details, Utc::now());
        self.store(&product, "catalog.admin_update").await?;
        tracing::info!(item_id = id, admin = %caller.user_id, "item updated by admin");
        Ok(product)
    }

    pub async fn admin_delete_item(&self, caller: &Identity, id: &str) -> Result<()> {
        caller.ensure_admin()?;
        bounded(self.timeout, self.catalog.delete(id)).await.or_internal("catalog.admin_delete", id)?.ok_or_else(product_not_found)?;
        tracing::info!(item_id = id, admin = %caller.user_id, "item deleted by admin");
        Ok(())
    }

    pub async fn set_availability(&self, caller: &Identity, id: &str, available: bool) -> Result<Product> {
        caller.ensure_admin()?;
        let mut product = self.get(id).await?;
        product.set_availability(available);
        self.store(&product, "catalog.set_availability").await?;
        tracing::info!(item_id = id, available, admin = %caller.user_id, "item availability changed");
        Ok(product)
    }
}

fn seller_of(caller: &Identity) -> SellerRef {
    let name = caller.name.clone().filter(|n| !n.trim().is_empty()).unwrap_or_else(|| caller.user_id.clone());
    SellerRef { id: caller.user_id.clone(), store_name: Some(name.clone()), name }
}

fn product_not_found() -> MarketplaceError { MarketplaceError::not_found("Product not found") }
