//! Cart store: one mutable cart per buyer.
//!
//! Updates are read-modify-write on the user's cart document; two concurrent
//! requests for the same cart race and the last write wins.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use super::OrInternal;
use crate::auth::Identity;
use crate::domain::aggregates::{Cart, CartLine};
use crate::domain::value_objects::Quantity;
use crate::store::{bounded, CartRepository, Catalog};
use crate::{MarketplaceError, Result};

/// What a buyer sees when opening their cart.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub cart_items: Vec<CartViewLine>,
    pub total_items: u64,
    pub total_price: Decimal,
}

/// A cart line plus its rounded total.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartViewLine {
    #[serde(flatten)]
    pub line: CartLine,
    pub line_total: Decimal,
}

impl CartView {
    pub fn empty() -> Self { Self { cart_items: vec![], total_items: 0, total_price: Decimal::ZERO } }
}

impl From<Cart> for CartView {
    fn from(cart: Cart) -> Self {
        let cart_items = cart.items().iter().map(|line| CartViewLine { line_total: line.line_total(), line: line.clone() }).collect();
        Self { total_items: cart.total_items(), total_price: cart.total_price(), cart_items }
    }
}

#[derive(Clone)]
pub struct CartService {
    carts: Arc<dyn CartRepository>,
    catalog: Arc<dyn Catalog>,
    timeout: Duration,
}

fn parse_quantity(raw: i64) -> Result<Quantity> {
    u32::try_from(raw)
        .ok()
        .and_then(|q| Quantity::new(q).ok())
        .ok_or_else(|| MarketplaceError::invalid("Quantity must be at least 1"))
}

impl CartService {
    pub fn new(carts: Arc<dyn CartRepository>, catalog: Arc<dyn Catalog>, timeout: Duration) -> Self {
        Self { carts, catalog, timeout }
    }

    async fn load(&self, user_id: &str, operation: &'static str) -> Result<Option<Cart>> {
        bounded(self.timeout, self.carts.find(user_id)).await.or_internal(operation, user_id)
    }

    async fn store(&self, cart: &Cart, operation: &'static str) -> Result<()> {
        bounded(self.timeout, self.carts.save(cart)).await.or_internal(operation, cart.user_id())
    }

    pub async fn get_cart(&self, caller: &Identity, user_id: &str) -> Result<CartView> {
        caller.ensure_owner(user_id)?;
        Ok(self.load(user_id, "cart.get").await?.map_or_else(CartView::empty, CartView::from))
    }

    pub async fn item_count(&self, caller: &Identity, user_id: &str) -> Result<u64> {
        caller.ensure_owner(user_id)?;
        Ok(self.load(user_id, "cart.count").await?.map_or(0, |c| c.total_items()))
    }

    /// Adds a catalog product, merging into an existing line. Returns the new item count.
    pub async fn add_item(&self, caller: &Identity, user_id: &str, product_id: &str, quantity: Option<i64>) -> Result<u64> {
        caller.ensure_owner(user_id)?;
        let quantity = parse_quantity(quantity.unwrap_or(1))?;
        let product = bounded(self.timeout, self.catalog.get_product(product_id))
            .await
            .or_internal("cart.add_item", product_id)?
            .ok_or_else(|| MarketplaceError::not_found("Product not found"))?;

        let now = Utc::now();
        let mut cart = self.load(user_id, "cart.add_item").await?.unwrap_or_else(|| Cart::new(user_id, now));
        cart.add_product(product_id, &product, quantity, now);
        self.store(&cart, "cart.add_item").await?;
        tracing::debug!(user_id, product_id, quantity = quantity.value(), "cart item added");
        Ok(cart.total_items())
    }

    pub async fn update_quantity(&self, caller: &Identity, user_id: &str, product_id: &str, quantity: i64) -> Result<u64> {
        caller.ensure_owner(user_id)?;
        let quantity = parse_quantity(quantity)?;
        let mut cart = self
            .load(user_id, "cart.update_quantity")
            .await?
            .ok_or_else(|| MarketplaceError::not_found("Cart not found"))?;
        cart.update_quantity(product_id, quantity, Utc::now())?;
        self.store(&cart, "cart.update_quantity").await?;
        Ok(cart.total_items())
    }

    /// Removes a line; a cart left empty is deleted rather than stored.
    pub async fn remove_item(&self, caller: &Identity, user_id: &str, product_id: &str) -> Result<u64> {
        caller.ensure_owner(user_id)?;
        let mut cart = self
            .load(user_id, "cart.remove_item")
            .await?
            .ok_or_else(|| MarketplaceError::not_found("Cart not found"))?;
        cart.remove_item(product_id, Utc::now())?;
        if cart.is_empty() {
            bounded(self.timeout, self.carts.delete(user_id)).await.or_internal("cart.remove_item", user_id)?;
        } else {
            self.store(&cart, "cart.remove_item").await?;
        }
        Ok(cart.total_items())
    }

    pub async fn clear_cart(&self, caller: &Identity, user_id: &str) -> Result<()> {
        caller.ensure_owner(user_id)?;
        bounded(self.timeout, self.carts.delete(user_id)).await.or_internal("cart.clear", user_id)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::product::sample;
    use crate::store::{MemoryStore, StoreError, StoreResult};
    use async_trait::async_trait;
    use rust_decimal_macros::dec;

    async fn service() -> (CartService, Arc<MemoryStore>) {
        let store = Arc::new(
            MemoryStore::new()
                .with_products([sample("P", dec!(100), dec!(10), dec!(5)), sample("Q", dec!(20), dec!(0), dec!(0))])
                .await,
        );
        (CartService::new(store.clone(), store.clone(), Duration::from_secs(1)), store)
    }

    #[tokio::test]
    async fn test_missing_cart_is_empty() {
        let (svc, _) = service().await;
        assert_eq!(svc.get_cart(&Identity::new("U1"), "U1").await.unwrap(), CartView::empty());
        assert_eq!(svc.item_count(&Identity::new("U1"), "U1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_add_twice_merges_lines() {
        let (svc, _) = service().await;
        let me = Identity::new("U1");
        svc.add_item(&me, "U1", "P", Some(2)).await.unwrap();
        assert_eq!(svc.add_item(&me, "U1", "P", Some(3)).await.unwrap(), 5);
        let view = svc.get_cart(&me, "U1").await.unwrap();
        assert_eq!(view.cart_items.len(), 1);
        assert_eq!(view.cart_items[0].line.quantity.value(), 5);
    }

    #[tokio::test]
    async fn test_priced_cart_total() {
        let (svc, _) = service().await;
        let me = Identity::new("U1");
        svc.add_item(&me, "U1", "P", Some(2)).await.unwrap();
        let view = svc.get_cart(&me, "U1").await.unwrap();
        assert_eq!(view.total_price, dec!(189.00));
        assert_eq!(view.total_items, 2);
    }

    #[tokio::test]
    async fn test_unknown_product() {
        let (svc, _) = service().await;
        let err = svc.add_item(&Identity::new("U1"), "U1", "nope", None).await.unwrap_err();
        assert_eq!(err, MarketplaceError::not_found("Product not found"));
    }

    #[tokio::test]
    async fn test_other_users_cart_forbidden() {
        let (svc, store) = service().await;
        let intruder = Identity::new("U2");
        assert!(matches!(svc.get_cart(&intruder, "U1").await, Err(MarketplaceError::Forbidden(_))));
        assert!(matches!(svc.add_item(&intruder, "U1", "P", None).await, Err(MarketplaceError::Forbidden(_))));
        assert!(matches!(svc.clear_cart(&intruder, "U1").await, Err(MarketplaceError::Forbidden(_))));
        assert!(CartRepository::find(store.as_ref(), "U1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_quantity_rules() {
        let (svc, _) = service().await;
        let me = Identity::new("U1");
        assert!(matches!(svc.update_quantity(&me, "U1", "P", 2).await, Err(MarketplaceError::NotFound(_))));
        svc.add_item(&me, "U1", "P", None).await.unwrap();
        assert!(matches!(svc.update_quantity(&me, "U1", "P", 0).await, Err(MarketplaceError::InvalidArgument(_))));
        assert!(matches!(svc.update_quantity(&me, "U1", "Q", 2).await, Err(MarketplaceError::NotFound(_))));
        assert_eq!(svc.update_quantity(&me, "U1", "P", 4).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_removing_last_line_deletes_cart() {
        let (svc, store) = service().await;
        let me = Identity::new("U1");
        svc.add_item(&me, "U1", "P", None).await.unwrap();
        svc.add_item(&me, "U1", "Q", None).await.unwrap();
        assert_eq!(svc.remove_item(&me, "U1", "P").await.unwrap(), 1);
        assert_eq!(svc.remove_item(&me, "U1", "Q").await.unwrap(), 0);
        assert!(CartRepository::find(store.as_ref(), "U1").await.unwrap().is_none());
        assert_eq!(svc.get_cart(&me, "U1").await.unwrap(), CartView::empty());
        assert!(matches!(svc.remove_item(&me, "U1", "Q").await, Err(MarketplaceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let (svc, _) = service().await;
        let me = Identity::new("U1");
        svc.clear_cart(&me, "U1").await.unwrap();
        svc.add_item(&me, "U1", "P", None).await.unwrap();
        svc.clear_cart(&me, "U1").await.unwrap();
        assert_eq!(svc.item_count(&me, "U1").await.unwrap(), 0);
    }

    struct Down;

    #[async_trait]
    impl CartRepository for Down {
        async fn find(&self, _: &str) -> StoreResult<Option<Cart>> { Err(StoreError::Unavailable("down".into())) }
        async fn save(&self, _: &Cart) -> StoreResult<()> { Err(StoreError::Unavailable("down".into())) }
        async fn delete(&self, _: &str) -> StoreResult<bool> { Err(StoreError::Unavailable("down".into())) }
    }

    #[tokio::test]
    async fn test_store_failure_is_internal() {
        let catalog = Arc::new(MemoryStore::new());
        let svc = CartService::new(Arc::new(Down), catalog, Duration::from_secs(1));
        let err = svc.get_cart(&Identity::new("U1"), "U1").await.unwrap_err();
        assert_eq!(err, MarketplaceError::Internal("cart.get".into()));
    }
}
