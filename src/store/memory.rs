//! In-process store used by tests and by local runs without `DATABASE_URL`.

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    AddressRepository, CartRepository, Catalog, OrderQuery, OrderRepository, Page, ProductQuery, StoreError,
    StoreResult,
};
use crate::domain::aggregates::{Address, Cart, Order, Product};

#[derive(Debug, Default)]
pub struct MemoryStore {
    carts: RwLock<HashMap<String, Cart>>,
    orders: RwLock<HashMap<String, Order>>,
    addresses: RwLock<HashMap<Uuid, Address>>,
    products: RwLock<HashMap<String, Product>>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    /// Seeds the catalog.
    pub async fn with_products(self, products: impl IntoIterator<Item = Product>) -> Self {
        {
            let mut map = self.products.write().await;
            for p in products { map.insert(p.id.clone(), p); }
        }
        self
    }
}

#[async_trait]
impl CartRepository for MemoryStore {
    async fn find(&self, user_id: &str) -> StoreResult<Option<Cart>> {
        Ok(self.carts.read().await.get(user_id).cloned())
    }

    async fn save(&self, cart: &Cart) -> StoreResult<()> {
        self.carts.write().await.insert(cart.user_id().to_string(), cart.clone());
        Ok(())
    }

    async fn delete(&self, user_id: &str) -> StoreResult<bool> {
        Ok(self.carts.write().await.remove(user_id).is_some())
    }
}

#[async_trait]
impl OrderRepository for MemoryStore {
    async fn insert(&self, order: &Order) -> StoreResult<()> {
        let mut orders = self.orders.write().await;
        let key = order.order_id().to_string();
        if orders.contains_key(&key) { return Err(StoreError::Duplicate(key)); }
        orders.insert(key, order.clone());
        Ok(())
    }

    async fn update(&self, order: &Order) -> StoreResult<()> {
        self.orders.write().await.insert(order.order_id().to_string(), order.clone());
        Ok(())
    }

    async fn find(&self, order_id: &str) -> StoreResult<Option<Order>> {
        Ok(self.orders.read().await.get(order_id).cloned())
    }

    async fn find_by_gateway_order(&self, gateway_order_id: &str) -> StoreResult<Option<Order>> {
        Ok(self.orders.read().await.values().find(|o| o.gateway_order_id() == Some(gateway_order_id)).cloned())
    }

    async fn list(&self, query: &OrderQuery) -> StoreResult<Page<Order>> {
        let mut matching: Vec<Order> = self.orders.read().await.values().filter(|o| query.matches(o)).cloned().collect();
        matching.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(Page::from_all(matching, query.page, query.limit))
    }
}

#[async_trait]
impl AddressRepository for MemoryStore {
    async fn list(&self, user_id: &str) -> StoreResult<Vec<Address>> {
        let mut mine: Vec<Address> = self.addresses.read().await.values().filter(|a| a.user_id == user_id).cloned().collect();
        mine.sort_by_key(|a| a.created_at);
        Ok(mine)
    }

    async fn save(&self, address: &Address) -> StoreResult<()> {
        self.addresses.write().await.insert(address.id, address.clone());
        Ok(())
    }

    async fn delete(&self, user_id: &str, id: Uuid) -> StoreResult<Option<Address>> {
        let mut all = self.addresses.write().await;
        if all.get(&id).is_some_and(|a| a.user_id == user_id) { Ok(all.remove(&id)) } else { Ok(None) }
    }
}

#[async_trait]
impl Catalog for MemoryStore {
    async fn get_product(&self, id: &str) -> StoreResult<Option<Product>> {
        Ok(self.products.read().await.get(id).cloned())
    }

    async fn list(&self, query: &ProductQuery) -> StoreResult<Page<Product>> {
        let mut matching: Vec<Product> = self
            .products
            .read()
            .await
            .values()
            .filter(|p| query.matches(p))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(Page::from_all(matching, query.page, query.limit))
    }

    async fn save(&self, product: &Product) -> StoreResult<()> {
        self.products.write().await.insert(product.id.clone(), product.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> StoreResult<Option<Product>> {
        Ok(self.products.write().await.remove(id))
    }

    async fn categories(&self) -> StoreResult<Vec<String>> {
        let names: BTreeSet<String> = self.products.read().await.values().map(|p| p.category.clone()).collect();
        Ok(names.into_iter().collect())
    }
}
