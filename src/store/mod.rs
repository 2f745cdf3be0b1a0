//! Document storage for carts, orders, addresses and catalog items.
//!
//! Services talk to the traits below; [`memory::MemoryStore`] backs tests and
//! local runs, [`postgres::PgStore`] keeps each entity as a JSONB document.

use async_trait::async_trait;
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::{Address, Cart, Order, OrderStatus, Product};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("duplicate key: {0}")]
    Duplicate(String),

    #[error("store call exceeded {0:?}")]
    Timeout(Duration),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Runs a store call under a deadline.
pub async fn bounded<T, F>(limit: Duration, call: F) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_elapsed) => Err(StoreError::Timeout(limit)),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, total: u64, page: u32, limit: u32) -> Self {
        let total_pages = if limit == 0 { 0 } else { total.div_ceil(u64::from(limit)) };
        Self { data, total, page, total_pages }
    }

    /// Slices an already filtered and ordered set.
    pub fn from_all(all: Vec<T>, page: u32, limit: u32) -> Self {
        let total = all.len() as u64;
        let skip = (page.max(1) as usize - 1) * limit as usize;
        let data = all.into_iter().skip(skip).take(limit as usize).collect();
        Self::new(data, total, page.max(1), limit)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderQuery {
    pub user_id: Option<String>,
    pub status: Option<OrderStatus>,
    /// Case-insensitive fragment of the order number.
    pub search: Option<String>,
    pub page: u32,
    pub limit: u32,
}

impl OrderQuery {
    pub fn offset(&self) -> u64 { u64::from(self.page.max(1) - 1) * u64::from(self.limit) }

    pub fn matches(&self, order: &Order) -> bool {
        self.user_id.as_deref().map_or(true, |u| order.user_id() == u)
            && self.status.map_or(true, |s| order.order_status() == s)
            && self.search.as_deref().map_or(true, |s| {
                order.order_id().as_str().to_lowercase().contains(&s.to_lowercase())
            })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductQuery {
    pub category: Option<String>,
    pub search: Option<String>,
    /// Only this seller's listings.
    pub seller_id: Option<String>,
    pub include_unavailable: bool,
    pub page: u32,
    pub limit: u32,
}

impl ProductQuery {
    pub fn offset(&self) -> u64 { u64::from(self.page.max(1) - 1) * u64::from(self.limit) }

    pub fn matches(&self, product: &Product) -> bool {
        (self.include_unavailable || product.is_available)
            && self.seller_id.as_deref().map_or(true, |s| product.is_listed_by(s))
            && product.matches(self.category.as_deref(), self.search.as_deref())
    }
}

#[async_trait]
pub trait CartRepository: Send + Sync {
    async fn find(&self, user_id: &str) -> StoreResult<Option<Cart>>;
    async fn save(&self, cart: &Cart) -> StoreResult<()>;
    /// Returns whether a cart existed.
    async fn delete(&self, user_id: &str) -> StoreResult<bool>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Fails with [`StoreError::Duplicate`] when the order number is taken.
    async fn insert(&self, order: &Order) -> StoreResult<()>;
    async fn update(&self, order: &Order) -> StoreResult<()>;
    async fn find(&self, order_id: &str) -> StoreResult<Option<Order>>;
    async fn find_by_gateway_order(&self, gateway_order_id: &str) -> StoreResult<Option<Order>>;
    /// Newest first.
    async fn list(&self, query: &OrderQuery) -> StoreResult<Page<Order>>;
}

#[async_trait]
pub trait AddressRepository: Send + Sync {
    /// Oldest first.
    async fn list(&self, user_id: &str) -> StoreResult<Vec<Address>>;
    async fn save(&self, address: &Address) -> StoreResult<()>;
    async fn delete(&self, user_id: &str, id: Uuid) -> StoreResult<Option<Address>>;
}

#[async_trait]
pub trait Catalog: Send + Sync {
    async fn get_product(&self, id: &str) -> StoreResult<Option<Product>>;
    /// Newest first.
    async fn list(&self, query: &ProductQuery) -> StoreResult<Page<Product>>;
    async fn save(&self, product: &Product) -> StoreResult<()>;
    /// Returns the removed listing.
    async fn delete(&self, id: &str) -> StoreResult<Option<Product>>;
    /// Distinct categories across all listings, sorted.
    async fn categories(&self) -> StoreResult<Vec<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_math() {
        let page = Page::from_all((1..=25).collect::<Vec<_>>(), 3, 10);
        assert_eq!(page.data, vec![21, 22, 23, 24, 25]);
        assert_eq!(page.total, 25);
        assert_eq!(page.total_pages, 3);
        assert!(Page::from_all(vec![1, 2], 5, 10).data.is_empty());
    }

    #[tokio::test]
    async fn test_bounded_times_out() {
        let slow = async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok::<_, StoreError>(())
        };
        let err = bounded(Duration::from_millis(10), slow).await.unwrap_err();
        assert!(matches!(err, StoreError::Timeout(_)));
    }
}
