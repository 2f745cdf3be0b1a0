//! Postgres-backed store. Each entity is one JSONB document plus the few
//! columns queries filter and sort on.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use uuid::Uuid;

use super::{
    AddressRepository, CartRepository, Catalog, OrderQuery, OrderRepository, Page, ProductQuery, StoreError,
    StoreResult,
};
use crate::domain::aggregates::{Address, Cart, Order, Product};

#[derive(Clone, Debug)]
pub struct PgStore { pool: PgPool }

impl PgStore {
    pub async fn connect(url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new().max_connections(max_connections).connect(url).await?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await.map_err(|e| StoreError::Database(e.into()))
    }
}

fn page_bounds(limit: u32, offset: u64) -> (i64, i64) {
    (i64::from(limit), i64::try_from(offset).unwrap_or(i64::MAX))
}

#[async_trait]
impl CartRepository for PgStore {
    async fn find(&self, user_id: &str) -> StoreResult<Option<Cart>> {
        let doc = sqlx::query_scalar::<_, Json<Cart>>("SELECT doc FROM carts WHERE user_id = $1")
            .bind(user_id).fetch_optional(&self.pool).await?;
        Ok(doc.map(|Json(c)| c))
    }

    async fn save(&self, cart: &Cart) -> StoreResult<()> {
        sqlx::query("INSERT INTO carts (user_id, doc, updated_at) VALUES ($1, $2, $3) ON CONFLICT (user_id) DO UPDATE SET doc = EXCLUDED.doc, updated_at = EXCLUDED.updated_at")
            .bind(cart.user_id()).bind(Json(cart)).bind(cart.updated_at())
            .execute(&self.pool).await?;
        Ok(())
    }

    async fn delete(&self, user_id: &str) -> StoreResult<bool> {
        let done = sqlx::query("DELETE FROM carts WHERE user_id = $1").bind(user_id).execute(&self.pool).await?;
        Ok(done.rows_affected() > 0)
    }
}

#[async_trait]
impl OrderRepository for PgStore {
    async fn insert(&self, order: &Order) -> StoreResult<()> {
        let result = sqlx::query("INSERT INTO orders (order_id, id, user_id, gateway_order_id, order_status, created_at, doc) VALUES ($1, $2, $3, $4, $5, $6, $7)")
            .bind(order.order_id().as_str()).bind(order.id()).bind(order.user_id()).bind(order.gateway_order_id())
            .bind(order.order_status().to_string()).bind(order.created_at()).bind(Json(order))
            .execute(&self.pool).await;
        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(StoreError::Duplicate(order.order_id().to_string())),
            Err(e) => Err(e.into()),
        }
    }

    async fn update(&self, order: &Order) -> StoreResult<()> {
        sqlx::query("UPDATE orders SET order_status = $2, doc = $3 WHERE order_id = $1")
            .bind(order.order_id().as_str()).bind(order.order_status().to_string()).bind(Json(order))
            .execute(&self.pool).await?;
        Ok(())
    }

    async fn find(&self, order_id: &str) -> StoreResult<Option<Order>> {
        let doc = sqlx::query_scalar::<_, Json<Order>>("SELECT doc FROM orders WHERE order_id = $1")
            .bind(order_id).fetch_optional(&self.pool).await?;
        Ok(doc.map(|Json(o)| o))
    }

    async fn find_by_gateway_order(&self, gateway_order_id: &str) -> StoreResult<Option<Order>> {
        let doc = sqlx::query_scalar::<_, Json<Order>>("SELECT doc FROM orders WHERE gateway_order_id = $1 ORDER BY created_at DESC LIMIT 1")
            .bind(gateway_order_id).fetch_optional(&self.pool).await?;
        Ok(doc.map(|Json(o)| o))
    }

    async fn list(&self, query: &OrderQuery) -> StoreResult<Page<Order>> {
        const FILTER: &str = "($1::text IS NULL OR user_id = $1) AND ($2::text IS NULL OR order_status = $2) AND ($3::text IS NULL OR order_id ILIKE '%' || $3 || '%')";
        let status = query.status.map(|s| s.to_string());
        let (limit, offset) = page_bounds(query.limit, query.offset());
        let docs = sqlx::query_scalar::<_, Json<Order>>(&format!("SELECT doc FROM orders WHERE {FILTER} ORDER BY created_at DESC LIMIT $4 OFFSET $5"))
            .bind(&query.user_id).bind(&status).bind(&query.search).bind(limit).bind(offset)
            .fetch_all(&self.pool).await?;
        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM orders WHERE {FILTER}"))
            .bind(&query.user_id).bind(&status).bind(&query.search)
            .fetch_one(&self.pool).await?;
        let data = docs.into_iter().map(|Json(o)| o).collect();
        Ok(Page::new(data, u64::try_from(total).unwrap_or(0), query.page.max(1), query.limit))
    }
}

#[async_trait]
impl AddressRepository for PgStore {
    async fn list(&self, user_id: &str) -> StoreResult<Vec<Address>> {
        let docs = sqlx::query_scalar::<_, Json<Address>>("SELECT doc FROM addresses WHERE user_id = $1 ORDER BY created_at")
            .bind(user_id).fetch_all(&self.pool).await?;
        Ok(docs.into_iter().map(|Json(a)| a).collect())
    }

    async fn save(&self, address: &Address) -> StoreResult<()> {
        sqlx::query("INSERT INTO addresses (id, user_id, created_at, doc) VALUES ($1, $2, $3, $4) ON CONFLICT (id) DO UPDATE SET doc = EXCLUDED.doc")
            .bind(address.id).bind(&address.user_id).bind(address.created_at).bind(Json(address))
            .execute(&self.pool).await?;
        Ok(())
    }

    async fn delete(&self, user_id: &str, id: Uuid) -> StoreResult<Option<Address>> {
        let doc = sqlx::query_scalar::<_, Json<Address>>("DELETE FROM addresses WHERE id = $1 AND user_id = $2 RETURNING doc")
            .bind(id).bind(user_id).fetch_optional(&self.pool).await?;
        Ok(doc.map(|Json(a)| a))
    }
}

#[async_trait]
impl Catalog for PgStore {
    async fn get_product(&self, id: &str) -> StoreResult<Option<Product>> {
        let doc = sqlx::query_scalar::<_, Json<Product>>("SELECT doc FROM items WHERE id = $1")
            .bind(id).fetch_optional(&self.pool).await?;
        Ok(doc.map(|Json(p)| p))
    }

    async fn list(&self, query: &ProductQuery) -> StoreResult<Page<Product>> {
        const FILTER: &str = "($1 OR is_available) AND ($2::text IS NULL OR doc->>'category' ILIKE '%' || $2 || '%') AND ($3::text IS NULL OR doc->>'name' ILIKE '%' || $3 || '%' OR doc->>'description' ILIKE '%' || $3 || '%' OR doc->>'category' ILIKE '%' || $3 || '%') AND ($4::text IS NULL OR seller_id = $4)";
        let (limit, offset) = page_bounds(query.limit, query.offset());
        let docs = sqlx::query_scalar::<_, Json<Product>>(&format!("SELECT doc FROM items WHERE {FILTER} ORDER BY created_at DESC LIMIT $5 OFFSET $6"))
            .bind(query.include_unavailable).bind(&query.category).bind(&query.search).bind(&query.seller_id).bind(limit).bind(offset)
            .fetch_all(&self.pool).await?;
        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM items WHERE {FILTER}"))
            .bind(query.include_unavailable).bind(&query.category).bind(&query.search).bind(&query.seller_id)
            .fetch_one(&self.pool).await?;
        let data = docs.into_iter().map(|Json(p)| p).collect();
        Ok(Page::new(data, u64::try_from(total).unwrap_or(0), query.page.max(1), query.limit))
    }

    async fn save(&self, product: &Product) -> StoreResult<()> {
        sqlx::query("INSERT INTO items (id, seller_id, category, is_available, created_at, doc) VALUES ($1, $2, $3, $4, $5, $6) ON CONFLICT (id) DO UPDATE SET category = EXCLUDED.category, is_available = EXCLUDED.is_available, doc = EXCLUDED.doc")
            .bind(&product.id).bind(&product.seller_id).bind(&product.category).bind(product.is_available).bind(product.created_at).bind(Json(product))
            .execute(&self.pool).await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> StoreResult<Option<Product>> {
        let doc = sqlx::query_scalar::<_, Json<Product>>("DELETE FROM items WHERE id = $1 RETURNING doc")
            .bind(id).fetch_optional(&self.pool).await?;
        Ok(doc.map(|Json(p)| p))
    }

    async fn categories(&self) -> StoreResult<Vec<String>> {
        Ok(sqlx::query_scalar("SELECT DISTINCT category FROM items ORDER BY category").fetch_all(&self.pool).await?)
    }
}
