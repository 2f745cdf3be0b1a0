//! Checkout and the order lifecycle.
//!
//! Placing an order persists it and returns; clearing the buyer's cart and
//! sending the confirmation run in the background and never fail or delay
//! the checkout.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use validator::Validate;

use super::{page_limit, OrInternal};
use crate::auth::Identity;
use crate::domain::aggregates::{
    AddressSnapshot, Checkout, Order, OrderId, OrderLine, OrderStatus, PaymentMethod, PaymentStatus,
};
use crate::domain::events::OrderEvent;
use crate::notifications::{Notifier, Recipient};
use crate::payments::Verified;
use crate::store::{bounded, CartRepository, OrderQuery, OrderRepository, Page, StoreError};
use crate::{MarketplaceError, Result};

const ORDER_ID_ATTEMPTS: u32 = 3;
pub const ADMIN_CANCELLATION_REASON: &str = "Cancelled by admin";

/// Checkout body as submitted by the storefront.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    #[validate(length(min = 1, message = "Order items are required"))]
    pub items: Vec<OrderLine>,
    pub address: AddressSnapshot,
    pub payment_method: String,
    #[serde(default)]
    pub payment_id: Option<String>,
    #[serde(default, alias = "razorpayOrderId")]
    pub gateway_order_id: Option<String>,
    pub subtotal: Decimal,
    pub delivery_fee: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
    #[serde(default)]
    #[validate(length(max = 200, message = "Special requests cannot exceed 200 characters"))]
    pub special_requests: Option<String>,
}

impl CheckoutRequest {
    pub fn into_checkout(self) -> Result<Checkout> {
        let payment_method = PaymentMethod::from_str(self.payment_method.trim())
            .map_err(|_| MarketplaceError::invalid("Valid payment method is required"))?;
        Ok(Checkout {
            items: self.items, address: self.address, payment_method,
            payment_id: self.payment_id.filter(|p| !p.trim().is_empty()),
            gateway_order_id: self.gateway_order_id.filter(|g| !g.trim().is_empty()),
            subtotal: self.subtotal, delivery_fee: self.delivery_fee, tax_amount: self.tax_amount,
            total_amount: self.total_amount, special_requests: self.special_requests,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub number: String,
    pub date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub customer_id: String,
    pub address: AddressSnapshot,
    pub items: Vec<OrderLine>,
    pub subtotal: Decimal,
    pub delivery_fee: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub order_status: OrderStatus,
}

impl From<&Order> for Invoice {
    fn from(o: &Order) -> Self {
        Self {
            number: o.order_id().to_string(), date: o.created_at(), due_date: o.estimated_delivery(),
            customer_id: o.user_id().to_string(), address: o.address().clone(), items: o.items().to_vec(),
            subtotal: o.subtotal(), delivery_fee: o.delivery_fee(), tax_amount: o.tax_amount(),
            total_amount: o.total_amount(), payment_method: o.payment_method(), payment_status: o.payment_status(),
            order_status: o.order_status(),
        }
    }
}

#[derive(Clone)]
pub struct OrderService {
    orders: Arc<dyn OrderRepository>,
    carts: Arc<dyn CartRepository>,
    notifier: Arc<dyn Notifier>,
    timeout: Duration,
    verify_subtotal: bool,
}

impl OrderService {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        carts: Arc<dyn CartRepository>,
        notifier: Arc<dyn Notifier>,
        timeout: Duration,
        verify_subtotal: bool,
    ) -> Self {
        Self { orders, carts, notifier, timeout, verify_subtotal }
    }

    /// Validates the checkout, mints an order number and persists a confirmed order.
    pub async fn create_order(&self, caller: &Identity, request: CheckoutRequest) -> Result<Order> {
        let checkout = request.into_checkout()?;
        checkout.validate(self.verify_subtotal)?;

        let user_id = caller.user_id.as_str();
        let mut placed = None;
        for attempt in 1..=ORDER_ID_ATTEMPTS {
            let now = Utc::now();
            let order = Order::place(OrderId::generate(now), user_id, checkout.clone(), now);
            match bounded(self.timeout, self.orders.insert(&order)).await {
                Ok(()) => {
                    placed = Some(order);
                    break;
                }
                Err(StoreError::Duplicate(order_id)) => {
                    tracing::warn!(%order_id, attempt, "order number already taken, regenerating");
                }
                Err(e) => return Err(e).or_internal("orders.create", user_id),
            }
        }
        let mut order = placed.ok_or_else(|| {
            tracing::error!(operation = "orders.create", user_id, attempts = ORDER_ID_ATTEMPTS, "could not mint a unique order number");
            MarketplaceError::Internal("orders.create".into())
        })?;
        tracing::info!(
            order_id = %order.order_id(), user_id, total = %order.total_amount(),
            payment_method = %order.payment_method(), payment_status = %order.payment_status(), "order placed"
        );

        let events = order.take_events();
        self.dispatch(Some(Recipient::from(caller)), &order, events);
        Ok(order)
    }

    /// The caller's own orders, newest first.
    pub async fn list_orders(&self, caller: &Identity, status: Option<OrderStatus>, page: Option<u32>, limit: Option<u32>) -> Result<Page<Order>> {
        let query = OrderQuery {
            user_id: Some(caller.user_id.clone()), status, search: None,
            page: page.unwrap_or(1).max(1), limit: page_limit(limit, 10),
        };
        bounded(self.timeout, self.orders.list(&query)).await.or_internal("orders.list", &caller.user_id)
    }

    /// Another user's order reads as missing.
    pub async fn get_order(&self, caller: &Identity, order_id: &str) -> Result<Order> {
        self.load(order_id, "orders.get").await?.filter(|o| o.user_id() == caller.user_id).ok_or_else(not_found)
    }

    pub async fn cancel_order(&self, caller: &Identity, order_id: &str, reason: Option<String>) -> Result<Order> {
        let mut order = self.get_order(caller, order_id).await?;
        order.cancel(reason, Utc::now())?;
        self.save(&mut order, "orders.cancel").await?;
        tracing::info!(order_id, user_id = %caller.user_id, refunded = order.payment_status() == PaymentStatus::Refunded, "order cancelled");
        Ok(order)
    }

    pub async fn admin_list_orders(
        &self,
        caller: &Identity,
        status: Option<OrderStatus>,
        search: Option<String>,
        page: Option<u32>,
        limit: Option<u32>,
    ) -> Result<Page<Order>> {
        caller.ensure_admin()?;
        let query = OrderQuery {
            user_id: None, status, search: search.filter(|s| !s.trim().is_empty()),
            page: page.unwrap_or(1).max(1), limit: page_limit(limit, 50),
        };
        bounded(self.timeout, self.orders.list(&query)).await.or_internal("orders.admin_list", &caller.user_id)
    }

    pub async fn admin_update_status(&self, caller: &Identity, order_id: &str, next: OrderStatus) -> Result<Order> {
        caller.ensure_admin()?;
        let mut order = self.load(order_id, "orders.update_status").await?.ok_or_else(not_found)?;
        let now = Utc::now();
        if next == OrderStatus::Cancelled {
            order.cancel(Some(ADMIN_CANCELLATION_REASON.to_string()), now)?;
        } else {
            order.advance_to(next, now)?;
        }
        self.save(&mut order, "orders.update_status").await?;
        tracing::info!(order_id, admin = %caller.user_id, status = %next, "order status updated");
        Ok(order)
    }

    pub async fn admin_update_payment_status(&self, caller: &Identity, order_id: &str, next: PaymentStatus) -> Result<Order> {
        caller.ensure_admin()?;
        let mut order = self.load(order_id, "orders.update_payment").await?.ok_or_else(not_found)?;
        order.set_payment_status(next, Utc::now())?;
        self.save(&mut order, "orders.update_payment").await?;
        tracing::info!(order_id, admin = %caller.user_id, payment_status = %next, "payment status updated");
        Ok(order)
    }

    pub async fn invoice(&self, caller: &Identity, order_id: &str) -> Result<Invoice> {
        caller.ensure_admin()?;
        let order = self.load(order_id, "orders.invoice").await?.ok_or_else(not_found)?;
        Ok(Invoice::from(&order))
    }

    /// Marks the order opened against a verified gateway payment as paid, or
    /// as refunded when the buyer cancelled before the money arrived.
    /// Orders that are not pending, or do not exist yet, are left alone.
    pub async fn settle_payment(&self, verified: &Verified) -> Result<Option<Order>> {
        let key = verified.gateway_order_id.as_str();
        let found = bounded(self.timeout, self.orders.find_by_gateway_order(key)).await.or_internal("orders.settle_payment", key)?;
        let Some(mut order) = found else { return Ok(None) };
        match order.payment_status() {
            PaymentStatus::Pending => {
                order.record_payment(verified.payment_id.clone(), Utc::now())?;
                self.save(&mut order, "orders.settle_payment").await?;
                if order.payment_status() == PaymentStatus::Refunded {
                    tracing::warn!(order_id = %order.order_id(), gateway_order_id = key, payment_id = %verified.payment_id, "payment arrived for a cancelled order, refund due");
                } else {
                    tracing::info!(order_id = %order.order_id(), gateway_order_id = key, "payment settled");
                }
            }
            status => tracing::debug!(order_id = %order.order_id(), %status, "payment already settled"),
        }
        Ok(Some(order))
    }

    async fn load(&self, order_id: &str, operation: &'static str) -> Result<Option<Order>> {
        bounded(self.timeout, self.orders.find(order_id)).await.or_internal(operation, order_id)
    }

    async fn save(&self, order: &mut Order, operation: &'static str) -> Result<()> {
        bounded(self.timeout, self.orders.update(order)).await.or_internal(operation, order.order_id().as_str())?;
        let events = order.take_events();
        self.dispatch(None, order, events);
        Ok(())
    }

    /// Fire-and-forget follow-up to a write. A freshly placed order also
    /// empties the buyer's cart and sends the confirmation.
    fn dispatch(&self, placed_by: Option<Recipient>, order: &Order, events: Vec<OrderEvent>) {
        if placed_by.is_none() && events.is_empty() { return; }
        let notifier = Arc::clone(&self.notifier);
        let carts = Arc::clone(&self.carts);
        let timeout = self.timeout;
        let order = order.clone();
        tokio::spawn(async move {
            if let Some(to) = placed_by {
                if let Err(e) = bounded(timeout, carts.delete(order.user_id())).await {
                    tracing::warn!(user_id = %order.user_id(), order_id = %order.order_id(), error = %e, "failed to clear cart after order");
                }
                if let Err(e) = notifier.send_order_confirmation(&to, &order).await {
                    tracing::warn!(order_id = %order.order_id(), user_id = %to.user_id, error = %e, "failed to send order confirmation");
                }
            }
            for event in &events {
                if let Err(e) = notifier.publish(event).await {
                    tracing::warn!(order_id = %event.order_id(), event = event.name(), error = %e, "failed to publish order event");
                }
            }
        });
    }
}

fn not_found() -> MarketplaceError { MarketplaceError::not_found("Order not found") }
