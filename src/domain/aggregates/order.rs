//! Order Aggregate
//!
//! Items, address and amounts are fixed when the order is placed. Only the
//! order status, payment status and cancellation fields move afterwards, and
//! only along the transitions below:
//!
//! ```text
//! pending -> confirmed -> processing -> shipped -> delivered
//! pending | confirmed -> cancelled
//!
//! payment: pending -> paid | failed, paid -> refunded
//! ```

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{Display, EnumString};
use uuid::Uuid;
use crate::domain::events::OrderEvent;
use crate::domain::value_objects::{round_money, Quantity};

/// Days between placement and the promised delivery date.
pub const DELIVERY_WINDOW_DAYS: i64 = 7;
pub const SPECIAL_REQUESTS_MAX_CHARS: usize = 200;
pub const DEFAULT_CANCELLATION_REASON: &str = "Cancelled by user";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PaymentMethod { Cod, Online }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OrderStatus { #[default] Pending, Confirmed, Processing, Shipped, Delivered, Cancelled }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PaymentStatus { #[default] Pending, Paid, Failed, Refunded }

impl OrderStatus {
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed) | (Confirmed, Processing) | (Processing, Shipped) | (Shipped, Delivered)
                | (Pending | Confirmed, Cancelled)
        )
    }
    pub fn is_cancellable(self) -> bool { self.can_transition_to(OrderStatus::Cancelled) }
}

impl PaymentStatus {
    pub fn can_transition_to(self, next: PaymentStatus) -> bool {
        use PaymentStatus::*;
        matches!((self, next), (Pending, Paid) | (Pending, Failed) | (Paid, Refunded))
    }
}

/// Human-legible order number: `ORD<unix millis><3 random digits>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    pub fn generate(now: DateTime<Utc>) -> Self {
        let suffix: u16 = rand::thread_rng().gen_range(0..1000);
        Self(format!("ORD{}{:03}", now.timestamp_millis(), suffix))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl From<String> for OrderId { fn from(value: String) -> Self { Self(value) } }

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub item_id: String,
    pub name: String,
    pub price: Decimal,
    pub quantity: Quantity,
    #[serde(default)]
    pub seller_id: Option<String>,
    #[serde(default)]
    pub seller_name: Option<String>,
}

/// Delivery address copied into the order; later address-book edits never reach it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressSnapshot {
    pub name: String,
    pub phone: String,
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub pincode: String,
}

/// Everything the buyer submits at checkout.
#[derive(Clone, Debug, PartialEq)]
pub struct Checkout {
    pub items: Vec<OrderLine>,
    pub address: AddressSnapshot,
    pub payment_method: PaymentMethod,
    pub payment_id: Option<String>,
    pub gateway_order_id: Option<String>,
    pub subtotal: Decimal,
    pub delivery_fee: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
    pub special_requests: Option<String>,
}

impl Checkout {
    /// Checks the request before an order number is minted. With
    /// `verify_subtotal` the subtotal must also equal the sum of line prices.
    pub fn validate(&self, verify_subtotal: bool) -> Result<(), OrderError> {
        if self.items.is_empty() { return Err(OrderError::Invalid("Order items are required".into())); }
        let blank = |s: &str| s.trim().is_empty();
        if blank(&self.address.name) || blank(&self.address.phone) || blank(&self.address.address) {
            return Err(OrderError::Invalid("Delivery address is required".into()));
        }
        if let Some(requests) = &self.special_requests {
            if requests.chars().count() > SPECIAL_REQUESTS_MAX_CHARS {
                return Err(OrderError::Invalid(format!("Special requests cannot exceed {SPECIAL_REQUESTS_MAX_CHARS} characters")));
            }
        }
        if self.items.iter().any(|i| i.price.is_sign_negative() && !i.price.is_zero()) {
            return Err(OrderError::Invalid("Item prices cannot be negative".into()));
        }
        let amounts = [self.subtotal, self.delivery_fee, self.tax_amount, self.total_amount];
        if amounts.iter().any(|a| a.is_sign_negative() && !a.is_zero()) {
            return Err(OrderError::Invalid("Order amounts cannot be negative".into()));
        }
        if round_money(self.subtotal + self.delivery_fee + self.tax_amount) != round_money(self.total_amount) {
            return Err(OrderError::Invalid("Total amount must equal subtotal + delivery fee + tax".into()));
        }
        if verify_subtotal {
            let lines: Decimal = self.items.iter().map(|i| i.price * Decimal::from(i.quantity)).sum();
            if round_money(lines) != round_money(self.subtotal) {
                return Err(OrderError::Invalid("Subtotal does not match order items".into()));
            }
        }
        Ok(())
    }

    /// Online payments that arrive with a gateway payment id are already captured.
    pub fn initial_payment_status(&self) -> PaymentStatus {
        match (self.payment_method, &self.payment_id) {
            (PaymentMethod::Online, Some(id)) if !id.trim().is_empty() => PaymentStatus::Paid,
            _ => PaymentStatus::Pending,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    id: Uuid,
    user_id: String,
    order_id: OrderId,
    items: Vec<OrderLine>,
    address: AddressSnapshot,
    payment_method: PaymentMethod,
    payment_status: PaymentStatus,
    payment_id: Option<String>,
    gateway_order_id: Option<String>,
    subtotal: Decimal,
    delivery_fee: Decimal,
    tax_amount: Decimal,
    total_amount: Decimal,
    special_requests: Option<String>,
    order_status: OrderStatus,
    estimated_delivery: DateTime<Utc>,
    delivered_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    cancellation_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<OrderEvent>,
}

impl Order {
    /// Mints a confirmed order from a validated checkout.
    pub fn place(order_id: OrderId, user_id: impl Into<String>, checkout: Checkout, now: DateTime<Utc>) -> Self {
        let payment_status = checkout.initial_payment_status();
        let special_requests = checkout.special_requests.filter(|s| !s.trim().is_empty());
        let mut order = Self {
            id: Uuid::now_v7(), user_id: user_id.into(), order_id, items: checkout.items, address: checkout.address,
            payment_method: checkout.payment_method, payment_status, payment_id: checkout.payment_id,
            gateway_order_id: checkout.gateway_order_id, subtotal: checkout.subtotal, delivery_fee: checkout.delivery_fee,
            tax_amount: checkout.tax_amount, total_amount: checkout.total_amount, special_requests,
            order_status: OrderStatus::Confirmed, estimated_delivery: now + Duration::days(DELIVERY_WINDOW_DAYS),
            delivered_at: None, cancelled_at: None, cancellation_reason: None, created_at: now, updated_at: now,
            events: vec![],
        };
        order.raise_event(OrderEvent::Placed {
            order_id: order.order_id.to_string(), user_id: order.user_id.clone(),
            total_amount: order.total_amount, payment_status,
        });
        order
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn user_id(&self) -> &str { &self.user_id }
    pub fn order_id(&self) -> &OrderId { &self.order_id }
    pub fn items(&self) -> &[OrderLine] { &self.items }
    pub fn address(&self) -> &AddressSnapshot { &self.address }
    pub fn payment_method(&self) -> PaymentMethod { self.payment_method }
    pub fn payment_status(&self) -> PaymentStatus { self.payment_status }
    pub fn payment_id(&self) -> Option<&str> { self.payment_id.as_deref() }
    pub fn gateway_order_id(&self) -> Option<&str> { self.gateway_order_id.as_deref() }
    pub fn subtotal(&self) -> Decimal { self.subtotal }
    pub fn delivery_fee(&self) -> Decimal { self.delivery_fee }
    pub fn tax_amount(&self) -> Decimal { self.tax_amount }
    pub fn total_amount(&self) -> Decimal { self.total_amount }
    pub fn special_requests(&self) -> Option<&str> { self.special_requests.as_deref() }
    pub fn order_status(&self) -> OrderStatus { self.order_status }
    pub fn estimated_delivery(&self) -> DateTime<Utc> { self.estimated_delivery }
    pub fn delivered_at(&self) -> Option<DateTime<Utc>> { self.delivered_at }
    pub fn cancelled_at(&self) -> Option<DateTime<Utc>> { self.cancelled_at }
    pub fn cancellation_reason(&self) -> Option<&str> { self.cancellation_reason.as_deref() }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

    /// Cancels a pending or confirmed order. A captured online payment is
    /// marked refunded; no refund is issued from here.
    pub fn cancel(&mut self, reason: Option<String>, now: DateTime<Utc>) -> Result<(), OrderError> {
        if !self.order_status.is_cancellable() { return Err(OrderError::CannotCancel(self.order_status)); }
        let reason = reason.filter(|r| !r.trim().is_empty()).unwrap_or_else(|| DEFAULT_CANCELLATION_REASON.to_string());
        self.order_status = OrderStatus::Cancelled;
        self.cancelled_at = Some(now);
        self.cancellation_reason = Some(reason.clone());
        let refund_due = self.payment_method == PaymentMethod::Online && self.payment_status == PaymentStatus::Paid;
        if refund_due {
            self.move_payment(PaymentStatus::Refunded);
        }
        self.touch(now);
        self.raise_event(OrderEvent::Cancelled { order_id: self.order_id.to_string(), reason, refund_due });
        Ok(())
    }

    /// Moves the order one step forward. `cancelled` goes through [`Order::cancel`].
    pub fn advance_to(&mut self, next: OrderStatus, now: DateTime<Utc>) -> Result<(), OrderError> {
        if next == OrderStatus::Cancelled { return self.cancel(None, now); }
        let from = self.order_status;
        if !from.can_transition_to(next) { return Err(OrderError::IllegalTransition { from, to: next }); }
        self.order_status = next;
        if next == OrderStatus::Delivered { self.delivered_at = Some(now); }
        self.touch(now);
        self.raise_event(OrderEvent::StatusChanged { order_id: self.order_id.to_string(), from, to: next });
        Ok(())
    }

    pub fn set_payment_status(&mut self, next: PaymentStatus, now: DateTime<Utc>) -> Result<(), OrderError> {
        let from = self.payment_status;
        if !from.can_transition_to(next) { return Err(OrderError::IllegalPaymentTransition { from, to: next }); }
        self.move_payment(next);
        self.touch(now);
        Ok(())
    }

    /// Records a verified gateway payment against a pending order. Money that
    /// lands after the order was cancelled is owed back, so the payment moves
    /// straight on to refunded.
    pub fn record_payment(&mut self, payment_id: impl Into<String>, now: DateTime<Utc>) -> Result<(), OrderError> {
        self.set_payment_status(PaymentStatus::Paid, now)?;
        self.payment_id = Some(payment_id.into());
        if self.order_status == OrderStatus::Cancelled {
            self.move_payment(PaymentStatus::Refunded);
        }
        Ok(())
    }

    pub fn take_events(&mut self) -> Vec<OrderEvent> { std::mem::take(&mut self.events) }

    fn move_payment(&mut self, next: PaymentStatus) {
        let from = std::mem::replace(&mut self.payment_status, next);
        self.raise_event(OrderEvent::PaymentStatusChanged { order_id: self.order_id.to_string(), from, to: next });
    }
    fn raise_event(&mut self, e: OrderEvent) { self.events.push(e); }
    fn touch(&mut self, now: DateTime<Utc>) { self.updated_at = now; }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    Invalid(String),
    CannotCancel(OrderStatus),
    IllegalTransition { from: OrderStatus, to: OrderStatus },
    IllegalPaymentTransition { from: PaymentStatus, to: PaymentStatus },
}
impl std::error::Error for OrderError {}
impl fmt::Display for OrderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid(msg) => write!(f, "{msg}"),
            Self::CannotCancel(status) => write!(f, "Order cannot be cancelled at this stage ({status})"),
            Self::IllegalTransition { from, to } => write!(f, "Order cannot move from {from} to {to}"),
            Self::IllegalPaymentTransition { from, to } => write!(f, "Payment status cannot move from {from} to {to}"),
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_checkout(method: PaymentMethod, payment_id: Option<&str>) -> Checkout {
    use rust_decimal_macros::dec;
    Checkout {
        items: vec![OrderLine {
            item_id: "P1".into(), name: "Widget".into(), price: dec!(94.50), quantity: Quantity::new(2).unwrap(),
            seller_id: Some("seller-1".into()), seller_name: Some("Green Farm".into()),
        }],
        address: AddressSnapshot {
            name: "Asha".into(), phone: "9876543210".into(), address: "12 Market Road".into(),
            city: "Pune".into(), state: "MH".into(), pincode: "411001".into(),
        },
        payment_method: method, payment_id: payment_id.map(String::from), gateway_order_id: None,
        subtotal: dec!(189.00), delivery_fee: dec!(40), tax_amount: dec!(0), total_amount: dec!(229.00),
        special_requests: None,
    }
}
