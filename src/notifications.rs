//! Outbound notifications: order confirmations for buyers and order events
//! for downstream consumers (mailer, fulfilment).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::auth::Identity;
use crate::domain::aggregates::{AddressSnapshot, Order, PaymentMethod, PaymentStatus};
use crate::domain::events::OrderEvent;

pub const CONFIRMATION_SUBJECT: &str = "marketplace.notifications.order_confirmation";
pub const EVENT_SUBJECT_PREFIX: &str = "marketplace.orders";

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("could not encode notification: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("notification transport failed: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recipient {
    pub user_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
}

impl From<&Identity> for Recipient {
    fn from(who: &Identity) -> Self {
        Self { user_id: who.user_id.clone(), name: who.name.clone(), email: who.email.clone() }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationLine {
    pub name: String,
    pub quantity: u32,
    pub price: Decimal,
}

/// Rendered order confirmation, handed to the mailer as-is.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderConfirmation {
    pub to: Recipient,
    pub subject: String,
    pub order_id: String,
    pub total_amount: Decimal,
    pub payment_method: &'static str,
    pub payment_status: PaymentStatus,
    pub estimated_delivery: DateTime<Utc>,
    pub items: Vec<ConfirmationLine>,
    pub address: AddressSnapshot,
}

impl OrderConfirmation {
    pub fn render(to: &Recipient, order: &Order) -> Self {
        Self {
            to: to.clone(),
            subject: format!("Order Confirmation - {}", order.order_id()),
            order_id: order.order_id().to_string(),
            total_amount: order.total_amount(),
            payment_method: match order.payment_method() {
                PaymentMethod::Cod => "Cash on Delivery",
                PaymentMethod::Online => "Online Payment",
            },
            payment_status: order.payment_status(),
            estimated_delivery: order.estimated_delivery(),
            items: order
                .items()
                .iter()
                .map(|i| ConfirmationLine { name: i.name.clone(), quantity: i.quantity.value(), price: i.price })
                .collect(),
            address: order.address().clone(),
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_order_confirmation(&self, to: &Recipient, order: &Order) -> Result<(), NotifyError>;
    async fn publish(&self, event: &OrderEvent) -> Result<(), NotifyError>;
}

/// Publishes onto NATS for the mailer and other subscribers.
#[derive(Clone, Debug)]
pub struct NatsNotifier { client: async_nats::Client }

impl NatsNotifier {
    pub fn new(client: async_nats::Client) -> Self { Self { client } }

    async fn send<T: Serialize + Sync>(&self, subject: String, body: &T) -> Result<(), NotifyError> {
        let payload = serde_json::to_vec(body)?;
        self.client.publish(subject, payload.into()).await.map_err(|e| NotifyError::Transport(e.to_string()))
    }
}

#[async_trait]
impl Notifier for NatsNotifier {
    async fn send_order_confirmation(&self, to: &Recipient, order: &Order) -> Result<(), NotifyError> {
        self.send(CONFIRMATION_SUBJECT.to_string(), &OrderConfirmation::render(to, order)).await
    }

    async fn publish(&self, event: &OrderEvent) -> Result<(), NotifyError> {
        self.send(format!("{EVENT_SUBJECT_PREFIX}.{}", event.name()), event).await
    }
}

/// Fallback when no broker is configured: everything goes to the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_order_confirmation(&self, to: &Recipient, order: &Order) -> Result<(), NotifyError> {
        let message = OrderConfirmation::render(to, order);
        tracing::info!(order_id = %message.order_id, user_id = %to.user_id, subject = %message.subject, "order confirmation");
        Ok(())
    }

    async fn publish(&self, event: &OrderEvent) -> Result<(), NotifyError> {
        tracing::info!(order_id = %event.order_id(), event = event.name(), "order event");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::order::{sample_checkout, OrderId};

    #[test]
    fn test_confirmation_render() {
        let order = Order::place(OrderId::from("ORD1".to_string()), "U1", sample_checkout(PaymentMethod::Cod, None), Utc::now());
        let to = Recipient { user_id: "U1".into(), name: Some("Asha".into()), email: Some("asha@example.com".into()) };
        let msg = OrderConfirmation::render(&to, &order);
        assert_eq!(msg.subject, "Order Confirmation - ORD1");
        assert_eq!(msg.payment_method, "Cash on Delivery");
        assert_eq!(msg.items.len(), 1);
        assert_eq!(msg.items[0].quantity, 2);
    }
}
