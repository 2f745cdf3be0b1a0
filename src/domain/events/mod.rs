//! Domain events
use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::aggregates::order::{OrderStatus, PaymentStatus};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    #[serde(rename_all = "camelCase")]
    Placed { order_id: String, user_id: String, total_amount: Decimal, payment_status: PaymentStatus },
    #[serde(rename_all = "camelCase")]
    StatusChanged { order_id: String, from: OrderStatus, to: OrderStatus },
    #[serde(rename_all = "camelCase")]
    PaymentStatusChanged { order_id: String, from: PaymentStatus, to: PaymentStatus },
    #[serde(rename_all = "camelCase")]
    Cancelled { order_id: String, reason: String, refund_due: bool },
}

impl OrderEvent {
    pub fn order_id(&self) -> &str {
        match self {
            Self::Placed { order_id, .. }
            | Self::StatusChanged { order_id, .. }
            | Self::PaymentStatusChanged { order_id, .. }
            | Self::Cancelled { order_id, .. } => order_id,
        }
    }

    /// Subject suffix used when the event leaves the process.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Placed { .. } => "placed",
            Self::StatusChanged { .. } => "status_changed",
            Self::PaymentStatusChanged { .. } => "payment_status_changed",
            Self::Cancelled { .. } => "cancelled",
        }
    }
}
