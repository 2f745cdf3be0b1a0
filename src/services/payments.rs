use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

use super::{OrInternal, OrderService};
use crate::auth::Identity;
use crate::domain::aggregates::Order;
use crate::payments::{verify_payment, GatewayError, GatewayOrder, PaymentGateway, Verified};
use crate::{MarketplaceError, Result};

/// Opens gateway payment orders and settles them once the buyer's callback
/// signature checks out.
#[derive(Clone)]
pub struct PaymentService {
    gateway: Arc<dyn PaymentGateway>,
    key_secret: String,
    currency: String,
    timeout: Duration,
    orders: OrderService,
}

impl PaymentService {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        key_secret: impl Into<String>,
        currency: impl Into<String>,
        timeout: Duration,
        orders: OrderService,
    ) -> Self {
        Self { gateway, key_secret: key_secret.into(), currency: currency.into(), timeout, orders }
    }

    /// `amount` is in minor units and rounded to a whole number.
    pub async fn create_gateway_order(&self, caller: &Identity, amount: Decimal, currency: Option<String>) -> Result<GatewayOrder> {
        let amount = amount
            .round()
            .to_i64()
            .filter(|a| *a > 0)
            .ok_or_else(|| MarketplaceError::invalid("Valid amount is required"))?;
        let currency = currency.filter(|c| !c.trim().is_empty()).unwrap_or_else(|| self.currency.clone());
        let receipt = format!("receipt_{}", Utc::now().timestamp_millis());
        let order = tokio::time::timeout(self.timeout, self.gateway.create_order(amount, &currency, &receipt))
            .await
            .unwrap_or_else(|_| Err(GatewayError::Timeout(self.timeout)))
            .or_internal("payments.create_order", &receipt)?;
        tracing::info!(user_id = %caller.user_id, gateway_order_id = %order.id, amount, %currency, "gateway order created");
        Ok(order)
    }

    /// Checks the callback signature and marks the matching pending order paid.
    pub async fn verify(&self, caller: &Identity, gateway_order_id: &str, payment_id: &str, signature: &str) -> Result<(Verified, Option<Order>)> {
        let verified = verify_payment(gateway_order_id, payment_id, signature, &self.key_secret).map_err(|e| {
            if e == MarketplaceError::SignatureMismatch {
                tracing::warn!(user_id = %caller.user_id, gateway_order_id, "payment signature mismatch");
            }
            e
        })?;
        let settled = self.orders.settle_payment(&verified).await?;
        Ok((verified, settled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::PaymentStatus;
    use crate::notifications::LogNotifier;
    use crate::payments::{sign, GatewayError};
    use crate::services::CheckoutRequest;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    const SECRET: &str = "rzp_test_secret";

    struct FakeGateway;

    #[async_trait]
    impl PaymentGateway for FakeGateway {
        async fn create_order(&self, amount: i64, currency: &str, receipt: &str) -> std::result::Result<GatewayOrder, GatewayError> {
            Ok(GatewayOrder { id: "order_G1".into(), amount, currency: currency.into(), receipt: receipt.into() })
        }
    }

    struct Rejecting;

    #[async_trait]
    impl PaymentGateway for Rejecting {
        async fn create_order(&self, _: i64, _: &str, _: &str) -> std::result::Result<GatewayOrder, GatewayError> {
            Err(GatewayError::Rejected { status: 401, body: "bad key".into() })
        }
    }

    /// Accepts the request and never answers.
    struct Silent;

    #[async_trait]
    impl PaymentGateway for Silent {
        async fn create_order(&self, _: i64, _: &str, _: &str) -> std::result::Result<GatewayOrder, GatewayError> {
            std::future::pending().await
        }
    }

    fn orders() -> OrderService {
        let store = Arc::new(MemoryStore::new());
        OrderService::new(store.clone(), store, Arc::new(LogNotifier), Duration::from_secs(1), false)
    }

    #[tokio::test]
    async fn test_create_gateway_order() {
        let svc = PaymentService::new(Arc::new(FakeGateway), SECRET, "INR", Duration::from_secs(1), orders());
        let me = Identity::new("U1");
        let order = svc.create_gateway_order(&me, dec!(22900.4), None).await.unwrap();
        assert_eq!(order.amount, 22900);
        assert_eq!(order.currency, "INR");
        assert!(order.receipt.starts_with("receipt_"));
        for bad in [dec!(0), dec!(-5), dec!(0.2)] {
            assert_eq!(svc.create_gateway_order(&me, bad, None).await.unwrap_err(), MarketplaceError::invalid("Valid amount is required"));
        }
    }

    #[tokio::test]
    async fn test_gateway_failure_is_internal() {
        let svc = PaymentService::new(Arc::new(Rejecting), SECRET, "INR", Duration::from_secs(1), orders());
        let err = svc.create_gateway_order(&Identity::new("U1"), dec!(100), Some("USD".into())).await.unwrap_err();
        assert_eq!(err, MarketplaceError::Internal("payments.create_order".into()));
    }

    #[tokio::test]
    async fn test_silent_gateway_times_out() {
        let svc = PaymentService::new(Arc::new(Silent), SECRET, "INR", Duration::from_millis(50), orders());
        let outcome = tokio::time::timeout(Duration::from_secs(2), svc.create_gateway_order(&Identity::new("U1"), dec!(100), None)).await;
        let err = outcome.expect("gateway call was not bounded").unwrap_err();
        assert_eq!(err, MarketplaceError::Internal("payments.create_order".into()));
    }

    #[tokio::test]
    async fn test_verify_settles_pending_order() {
        let orders = orders();
        let svc = PaymentService::new(Arc::new(FakeGateway), SECRET, "INR", Duration::from_secs(1), orders.clone());
        let me = Identity::new("U1");
        let request: CheckoutRequest = serde_json::from_value(serde_json::json!({
            "items": [{ "itemId": "P", "name": "Widget", "price": 94.5, "quantity": 2 }],
            "address": { "name": "Asha", "phone": "9876543210", "address": "12 Market Road" },
            "paymentMethod": "online", "razorpayOrderId": "order_G1",
            "subtotal": 189.0, "deliveryFee": 40, "taxAmount": 0, "totalAmount": 229.0,
        }))
        .unwrap();
        let placed = orders.create_order(&me, request).await.unwrap();

        let bad = svc.verify(&me, "order_G1", "pay_1", "00ff").await.unwrap_err();
        assert_eq!(bad, MarketplaceError::SignatureMismatch);
        assert_eq!(orders.get_order(&me, placed.order_id().as_str()).await.unwrap().payment_status(), PaymentStatus::Pending);

        let signature = sign("order_G1", "pay_1", SECRET).unwrap();
        let (verified, settled) = svc.verify(&me, "order_G1", "pay_1", &signature).await.unwrap();
        assert_eq!(verified.payment_id, "pay_1");
        assert_eq!(settled.unwrap().payment_status(), PaymentStatus::Paid);
    }

    #[tokio::test]
    async fn test_verify_without_order() {
        let svc = PaymentService::new(Arc::new(FakeGateway), SECRET, "INR", Duration::from_secs(1), orders());
        let signature = sign("order_Z", "pay_9", SECRET).unwrap();
        let (_, settled) = svc.verify(&Identity::new("U1"), "order_Z", "pay_9", &signature).await.unwrap();
        assert!(settled.is_none());
    }
}
