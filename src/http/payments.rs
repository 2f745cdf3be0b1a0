use axum::{extract::State, Json};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use super::{AppState, ValidatedJson};
use crate::auth::Identity;
use crate::Result;

#[derive(Debug, Deserialize, Validate)]
pub struct GatewayOrderRequest {
    pub amount: Decimal,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyRequest {
    #[serde(alias = "razorpay_order_id", alias = "gatewayOrderId", alias = "orderId")]
    #[validate(length(min = 1, message = "Payment order id is required"))]
    pub order_id: String,
    #[serde(alias = "razorpay_payment_id", alias = "paymentId")]
    #[validate(length(min = 1, message = "Payment id is required"))]
    pub payment_id: String,
    #[serde(alias = "razorpay_signature")]
    #[validate(length(min = 1, message = "Payment signature is required"))]
    pub signature: String,
}

pub async fn create_order(State(s): State<AppState>, me: Identity, ValidatedJson(r): ValidatedJson<GatewayOrderRequest>) -> Result<Json<Value>> {
    let order = s.payments.create_gateway_order(&me, r.amount, r.currency).await?;
    Ok(Json(json!({
        "success": true,
        "id": order.id,
        "amount": order.amount,
        "currency": order.currency,
        "receipt": order.receipt,
    })))
}

pub async fn verify(State(s): State<AppState>, me: Identity, ValidatedJson(r): ValidatedJson<VerifyRequest>) -> Result<Json<Value>> {
    let (verified, settled) = s.payments.verify(&me, &r.order_id, &r.payment_id, &r.signature).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Payment verified successfully",
        "paymentId": verified.payment_id,
        "orderId": verified.gateway_order_id,
        "settledOrderId": settled.as_ref().map(|o| o.order_id().to_string()),
    })))
}
