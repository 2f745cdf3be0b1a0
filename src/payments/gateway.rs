//! Remote payment-order client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    /// Minor currency units (paise, cents).
    pub amount: i64,
    pub currency: String,
    pub receipt: String,
}

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("gateway request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("gateway rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("gateway did not answer within {0:?}")]
    Timeout(Duration),
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Opens a payment order the buyer will pay against.
    async fn create_order(&self, amount: i64, currency: &str, receipt: &str) -> Result<GatewayOrder, GatewayError>;
}

pub const RAZORPAY_API_URL: &str = "https://api.razorpay.com";

/// Razorpay orders API client (`POST /v1/orders`, basic auth).
#[derive(Clone)]
pub struct RazorpayGateway {
    http: reqwest::Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

impl std::fmt::Debug for RazorpayGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RazorpayGateway").field("base_url", &self.base_url).field("key_id", &self.key_id).finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct CreateOrderBody<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
    payment_capture: u8,
}

impl RazorpayGateway {
    /// Every request, body read included, is cut off after `timeout`.
    pub fn new(
        base_url: impl Into<String>,
        key_id: impl Into<String>,
        key_secret: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder().connect_timeout(timeout).timeout(timeout).build()?;
        Ok(Self { http, base_url: base_url.into(), key_id: key_id.into(), key_secret: key_secret.into() })
    }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    async fn create_order(&self, amount: i64, currency: &str, receipt: &str) -> Result<GatewayOrder, GatewayError> {
        let url = format!("{}/v1/orders", self.base_url.trim_end_matches('/'));
        let response = self
            .http
            .post(url)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&CreateOrderBody { amount, currency, receipt, payment_capture: 1 })
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected { status: status.as_u16(), body });
        }
        Ok(response.json::<GatewayOrder>().await?)
    }
}
