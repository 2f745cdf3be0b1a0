//! Process configuration, read from the environment (and `.env`).

use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::payments::gateway::RAZORPAY_API_URL;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} not set")]
    Missing(&'static str),

    #[error("invalid {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: Option<String>,
    pub max_db_connections: u32,
    pub nats_url: Option<String>,
    pub jwt_secret: String,
    pub razorpay_key_id: String,
    pub razorpay_key_secret: String,
    pub razorpay_api_url: String,
    pub payment_currency: String,
    /// Upper bound on one payment-gateway round trip.
    pub gateway_timeout: Duration,
    pub store_timeout: Duration,
    /// Reject checkouts whose subtotal differs from the sum of line prices.
    pub verify_subtotal: bool,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("database", &self.database_url.is_some())
            .field("nats", &self.nats_url.is_some())
            .field("razorpay_key_id", &self.razorpay_key_id)
            .field("payment_currency", &self.payment_currency)
            .field("gateway_timeout", &self.gateway_timeout)
            .field("store_timeout", &self.store_timeout)
            .field("verify_subtotal", &self.verify_subtotal)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &'static str| var(key).ok_or(ConfigError::Missing(key));
        fn parsed<T: FromStr>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
            match raw {
                None => Ok(default),
                Some(value) => value.parse().map_err(|_| ConfigError::Invalid { key, value }),
            }
        }

        Ok(Self {
            port: parsed("PORT", var("PORT"), 8083)?,
            database_url: var("DATABASE_URL"),
            max_db_connections: parsed("DATABASE_MAX_CONNECTIONS", var("DATABASE_MAX_CONNECTIONS"), 10)?,
            nats_url: var("NATS_URL"),
            jwt_secret: required("JWT_SECRET")?,
            razorpay_key_id: required("RAZORPAY_KEY_ID")?,
            razorpay_key_secret: required("RAZORPAY_KEY_SECRET")?,
            razorpay_api_url: var("RAZORPAY_API_URL").unwrap_or_else(|| RAZORPAY_API_URL.to_string()),
            payment_currency: var("PAYMENT_CURRENCY").unwrap_or_else(|| "INR".to_string()),
            gateway_timeout: Duration::from_millis(parsed("GATEWAY_TIMEOUT_MS", var("GATEWAY_TIMEOUT_MS"), 10_000)?),
            store_timeout: Duration::from_millis(parsed("STORE_TIMEOUT_MS", var("STORE_TIMEOUT_MS"), 5000)?),
            verify_subtotal: parsed("ORDER_VERIFY_SUBTOTAL", var("ORDER_VERIFY_SUBTOTAL"), false)?,
        })
    }
}
