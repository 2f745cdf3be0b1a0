//! OpenSASE Marketplace
//!
//! Self-hosted marketplace backend: buyer carts, checkout, payments and the
//! order lifecycle.
//!
//! ## Features
//! - Per-user carts with live discount/tax pricing
//! - Checkout into immutable, snapshotted orders
//! - Cash-on-delivery and gateway-verified online payments
//! - Order status state machine with cancellation and refund marking
//! - Address book, catalog browsing and admin moderation

use thiserror::Error;

pub mod auth;
pub mod config;
pub mod domain;
pub mod http;
pub mod notifications;
pub mod payments;
pub mod services;
pub mod store;

use domain::aggregates::{AddressError, CartError, OrderError};

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarketplaceError {
    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("Invalid payment signature")]
    SignatureMismatch,

    /// Carries the failed operation name; details stay in the logs.
    #[error("Internal error during {0}")]
    Internal(String),
}

impl MarketplaceError {
    pub fn invalid(msg: impl Into<String>) -> Self { Self::InvalidArgument(msg.into()) }
    pub fn not_found(msg: impl Into<String>) -> Self { Self::NotFound(msg.into()) }
    pub fn forbidden(msg: impl Into<String>) -> Self { Self::Forbidden(msg.into()) }
}

impl From<OrderError> for MarketplaceError {
    fn from(e: OrderError) -> Self {
        match e {
            OrderError::Invalid(msg) => Self::InvalidArgument(msg),
            other => Self::InvalidState(other.to_string()),
        }
    }
}

impl From<CartError> for MarketplaceError {
    fn from(e: CartError) -> Self { Self::NotFound(e.to_string()) }
}

impl From<AddressError> for MarketplaceError {
    fn from(e: AddressError) -> Self { Self::InvalidArgument(e.to_string()) }
}

pub type Result<T> = std::result::Result<T, MarketplaceError>;

#[cfg(test)]
mod tests {
    use super::*;
    use domain::aggregates::OrderStatus;

    #[test]
    fn test_domain_error_mapping() {
        let e: MarketplaceError = OrderError::CannotCancel(OrderStatus::Shipped).into();
        assert!(matches!(e, MarketplaceError::InvalidState(ref m) if m.contains("cannot be cancelled")));
        let e: MarketplaceError = OrderError::Invalid("Order items are required".into()).into();
        assert_eq!(e, MarketplaceError::invalid("Order items are required"));
        let e: MarketplaceError = CartError::ItemNotFound.into();
        assert!(matches!(e, MarketplaceError::NotFound(_)));
    }
}
