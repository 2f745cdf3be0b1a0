//! Application services. Each one checks the caller, talks to the store
//! under a deadline, and turns store failures into logged internal errors.

use std::fmt::Display;

use crate::{MarketplaceError, Result};

pub mod addresses;
pub mod cart;
pub mod catalog;
pub mod orders;
pub mod payments;

pub use addresses::AddressService;
pub use cart::{CartService, CartView};
pub use catalog::{CatalogService, ItemRequest};
pub use orders::{CheckoutRequest, OrderService};
pub use payments::PaymentService;

/// Default and ceiling page sizes for listings.
pub(crate) fn page_limit(requested: Option<u32>, default: u32) -> u32 {
    requested.unwrap_or(default).clamp(1, 100)
}

pub(crate) trait OrInternal<T> {
    /// Logs the failure with its context and hides the details from callers.
    fn or_internal(self, operation: &'static str, key: &str) -> Result<T>;
}

impl<T, E: Display> OrInternal<T> for std::result::Result<T, E> {
    fn or_internal(self, operation: &'static str, key: &str) -> Result<T> {
        self.map_err(|e| {
            tracing::error!(operation, key, error = %e, "operation failed");
            MarketplaceError::Internal(operation.to_string())
        })
    }
}
