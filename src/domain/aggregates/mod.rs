//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;
pub mod address;

pub use product::{Product, ProductDetails, SellerRef};
pub use order::{AddressSnapshot, Checkout, Order, OrderError, OrderId, OrderLine, OrderStatus, PaymentMethod, PaymentStatus};
pub use cart::{Cart, CartError, CartLine};
pub use address::{Address, AddressError, AddressFields};
