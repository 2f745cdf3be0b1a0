//! HTTP surface: router, shared state and the JSON envelope.
//!
//! Every body is `{"success": bool, ...}`; failures carry a `message`.

use axum::{
    async_trait,
    extract::{FromRef, FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post, put},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Arc;
use validator::{Validate, ValidationErrors};

use crate::auth::TokenKeys;
use crate::services::{AddressService, CartService, CatalogService, OrderService, PaymentService};
use crate::MarketplaceError;

mod addresses;
mod admin;
mod cart;
mod catalog;
mod orders;
mod payments;

#[derive(Clone)]
pub struct AppState {
    pub keys: Arc<TokenKeys>,
    pub cart: CartService,
    pub orders: OrderService,
    pub payments: PaymentService,
    pub addresses: AddressService,
    pub catalog: CatalogService,
}

impl FromRef<AppState> for Arc<TokenKeys> {
    fn from_ref(state: &AppState) -> Self { Arc::clone(&state.keys) }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(json!({"status": "healthy", "service": "opensase-marketplace"})) }))
        .route("/api/cart/add", post(cart::add_item))
        .route("/api/cart/update", put(cart::update_quantity))
        .route("/api/cart/remove", axum::routing::delete(cart::remove_item))
        .route("/api/cart/clear/:user_id", axum::routing::delete(cart::clear_cart))
        .route("/api/cart/:user_id", get(cart::get_cart))
        .route("/api/cart/:user_id/count", get(cart::item_count))
        .route("/api/addresses", get(addresses::list).post(addresses::add))
        .route("/api/addresses/:id", put(addresses::update).delete(addresses::remove))
        .route("/api/items", get(catalog::list).post(catalog::create))
        .route("/api/items/my-items", get(catalog::my_items))
        .route("/api/items/:id", get(catalog::get).put(catalog::update).delete(catalog::remove))
        .route("/api/categories", get(catalog::categories))
        .route("/api/orders", get(orders::list).post(orders::create))
        .route("/api/orders/:order_id", get(orders::get))
        .route("/api/orders/:order_id/cancel", patch(orders::cancel))
        .route("/api/payments/order", post(payments::create_order))
        .route("/api/payments/verify", post(payments::verify))
        .route("/api/create-razorpay-order", post(payments::create_order))
        .route("/api/verify-razorpay-payment", post(payments::verify))
        .route("/api/admin/orders", get(admin::list_orders))
        .route("/api/admin/orders/:order_id/status", patch(admin::update_status))
        .route("/api/admin/orders/:order_id/payment-status", patch(admin::update_payment_status))
        .route("/api/admin/orders/:order_id/invoice", get(admin::invoice))
        .route("/api/admin/items", get(admin::list_items).post(admin::create_item))
        .route("/api/admin/items/:id", put(admin::update_item).delete(admin::delete_item))
        .route("/api/admin/items/:id/status", patch(admin::set_item_availability))
        .with_state(state)
}

impl IntoResponse for MarketplaceError {
    fn into_response(self) -> Response {
        let status = match &self {
            MarketplaceError::InvalidArgument(_) | MarketplaceError::SignatureMismatch => StatusCode::BAD_REQUEST,
            MarketplaceError::NotFound(_) => StatusCode::NOT_FOUND,
            MarketplaceError::Forbidden(_) => StatusCode::FORBIDDEN,
            MarketplaceError::InvalidState(_) => StatusCode::CONFLICT,
            MarketplaceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = match &self {
            MarketplaceError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };
        (status, Json(json!({"success": false, "message": message}))).into_response()
    }
}

/// JSON body that has also passed its `validator` rules.
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = MarketplaceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| MarketplaceError::invalid(rejection.body_text()))?;
        value.validate().map_err(|e| MarketplaceError::invalid(first_message(&e)))?;
        Ok(Self(value))
    }
}

fn first_message(errors: &ValidationErrors) -> String {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by_key(|(name, _)| *name);
    fields
        .into_iter()
        .flat_map(|(name, errs)| errs.iter().map(move |e| (name, e)))
        .map(|(name, e)| e.message.as_ref().map_or_else(|| format!("Invalid {name}"), |m| m.to_string()))
        .next()
        .unwrap_or_else(|| "Invalid request".to_string())
}
