use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use super::{AppState, ValidatedJson};
use crate::auth::Identity;
use crate::Result;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CartItemRequest {
    #[validate(length(min = 1, message = "User ID is required"))]
    pub user_id: String,
    #[validate(length(min = 1, message = "Product ID is required"))]
    pub product_id: String,
    #[serde(default)]
    pub quantity: Option<i64>,
}

pub async fn get_cart(State(s): State<AppState>, me: Identity, Path(user_id): Path<String>) -> Result<Json<Value>> {
    let view = s.cart.get_cart(&me, &user_id).await?;
    Ok(Json(json!({
        "success": true,
        "cartItems": view.cart_items,
        "totalItems": view.total_items,
        "totalPrice": view.total_price,
    })))
}

pub async fn item_count(State(s): State<AppState>, me: Identity, Path(user_id): Path<String>) -> Result<Json<Value>> {
    let count = s.cart.item_count(&me, &user_id).await?;
    Ok(Json(json!({"success": true, "count": count})))
}

pub async fn add_item(State(s): State<AppState>, me: Identity, ValidatedJson(r): ValidatedJson<CartItemRequest>) -> Result<Json<Value>> {
    let total = s.cart.add_item(&me, &r.user_id, &r.product_id, r.quantity).await?;
    Ok(Json(json!({"success": true, "message": "Item added to cart", "totalItems": total})))
}

pub async fn update_quantity(State(s): State<AppState>, me: Identity, ValidatedJson(r): ValidatedJson<CartItemRequest>) -> Result<Json<Value>> {
    // a missing quantity falls through to the "at least 1" rejection
    let total = s.cart.update_quantity(&me, &r.user_id, &r.product_id, r.quantity.unwrap_or(0)).await?;
    Ok(Json(json!({"success": true, "message": "Cart updated", "totalItems": total})))
}

pub async fn remove_item(State(s): State<AppState>, me: Identity, ValidatedJson(r): ValidatedJson<CartItemRequest>) -> Result<Json<Value>> {
    let total = s.cart.remove_item(&me, &r.user_id, &r.product_id).await?;
    Ok(Json(json!({"success": true, "message": "Item removed from cart", "totalItems": total})))
}

pub async fn clear_cart(State(s): State<AppState>, me: Identity, Path(user_id): Path<String>) -> Result<Json<Value>> {
    s.cart.clear_cart(&me, &user_id).await?;
    Ok(Json(json!({"success": true, "message": "Cart cleared"})))
}
