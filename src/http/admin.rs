use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use super::catalog::{item_page, ItemParams};
use super::orders::{order_page, status_filter, OrderParams};
use super::{AppState, ValidatedJson};
use crate::auth::Identity;
use crate::domain::aggregates::{OrderStatus, PaymentStatus};
use crate::services::ItemRequest;
use crate::Result;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate { pub status: OrderStatus }

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusUpdate {
    #[serde(alias = "status")]
    pub payment_status: PaymentStatus,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityUpdate { pub is_available: bool }

pub async fn list_orders(State(s): State<AppState>, me: Identity, Query(p): Query<OrderParams>) -> Result<Json<Value>> {
    let status = status_filter(p.status.as_deref())?;
    let page = s.orders.admin_list_orders(&me, status, p.search, p.page, p.limit).await?;
    Ok(Json(json!({"success": true, "data": order_page(page)})))
}

pub async fn update_status(State(s): State<AppState>, me: Identity, Path(order_id): Path<String>, ValidatedJson(r): ValidatedJson<StatusUpdate>) -> Result<Json<Value>> {
    let order = s.orders.admin_update_status(&me, &order_id, r.status).await?;
    Ok(Json(json!({"success": true, "message": "Order status updated successfully", "order": order})))
}

pub async fn update_payment_status(State(s): State<AppState>, me: Identity, Path(order_id): Path<String>, ValidatedJson(r): ValidatedJson<PaymentStatusUpdate>) -> Result<Json<Value>> {
    let order = s.orders.admin_update_payment_status(&me, &order_id, r.payment_status).await?;
    Ok(Json(json!({"success": true, "message": "Payment status updated successfully", "order": order})))
}

pub async fn invoice(State(s): State<AppState>, me: Identity, Path(order_id): Path<String>) -> Result<Json<Value>> {
    let invoice = s.orders.invoice(&me, &order_id).await?;
    Ok(Json(json!({"success": true, "invoice": invoice})))
}

pub async fn set_item_availability(State(s): State<AppState>, me: Identity, Path(id): Path<String>, ValidatedJson(r): ValidatedJson<AvailabilityUpdate>) -> Result<Json<Value>> {
    let item = s.catalog.set_availability(&me, &id, r.is_available).await?;
    Ok(Json(json!({"success": true, "item": item})))
}

pub async fn list_items(State(s): State<AppState>, me: Identity, Query(p): Query<ItemParams>) -> Result<Json<Value>> {
    let page = s.catalog.admin_list(&me, p.category, p.search, p.page, p.limit).await?;
    Ok(Json(item_page(page)))
}

pub async fn create_item(State(s): State<AppState>, me: Identity, ValidatedJson(r): ValidatedJson<ItemRequest>) -> Result<(StatusCode, Json<Value>)> {
    let item = s.catalog.admin_create_item(&me, r).await?;
    Ok((StatusCode::CREATED, Json(json!({"success": true, "message": "Product added successfully by admin!", "item": item}))))
}

pub async fn update_item(State(s): State<AppState>, me: Identity, Path(id): Path<String>, ValidatedJson(r): ValidatedJson<ItemRequest>) -> Result<Json<Value>> {
    let item = s.catalog.admin_update_item(&me, &id, r).await?;
    Ok(Json(json!({"success": true, "message": "Product updated successfully!", "item": item})))
}

pub async fn delete_item(State(s): State<AppState>, me: Identity, Path(id): Path<String>) -> Result<Json<Value>> {
    s.catalog.admin_delete_item(&me, &id).await?;
    Ok(Json(json!({"success": true, "message": "Product deleted successfully!"})))
}
