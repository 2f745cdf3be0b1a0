use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::str::FromStr;

use super::{AppState, ValidatedJson};
use crate::auth::Identity;
use crate::domain::aggregates::{Order, OrderStatus};
use crate::services::CheckoutRequest;
use crate::store::Page;
use crate::{MarketplaceError, Result};

#[derive(Debug, Default, Deserialize)]
pub struct OrderParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<String>,
    pub search: Option<String>,
}

/// `all` and blank mean no filter.
pub(super) fn status_filter(raw: Option<&str>) -> Result<Option<OrderStatus>> {
    match raw.map(str::trim) {
        None | Some("") | Some("all") => Ok(None),
        Some(s) => OrderStatus::from_str(s).map(Some).map_err(|_| MarketplaceError::invalid(format!("Unknown order status: {s}"))),
    }
}

pub(super) fn order_page(page: Page<Order>) -> Value {
    json!({
        "orders": page.data,
        "totalPages": page.total_pages,
        "currentPage": page.page,
        "totalOrders": page.total,
    })
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

pub async fn create(State(s): State<AppState>, me: Identity, ValidatedJson(r): ValidatedJson<CheckoutRequest>) -> Result<(StatusCode, Json<Value>)> {
    let order = s.orders.create_order(&me, r).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Order placed successfully!",
            "order_id": order.order_id(),
            "order": {
                "id": order.id(),
                "orderId": order.order_id(),
                "totalAmount": order.total_amount(),
                "paymentStatus": order.payment_status(),
                "orderStatus": order.order_status(),
                "estimatedDelivery": order.estimated_delivery(),
                "specialRequests": order.special_requests(),
                "createdAt": order.created_at(),
            },
        })),
    ))
}

pub async fn list(State(s): State<AppState>, me: Identity, Query(p): Query<OrderParams>) -> Result<Json<Value>> {
    let status = status_filter(p.status.as_deref())?;
    let page = s.orders.list_orders(&me, status, p.page, p.limit).await?;
    let mut body = order_page(page);
    body["success"] = json!(true);
    Ok(Json(body))
}

pub async fn get(State(s): State<AppState>, me: Identity, Path(order_id): Path<String>) -> Result<Json<Value>> {
    let order = s.orders.get_order(&me, &order_id).await?;
    Ok(Json(json!({"success": true, "order": order})))
}

pub async fn cancel(State(s): State<AppState>, me: Identity, Path(order_id): Path<String>, body: Option<Json<CancelRequest>>) -> Result<Json<Value>> {
    let reason = body.and_then(|Json(b)| b.reason);
    let order = s.orders.cancel_order(&me, &order_id, reason).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Order cancelled successfully",
        "order": {
            "orderId": order.order_id(),
            "orderStatus": order.order_status(),
            "paymentStatus": order.payment_status(),
            "cancelledAt": order.cancelled_at(),
        },
    })))
}
