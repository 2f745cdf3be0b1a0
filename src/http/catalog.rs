use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{AppState, ValidatedJson};
use crate::auth::Identity;
use crate::domain::aggregates::Product;
use crate::services::ItemRequest;
use crate::store::Page;
use crate::Result;

#[derive(Debug, Default, Deserialize)]
pub struct ItemParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub category: Option<String>,
    pub search: Option<String>,
}

pub(super) fn item_page(page: Page<Product>) -> Value {
    json!({
        "success": true,
        "items": page.data,
        "totalPages": page.total_pages,
        "currentPage": page.page,
        "totalItems": page.total,
    })
}

pub async fn list(State(s): State<AppState>, Query(p): Query<ItemParams>) -> Result<Json<Value>> {
    let page = s.catalog.list(p.category, p.search, p.page, p.limit).await?;
    Ok(Json(item_page(page)))
}

pub async fn get(State(s): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>> {
    let item = s.catalog.get(&id).await?;
    Ok(Json(json!({"success": true, "item": item})))
}

pub async fn categories(State(s): State<AppState>) -> Result<Json<Value>> {
    let categories = s.catalog.categories().await?;
    Ok(Json(json!({"success": true, "categories": categories})))
}

pub async fn create(State(s): State<AppState>, me: Identity, ValidatedJson(r): ValidatedJson<ItemRequest>) -> Result<(StatusCode, Json<Value>)> {
    let item = s.catalog.create_item(&me, r).await?;
    Ok((StatusCode::CREATED, Json(json!({"success": true, "message": "Item added successfully!", "item": item}))))
}

pub async fn my_items(State(s): State<AppState>, me: Identity, Query(p): Query<ItemParams>) -> Result<Json<Value>> {
    let page = s.catalog.seller_items(&me, p.page, p.limit).await?;
    Ok(Json(item_page(page)))
}

pub async fn update(State(s): State<AppState>, me: Identity, Path(id): Path<String>, ValidatedJson(r): ValidatedJson<ItemRequest>) -> Result<Json<Value>> {
    let item = s.catalog.update_item(&me, &id, r).await?;
    Ok(Json(json!({"success": true, "message": "Item updated successfully!", "item": item})))
}

pub async fn remove(State(s): State<AppState>, me: Identity, Path(id): Path<String>) -> Result<Json<Value>> {
    s.catalog.delete_item(&me, &id).await?;
    Ok(Json(json!({"success": true, "message": "Item deleted successfully!"})))
}
