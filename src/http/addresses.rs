use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use super::{AppState, ValidatedJson};
use crate::auth::Identity;
use crate::services::addresses::AddressRequest;
use crate::{MarketplaceError, Result};

/// Path ids are parsed here so a malformed one gets the usual error envelope.
fn address_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_| MarketplaceError::invalid("Invalid address id"))
}

pub async fn list(State(s): State<AppState>, me: Identity) -> Result<Json<Value>> {
    let addresses = s.addresses.list(&me).await?;
    Ok(Json(json!({"success": true, "addresses": addresses})))
}

pub async fn add(State(s): State<AppState>, me: Identity, ValidatedJson(r): ValidatedJson<AddressRequest>) -> Result<(StatusCode, Json<Value>)> {
    let address = s.addresses.add(&me, r).await?;
    Ok((StatusCode::CREATED, Json(json!({"success": true, "message": "Address added successfully", "address": address}))))
}

pub async fn update(State(s): State<AppState>, me: Identity, Path(id): Path<String>, ValidatedJson(r): ValidatedJson<AddressRequest>) -> Result<Json<Value>> {
    let address = s.addresses.update(&me, address_id(&id)?, r).await?;
    Ok(Json(json!({"success": true, "message": "Address updated successfully", "address": address})))
}

pub async fn remove(State(s): State<AppState>, me: Identity, Path(id): Path<String>) -> Result<Json<Value>> {
    s.addresses.delete(&me, address_id(&id)?).await?;
    Ok(Json(json!({"success": true, "message": "Address deleted successfully"})))
}
