use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use validator::Validate;

use super::OrInternal;
use crate::auth::Identity;
use crate::domain::aggregates::address::{sort_for_display, MAX_ADDRESSES_PER_USER};
use crate::domain::aggregates::{Address, AddressError, AddressFields};
use crate::store::{bounded, AddressRepository};
use crate::{MarketplaceError, Result};

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddressRequest {
    #[validate(length(min = 1, message = "All address fields are required"))]
    pub title: String,
    #[validate(length(min = 1, message = "All address fields are required"))]
    pub name: String,
    #[validate(length(min = 10, message = "Phone number must be at least 10 digits"))]
    pub phone: String,
    #[validate(length(min = 1, message = "All address fields are required"))]
    pub address: String,
    #[validate(length(min = 1, message = "All address fields are required"))]
    pub city: String,
    #[validate(length(min = 1, message = "All address fields are required"))]
    pub state: String,
    #[validate(length(equal = 6, message = "Pincode must be 6 digits"))]
    pub pincode: String,
    #[serde(default)]
    pub is_default: Option<bool>,
}

impl AddressRequest {
    fn fields(&self) -> AddressFields {
        let t = |s: &String| s.trim().to_string();
        AddressFields {
            title: t(&self.title), name: t(&self.name), phone: t(&self.phone), address: t(&self.address),
            city: t(&self.city), state: t(&self.state), pincode: t(&self.pincode),
        }
    }
}

/// The buyer's address book: at most three entries, exactly one default
/// whenever the book is non-empty.
#[derive(Clone)]
pub struct AddressService {
    addresses: Arc<dyn AddressRepository>,
    timeout: Duration,
}

impl AddressService {
    pub fn new(addresses: Arc<dyn AddressRepository>, timeout: Duration) -> Self { Self { addresses, timeout } }

    async fn load(&self, user_id: &str, operation: &'static str) -> Result<Vec<Address>> {
        bounded(self.timeout, self.addresses.list(user_id)).await.or_internal(operation, user_id)
    }

    async fn store(&self, address: &Address, operation: &'static str) -> Result<()> {
        bounded(self.timeout, self.addresses.save(address)).await.or_internal(operation, &address.user_id)
    }

    /// Clears the default flag on every address except `keep`.
    async fn demote_others(&self, book: &[Address], keep: Uuid, operation: &'static str) -> Result<()> {
        let now = Utc::now();
        for other in book.iter().filter(|a| a.is_default && a.id != keep) {
            let mut other = other.clone();
            other.is_default = false;
            other.updated_at = now;
            self.store(&other, operation).await?;
        }
        Ok(())
    }

    pub async fn list(&self, caller: &Identity) -> Result<Vec<Address>> {
        let mut book = self.load(&caller.user_id, "addresses.list").await?;
        sort_for_display(&mut book);
        Ok(book)
    }

    pub async fn add(&self, caller: &Identity, request: AddressRequest) -> Result<Address> {
        let fields = request.fields();
        fields.validate()?;
        let book = self.load(&caller.user_id, "addresses.add").await?;
        if book.len() >= MAX_ADDRESSES_PER_USER { return Err(AddressError::LimitReached.into()); }

        let is_default = book.is_empty() || request.is_default.unwrap_or(false);
        let address = Address::new(caller.user_id.as_str(), fields, is_default, Utc::now());
        if is_default {
            self.demote_others(&book, address.id, "addresses.add").await?;
        }
        self.store(&address, "addresses.add").await?;
        tracing::debug!(user_id = %caller.user_id, address_id = %address.id, is_default, "address added");
        Ok(address)
    }

    pub async fn update(&self, caller: &Identity, id: Uuid, request: AddressRequest) -> Result<Address> {
        let fields = request.fields();
        fields.validate()?;
        let book = self.load(&caller.user_id, "addresses.update").await?;
        let mut address = book.iter().find(|a| a.id == id).cloned().ok_or_else(not_found)?;

        address.apply(fields, Utc::now());
        if request.is_default == Some(true) && !address.is_default {
            address.is_default = true;
            self.demote_others(&book, id, "addresses.update").await?;
        }
        self.store(&address, "addresses.update").await?;
        Ok(address)
    }

    /// Deleting the default promotes the oldest remaining address.
    pub async fn delete(&self, caller: &Identity, id: Uuid) -> Result<()> {
        let removed = bounded(self.timeout, self.addresses.delete(&caller.user_id, id))
            .await
            .or_internal("addresses.delete", &caller.user_id)?
            .ok_or_else(not_found)?;
        if removed.is_default {
            let book = self.load(&caller.user_id, "addresses.delete").await?;
            if let Some(oldest) = book.into_iter().next() {
                let mut promoted = oldest;
                promoted.is_default = true;
                promoted.updated_at = Utc::now();
                self.store(&promoted, "addresses.delete").await?;
                tracing::debug!(user_id = %caller.user_id, address_id = %promoted.id, "default address promoted");
            }
        }
        Ok(())
    }
}

fn not_found() -> MarketplaceError { MarketplaceError::not_found("Address not found") }
