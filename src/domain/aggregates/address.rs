//! Saved delivery addresses (the buyer's address book)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MAX_ADDRESSES_PER_USER: usize = 3;
pub const PINCODE_LEN: usize = 6;
pub const MIN_PHONE_LEN: usize = 10;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub id: Uuid,
    pub user_id: String,
    pub title: String,
    pub name: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub pincode: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Editable part of an address.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AddressFields {
    pub title: String,
    pub name: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub pincode: String,
}

impl AddressFields {
    pub fn validate(&self) -> Result<(), AddressError> {
        let required = [&self.title, &self.name, &self.phone, &self.address, &self.city, &self.state, &self.pincode];
        if required.iter().any(|f| f.trim().is_empty()) { return Err(AddressError::MissingFields); }
        if self.pincode.trim().chars().count() != PINCODE_LEN { return Err(AddressError::BadPincode); }
        if self.phone.trim().chars().count() < MIN_PHONE_LEN { return Err(AddressError::BadPhone); }
        Ok(())
    }
}

impl Address {
    pub fn new(user_id: impl Into<String>, fields: AddressFields, is_default: bool, now: DateTime<Utc>) -> Self {
        let AddressFields { title, name, phone, address, city, state, pincode } = fields;
        Self {
            id: Uuid::now_v7(), user_id: user_id.into(), title, name, phone, address, city, state, pincode,
            is_default, created_at: now, updated_at: now,
        }
    }

    pub fn apply(&mut self, fields: AddressFields, now: DateTime<Utc>) {
        let AddressFields { title, name, phone, address, city, state, pincode } = fields;
        self.title = title; self.name = name; self.phone = phone; self.address = address;
        self.city = city; self.state = state; self.pincode = pincode;
        self.updated_at = now;
    }
}

/// Orders an address book for display: default first, then newest.
pub fn sort_for_display(addresses: &mut [Address]) {
    addresses.sort_by(|a, b| b.is_default.cmp(&a.is_default).then(b.created_at.cmp(&a.created_at)));
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum AddressError { MissingFields, BadPincode, BadPhone, LimitReached }
impl std::error::Error for AddressError {}
impl std::fmt::Display for AddressError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingFields => write!(f, "All address fields are required"),
            Self::BadPincode => write!(f, "Pincode must be {PINCODE_LEN} digits"),
            Self::BadPhone => write!(f, "Phone number must be at least {MIN_PHONE_LEN} digits"),
            Self::LimitReached => write!(f, "Maximum {MAX_ADDRESSES_PER_USER} addresses allowed per user"),
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_fields() -> AddressFields {
    AddressFields {
        title: "Home".into(), name: "Asha".into(), phone: "9876543210".into(), address: "12 Market Road".into(),
        city: "Pune".into(), state: "MH".into(), pincode: "411001".into(),
    }
}
