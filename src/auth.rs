//! Caller identity from bearer tokens.
//!
//! Tokens are HS256 JWTs minted by the account service; this crate only
//! verifies them and checks ownership of the resource being touched.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strum::{Display, EnumString};

use crate::{MarketplaceError, Result};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role { #[default] Buyer, Seller, Admin }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// The authenticated caller of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Role,
}

impl Identity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self { user_id: user_id.into(), name: None, email: None, role: Role::Buyer }
    }

    pub fn admin(user_id: impl Into<String>) -> Self {
        Self { role: Role::Admin, ..Self::new(user_id) }
    }

    /// Callers may only touch their own carts and orders.
    pub fn ensure_owner(&self, user_id: &str) -> Result<()> {
        if self.user_id != user_id {
            tracing::warn!(caller = %self.user_id, target_user = %user_id, "ownership check failed");
            return Err(MarketplaceError::forbidden("Access denied"));
        }
        Ok(())
    }

    pub fn ensure_admin(&self) -> Result<()> {
        if self.role != Role::Admin { return Err(MarketplaceError::forbidden("Admin access required")); }
        Ok(())
    }
}

impl From<Claims> for Identity {
    fn from(c: Claims) -> Self { Self { user_id: c.sub, name: c.name, email: c.email, role: c.role } }
}

pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for TokenKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str("TokenKeys { .. }") }
}

impl TokenKeys {
    pub fn from_secret(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn verify(&self, token: &str) -> Result<Identity> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims.into())
            .map_err(|e| {
                tracing::debug!(error = %e, "rejected bearer token");
                MarketplaceError::forbidden("Invalid token")
            })
    }

    /// Mints a token for `identity`; used by operator tooling and tests.
    pub fn issue(&self, identity: &Identity, ttl: Duration) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: identity.user_id.clone(), name: identity.name.clone(), email: identity.email.clone(),
            role: identity.role, iat: now.timestamp(), exp: (now + ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(|e| {
            tracing::error!(operation = "auth.issue", error = %e, "failed to sign token");
            MarketplaceError::Internal("auth.issue".into())
        })
    }
}

fn bearer(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    value.strip_prefix("Bearer ").map(str::trim).filter(|t| !t.is_empty())
}

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
    Arc<TokenKeys>: FromRef<S>,
{
    type Rejection = MarketplaceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> std::result::Result<Self, Self::Rejection> {
        let token = bearer(parts).ok_or_else(|| MarketplaceError::forbidden("Access token required"))?;
        Arc::<TokenKeys>::from_ref(state).verify(token)
    }
}
