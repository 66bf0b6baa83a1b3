//! Authentication domain types: roles, token claims, principals.

pub mod jwt;
pub mod middleware;
pub mod policy;
pub mod rate_limit;

use chrono::{DateTime, TimeZone, Utc};
use errors::EntregaError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Closed set of marketplace roles.
///
/// The legacy frontend sends Spanish aliases (`cliente`, `comercio`,
/// `repartidor`, `ceo`); they are normalized here at the boundary and
/// unknown values are rejected outright rather than passed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[serde(alias = "cliente")]
    Client,
    #[serde(alias = "comercio")]
    Merchant,
    #[serde(alias = "repartidor")]
    Courier,
    #[serde(alias = "ceo")]
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Merchant => "merchant",
            Role::Courier => "courier",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = EntregaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "client" | "cliente" => Ok(Role::Client),
            "merchant" | "comercio" => Ok(Role::Merchant),
            "courier" | "repartidor" => Ok(Role::Courier),
            "admin" | "ceo" => Ok(Role::Admin),
            other => Err(EntregaError::UnknownRole(other.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JWT claims embedded in every token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject — user id (UUID string)
    pub sub: String,
    /// Account email
    pub email: String,
    /// Marketplace role
    pub role: Role,
    /// Expiration (Unix timestamp)
    pub exp: usize,
    /// Issued-at (Unix timestamp)
    pub iat: usize,
    /// Unique token id
    pub jti: Uuid,
    /// Set on refresh tokens only
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub refresh: bool,
}

/// The authenticated identity extracted from a verified token.
///
/// Immutable for the token's lifetime; constructing one is only possible
/// through [`jwt::TokenCodec::verify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub issued_at: DateTime<Utc>,
}

impl TryFrom<Claims> for Principal {
    type Error = EntregaError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&claims.sub)
            .map_err(|_| EntregaError::InvalidToken("malformed subject".to_string()))?;
        let issued_at = Utc
            .timestamp_opt(claims.iat as i64, 0)
            .single()
            .ok_or_else(|| EntregaError::InvalidToken("malformed iat".to_string()))?;
        Ok(Principal {
            id,
            email: claims.email,
            role: claims.role,
            issued_at,
        })
    }
}
