use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use bazaar_core::{UserId, VendorId};

use crate::{Actor, ActorRole};

/// Bearer-token claims.
///
/// Timestamps are seconds since the Unix epoch, as registered JWT claims are.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject: the acting user.
    pub sub: UserId,

    pub role: ActorRole,

    /// Required for vendor tokens, ignored otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<VendorId>,

    /// Issued-at.
    pub iat: i64,

    /// Expiration.
    pub exp: i64,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (iat is in the future)")]
    NotYetValid,

    #[error("invalid token time window (exp <= iat)")]
    InvalidTimeWindow,

    #[error("vendor token without vendor_id")]
    MissingVendor,
}

/// Deterministically validate decoded claims against `now`.
pub fn validate_claims(claims: &JwtClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    let now = now.timestamp();
    if claims.exp <= claims.iat {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.iat {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.exp {
        return Err(TokenValidationError::Expired);
    }
    if claims.role == ActorRole::Vendor && claims.vendor_id.is_none() {
        return Err(TokenValidationError::MissingVendor);
    }
    Ok(())
}

impl JwtClaims {
    /// Project validated claims onto the engine's actor model.
    pub fn actor(&self) -> Actor {
        match (self.role, self.vendor_id) {
            (ActorRole::Vendor, Some(vendor_id)) => Actor::vendor(self.sub, vendor_id),
            (ActorRole::Admin, _) => Actor::admin(self.sub),
            // Vendor without vendor id is rejected by `validate_claims`; degrade
            // to the least-privileged shape if it ever gets here.
            (ActorRole::Vendor, None) | (ActorRole::Customer, _) => Actor::customer(self.sub),
        }
    }
}
