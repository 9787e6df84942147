//! Bearer-token verification.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use thiserror::Error;

use crate::claims::{JwtClaims, TokenValidationError, validate_claims};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed or unsigned token: {0}")]
    Malformed(String),

    #[error(transparent)]
    Claims(#[from] TokenValidationError),
}

/// Turns a raw bearer token into validated claims.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenError>;
}

/// HMAC-SHA256 shared-secret validator.
#[derive(Clone)]
pub struct Hs256JwtValidator {
    key: DecodingKey,
    validation: Validation,
}

impl Hs256JwtValidator {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Time-window checks are done by `validate_claims` against the caller's clock.
        validation.validate_exp = false;
        validation.required_spec_claims.clear();
        Self {
            key: DecodingKey::from_secret(secret),
            validation,
        }
    }
}

impl core::fmt::Debug for Hs256JwtValidator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Hs256JwtValidator").finish_non_exhaustive()
    }
}

impl JwtValidator for Hs256JwtValidator {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenError> {
        let data = decode::<JwtClaims>(token, &self.key, &self.validation)
            .map_err(|e| TokenError::Malformed(e.to_string()))?;
        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ActorRole;
    use bazaar_core::{UserId, VendorId};
    use jsonwebtoken::{EncodingKey, Header, encode};

    fn mint(secret: &[u8], claims: &JwtClaims) -> String {
        encode(&Header::new(Algorithm::HS256), claims, &EncodingKey::from_secret(secret)).unwrap()
    }

    fn vendor_claims(now: DateTime<Utc>) -> JwtClaims {
        JwtClaims {
            sub: UserId::new(),
            role: ActorRole::Vendor,
            vendor_id: Some(VendorId::new()),
            iat: now.timestamp() - 10,
            exp: now.timestamp() + 3600,
        }
    }

    #[test]
    fn verifies_signature_and_claims() {
        let now = Utc::now();
        let claims = vendor_claims(now);
        let token = mint(b"secret", &claims);
        let v = Hs256JwtValidator::new(b"secret");
        assert_eq!(v.validate(&token, now).unwrap(), claims);
    }

    #[test]
    fn wrong_secret_is_malformed() {
        let now = Utc::now();
        let token = mint(b"secret", &vendor_claims(now));
        let v = Hs256JwtValidator::new(b"other");
        assert!(matches!(v.validate(&token, now), Err(TokenError::Malformed(_))));
    }

    #[test]
    fn expiry_is_checked_against_the_given_clock() {
        let now = Utc::now();
        let token = mint(b"secret", &vendor_claims(now));
        let v = Hs256JwtValidator::new(b"secret");
        let later = now + chrono::Duration::hours(2);
        assert_eq!(
            v.validate(&token, later),
            Err(TokenError::Claims(TokenValidationError::Expired))
        );
    }
}
