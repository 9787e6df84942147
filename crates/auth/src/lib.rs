//! `bazaar-auth`: acting-user identity and bearer-token verification.
//!
//! This crate is decoupled from HTTP and storage. It never issues tokens; it
//! only turns a verified token into an [`Actor`] the order engine can reason about.

pub mod actor;
pub mod authorize;
pub mod claims;
pub mod roles;
pub mod token;

pub use actor::Actor;
pub use authorize::{AuthzError, require_admin, require_vendor};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use roles::ActorRole;
pub use token::{Hs256JwtValidator, JwtValidator, TokenError};
