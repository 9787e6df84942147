use thiserror::Error;

use bazaar_core::VendorId;

use crate::{Actor, ActorRole};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: requires role '{0}'")]
    Forbidden(ActorRole),

    #[error("vendor actor without a vendor id")]
    MissingVendor,
}

/// Only administrators pass.
pub fn require_admin(actor: &Actor) -> Result<(), AuthzError> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(ActorRole::Admin))
    }
}

/// Resolve the vendor scope of a vendor-side operation.
///
/// Vendors act for their own vendor id. Administrators may act on behalf of any
/// vendor, but must name it explicitly.
pub fn require_vendor(actor: &Actor, on_behalf_of: Option<VendorId>) -> Result<VendorId, AuthzError> {
    match actor.role {
        ActorRole::Vendor => actor.vendor_id.ok_or(AuthzError::MissingVendor),
        ActorRole::Admin => on_behalf_of.ok_or(AuthzError::MissingVendor),
        ActorRole::Customer => Err(AuthzError::Forbidden(ActorRole::Vendor)),
    }
}
