use serde::{Deserialize, Serialize};

use bazaar_core::{UserId, VendorId};

use crate::ActorRole;

/// The authenticated user on whose behalf an operation runs.
///
/// Passed explicitly into every engine operation; there is no ambient
/// "current user".
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub role: ActorRole,
    /// Present iff `role == Vendor`.
    pub vendor_id: Option<VendorId>,
}

impl Actor {
    pub fn customer(user_id: UserId) -> Self {
        Self {
            user_id,
            role: ActorRole::Customer,
            vendor_id: None,
        }
    }

    pub fn vendor(user_id: UserId, vendor_id: VendorId) -> Self {
        Self {
            user_id,
            role: ActorRole::Vendor,
            vendor_id: Some(vendor_id),
        }
    }

    pub fn admin(user_id: UserId) -> Self {
        Self {
            user_id,
            role: ActorRole::Admin,
            vendor_id: None,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == ActorRole::Admin
    }

    pub fn is_customer(&self) -> bool {
        self.role == ActorRole::Customer
    }

    /// The vendor this actor acts for, if it is a vendor.
    pub fn acting_vendor(&self) -> Option<VendorId> {
        match self.role {
            ActorRole::Vendor => self.vendor_id,
            _ => None,
        }
    }
}
