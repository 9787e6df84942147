use serde::Deserialize;

use bazaar_core::VendorId;
use bazaar_infra::FulfillmentUpdate;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Default, Deserialize)]
pub struct NotesRequest {
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

/// Vendors act for themselves; admins name the vendor.
#[derive(Debug, Default, Deserialize)]
pub struct VendorCancelRequest {
    #[serde(default)]
    pub vendor_id: Option<VendorId>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FulfillmentRequest {
    #[serde(default)]
    pub vendor_id: Option<VendorId>,
    #[serde(flatten)]
    pub update: FulfillmentUpdate,
}
