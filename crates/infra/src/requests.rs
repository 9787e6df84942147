//! Inputs and results of the engine operations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use bazaar_core::{Money, OrderItemId, ProductId, VariantId, VendorId};
use bazaar_inventory::{CatalogVariant, LedgerReason};
use bazaar_orders::{CustomerContact, FulfillmentStatus, OrderAmounts, OrderStatus, OrderView};

/// One requested line. For variant lines the catalog is authoritative for
/// names, SKU and price; the submitted values are only used for lines
/// without a variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineRequest {
    pub product_id: ProductId,
    #[serde(default)]
    pub variant_id: Option<VariantId>,
    pub vendor_id: VendorId,
    pub product_name: String,
    #[serde(default)]
    pub variant_name: Option<String>,
    pub sku: String,
    pub unit_price: Money,
    pub quantity: u32,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub items: Vec<OrderLineRequest>,
    pub contact: CustomerContact,
    pub amounts: OrderAmounts,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub shipping_method: Option<String>,
    #[serde(default)]
    pub customer_notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub tracking_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FulfillmentUpdate {
    pub status: FulfillmentStatus,
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Outcome reported by the external payment collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentResult {
    pub captured: bool,
    #[serde(default)]
    pub transaction_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjustment {
    pub delta: i64,
    pub reason: LedgerReason,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjusted {
    pub variant_id: VariantId,
    pub previous_stock: i64,
    pub new_stock: i64,
    pub low_stock: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorCancellation {
    pub order: OrderView,
    pub cancelled_items: Vec<OrderItemId>,
    /// Variants whose stock was given back. Empty while the order is pending.
    pub restored_variant_ids: Vec<VariantId>,
    /// The whole order was cancelled because no live line remained.
    pub rolled_up: bool,
}

/// A catalog variant to register, with its opening stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantSeed {
    #[serde(flatten)]
    pub catalog: CatalogVariant,
    #[serde(default)]
    pub initial_stock: i64,
    #[serde(default)]
    pub low_stock_threshold: Option<i64>,
}

/// A variant whose counter disagrees with its ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockDrift {
    pub variant_id: VariantId,
    pub counter: i64,
    pub ledger: i64,
}
