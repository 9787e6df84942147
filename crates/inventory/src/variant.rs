use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use bazaar_core::{Money, ProductId, VariantId, VendorId};

pub const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 5;

/// The stock fields of a variant row.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantStock {
    pub stock: i64,
    pub low_stock_threshold: i64,
    /// Set once a low-stock signal has been emitted; cleared when stock
    /// rises back above the threshold.
    pub low_stock_notified: bool,
}

/// Result of re-evaluating the low-stock flag after a counter change.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LowStockSignal {
    /// Stock fell to or below the threshold and no signal had been emitted yet.
    Crossed,
    /// Stock is back above the threshold; the signal is armed again.
    Rearmed,
    Unchanged,
}

impl VariantStock {
    pub fn new(stock: i64, low_stock_threshold: i64) -> Self {
        Self {
            stock,
            low_stock_threshold,
            low_stock_notified: false,
        }
    }

    pub fn is_low(&self) -> bool {
        self.stock <= self.low_stock_threshold
    }

    /// Edge-triggered flag maintenance. Returns what changed.
    pub fn evaluate_low_stock(&mut self) -> LowStockSignal {
        match (self.is_low(), self.low_stock_notified) {
            (true, false) => {
                self.low_stock_notified = true;
                LowStockSignal::Crossed
            }
            (false, true) => {
                self.low_stock_notified = false;
                LowStockSignal::Rearmed
            }
            _ => LowStockSignal::Unchanged,
        }
    }
}

/// Catalog identity of a variant, as snapshotted onto order lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogVariant {
    pub variant_id: VariantId,
    pub product_id: ProductId,
    pub vendor_id: VendorId,
    pub product_name: String,
    pub variant_name: String,
    pub sku: String,
    pub price: Money,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// A full variant row: catalog identity plus stock state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantRow {
    pub catalog: CatalogVariant,
    pub stock: VariantStock,
}

impl VariantRow {
    pub fn variant_id(&self) -> VariantId {
        self.catalog.variant_id
    }
}
