//! Inventory domain module: per-variant stock counters and their ledger.
//!
//! Pure, deterministic logic. Row locking and persistence are provided by the
//! caller through the [`StockRows`] seam; everything here runs inside the
//! caller's unit of work.

pub mod ledger;
pub mod replay;
pub mod rows;
pub mod stock_guard;
pub mod variant;

pub use ledger::{
    InventoryLedger, LedgerAction, LedgerEntry, LedgerError, LedgerOutcome, LedgerReason,
    StockChange, StockLine, StockMovement,
};
pub use replay::{ReplayMismatch, replay, verify_chain};
pub use rows::{StagedStock, StockRows};
pub use stock_guard::{InsufficientStock, StockGuard};
pub use variant::{
    CatalogVariant, DEFAULT_LOW_STOCK_THRESHOLD, LowStockSignal, VariantRow, VariantStock,
};
