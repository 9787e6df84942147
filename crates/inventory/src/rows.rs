//! The catalog-owned stock rows, as seen from inside a unit of work.

use std::collections::BTreeMap;

use bazaar_core::VariantId;

use crate::ledger::{LedgerError, StockChange};
use crate::variant::{VariantRow, VariantStock};

/// Read/write access to locked variant rows plus the pending ledger.
///
/// Implementations only ever expose rows the current unit of work holds a lock
/// on. A variant that is not visible reads as absent.
pub trait StockRows {
    fn read_variant_stock(&self, variant_id: VariantId) -> Option<VariantStock>;

    /// Apply `delta` to the counter and return the new stock.
    fn mutate_variant_stock(&mut self, variant_id: VariantId, delta: i64) -> Result<i64, LedgerError>;

    fn set_low_stock_notified(&mut self, variant_id: VariantId, notified: bool) -> Result<(), LedgerError>;

    /// Stage a ledger entry. It becomes durable only if the unit of work commits.
    fn append_entry(&mut self, change: StockChange);
}

/// Staged copies of variant rows and the ledger entries written against them.
///
/// Nothing here is visible to other units of work until the owner writes the
/// rows back; dropping a `StagedStock` discards every change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagedStock {
    rows: BTreeMap<VariantId, VariantRow>,
    entries: Vec<StockChange>,
}

impl StagedStock {
    pub fn new(rows: impl IntoIterator<Item = VariantRow>) -> Self {
        Self {
            rows: rows.into_iter().map(|r| (r.variant_id(), r)).collect(),
            entries: Vec::new(),
        }
    }

    pub fn row(&self, variant_id: VariantId) -> Option<&VariantRow> {
        self.rows.get(&variant_id)
    }

    pub fn rows(&self) -> impl Iterator<Item = &VariantRow> {
        self.rows.values()
    }

    pub fn entries(&self) -> &[StockChange] {
        &self.entries
    }

    /// Split into the final row states and the staged ledger entries.
    pub fn into_parts(self) -> (BTreeMap<VariantId, VariantRow>, Vec<StockChange>) {
        (self.rows, self.entries)
    }

    fn row_mut(&mut self, variant_id: VariantId) -> Result<&mut VariantRow, LedgerError> {
        self.rows
            .get_mut(&variant_id)
            .ok_or(LedgerError::UnknownVariant(variant_id))
    }
}

impl StockRows for StagedStock {
    fn read_variant_stock(&self, variant_id: VariantId) -> Option<VariantStock> {
        self.rows.get(&variant_id).map(|r| r.stock)
    }

    fn mutate_variant_stock(&mut self, variant_id: VariantId, delta: i64) -> Result<i64, LedgerError> {
        let row = self.row_mut(variant_id)?;
        let new_stock = row.stock.stock + delta;
        if new_stock < 0 {
            return Err(LedgerError::NegativeStock {
                variant_id,
                current: row.stock.stock,
                delta,
            });
        }
        row.stock.stock = new_stock;
        Ok(new_stock)
    }

    fn set_low_stock_notified(&mut self, variant_id: VariantId, notified: bool) -> Result<(), LedgerError> {
        self.row_mut(variant_id)?.stock.low_stock_notified = notified;
        Ok(())
    }

    fn append_entry(&mut self, change: StockChange) {
        self.entries.push(change);
    }
}
