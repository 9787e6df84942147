//! Ledger replay: rebuild counters from entries.

use std::collections::{BTreeMap, HashMap};

use thiserror::Error;

use bazaar_core::VariantId;

use crate::ledger::LedgerEntry;

/// Sum of deltas per variant, applied in sequence order from zero.
pub fn replay(entries: &[LedgerEntry]) -> BTreeMap<VariantId, i64> {
    let mut ordered: Vec<&LedgerEntry> = entries.iter().collect();
    ordered.sort_by_key(|e| e.sequence);

    let mut stock = BTreeMap::new();
    for e in ordered {
        *stock.entry(e.variant_id).or_insert(0) += e.delta;
    }
    stock
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReplayMismatch {
    #[error("entry {sequence}: new_stock {new_stock} != previous_stock {previous_stock} + delta {delta}")]
    Arithmetic {
        sequence: u64,
        previous_stock: i64,
        delta: i64,
        new_stock: i64,
    },

    #[error("entry {sequence} for variant {variant_id}: previous_stock {found} does not continue from {expected}")]
    Gap {
        sequence: u64,
        variant_id: VariantId,
        expected: i64,
        found: i64,
    },
}

/// Check that every entry is internally consistent and that, per variant, each
/// entry starts where the previous one ended (the first one from zero).
pub fn verify_chain(entries: &[LedgerEntry]) -> Result<(), ReplayMismatch> {
    let mut ordered: Vec<&LedgerEntry> = entries.iter().collect();
    ordered.sort_by_key(|e| e.sequence);

    let mut last: HashMap<VariantId, i64> = HashMap::new();
    for e in ordered {
        if e.previous_stock + e.delta != e.new_stock {
            return Err(ReplayMismatch::Arithmetic {
                sequence: e.sequence,
                previous_stock: e.previous_stock,
                delta: e.delta,
                new_stock: e.new_stock,
            });
        }
        let expected = last.get(&e.variant_id).copied().unwrap_or(0);
        if e.previous_stock != expected {
            return Err(ReplayMismatch::Gap {
                sequence: e.sequence,
                variant_id: e.variant_id,
                expected,
                found: e.previous_stock,
            });
        }
        last.insert(e.variant_id, e.new_stock);
    }
    Ok(())
}
