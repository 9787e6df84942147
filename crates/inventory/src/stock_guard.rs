//! Oversell prevention.

use serde::{Deserialize, Serialize};

use bazaar_core::VariantId;

use crate::ledger::StockLine;
use crate::rows::StockRows;

/// One line that cannot be satisfied.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsufficientStock {
    pub variant_id: VariantId,
    pub requested: u64,
    pub available: i64,
}

/// The single chokepoint every deduction passes through first.
#[derive(Debug, Default, Clone, Copy)]
pub struct StockGuard;

impl StockGuard {
    /// Check every requested quantity against current stock.
    ///
    /// Quantities for the same variant are summed across lines. All shortfalls
    /// are reported, in the order their variants first appear. Variants the
    /// unit of work cannot see count as having no stock. Lines without a
    /// variant are not tracked and always pass.
    pub fn validate<R: StockRows + ?Sized>(rows: &R, lines: &[StockLine]) -> Result<(), Vec<InsufficientStock>> {
        let mut requested: Vec<(VariantId, u64)> = Vec::new();
        for line in lines {
            let Some(variant_id) = line.variant_id else {
                continue;
            };
            match requested.iter_mut().find(|(v, _)| *v == variant_id) {
                Some((_, q)) => *q += u64::from(line.quantity),
                None => requested.push((variant_id, u64::from(line.quantity))),
            }
        }

        let shortfalls: Vec<InsufficientStock> = requested
            .into_iter()
            .filter_map(|(variant_id, requested)| {
                let available = rows.read_variant_stock(variant_id).map(|s| s.stock).unwrap_or(0);
                let enough = u64::try_from(available).is_ok_and(|a| a >= requested);
                (!enough).then_some(InsufficientStock {
                    variant_id,
                    requested,
                    available,
                })
            })
            .collect();

        if shortfalls.is_empty() {
            Ok(())
        } else {
            tracing::warn!(count = shortfalls.len(), "stock check rejected");
            Err(shortfalls)
        }
    }
}
