//! Append-only stock ledger.
//!
//! Every counter change is paired with exactly one ledger entry, written in the
//! same unit of work. Replaying a variant's entries from zero in sequence order
//! reproduces its current stock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use bazaar_core::{AggregateId, ProductId, VariantId};

use crate::rows::StockRows;
use crate::variant::LowStockSignal;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerAction {
    Deduct,
    Restore,
    Adjust,
    Return,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerReason {
    OrderConfirmation,
    OrderCancellation,
    ManualAdjustment,
    Return,
    Damage,
    InitialStock,
}

/// Order-driven stock movements.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockMovement {
    /// Stock leaves the shelf when an order is confirmed.
    Deduct,
    /// Stock comes back when a confirmed order (or some of its lines) is cancelled.
    Restore,
    /// Stock comes back when a confirmed order is refunded.
    Return,
}

impl StockMovement {
    fn action(self) -> LedgerAction {
        match self {
            StockMovement::Deduct => LedgerAction::Deduct,
            StockMovement::Restore => LedgerAction::Restore,
            StockMovement::Return => LedgerAction::Return,
        }
    }

    fn reason(self) -> LedgerReason {
        match self {
            StockMovement::Deduct => LedgerReason::OrderConfirmation,
            StockMovement::Restore => LedgerReason::OrderCancellation,
            StockMovement::Return => LedgerReason::Return,
        }
    }

    fn signed(self, quantity: u32) -> i64 {
        match self {
            StockMovement::Deduct => -i64::from(quantity),
            StockMovement::Restore | StockMovement::Return => i64::from(quantity),
        }
    }
}

/// One quantity request against a product line.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLine {
    pub product_id: ProductId,
    /// `None` for products sold without variants; such lines carry no counter.
    pub variant_id: Option<VariantId>,
    pub quantity: u32,
}

/// A ledger entry that has been staged but not yet committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockChange {
    pub variant_id: VariantId,
    pub product_id: ProductId,
    pub order_id: Option<AggregateId>,
    pub delta: i64,
    pub action: LedgerAction,
    pub reason: LedgerReason,
    pub notes: Option<String>,
    pub previous_stock: i64,
    pub new_stock: i64,
}

impl StockChange {
    pub fn commit(self, sequence: u64, recorded_at: DateTime<Utc>) -> LedgerEntry {
        LedgerEntry {
            sequence,
            recorded_at,
            variant_id: self.variant_id,
            product_id: self.product_id,
            order_id: self.order_id,
            delta: self.delta,
            action: self.action,
            reason: self.reason,
            notes: self.notes,
            previous_stock: self.previous_stock,
            new_stock: self.new_stock,
        }
    }
}

/// A committed, immutable ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Global commit order.
    pub sequence: u64,
    pub recorded_at: DateTime<Utc>,
    pub variant_id: VariantId,
    pub product_id: ProductId,
    pub order_id: Option<AggregateId>,
    pub delta: i64,
    pub action: LedgerAction,
    pub reason: LedgerReason,
    pub notes: Option<String>,
    pub previous_stock: i64,
    pub new_stock: i64,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("variant {0} is not locked by this unit of work")]
    UnknownVariant(VariantId),

    #[error("stock for variant {variant_id} would go negative ({current} {delta:+})")]
    NegativeStock {
        variant_id: VariantId,
        current: i64,
        delta: i64,
    },

    #[error("adjustment delta cannot be zero")]
    ZeroDelta,

    #[error("reason {0:?} is not valid for a manual adjustment")]
    InvalidReason(LedgerReason),
}

/// What one ledger application did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerOutcome {
    pub changes: Vec<StockChange>,
    /// Variants that fell to or below their threshold for the first time.
    pub low_stock_crossed: Vec<VariantId>,
    /// Variants whose low-stock signal was re-armed.
    pub rearmed: Vec<VariantId>,
    /// Products whose lines have no variant and so no counter.
    pub untracked: Vec<ProductId>,
}

impl LedgerOutcome {
    pub fn touched_variants(&self) -> impl Iterator<Item = VariantId> + '_ {
        self.changes.iter().map(|c| c.variant_id)
    }
}

/// Stateless ledger operations over a unit of work's [`StockRows`].
#[derive(Debug, Default, Clone, Copy)]
pub struct InventoryLedger;

impl InventoryLedger {
    /// Apply an order-driven movement for every line.
    ///
    /// One entry is staged per tracked line. On error, the caller must discard
    /// the unit of work; earlier lines may already have been staged.
    pub fn apply<R: StockRows + ?Sized>(
        rows: &mut R,
        order_id: Option<AggregateId>,
        lines: &[StockLine],
        movement: StockMovement,
    ) -> Result<LedgerOutcome, LedgerError> {
        let mut outcome = LedgerOutcome::default();

        for line in lines {
            let Some(variant_id) = line.variant_id else {
                tracing::debug!(product_id = %line.product_id, "line has no variant, stock untracked");
                outcome.untracked.push(line.product_id);
                continue;
            };
            if line.quantity == 0 {
                continue;
            }

            let change = Self::record(
                rows,
                variant_id,
                line.product_id,
                order_id,
                movement.signed(line.quantity),
                movement.action(),
                movement.reason(),
                None,
            )?;
            Self::track_signal(rows, variant_id, &mut outcome)?;
            outcome.changes.push(change);
        }

        Ok(outcome)
    }

    /// Manual signed adjustment (restock, shrinkage, customer return).
    pub fn adjust<R: StockRows + ?Sized>(
        rows: &mut R,
        variant_id: VariantId,
        product_id: ProductId,
        delta: i64,
        reason: LedgerReason,
        notes: Option<String>,
    ) -> Result<LedgerOutcome, LedgerError> {
        if delta == 0 {
            return Err(LedgerError::ZeroDelta);
        }
        let action = match reason {
            LedgerReason::OrderCancellation | LedgerReason::OrderConfirmation => {
                return Err(LedgerError::InvalidReason(reason));
            }
            LedgerReason::Return => LedgerAction::Return,
            LedgerReason::ManualAdjustment | LedgerReason::Damage | LedgerReason::InitialStock => {
                LedgerAction::Adjust
            }
        };

        let mut outcome = LedgerOutcome::default();
        let change = Self::record(rows, variant_id, product_id, None, delta, action, reason, notes)?;
        Self::track_signal(rows, variant_id, &mut outcome)?;
        outcome.changes.push(change);
        Ok(outcome)
    }

    #[allow(clippy::too_many_arguments)]
    fn record<R: StockRows + ?Sized>(
        rows: &mut R,
        variant_id: VariantId,
        product_id: ProductId,
        order_id: Option<AggregateId>,
        delta: i64,
        action: LedgerAction,
        reason: LedgerReason,
        notes: Option<String>,
    ) -> Result<StockChange, LedgerError> {
        let previous_stock = rows
            .read_variant_stock(variant_id)
            .ok_or(LedgerError::UnknownVariant(variant_id))?
            .stock;
        let new_stock = rows.mutate_variant_stock(variant_id, delta)?;

        let change = StockChange {
            variant_id,
            product_id,
            order_id,
            delta,
            action,
            reason,
            notes,
            previous_stock,
            new_stock,
        };
        rows.append_entry(change.clone());
        Ok(change)
    }

    fn track_signal<R: StockRows + ?Sized>(
        rows: &mut R,
        variant_id: VariantId,
        outcome: &mut LedgerOutcome,
    ) -> Result<(), LedgerError> {
        let mut stock = rows
            .read_variant_stock(variant_id)
            .ok_or(LedgerError::UnknownVariant(variant_id))?;
        match stock.evaluate_low_stock() {
            LowStockSignal::Crossed => {
                rows.set_low_stock_notified(variant_id, true)?;
                outcome.low_stock_crossed.push(variant_id);
            }
            LowStockSignal::Rearmed => {
                rows.set_low_stock_notified(variant_id, false)?;
                outcome.rearmed.push(variant_id);
            }
            LowStockSignal::Unchanged => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::replay;
    use crate::rows::StagedStock;
    use crate::variant::{CatalogVariant, VariantRow, VariantStock};
    use bazaar_core::{Money, VendorId};
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn test_row(stock: i64, threshold: i64) -> VariantRow {
        VariantRow {
            catalog: CatalogVariant {
                variant_id: VariantId::new(),
                product_id: ProductId::new(),
                vendor_id: VendorId::new(),
                product_name: "Tee".to_string(),
                variant_name: "Large".to_string(),
                sku: "TEE-L".to_string(),
                price: Money::from_minor(1500),
                attributes: BTreeMap::new(),
                is_active: true,
            },
            stock: VariantStock::new(stock, threshold),
        }
    }

    fn line(row: &VariantRow, quantity: u32) -> StockLine {
        StockLine {
            product_id: row.catalog.product_id,
            variant_id: Some(row.variant_id()),
            quantity,
        }
    }

    #[test]
    fn deduct_records_previous_and_new_stock() {
        let row = test_row(10, 2);
        let mut staged = StagedStock::new([row.clone()]);
        let order = AggregateId::new();

        let out = InventoryLedger::apply(&mut staged, Some(order), &[line(&row, 3)], StockMovement::Deduct).unwrap();

        assert_eq!(out.changes.len(), 1);
        let c = &out.changes[0];
        assert_eq!((c.previous_stock, c.delta, c.new_stock), (10, -3, 7));
        assert_eq!(c.action, LedgerAction::Deduct);
        assert_eq!(c.reason, LedgerReason::OrderConfirmation);
        assert_eq!(c.order_id, Some(order));
        assert_eq!(staged.entries().len(), 1);
        assert_eq!(staged.read_variant_stock(row.variant_id()).unwrap().stock, 7);
    }

    #[test]
    fn deduct_signals_low_stock_once_then_restore_rearms() {
        let row = test_row(7, 5);
        let mut staged = StagedStock::new([row.clone()]);

        let first = InventoryLedger::apply(&mut staged, None, &[line(&row, 2)], StockMovement::Deduct).unwrap();
        assert_eq!(first.low_stock_crossed, vec![row.variant_id()]);

        let second = InventoryLedger::apply(&mut staged, None, &[line(&row, 1)], StockMovement::Deduct).unwrap();
        assert!(second.low_stock_crossed.is_empty());

        let restored = InventoryLedger::apply(&mut staged, None, &[line(&row, 3)], StockMovement::Restore).unwrap();
        assert_eq!(restored.rearmed, vec![row.variant_id()]);
        assert!(!staged.read_variant_stock(row.variant_id()).unwrap().low_stock_notified);
    }

    #[test]
    fn deduct_below_zero_is_refused() {
        let row = test_row(1, 0);
        let mut staged = StagedStock::new([row.clone()]);
        let err = InventoryLedger::apply(&mut staged, None, &[line(&row, 2)], StockMovement::Deduct).unwrap_err();
        match err {
            LedgerError::NegativeStock { current, delta, .. } => assert_eq!((current, delta), (1, -2)),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(staged.read_variant_stock(row.variant_id()).unwrap().stock, 1);
        assert!(staged.entries().is_empty());
    }

    #[test]
    fn variantless_lines_are_reported_not_mutated() {
        let product_id = ProductId::new();
        let mut staged = StagedStock::default();
        let lines = [StockLine { product_id, variant_id: None, quantity: 4 }];
        let out = InventoryLedger::apply(&mut staged, None, &lines, StockMovement::Deduct).unwrap();
        assert!(out.changes.is_empty());
        assert_eq!(out.untracked, vec![product_id]);
    }

    #[test]
    fn refund_returns_stock_as_return_action() {
        let row = test_row(4, 1);
        let mut staged = StagedStock::new([row.clone()]);
        let out = InventoryLedger::apply(&mut staged, None, &[line(&row, 2)], StockMovement::Return).unwrap();
        assert_eq!(out.changes[0].action, LedgerAction::Return);
        assert_eq!(out.changes[0].reason, LedgerReason::Return);
        assert_eq!(out.changes[0].new_stock, 6);
    }

    #[test]
    fn manual_adjustments_validate_reason_and_delta() {
        let row = test_row(4, 1);
        let mut staged = StagedStock::new([row.clone()]);
        let (v, p) = (row.variant_id(), row.catalog.product_id);

        assert_eq!(
            InventoryLedger::adjust(&mut staged, v, p, 0, LedgerReason::ManualAdjustment, None),
            Err(LedgerError::ZeroDelta)
        );
        assert_eq!(
            InventoryLedger::adjust(&mut staged, v, p, 3, LedgerReason::OrderCancellation, None),
            Err(LedgerError::InvalidReason(LedgerReason::OrderCancellation))
        );

        let out = InventoryLedger::adjust(&mut staged, v, p, -2, LedgerReason::Damage, Some("dropped".into())).unwrap();
        assert_eq!(out.changes[0].action, LedgerAction::Adjust);
        assert_eq!(out.changes[0].notes.as_deref(), Some("dropped"));
        assert_eq!(staged.read_variant_stock(v).unwrap().stock, 2);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Deduct(u32),
        Restore(u32),
        Adjust(i64),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (1u32..20).prop_map(Op::Deduct),
            (1u32..20).prop_map(Op::Restore),
            (-20i64..20).prop_map(Op::Adjust),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 256, .. ProptestConfig::default() })]

        #[test]
        fn replaying_the_ledger_reproduces_stock(initial in 0i64..50, ops in prop::collection::vec(op_strategy(), 0..40)) {
            let row = test_row(0, 5);
            let (v, p) = (row.variant_id(), row.catalog.product_id);
            let mut staged = StagedStock::new([row.clone()]);

            if initial > 0 {
                InventoryLedger::adjust(&mut staged, v, p, initial, LedgerReason::InitialStock, None).unwrap();
            }

            for op in ops {
                // Rejected operations must leave no trace; ignore them here.
                let _ = match op {
                    Op::Deduct(q) => InventoryLedger::apply(&mut staged, None, &[line(&row, q)], StockMovement::Deduct).map(|_| ()),
                    Op::Restore(q) => InventoryLedger::apply(&mut staged, None, &[line(&row, q)], StockMovement::Restore).map(|_| ()),
                    Op::Adjust(d) => InventoryLedger::adjust(&mut staged, v, p, d, LedgerReason::ManualAdjustment, None).map(|_| ()),
                };
            }

            let now = Utc::now();
            let committed: Vec<LedgerEntry> = staged
                .entries()
                .iter()
                .cloned()
                .enumerate()
                .map(|(i, c)| c.commit(i as u64 + 1, now))
                .collect();

            let current = staged.read_variant_stock(v).unwrap().stock;
            prop_assert!(current >= 0);
            prop_assert_eq!(replay(&committed).get(&v).copied().unwrap_or(0), current);
            for e in &committed {
                prop_assert_eq!(e.new_stock, e.previous_stock + e.delta);
            }
        }
    }
}
