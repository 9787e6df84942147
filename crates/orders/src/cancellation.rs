//! Vendor-scoped cancellation and the roll-up to a full-order cancellation.

use bazaar_core::{DomainError, OrderItemId, VendorId};

use crate::order::{Order, OrderError};
use crate::state_machine::{InvalidTransition, TransitionDenial};
use crate::status::OrderStatus;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancellationOutcome {
    /// Every line on the order is now cancelled; the order follows.
    RollUp,
    /// Other vendors still have live lines; the order status is unchanged.
    Partial { note: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancellationPlan {
    pub item_ids: Vec<OrderItemId>,
    /// Whether the newly cancelled lines give their stock back.
    pub restock: bool,
    pub outcome: CancellationOutcome,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CancellationCoordinator;

impl CancellationCoordinator {
    /// Decide what cancelling `vendor_id`'s lines would do to `order`.
    ///
    /// Lines that are already cancelled, shipped or delivered are left alone.
    pub fn plan(order: &Order, vendor_id: VendorId) -> Result<CancellationPlan, OrderError> {
        if order.status().is_terminal() {
            return Err(InvalidTransition {
                current: order.status(),
                requested: OrderStatus::Cancelled,
                reason: TransitionDenial::Terminal,
            }
            .into());
        }
        if !order.has_vendor(vendor_id) {
            return Err(DomainError::not_found().into());
        }

        let item_ids: Vec<OrderItemId> = order
            .vendor_items(vendor_id)
            .filter(|i| !i.fulfillment_status.is_terminal())
            .map(|i| i.id)
            .collect();
        if item_ids.is_empty() {
            return Err(DomainError::validation("vendor has no cancellable items on this order").into());
        }

        let restock = matches!(order.status(), OrderStatus::Confirmed | OrderStatus::Processing);

        let all_cancelled = order
            .items()
            .iter()
            .all(|i| i.is_cancelled() || item_ids.contains(&i.id));

        let outcome = if all_cancelled {
            CancellationOutcome::RollUp
        } else {
            CancellationOutcome::Partial {
                note: Self::partial_note(order, vendor_id, &item_ids),
            }
        };

        Ok(CancellationPlan {
            item_ids,
            restock,
            outcome,
        })
    }

    pub fn roll_up_note(reason: Option<&str>) -> String {
        match reason.map(str::trim).filter(|r| !r.is_empty()) {
            Some(reason) => format!("all items cancelled by their vendors: {reason}"),
            None => "all items cancelled by their vendors".to_string(),
        }
    }

    fn partial_note(order: &Order, vendor_id: VendorId, item_ids: &[OrderItemId]) -> String {
        let remaining: Vec<String> = order
            .vendors()
            .into_iter()
            .filter(|v| *v != vendor_id)
            .filter(|v| order.vendor_items(*v).any(|i| !i.is_cancelled()))
            .map(|v| v.to_string())
            .collect();
        format!(
            "vendor {vendor_id} cancelled {} item(s); vendors with active items: {}",
            item_ids.len(),
            remaining.join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::*;
    use crate::order::{CancelVendorItems, OrderCommand, OrderEvent};
    use bazaar_core::{Aggregate, UserId};
    use bazaar_inventory::StockMovement;

    fn cancel(order: &mut Order, vendor_id: VendorId) -> Result<Vec<OrderEvent>, OrderError> {
        let cmd = CancelVendorItems {
            order_id: order.id_typed(),
            vendor_id,
            reason: Some("out of stock at warehouse".to_string()),
            occurred_at: test_time(),
        };
        order.execute(&OrderCommand::CancelVendorItems(cmd))
    }

    #[test]
    fn partial_then_full_cancellation_rolls_up() {
        let (v1, v2) = (VendorId::new(), VendorId::new());
        let mut order = placed_order(
            UserId::new(),
            vec![test_line(v1, 100, 1), test_line(v1, 100, 2), test_line(v2, 300, 1)],
        );
        advance(&mut order, OrderStatus::Confirmed);

        let first = cancel(&mut order, v1).unwrap();
        match &first[0] {
            OrderEvent::ItemsCancelled(e) => {
                assert_eq!(e.item_ids.len(), 2);
                assert_eq!(e.stock.as_ref().unwrap().movement, StockMovement::Restore);
            }
            other => panic!("Expected ItemsCancelled, got {other:?}"),
        }
        assert!(matches!(first[1], OrderEvent::AdminNoteAdded(_)));
        assert_eq!(order.status(), OrderStatus::Confirmed);
        assert!(order.admin_notes()[0].text.contains(&v2.to_string()));

        let second = cancel(&mut order, v2).unwrap();
        assert!(matches!(
            &second[1],
            OrderEvent::StatusChanged(e) if e.to == OrderStatus::Cancelled && e.stock.is_none()
        ));
        assert_eq!(order.status(), OrderStatus::Cancelled);
        assert!(order.items().iter().all(|i| i.is_cancelled()));
    }

    #[test]
    fn pending_orders_cancel_lines_without_restock() {
        let v = VendorId::new();
        let order = placed_order(UserId::new(), vec![test_line(v, 100, 1), test_line(VendorId::new(), 100, 1)]);
        let plan = CancellationCoordinator::plan(&order, v).unwrap();
        assert!(!plan.restock);
        assert!(matches!(plan.outcome, CancellationOutcome::Partial { .. }));
    }

    #[test]
    fn shipped_lines_are_skipped() {
        let v = VendorId::new();
        let mut order = placed_order(UserId::new(), vec![test_line(v, 100, 1)]);
        advance(&mut order, OrderStatus::Confirmed);
        advance(&mut order, OrderStatus::Shipped);

        let err = cancel(&mut order, v).unwrap_err();
        assert!(matches!(err, OrderError::Domain(DomainError::Validation(_))));
    }

    #[test]
    fn terminal_orders_reject_vendor_cancellation() {
        let v = VendorId::new();
        let mut order = placed_order(UserId::new(), vec![test_line(v, 100, 1)]);
        advance(&mut order, OrderStatus::Cancelled);
        let err = CancellationCoordinator::plan(&order, v).unwrap_err();
        assert!(matches!(
            err,
            OrderError::Transition(InvalidTransition { reason: TransitionDenial::Terminal, .. })
        ));
    }

    #[test]
    fn unknown_vendor_is_not_found() {
        let order = placed_order(UserId::new(), vec![test_line(VendorId::new(), 100, 1)]);
        assert_eq!(
            CancellationCoordinator::plan(&order, VendorId::new()),
            Err(OrderError::Domain(DomainError::NotFound))
        );
    }

    #[test]
    fn cancelling_twice_finds_nothing_left() {
        let (v1, v2) = (VendorId::new(), VendorId::new());
        let mut order = placed_order(UserId::new(), vec![test_line(v1, 100, 1), test_line(v2, 100, 1)]);
        cancel(&mut order, v1).unwrap();
        assert!(matches!(
            cancel(&mut order, v1),
            Err(OrderError::Domain(DomainError::Validation(_)))
        ));
    }
}
