//! Vendor-driven line fulfillment.

use bazaar_core::{DomainError, OrderItemId, VendorId};

use crate::order::{Order, OrderError};
use crate::status::{FulfillmentStatus, OrderStatus};

const MAX_TRACKING: usize = 100;

#[derive(Debug, Default, Clone, Copy)]
pub struct FulfillmentRules;

impl FulfillmentRules {
    /// Lines of `vendor_id` that move to `target`, with their current status.
    ///
    /// Only forward moves are produced; lines already at or past `target`, and
    /// cancelled lines, are skipped. Other vendors' lines are never touched.
    pub fn plan(
        order: &Order,
        vendor_id: VendorId,
        target: FulfillmentStatus,
        tracking_number: Option<&str>,
    ) -> Result<Vec<(OrderItemId, FulfillmentStatus)>, OrderError> {
        if !order.has_vendor(vendor_id) {
            return Err(DomainError::not_found().into());
        }
        if !matches!(
            order.status(),
            OrderStatus::Confirmed | OrderStatus::Processing | OrderStatus::Shipped
        ) {
            return Err(DomainError::validation(format!(
                "fulfillment cannot be updated while the order is {}",
                order.status()
            ))
            .into());
        }
        match target {
            FulfillmentStatus::Cancelled => {
                return Err(DomainError::validation("use vendor item cancellation to cancel lines").into());
            }
            FulfillmentStatus::Pending => {
                return Err(DomainError::validation("lines cannot be moved back to pending").into());
            }
            FulfillmentStatus::Shipped if tracking_number.is_none_or(|t| t.trim().is_empty()) => {
                return Err(DomainError::validation("tracking_number is required when marking as shipped").into());
            }
            _ => {}
        }
        if tracking_number.is_some_and(|t| t.chars().count() > MAX_TRACKING) {
            return Err(DomainError::validation(format!(
                "tracking_number may not exceed {MAX_TRACKING} characters"
            ))
            .into());
        }

        let moves: Vec<(OrderItemId, FulfillmentStatus)> = order
            .vendor_items(vendor_id)
            .filter(|i| !i.is_cancelled() && i.fulfillment_status.rank() < target.rank())
            .map(|i| (i.id, i.fulfillment_status))
            .collect();

        if moves.is_empty() {
            return Err(DomainError::validation(format!(
                "no items of this vendor can move to {target}"
            ))
            .into());
        }
        Ok(moves)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::*;
    use crate::order::{OrderCommand, UpdateFulfillment};
    use bazaar_core::{Aggregate, UserId};

    fn update(order: &Order, vendor_id: VendorId, status: FulfillmentStatus, tracking: Option<&str>) -> OrderCommand {
        OrderCommand::UpdateFulfillment(UpdateFulfillment {
            order_id: order.id_typed(),
            vendor_id,
            status,
            tracking_number: tracking.map(str::to_string),
            notes: None,
            occurred_at: test_time(),
        })
    }

    #[test]
    fn vendor_moves_only_its_own_lines() {
        let (v1, v2) = (VendorId::new(), VendorId::new());
        let mut order = placed_order(UserId::new(), vec![test_line(v1, 100, 1), test_line(v2, 100, 1)]);
        advance(&mut order, OrderStatus::Confirmed);

        let cmd = update(&order, v1, FulfillmentStatus::Shipped, Some("1Z999"));
        let events = order.execute(&cmd).unwrap();
        assert_eq!(events.len(), 1);

        let mine = order.vendor_items(v1).next().unwrap();
        assert_eq!(mine.fulfillment_status, FulfillmentStatus::Shipped);
        assert_eq!(mine.tracking_number.as_deref(), Some("1Z999"));
        assert!(mine.fulfilled_at.is_some());
        let theirs = order.vendor_items(v2).next().unwrap();
        assert_eq!(theirs.fulfillment_status, FulfillmentStatus::Pending);
        assert_eq!(order.status(), OrderStatus::Confirmed);
    }

    #[test]
    fn shipped_requires_tracking() {
        let v = VendorId::new();
        let mut order = placed_order(UserId::new(), vec![test_line(v, 100, 1)]);
        advance(&mut order, OrderStatus::Confirmed);
        assert!(order.handle(&update(&order, v, FulfillmentStatus::Shipped, None)).is_err());
        assert!(order.handle(&update(&order, v, FulfillmentStatus::Shipped, Some("  "))).is_err());
    }

    #[test]
    fn pending_orders_cannot_be_fulfilled() {
        let v = VendorId::new();
        let order = placed_order(UserId::new(), vec![test_line(v, 100, 1)]);
        let err = order
            .handle(&update(&order, v, FulfillmentStatus::Processing, None))
            .unwrap_err();
        assert!(matches!(err, OrderError::Domain(DomainError::Validation(_))));
    }

    #[test]
    fn no_backward_moves() {
        let v = VendorId::new();
        let mut order = placed_order(UserId::new(), vec![test_line(v, 100, 1)]);
        advance(&mut order, OrderStatus::Confirmed);
        order
            .execute(&update(&order, v, FulfillmentStatus::Delivered, None))
            .unwrap();
        assert!(order.handle(&update(&order, v, FulfillmentStatus::Processing, None)).is_err());
    }
}
