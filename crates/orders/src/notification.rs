//! Post-commit notifications handed to the external delivery sink.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bazaar_core::{AggregateId, Money, UserId, VariantId, VendorId};
use bazaar_events::Event;

use crate::order::{Order, OrderEvent, OrderId};
use crate::status::{FulfillmentStatus, OrderStatus, PaymentStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    OrderCreated {
        order_id: OrderId,
        order_number: String,
        customer_id: UserId,
        total: Money,
        vendor_ids: Vec<VendorId>,
        occurred_at: DateTime<Utc>,
    },
    OrderStatusChanged {
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
        occurred_at: DateTime<Utc>,
    },
    VendorItemStatusChanged {
        order_id: OrderId,
        vendor_id: VendorId,
        from: FulfillmentStatus,
        to: FulfillmentStatus,
        occurred_at: DateTime<Utc>,
    },
    LowStockCrossed {
        variant_id: VariantId,
        stock: i64,
        threshold: i64,
        occurred_at: DateTime<Utc>,
    },
    PaymentStatusChanged {
        order_id: OrderId,
        from: PaymentStatus,
        to: PaymentStatus,
        occurred_at: DateTime<Utc>,
    },
}

impl DomainEvent {
    /// Stream the notification belongs to and that stream's kind.
    pub fn stream(&self) -> (AggregateId, &'static str) {
        match self {
            DomainEvent::OrderCreated { order_id, .. }
            | DomainEvent::OrderStatusChanged { order_id, .. }
            | DomainEvent::VendorItemStatusChanged { order_id, .. }
            | DomainEvent::PaymentStatusChanged { order_id, .. } => (order_id.0, "order"),
            DomainEvent::LowStockCrossed { variant_id, .. } => {
                (AggregateId::from_uuid(*variant_id.as_uuid()), "variant")
            }
        }
    }
}

impl Event for DomainEvent {
    fn event_type(&self) -> &'static str {
        match self {
            DomainEvent::OrderCreated { .. } => "orders.order.created",
            DomainEvent::OrderStatusChanged { .. } => "orders.order.status_changed",
            DomainEvent::VendorItemStatusChanged { .. } => "orders.vendor_item.status_changed",
            DomainEvent::LowStockCrossed { .. } => "inventory.variant.low_stock",
            DomainEvent::PaymentStatusChanged { .. } => "orders.order.payment_status_changed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            DomainEvent::OrderCreated { occurred_at, .. }
            | DomainEvent::OrderStatusChanged { occurred_at, .. }
            | DomainEvent::VendorItemStatusChanged { occurred_at, .. }
            | DomainEvent::LowStockCrossed { occurred_at, .. }
            | DomainEvent::PaymentStatusChanged { occurred_at, .. } => *occurred_at,
        }
    }
}

/// Translate committed order events into notifications.
///
/// `before` is the order as it was loaded, before any of `events` applied. Item
/// changes are collapsed to one notification per (vendor, from, to).
pub fn notifications_for(before: &Order, events: &[OrderEvent]) -> Vec<DomainEvent> {
    let mut out: Vec<DomainEvent> = Vec::new();

    for event in events {
        match event {
            OrderEvent::OrderPlaced(e) => {
                let mut vendor_ids: Vec<VendorId> = Vec::new();
                for item in &e.items {
                    if !vendor_ids.contains(&item.snapshot.vendor_id) {
                        vendor_ids.push(item.snapshot.vendor_id);
                    }
                }
                out.push(DomainEvent::OrderCreated {
                    order_id: e.order_id,
                    order_number: e.order_number.clone(),
                    customer_id: e.customer_id,
                    total: e.amounts.total,
                    vendor_ids,
                    occurred_at: e.occurred_at,
                });
            }
            OrderEvent::StatusChanged(e) => out.push(DomainEvent::OrderStatusChanged {
                order_id: e.order_id,
                from: e.from,
                to: e.to,
                occurred_at: e.occurred_at,
            }),
            OrderEvent::ItemsCancelled(e) => {
                for item_id in &e.item_ids {
                    let from = before
                        .item(*item_id)
                        .map(|i| i.fulfillment_status)
                        .unwrap_or(FulfillmentStatus::Pending);
                    push_unique(
                        &mut out,
                        DomainEvent::VendorItemStatusChanged {
                            order_id: e.order_id,
                            vendor_id: e.vendor_id,
                            from,
                            to: FulfillmentStatus::Cancelled,
                            occurred_at: e.occurred_at,
                        },
                    );
                }
            }
            OrderEvent::ItemFulfillmentUpdated(e) => push_unique(
                &mut out,
                DomainEvent::VendorItemStatusChanged {
                    order_id: e.order_id,
                    vendor_id: e.vendor_id,
                    from: e.from,
                    to: e.to,
                    occurred_at: e.occurred_at,
                },
            ),
            OrderEvent::PaymentRecorded(e) => out.push(DomainEvent::PaymentStatusChanged {
                order_id: e.order_id,
                from: e.from,
                to: e.to,
                occurred_at: e.occurred_at,
            }),
            OrderEvent::AdminNoteAdded(_) => {}
        }
    }
    out
}

fn push_unique(out: &mut Vec<DomainEvent>, notification: DomainEvent) {
    if !out.contains(&notification) {
        out.push(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::*;
    use crate::order::{CancelVendorItems, OrderCommand};
    use bazaar_core::Aggregate;

    #[test]
    fn placement_announces_order_and_vendors() {
        let (v1, v2) = (VendorId::new(), VendorId::new());
        let cmd = place_cmd(UserId::new(), vec![test_line(v1, 100, 1), test_line(v2, 100, 1), test_line(v1, 50, 1)]);
        let before = Order::empty(cmd.order_id);
        let events = before.handle(&OrderCommand::PlaceOrder(cmd)).unwrap();

        let notes = notifications_for(&before, &events);
        match &notes[..] {
            [DomainEvent::OrderCreated { vendor_ids, total, .. }] => {
                assert_eq!(vendor_ids, &vec![v1, v2]);
                assert_eq!(*total, Money::from_minor(250));
            }
            other => panic!("unexpected notifications: {other:?}"),
        }
    }

    #[test]
    fn vendor_cancellation_collapses_per_vendor_and_status() {
        let v = VendorId::new();
        let mut order = placed_order(UserId::new(), vec![test_line(v, 100, 1), test_line(v, 100, 1)]);
        advance(&mut order, OrderStatus::Confirmed);
        let before = order.clone();

        let events = order
            .execute(&OrderCommand::CancelVendorItems(CancelVendorItems {
                order_id: order.id_typed(),
                vendor_id: v,
                reason: None,
                occurred_at: test_time(),
            }))
            .unwrap();

        let notes = notifications_for(&before, &events);
        assert_eq!(notes.len(), 2);
        assert!(matches!(
            notes[0],
            DomainEvent::VendorItemStatusChanged {
                from: FulfillmentStatus::Pending,
                to: FulfillmentStatus::Cancelled,
                ..
            }
        ));
        assert!(matches!(
            notes[1],
            DomainEvent::OrderStatusChanged { from: OrderStatus::Confirmed, to: OrderStatus::Cancelled, .. }
        ));
    }

    #[test]
    fn envelope_streams() {
        let variant_id = VariantId::new();
        let n = DomainEvent::LowStockCrossed {
            variant_id,
            stock: 2,
            threshold: 5,
            occurred_at: Utc::now(),
        };
        assert_eq!(n.stream().1, "variant");
        assert_eq!(n.event_type(), "inventory.variant.low_stock");
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["type"], "low_stock_crossed");
    }
}
