//! Shared builders for this crate's unit tests.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use bazaar_auth::Actor;
use bazaar_core::{
    Aggregate, AggregateId, Money, OrderItemId, ProductId, UserId, VariantId, VendorId,
};

use crate::amounts::OrderAmounts;
use crate::customer::tests::test_contact;
use crate::order::{
    ChangeStatus, ItemSnapshot, NewOrderItem, Order, OrderCommand, OrderEvent, OrderId, PlaceOrder,
};
use crate::state_machine::TransitionMode;
use crate::status::OrderStatus;

pub fn test_time() -> DateTime<Utc> {
    Utc::now()
}

pub fn test_line(vendor_id: VendorId, unit_minor: i64, quantity: u32) -> NewOrderItem {
    NewOrderItem {
        item_id: OrderItemId::new(),
        snapshot: ItemSnapshot {
            product_id: ProductId::new(),
            variant_id: Some(VariantId::new()),
            vendor_id,
            product_name: "Widget".to_string(),
            variant_name: Some("Standard".to_string()),
            sku: "WID-STD".to_string(),
            attributes: BTreeMap::new(),
        },
        unit_price: Money::from_minor(unit_minor),
        quantity,
    }
}

pub fn place_cmd(customer_id: UserId, items: Vec<NewOrderItem>) -> PlaceOrder {
    let subtotal: Money = items
        .iter()
        .filter_map(|l| l.unit_price.checked_times(l.quantity))
        .sum();
    PlaceOrder {
        order_id: OrderId::new(AggregateId::new()),
        order_number: "ORD-20260101-000001".to_string(),
        customer_id,
        contact: test_contact(),
        amounts: OrderAmounts {
            subtotal,
            tax_amount: Money::ZERO,
            shipping_cost: Money::ZERO,
            discount_amount: Money::ZERO,
            total: subtotal,
        },
        items,
        payment_method: Some("card".to_string()),
        shipping_method: None,
        customer_notes: None,
        occurred_at: test_time(),
    }
}

/// A placed (pending) order.
pub fn placed_order(customer_id: UserId, items: Vec<NewOrderItem>) -> Order {
    let cmd = place_cmd(customer_id, items);
    let mut order = Order::empty(cmd.order_id);
    order.execute(&OrderCommand::PlaceOrder(cmd)).unwrap();
    order
}

pub fn change_status(order: &Order, actor: Actor, requested: OrderStatus) -> ChangeStatus {
    ChangeStatus {
        order_id: order.id_typed(),
        actor,
        requested,
        mode: TransitionMode::Normal,
        note: None,
        tracking_number: None,
        occurred_at: test_time(),
    }
}

pub fn admin() -> Actor {
    Actor::admin(UserId::new())
}

/// Drive `order` to `status` as an admin.
pub fn advance(order: &mut Order, status: OrderStatus) -> Vec<OrderEvent> {
    let mut cmd = change_status(order, admin(), status);
    if status == OrderStatus::Shipped {
        cmd.tracking_number = Some("TRK-1".to_string());
    }
    order.execute(&OrderCommand::ChangeStatus(cmd)).unwrap()
}
