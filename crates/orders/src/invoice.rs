//! Read-only invoice projection over an order.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use bazaar_core::{DomainError, Money, VendorId};

use crate::customer::CustomerContact;
use crate::order::{Order, OrderError, OrderId};
use crate::status::{FulfillmentStatus, OrderStatus, PaymentStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub sku: String,
    pub product_name: String,
    pub variant_name: Option<String>,
    pub quantity: u32,
    pub unit_price: Money,
    pub total_price: Money,
    pub fulfillment_status: FulfillmentStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceSnapshot {
    pub invoice_number: String,
    pub order_id: OrderId,
    pub order_number: String,
    pub issued_on: NaiveDate,
    pub vendor_id: Option<VendorId>,
    pub customer: Option<CustomerContact>,
    pub order_status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub lines: Vec<InvoiceLine>,
    pub subtotal: Money,
    pub tax_amount: Money,
    pub shipping_cost: Money,
    pub discount_amount: Money,
    pub total: Money,
}

/// Build the invoice for the whole order, or for one vendor's lines.
///
/// Vendor invoices carry only that vendor's non-cancelled lines; order-level
/// tax, shipping and discount are not apportioned to vendors.
pub fn invoice_snapshot(
    order: &Order,
    vendor_id: Option<VendorId>,
    issued_on: NaiveDate,
) -> Result<InvoiceSnapshot, OrderError> {
    let amounts = order.amounts().copied().ok_or(DomainError::NotFound)?;

    let to_line = |i: &crate::order::OrderItem| InvoiceLine {
        sku: i.snapshot.sku.clone(),
        product_name: i.snapshot.product_name.clone(),
        variant_name: i.snapshot.variant_name.clone(),
        quantity: i.quantity,
        unit_price: i.unit_price,
        total_price: i.total_price,
        fulfillment_status: i.fulfillment_status,
    };

    let (invoice_number, lines, subtotal, tax_amount, shipping_cost, discount_amount, total) =
        match vendor_id {
            Some(vendor_id) => {
                if !order.has_vendor(vendor_id) {
                    return Err(DomainError::NotFound.into());
                }
                let lines: Vec<InvoiceLine> = order
                    .vendor_items(vendor_id)
                    .filter(|i| !i.is_cancelled())
                    .map(to_line)
                    .collect();
                let subtotal: Money = lines.iter().map(|l| l.total_price).sum();
                (
                    vendor_invoice_number(vendor_id, order.order_number()),
                    lines,
                    subtotal,
                    Money::ZERO,
                    Money::ZERO,
                    Money::ZERO,
                    subtotal,
                )
            }
            None => (
                format!("INV-{}-{}", order.order_number(), issued_on.format("%Y%m%d")),
                order.items().iter().map(to_line).collect(),
                amounts.subtotal,
                amounts.tax_amount,
                amounts.shipping_cost,
                amounts.discount_amount,
                amounts.total,
            ),
        };

    Ok(InvoiceSnapshot {
        invoice_number,
        order_id: order.id_typed(),
        order_number: order.order_number().to_string(),
        issued_on,
        vendor_id,
        customer: order.contact().cloned(),
        order_status: order.status(),
        payment_status: order.payment_status(),
        lines,
        subtotal,
        tax_amount,
        shipping_cost,
        discount_amount,
        total,
    })
}

fn vendor_invoice_number(vendor_id: VendorId, order_number: &str) -> String {
    let code: String = vendor_id
        .as_uuid()
        .simple()
        .to_string()
        .chars()
        .take(8)
        .collect::<String>()
        .to_uppercase();
    format!("VINV-{code}-{order_number}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::*;
    use bazaar_core::UserId;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 14).unwrap()
    }

    #[test]
    fn full_invoice_mirrors_order_amounts() {
        let order = placed_order(UserId::new(), vec![test_line(VendorId::new(), 1250, 2)]);
        let inv = invoice_snapshot(&order, None, day()).unwrap();
        assert_eq!(inv.invoice_number, format!("INV-{}-20261014", order.order_number()));
        assert_eq!(inv.total, Money::from_minor(2500));
        assert_eq!(inv.lines.len(), 1);
    }

    #[test]
    fn vendor_invoice_only_covers_that_vendor() {
        let (v1, v2) = (VendorId::new(), VendorId::new());
        let order = placed_order(UserId::new(), vec![test_line(v1, 100, 3), test_line(v2, 900, 1)]);
        let inv = invoice_snapshot(&order, Some(v1), day()).unwrap();

        let code: String = v1.as_uuid().simple().to_string()[..8].to_uppercase();
        assert_eq!(inv.invoice_number, format!("VINV-{code}-{}", order.order_number()));
        assert_eq!(inv.lines.len(), 1);
        assert_eq!(inv.total, Money::from_minor(300));
        assert_eq!(inv.shipping_cost, Money::ZERO);

        assert!(invoice_snapshot(&order, Some(VendorId::new()), day()).is_err());
    }
}
