//! Who may see which order, and what they see of it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bazaar_auth::{Actor, ActorRole};
use bazaar_core::{AggregateRoot, Money, UserId, VendorId};

use crate::amounts::OrderAmounts;
use crate::customer::CustomerContact;
use crate::order::{AdminNote, Order, OrderId, OrderItem, StatusTimestamps};
use crate::status::{OrderStatus, PaymentStatus};

/// Admins see every order, customers their own, vendors any order that
/// carries at least one of their lines.
pub fn can_view(actor: &Actor, order: &Order) -> bool {
    if !order.is_created() {
        return false;
    }
    match actor.role {
        ActorRole::Admin => true,
        ActorRole::Customer => order.customer_id() == Some(actor.user_id),
        ActorRole::Vendor => actor.vendor_id.is_some_and(|v| order.has_vendor(v)),
    }
}

/// Read model of an order as presented to one actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderView {
    pub id: OrderId,
    pub order_number: String,
    pub customer_id: Option<UserId>,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: Option<String>,
    pub transaction_id: Option<String>,
    pub amounts: Option<OrderAmounts>,
    /// Sum of the visible, non-cancelled lines. Differs from the order subtotal
    /// for vendors.
    pub visible_subtotal: Money,
    pub contact: Option<CustomerContact>,
    pub shipping_method: Option<String>,
    pub tracking_number: Option<String>,
    pub customer_notes: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub admin_notes: Vec<AdminNote>,
    #[serde(flatten)]
    pub timestamps: StatusTimestamps,
    pub items: Vec<OrderItem>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub version: u64,
}

/// Project `order` for `actor`, or `None` if the actor may not see it.
///
/// Vendors only get their own lines. Administrative notes are for admins.
pub fn view_for(actor: &Actor, order: &Order) -> Option<OrderView> {
    if !can_view(actor, order) {
        return None;
    }
    let items: Vec<OrderItem> = match actor.acting_vendor() {
        Some(vendor_id) => order.vendor_items(vendor_id).cloned().collect(),
        None => order.items().to_vec(),
    };
    let visible_subtotal = items
        .iter()
        .filter(|i| !i.is_cancelled())
        .map(|i| i.total_price)
        .sum();

    Some(OrderView {
        id: order.id_typed(),
        order_number: order.order_number().to_string(),
        customer_id: order.customer_id(),
        status: order.status(),
        payment_status: order.payment_status(),
        payment_method: order.payment_method().map(str::to_string),
        transaction_id: order.transaction_id().map(str::to_string),
        amounts: order.amounts().copied(),
        visible_subtotal,
        contact: order.contact().cloned(),
        shipping_method: order.shipping_method().map(str::to_string),
        tracking_number: order.tracking_number().map(str::to_string),
        customer_notes: order.customer_notes().map(str::to_string),
        admin_notes: if actor.is_admin() {
            order.admin_notes().to_vec()
        } else {
            Vec::new()
        },
        timestamps: *order.timestamps(),
        items,
        created_at: order.created_at(),
        updated_at: order.updated_at(),
        version: order.version(),
    })
}

pub const DEFAULT_PER_PAGE: usize = 15;
pub const MAX_PER_PAGE: usize = 100;

/// Listing filters. `customer_id` and `vendor_id` only narrow an admin's view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub customer_id: Option<UserId>,
    pub vendor_id: Option<VendorId>,
    pub page: Option<usize>,
    pub per_page: Option<usize>,
}

impl OrderFilter {
    pub fn matches(&self, order: &Order) -> bool {
        self.status.is_none_or(|s| order.status() == s)
            && self.payment_status.is_none_or(|p| order.payment_status() == p)
            && self.customer_id.is_none_or(|c| order.customer_id() == Some(c))
            && self.vendor_id.is_none_or(|v| order.has_vendor(v))
    }

    pub fn page(&self) -> usize {
        self.page.unwrap_or(1).max(1)
    }

    pub fn per_page(&self) -> usize {
        self.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
    pub last_page: usize,
}

impl<T> Page<T> {
    /// Slice an already ordered result set. Pages past the end are empty.
    pub fn paginate(all: Vec<T>, page: usize, per_page: usize) -> Self {
        let (page, per_page) = (page.max(1), per_page.max(1));
        let total = all.len();
        let last_page = total.div_ceil(per_page).max(1);
        let offset = (page - 1).saturating_mul(per_page);
        let data = all.into_iter().skip(offset).take(per_page).collect();
        Self {
            data,
            total,
            page,
            per_page,
            last_page,
        }
    }
}
