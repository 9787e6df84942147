use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use bazaar_auth::Actor;
use bazaar_core::{
    Aggregate, AggregateId, AggregateRoot, DomainError, Entity, Money, OrderItemId, ProductId,
    UserId, VariantId, VendorId,
};
use bazaar_events::Event;
use bazaar_inventory::{StockLine, StockMovement};

use crate::amounts::OrderAmounts;
use crate::cancellation::{CancellationCoordinator, CancellationOutcome};
use crate::customer::CustomerContact;
use crate::fulfillment::FulfillmentRules;
use crate::state_machine::{InvalidTransition, OrderStateMachine, TransitionMode};
use crate::status::{FulfillmentStatus, OrderStatus, PaymentStatus};

pub const MAX_LINE_QUANTITY: u32 = 1000;
const MAX_NOTES: usize = 1000;

/// Order identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub AggregateId);

impl OrderId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for OrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl core::str::FromStr for OrderId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Catalog data frozen onto a line at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSnapshot {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub vendor_id: VendorId,
    pub product_name: String,
    pub variant_name: Option<String>,
    pub sku: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    #[serde(flatten)]
    pub snapshot: ItemSnapshot,
    pub unit_price: Money,
    pub quantity: u32,
    pub total_price: Money,
    pub fulfillment_status: FulfillmentStatus,
    pub fulfilled_at: Option<DateTime<Utc>>,
    pub tracking_number: Option<String>,
}

impl Entity for OrderItem {
    type Id = OrderItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl OrderItem {
    pub fn vendor_id(&self) -> VendorId {
        self.snapshot.vendor_id
    }

    pub fn is_cancelled(&self) -> bool {
        self.fulfillment_status == FulfillmentStatus::Cancelled
    }

    pub fn stock_line(&self) -> StockLine {
        StockLine {
            product_id: self.snapshot.product_id,
            variant_id: self.snapshot.variant_id,
            quantity: self.quantity,
        }
    }
}

/// A line as requested at placement, before ids and totals are assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub item_id: OrderItemId,
    pub snapshot: ItemSnapshot,
    pub unit_price: Money,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminNote {
    pub text: String,
    pub at: DateTime<Utc>,
}

/// When the order entered each status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTimestamps {
    pub confirmed_at: Option<DateTime<Utc>>,
    pub processing_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
}

impl StatusTimestamps {
    fn mark(&mut self, status: OrderStatus, at: DateTime<Utc>) {
        let slot = match status {
            OrderStatus::Pending => return,
            OrderStatus::Confirmed => &mut self.confirmed_at,
            OrderStatus::Processing => &mut self.processing_at,
            OrderStatus::Shipped => &mut self.shipped_at,
            OrderStatus::Delivered => &mut self.delivered_at,
            OrderStatus::Cancelled => &mut self.cancelled_at,
            OrderStatus::Refunded => &mut self.refunded_at,
        };
        *slot = Some(at);
    }
}

/// Aggregate root: Order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    id: OrderId,
    order_number: String,
    customer_id: Option<UserId>,
    status: OrderStatus,
    payment_status: PaymentStatus,
    payment_method: Option<String>,
    transaction_id: Option<String>,
    amounts: Option<OrderAmounts>,
    contact: Option<CustomerContact>,
    shipping_method: Option<String>,
    tracking_number: Option<String>,
    customer_notes: Option<String>,
    admin_notes: Vec<AdminNote>,
    timestamps: StatusTimestamps,
    items: Vec<OrderItem>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Order {
    /// Create an empty, not-yet-created aggregate instance.
    pub fn empty(id: OrderId) -> Self {
        Self {
            id,
            order_number: String::new(),
            customer_id: None,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_method: None,
            transaction_id: None,
            amounts: None,
            contact: None,
            shipping_method: None,
            tracking_number: None,
            customer_notes: None,
            admin_notes: Vec::new(),
            timestamps: StatusTimestamps::default(),
            items: Vec::new(),
            created_at: None,
            updated_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn order_number(&self) -> &str {
        &self.order_number
    }

    pub fn customer_id(&self) -> Option<UserId> {
        self.customer_id
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    pub fn payment_method(&self) -> Option<&str> {
        self.payment_method.as_deref()
    }

    pub fn transaction_id(&self) -> Option<&str> {
        self.transaction_id.as_deref()
    }

    pub fn amounts(&self) -> Option<&OrderAmounts> {
        self.amounts.as_ref()
    }

    pub fn contact(&self) -> Option<&CustomerContact> {
        self.contact.as_ref()
    }

    pub fn shipping_method(&self) -> Option<&str> {
        self.shipping_method.as_deref()
    }

    pub fn tracking_number(&self) -> Option<&str> {
        self.tracking_number.as_deref()
    }

    pub fn customer_notes(&self) -> Option<&str> {
        self.customer_notes.as_deref()
    }

    pub fn admin_notes(&self) -> &[AdminNote] {
        &self.admin_notes
    }

    pub fn timestamps(&self) -> &StatusTimestamps {
        &self.timestamps
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn item(&self, id: OrderItemId) -> Option<&OrderItem> {
        self.items.iter().find(|i| i.id == id)
    }

    pub fn vendor_items(&self, vendor_id: VendorId) -> impl Iterator<Item = &OrderItem> {
        self.items.iter().filter(move |i| i.vendor_id() == vendor_id)
    }

    pub fn has_vendor(&self, vendor_id: VendorId) -> bool {
        self.vendor_items(vendor_id).next().is_some()
    }

    /// Distinct vendors on this order, in first-seen order.
    pub fn vendors(&self) -> Vec<VendorId> {
        let mut out: Vec<VendorId> = Vec::new();
        for item in &self.items {
            if !out.contains(&item.vendor_id()) {
                out.push(item.vendor_id());
            }
        }
        out
    }

    /// Variants whose rows a unit of work on this order may need to lock.
    pub fn variant_ids(&self) -> Vec<VariantId> {
        let mut ids: Vec<VariantId> = self.items.iter().filter_map(|i| i.snapshot.variant_id).collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Stock lines for the given items.
    pub fn stock_lines(&self, item_ids: &[OrderItemId]) -> Vec<StockLine> {
        self.items
            .iter()
            .filter(|i| item_ids.contains(&i.id))
            .map(OrderItem::stock_line)
            .collect()
    }

    /// Only pending orders may be physically removed.
    pub fn ensure_deletable(&self) -> Result<(), OrderError> {
        if !self.created {
            return Err(DomainError::not_found().into());
        }
        if self.status != OrderStatus::Pending {
            return Err(DomainError::validation(format!(
                "only pending orders can be deleted (order is {})",
                self.status
            ))
            .into());
        }
        Ok(())
    }
}

impl AggregateRoot for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OrderError {
    #[error(transparent)]
    Transition(#[from] InvalidTransition),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Command: PlaceOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrder {
    pub order_id: OrderId,
    pub order_number: String,
    pub customer_id: UserId,
    pub contact: CustomerContact,
    pub amounts: OrderAmounts,
    pub items: Vec<NewOrderItem>,
    pub payment_method: Option<String>,
    pub shipping_method: Option<String>,
    pub customer_notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeStatus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeStatus {
    pub order_id: OrderId,
    pub actor: Actor,
    pub requested: OrderStatus,
    #[serde(skip)]
    pub mode: TransitionMode,
    pub note: Option<String>,
    pub tracking_number: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelVendorItems.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelVendorItems {
    pub order_id: OrderId,
    pub vendor_id: VendorId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateFulfillment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateFulfillment {
    pub order_id: OrderId,
    pub vendor_id: VendorId,
    pub status: FulfillmentStatus,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordPayment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPayment {
    pub order_id: OrderId,
    pub captured: bool,
    pub transaction_id: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderCommand {
    PlaceOrder(PlaceOrder),
    ChangeStatus(ChangeStatus),
    CancelVendorItems(CancelVendorItems),
    UpdateFulfillment(UpdateFulfillment),
    RecordPayment(RecordPayment),
}

/// Event: OrderPlaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPlaced {
    pub order_id: OrderId,
    pub order_number: String,
    pub customer_id: UserId,
    pub contact: CustomerContact,
    pub amounts: OrderAmounts,
    pub items: Vec<OrderItem>,
    pub payment_method: Option<String>,
    pub shipping_method: Option<String>,
    pub customer_notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// The stock movement a status change requires, and for which lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockEffect {
    pub movement: StockMovement,
    pub item_ids: Vec<OrderItemId>,
}

/// Event: StatusChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChanged {
    pub order_id: OrderId,
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub stock: Option<StockEffect>,
    /// Lines moved to cancelled by this change.
    pub cancelled_items: Vec<OrderItemId>,
    pub note: Option<String>,
    pub tracking_number: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemsCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemsCancelled {
    pub order_id: OrderId,
    pub vendor_id: VendorId,
    pub item_ids: Vec<OrderItemId>,
    /// Restore movement for the cancelled lines, if the order holds their stock.
    pub stock: Option<StockEffect>,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: AdminNoteAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminNoteAdded {
    pub order_id: OrderId,
    pub note: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemFulfillmentUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFulfillmentUpdated {
    pub order_id: OrderId,
    pub vendor_id: VendorId,
    pub item_id: OrderItemId,
    pub from: FulfillmentStatus,
    pub to: FulfillmentStatus,
    pub tracking_number: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PaymentRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecorded {
    pub order_id: OrderId,
    pub from: PaymentStatus,
    pub to: PaymentStatus,
    pub transaction_id: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderEvent {
    OrderPlaced(OrderPlaced),
    StatusChanged(StatusChanged),
    ItemsCancelled(ItemsCancelled),
    AdminNoteAdded(AdminNoteAdded),
    ItemFulfillmentUpdated(ItemFulfillmentUpdated),
    PaymentRecorded(PaymentRecorded),
}

impl OrderEvent {
    /// Stock movement this event requires, if any.
    pub fn stock_effect(&self) -> Option<&StockEffect> {
        match self {
            OrderEvent::StatusChanged(e) => e.stock.as_ref(),
            OrderEvent::ItemsCancelled(e) => e.stock.as_ref(),
            _ => None,
        }
    }
}

impl Event for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced(_) => "orders.order.placed",
            OrderEvent::StatusChanged(_) => "orders.order.status_changed",
            OrderEvent::ItemsCancelled(_) => "orders.order.items_cancelled",
            OrderEvent::AdminNoteAdded(_) => "orders.order.admin_note_added",
            OrderEvent::ItemFulfillmentUpdated(_) => "orders.item.fulfillment_updated",
            OrderEvent::PaymentRecorded(_) => "orders.order.payment_recorded",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::OrderPlaced(e) => e.occurred_at,
            OrderEvent::StatusChanged(e) => e.occurred_at,
            OrderEvent::ItemsCancelled(e) => e.occurred_at,
            OrderEvent::AdminNoteAdded(e) => e.occurred_at,
            OrderEvent::ItemFulfillmentUpdated(e) => e.occurred_at,
            OrderEvent::PaymentRecorded(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Order {
    type Command = OrderCommand;
    type Event = OrderEvent;
    type Error = OrderError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            OrderEvent::OrderPlaced(e) => {
                self.id = e.order_id;
                self.order_number = e.order_number.clone();
                self.customer_id = Some(e.customer_id);
                self.status = OrderStatus::Pending;
                self.payment_status = PaymentStatus::Pending;
                self.payment_method = e.payment_method.clone();
                self.amounts = Some(e.amounts);
                self.contact = Some(e.contact.clone());
                self.shipping_method = e.shipping_method.clone();
                self.customer_notes = e.customer_notes.clone();
                self.items = e.items.clone();
                self.created_at = Some(e.occurred_at);
                self.created = true;
            }
            OrderEvent::StatusChanged(e) => {
                self.status = e.to;
                self.timestamps.mark(e.to, e.occurred_at);
                if let Some(tracking) = &e.tracking_number {
                    self.tracking_number = Some(tracking.clone());
                }
                if let Some(note) = &e.note {
                    self.admin_notes.push(AdminNote {
                        text: note.clone(),
                        at: e.occurred_at,
                    });
                }
                for item in &mut self.items {
                    if e.cancelled_items.contains(&item.id) {
                        item.fulfillment_status = FulfillmentStatus::Cancelled;
                    } else {
                        cascade_item(item, e.to, e.occurred_at);
                    }
                }
            }
            OrderEvent::ItemsCancelled(e) => {
                for item in &mut self.items {
                    if e.item_ids.contains(&item.id) {
                        item.fulfillment_status = FulfillmentStatus::Cancelled;
                    }
                }
            }
            OrderEvent::AdminNoteAdded(e) => {
                self.admin_notes.push(AdminNote {
                    text: e.note.clone(),
                    at: e.occurred_at,
                });
            }
            OrderEvent::ItemFulfillmentUpdated(e) => {
                if let Some(item) = self.items.iter_mut().find(|i| i.id == e.item_id) {
                    item.fulfillment_status = e.to;
                    if let Some(tracking) = &e.tracking_number {
                        item.tracking_number = Some(tracking.clone());
                    }
                    if matches!(e.to, FulfillmentStatus::Shipped | FulfillmentStatus::Delivered)
                        && item.fulfilled_at.is_none()
                    {
                        item.fulfilled_at = Some(e.occurred_at);
                    }
                }
            }
            OrderEvent::PaymentRecorded(e) => {
                self.payment_status = e.to;
                if e.transaction_id.is_some() {
                    self.transaction_id = e.transaction_id.clone();
                }
            }
        }

        self.updated_at = Some(event.occurred_at());

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OrderCommand::PlaceOrder(cmd) => self.handle_place(cmd),
            OrderCommand::ChangeStatus(cmd) => self.handle_change_status(cmd),
            OrderCommand::CancelVendorItems(cmd) => self.handle_cancel_vendor_items(cmd),
            OrderCommand::UpdateFulfillment(cmd) => self.handle_update_fulfillment(cmd),
            OrderCommand::RecordPayment(cmd) => self.handle_record_payment(cmd),
        }
    }
}

/// Order-level forward moves drag the non-cancelled lines along.
fn cascade_item(item: &mut OrderItem, to: OrderStatus, at: DateTime<Utc>) {
    if item.is_cancelled() {
        return;
    }
    let target = match to {
        OrderStatus::Processing => FulfillmentStatus::Processing,
        OrderStatus::Shipped => FulfillmentStatus::Shipped,
        OrderStatus::Delivered => FulfillmentStatus::Delivered,
        _ => return,
    };
    if item.fulfillment_status.rank() < target.rank() {
        item.fulfillment_status = target;
        if matches!(target, FulfillmentStatus::Shipped | FulfillmentStatus::Delivered)
            && item.fulfilled_at.is_none()
        {
            item.fulfilled_at = Some(at);
        }
    }
}

fn too_long(value: &Option<String>, max: usize) -> bool {
    value.as_ref().is_some_and(|v| v.chars().count() > max)
}

impl Order {
    fn ensure_created(&self) -> Result<(), OrderError> {
        if !self.created {
            return Err(DomainError::not_found().into());
        }
        Ok(())
    }

    fn ensure_order_id(&self, order_id: OrderId) -> Result<(), OrderError> {
        if self.id != order_id {
            return Err(DomainError::invariant("order_id mismatch").into());
        }
        Ok(())
    }

    /// Items that still count against stock.
    fn active_item_ids(&self) -> Vec<OrderItemId> {
        self.items.iter().filter(|i| !i.is_cancelled()).map(|i| i.id).collect()
    }

    fn handle_place(&self, cmd: &PlaceOrder) -> Result<Vec<OrderEvent>, OrderError> {
        if self.created {
            return Err(DomainError::invariant("order already exists").into());
        }

        let mut errors = Vec::new();
        if cmd.items.is_empty() {
            errors.push("at least one order item is required".to_string());
        }
        let line_totals: Vec<Option<Money>> = cmd
            .items
            .iter()
            .map(|l| l.unit_price.checked_times(l.quantity))
            .collect();
        for (idx, (line, total)) in cmd.items.iter().zip(&line_totals).enumerate() {
            if total.is_none() {
                errors.push(format!("items.{idx} line total is out of range"));
            }
            if line.quantity == 0 || line.quantity > MAX_LINE_QUANTITY {
                errors.push(format!(
                    "items.{idx}.quantity must be between 1 and {MAX_LINE_QUANTITY}"
                ));
            }
            if line.unit_price < Money::from_minor(1) {
                errors.push(format!("items.{idx}.unit_price must be at least 0.01"));
            }
            if line.snapshot.product_name.trim().is_empty() {
                errors.push(format!("items.{idx}.product_name is required"));
            }
            if line.snapshot.sku.trim().is_empty() {
                errors.push(format!("items.{idx}.sku is required"));
            }
        }
        let item_sum = line_totals
            .iter()
            .copied()
            .collect::<Option<Vec<Money>>>()
            .and_then(Money::checked_sum);
        cmd.amounts.collect_errors(item_sum, &mut errors);
        cmd.contact.collect_errors(&mut errors);
        if too_long(&cmd.customer_notes, MAX_NOTES) {
            errors.push(format!("customer_notes may not exceed {MAX_NOTES} characters"));
        }
        if too_long(&cmd.payment_method, 50) {
            errors.push("payment_method may not exceed 50 characters".to_string());
        }
        if !errors.is_empty() {
            return Err(DomainError::validation(errors.join("; ")).into());
        }

        let items = cmd
            .items
            .iter()
            .zip(line_totals)
            .map(|(l, total_price)| OrderItem {
                id: l.item_id,
                snapshot: l.snapshot.clone(),
                unit_price: l.unit_price,
                quantity: l.quantity,
                total_price: total_price.unwrap_or_default(),
                fulfillment_status: FulfillmentStatus::Pending,
                fulfilled_at: None,
                tracking_number: None,
            })
            .collect();

        Ok(vec![OrderEvent::OrderPlaced(OrderPlaced {
            order_id: cmd.order_id,
            order_number: cmd.order_number.clone(),
            customer_id: cmd.customer_id,
            contact: cmd.contact.clone(),
            amounts: cmd.amounts,
            items,
            payment_method: cmd.payment_method.clone(),
            shipping_method: cmd.shipping_method.clone(),
            customer_notes: cmd.customer_notes.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_status(&self, cmd: &ChangeStatus) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_created()?;
        self.ensure_order_id(cmd.order_id)?;

        // Never confirm to a customer that someone else's order exists.
        if cmd.actor.is_customer() && self.customer_id != Some(cmd.actor.user_id) {
            return Err(DomainError::not_found().into());
        }

        let transition =
            OrderStateMachine::evaluate(self.status, cmd.requested, cmd.actor.role, cmd.mode)?;

        if transition.to == OrderStatus::Shipped
            && cmd.tracking_number.is_none()
            && self.tracking_number.is_none()
        {
            return Err(DomainError::validation("tracking_number is required when marking as shipped").into());
        }
        if too_long(&cmd.note, MAX_NOTES) {
            return Err(DomainError::validation(format!("notes may not exceed {MAX_NOTES} characters")).into());
        }

        let active = self.active_item_ids();
        let cancelled_items = if transition.to == OrderStatus::Cancelled {
            active.clone()
        } else {
            Vec::new()
        };
        let stock = transition
            .stock
            .filter(|_| !active.is_empty())
            .map(|movement| StockEffect {
                movement,
                item_ids: active,
            });

        let mut events = vec![OrderEvent::StatusChanged(StatusChanged {
            order_id: cmd.order_id,
            from: transition.from,
            to: transition.to,
            stock,
            cancelled_items,
            note: cmd.note.clone(),
            tracking_number: cmd.tracking_number.clone(),
            occurred_at: cmd.occurred_at,
        })];

        if transition.to == OrderStatus::Refunded && self.payment_status == PaymentStatus::Paid {
            events.push(OrderEvent::PaymentRecorded(PaymentRecorded {
                order_id: cmd.order_id,
                from: PaymentStatus::Paid,
                to: PaymentStatus::Refunded,
                transaction_id: None,
                occurred_at: cmd.occurred_at,
            }));
        }

        Ok(events)
    }

    fn handle_cancel_vendor_items(&self, cmd: &CancelVendorItems) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_created()?;
        self.ensure_order_id(cmd.order_id)?;

        let plan = CancellationCoordinator::plan(self, cmd.vendor_id)?;

        let stock = plan.restock.then(|| StockEffect {
            movement: StockMovement::Restore,
            item_ids: plan.item_ids.clone(),
        });
        let mut events = vec![OrderEvent::ItemsCancelled(ItemsCancelled {
            order_id: cmd.order_id,
            vendor_id: cmd.vendor_id,
            item_ids: plan.item_ids.clone(),
            stock,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })];

        match plan.outcome {
            CancellationOutcome::RollUp => {
                events.push(OrderEvent::StatusChanged(StatusChanged {
                    order_id: cmd.order_id,
                    from: self.status,
                    to: OrderStatus::Cancelled,
                    stock: None,
                    cancelled_items: Vec::new(),
                    note: Some(CancellationCoordinator::roll_up_note(cmd.reason.as_deref())),
                    tracking_number: None,
                    occurred_at: cmd.occurred_at,
                }));
            }
            CancellationOutcome::Partial { note } => {
                events.push(OrderEvent::AdminNoteAdded(AdminNoteAdded {
                    order_id: cmd.order_id,
                    note,
                    occurred_at: cmd.occurred_at,
                }));
            }
        }

        Ok(events)
    }

    fn handle_update_fulfillment(&self, cmd: &UpdateFulfillment) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_created()?;
        self.ensure_order_id(cmd.order_id)?;

        let moves = FulfillmentRules::plan(self, cmd.vendor_id, cmd.status, cmd.tracking_number.as_deref())?;

        let mut events: Vec<OrderEvent> = moves
            .into_iter()
            .map(|(item_id, from)| {
                OrderEvent::ItemFulfillmentUpdated(ItemFulfillmentUpdated {
                    order_id: cmd.order_id,
                    vendor_id: cmd.vendor_id,
                    item_id,
                    from,
                    to: cmd.status,
                    tracking_number: cmd.tracking_number.clone(),
                    occurred_at: cmd.occurred_at,
                })
            })
            .collect();

        if let Some(notes) = cmd.notes.as_ref().filter(|n| !n.trim().is_empty()) {
            events.push(OrderEvent::AdminNoteAdded(AdminNoteAdded {
                order_id: cmd.order_id,
                note: format!("vendor {}: {}", cmd.vendor_id, notes.trim()),
                occurred_at: cmd.occurred_at,
            }));
        }

        Ok(events)
    }

    fn handle_record_payment(&self, cmd: &RecordPayment) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_created()?;
        self.ensure_order_id(cmd.order_id)?;

        if self.status.is_absorbing() {
            return Err(DomainError::validation(format!(
                "cannot record a payment on a {} order",
                self.status
            ))
            .into());
        }
        if self.payment_status == PaymentStatus::Paid {
            return Err(DomainError::validation("order is already paid").into());
        }
        if cmd.captured && cmd.transaction_id.as_deref().is_none_or(|t| t.trim().is_empty()) {
            return Err(DomainError::validation("transaction_id is required for a captured payment").into());
        }

        let to = if cmd.captured {
            PaymentStatus::Paid
        } else {
            PaymentStatus::Failed
        };

        Ok(vec![OrderEvent::PaymentRecorded(PaymentRecorded {
            order_id: cmd.order_id,
            from: self.payment_status,
            to,
            transaction_id: cmd.transaction_id.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}
