//! The engine's public operations.
//!
//! Each mutating operation is one unit of work: authorize, decide on the
//! aggregate, run the stock checks and ledger movements the decision requires,
//! commit, and only then publish notifications. Publication is best-effort; a
//! failed publish is logged and never undoes the commit.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use tracing::instrument;

use bazaar_auth::{Actor, ActorRole, require_admin, require_vendor};
use bazaar_core::{Aggregate, AggregateId, OrderItemId, VariantId, VendorId};
use bazaar_events::{Event, EventBus, EventEnvelope};
use bazaar_inventory::{
    InventoryLedger, LedgerEntry, LedgerReason, StockGuard, StockLine, StockMovement, StockRows,
    VariantRow, VariantStock, replay,
};
use bazaar_orders::{
    CancelVendorItems, ChangeStatus, DomainEvent, InvoiceSnapshot, ItemSnapshot, NewOrderItem,
    Order, OrderCommand, OrderEvent, OrderFilter, OrderId, OrderStatus, OrderView, Page,
    PlaceOrder, RecordPayment, TransitionMode, UpdateFulfillment, can_view, invoice_snapshot,
    notifications_for, view_for,
};

use crate::config::EngineConfig;
use crate::error::ServiceError;
use crate::requests::{
    CreateOrderRequest, FulfillmentUpdate, OrderLineRequest, PaymentResult, StatusUpdate,
    StockAdjusted, StockAdjustment, StockDrift, VariantSeed, VendorCancellation,
};
use crate::store::{TransactionalStore, TxScope, UnitOfWork};

/// What one committed order command did.
#[derive(Debug, Clone)]
struct Executed {
    before: Order,
    after: Order,
    events: Vec<OrderEvent>,
    restored: Vec<VariantId>,
}

#[derive(Debug, Default)]
struct StockApplied {
    restored: Vec<VariantId>,
    notifications: Vec<DomainEvent>,
}

pub struct OrderService<S, B> {
    store: S,
    bus: B,
    config: EngineConfig,
    outbound_sequence: AtomicU64,
}

impl<S, B> OrderService<S, B>
where
    S: TransactionalStore,
    B: EventBus<EventEnvelope<DomainEvent>>,
{
    pub fn new(store: S, bus: B, config: EngineConfig) -> Self {
        Self {
            store,
            bus,
            config,
            outbound_sequence: AtomicU64::new(0),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[instrument(skip(self, actor, request), fields(role = %actor.role, lines = request.items.len()), err)]
    pub fn create_order(&self, actor: &Actor, request: CreateOrderRequest) -> Result<OrderView, ServiceError> {
        if actor.role == ActorRole::Vendor {
            return Err(ServiceError::validation("vendor accounts cannot place orders"));
        }

        let at = Utc::now();
        let order_id = OrderId::new(AggregateId::new());
        let mut variant_ids: Vec<VariantId> = request.items.iter().filter_map(|l| l.variant_id).collect();
        variant_ids.sort();
        variant_ids.dedup();
        let order_number = self
            .store
            .next_order_number(&self.config.order_number_prefix, at.date_naive())?;

        let (order, events) = self.store.transact(TxScope::Variants(variant_ids), |uow| {
            let items = resolve_lines(uow, &request.items)?;
            let lines: Vec<StockLine> = items
                .iter()
                .map(|i| StockLine {
                    product_id: i.snapshot.product_id,
                    variant_id: i.snapshot.variant_id,
                    quantity: i.quantity,
                })
                .collect();

            let mut order = Order::empty(order_id);
            let events = order.execute(&OrderCommand::PlaceOrder(PlaceOrder {
                order_id,
                order_number: order_number.clone(),
                customer_id: actor.user_id,
                contact: request.contact.clone(),
                amounts: request.amounts,
                items,
                payment_method: request.payment_method.clone(),
                shipping_method: request.shipping_method.clone(),
                customer_notes: request.customer_notes.clone(),
                occurred_at: at,
            }))?;

            // Advisory here; confirmation checks again under the same locks.
            StockGuard::validate(uow.stock(), &lines)?;

            uow.stage_order(order.clone());
            Ok::<_, ServiceError>((order, events))
        })?;

        tracing::info!(order_id = %order_id, order_number = %order.order_number(), "order created");
        self.publish(notifications_for(&Order::empty(order_id), &events));

        view_for(actor, &order).ok_or_else(|| ServiceError::Fatal("created order not visible to its creator".into()))
    }

    #[instrument(skip(self, actor), fields(role = %actor.role), err)]
    pub fn get_order(&self, actor: &Actor, order_id: OrderId) -> Result<OrderView, ServiceError> {
        self.store
            .load_order(order_id)?
            .and_then(|order| view_for(actor, &order))
            .ok_or(ServiceError::NotFoundOrUnauthorized)
    }

    /// Newest first.
    #[instrument(skip(self, actor, filter), fields(role = %actor.role), err)]
    pub fn list_orders(&self, actor: &Actor, filter: &OrderFilter) -> Result<Page<OrderView>, ServiceError> {
        let mut orders: Vec<Order> = self
            .store
            .orders()?
            .into_iter()
            .filter(|o| can_view(actor, o) && filter.matches(o))
            .collect();
        orders.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.order_number().cmp(a.order_number()))
        });
        let views: Vec<OrderView> = orders.iter().filter_map(|o| view_for(actor, o)).collect();
        Ok(Page::paginate(views, filter.page(), filter.per_page()))
    }

    pub fn confirm_order(&self, actor: &Actor, order_id: OrderId, note: Option<String>) -> Result<OrderView, ServiceError> {
        self.change_status(actor, order_id, OrderStatus::Confirmed, TransitionMode::Normal, note, None)
    }

    pub fn update_status(&self, actor: &Actor, order_id: OrderId, update: StatusUpdate) -> Result<OrderView, ServiceError> {
        self.change_status(
            actor,
            order_id,
            update.status,
            TransitionMode::Normal,
            update.notes,
            update.tracking_number,
        )
    }

    pub fn cancel_order(&self, actor: &Actor, order_id: OrderId, reason: Option<String>) -> Result<OrderView, ServiceError> {
        self.change_status(actor, order_id, OrderStatus::Cancelled, TransitionMode::Normal, reason, None)
    }

    /// Administrative cancellation from any status except cancelled.
    pub fn force_cancel_order(
        &self,
        actor: &Actor,
        order_id: OrderId,
        reason: Option<String>,
    ) -> Result<OrderView, ServiceError> {
        require_admin(actor)?;
        self.change_status(actor, order_id, OrderStatus::Cancelled, TransitionMode::Force, reason, None)
    }

    #[instrument(skip(self, actor, note, tracking_number), fields(role = %actor.role, order_id = %order_id), err)]
    fn change_status(
        &self,
        actor: &Actor,
        order_id: OrderId,
        requested: OrderStatus,
        mode: TransitionMode,
        note: Option<String>,
        tracking_number: Option<String>,
    ) -> Result<OrderView, ServiceError> {
        let executed = self.execute_on_order(actor, order_id, |_, at| {
            Ok(OrderCommand::ChangeStatus(ChangeStatus {
                order_id,
                actor: *actor,
                requested,
                mode,
                note,
                tracking_number,
                occurred_at: at,
            }))
        })?;
        tracing::info!(
            order_id = %order_id,
            from = %executed.before.status(),
            to = %executed.after.status(),
            "order status changed"
        );
        self.view(actor, &executed.after)
    }

    /// Cancel one vendor's live lines, rolling the order up to cancelled when
    /// nothing live remains.
    #[instrument(skip(self, actor, reason), fields(role = %actor.role, order_id = %order_id), err)]
    pub fn cancel_vendor_items(
        &self,
        actor: &Actor,
        order_id: OrderId,
        on_behalf_of: Option<VendorId>,
        reason: Option<String>,
    ) -> Result<VendorCancellation, ServiceError> {
        let vendor_id = require_vendor(actor, on_behalf_of)?;
        let executed = self.execute_on_order(actor, order_id, |_, at| {
            Ok(OrderCommand::CancelVendorItems(CancelVendorItems {
                order_id,
                vendor_id,
                reason,
                occurred_at: at,
            }))
        })?;

        let cancelled_items: Vec<OrderItemId> = executed
            .events
            .iter()
            .filter_map(|e| match e {
                OrderEvent::ItemsCancelled(c) => Some(c.item_ids.clone()),
                _ => None,
            })
            .flatten()
            .collect();
        let rolled_up = executed.after.status() == OrderStatus::Cancelled;
        tracing::info!(
            order_id = %order_id,
            vendor_id = %vendor_id,
            items = cancelled_items.len(),
            rolled_up,
            "vendor items cancelled"
        );

        Ok(VendorCancellation {
            order: self.view(actor, &executed.after)?,
            cancelled_items,
            restored_variant_ids: executed.restored,
            rolled_up,
        })
    }

    #[instrument(skip(self, actor, update), fields(role = %actor.role, order_id = %order_id, status = %update.status), err)]
    pub fn update_fulfillment(
        &self,
        actor: &Actor,
        order_id: OrderId,
        on_behalf_of: Option<VendorId>,
        update: FulfillmentUpdate,
    ) -> Result<OrderView, ServiceError> {
        let vendor_id = require_vendor(actor, on_behalf_of)?;
        let executed = self.execute_on_order(actor, order_id, |_, at| {
            Ok(OrderCommand::UpdateFulfillment(UpdateFulfillment {
                order_id,
                vendor_id,
                status: update.status,
                tracking_number: update.tracking_number,
                notes: update.notes,
                occurred_at: at,
            }))
        })?;
        self.view(actor, &executed.after)
    }

    #[instrument(skip(self, actor, result), fields(role = %actor.role, order_id = %order_id, captured = result.captured), err)]
    pub fn record_payment(&self, actor: &Actor, order_id: OrderId, result: PaymentResult) -> Result<OrderView, ServiceError> {
        require_admin(actor)?;
        let executed = self.execute_on_order(actor, order_id, |_, at| {
            Ok(OrderCommand::RecordPayment(RecordPayment {
                order_id,
                captured: result.captured,
                transaction_id: result.transaction_id,
                occurred_at: at,
            }))
        })?;
        self.view(actor, &executed.after)
    }

    /// Physically remove a pending order. Owner or admin only.
    #[instrument(skip(self, actor), fields(role = %actor.role, order_id = %order_id), err)]
    pub fn delete_order(&self, actor: &Actor, order_id: OrderId) -> Result<(), ServiceError> {
        self.store.transact(TxScope::Order(order_id), |uow| {
            let order = uow.order().ok_or(ServiceError::NotFoundOrUnauthorized)?;
            let owner = actor.is_customer() && order.customer_id() == Some(actor.user_id);
            if !(owner || actor.is_admin()) {
                return Err(ServiceError::NotFoundOrUnauthorized);
            }
            order.ensure_deletable()?;
            uow.delete_order();
            Ok::<_, ServiceError>(())
        })?;
        tracing::info!(order_id = %order_id, "pending order deleted");
        Ok(())
    }

    #[instrument(skip(self, actor, adjustment), fields(role = %actor.role, variant_id = %variant_id, delta = adjustment.delta), err)]
    pub fn adjust_stock(
        &self,
        actor: &Actor,
        variant_id: VariantId,
        adjustment: StockAdjustment,
    ) -> Result<StockAdjusted, ServiceError> {
        require_admin(actor)?;
        let at = Utc::now();

        let (adjusted, notifications) = self.store.transact(TxScope::Variants(vec![variant_id]), |uow| {
            let product_id = uow
                .catalog(variant_id)
                .map(|c| c.product_id)
                .ok_or(ServiceError::NotFoundOrUnauthorized)?;
            let outcome = InventoryLedger::adjust(
                uow.stock_mut(),
                variant_id,
                product_id,
                adjustment.delta,
                adjustment.reason,
                adjustment.notes,
            )?;
            let change = outcome
                .changes
                .first()
                .ok_or_else(|| ServiceError::Fatal("adjustment staged no ledger entry".into()))?;
            let stock = uow
                .stock()
                .read_variant_stock(variant_id)
                .ok_or_else(|| ServiceError::Fatal(format!("variant {variant_id} vanished mid-transaction")))?;
            let adjusted = StockAdjusted {
                variant_id,
                previous_stock: change.previous_stock,
                new_stock: change.new_stock,
                low_stock: stock.is_low(),
            };
            Ok::<_, ServiceError>((adjusted, low_stock_notifications(uow, &outcome.low_stock_crossed, at)))
        })?;

        tracing::info!(
            variant_id = %variant_id,
            previous = adjusted.previous_stock,
            new = adjusted.new_stock,
            "stock adjusted"
        );
        self.publish(notifications);
        Ok(adjusted)
    }

    /// Ledger of one variant, for admins and the vendor that owns it.
    #[instrument(skip(self, actor), fields(role = %actor.role, variant_id = %variant_id), err)]
    pub fn variant_ledger(&self, actor: &Actor, variant_id: VariantId) -> Result<Vec<LedgerEntry>, ServiceError> {
        let row = self
            .store
            .variant(variant_id)?
            .ok_or(ServiceError::NotFoundOrUnauthorized)?;
        let allowed = actor.is_admin() || actor.acting_vendor() == Some(row.catalog.vendor_id);
        if !allowed {
            return Err(ServiceError::NotFoundOrUnauthorized);
        }
        Ok(self.store.ledger(Some(variant_id))?)
    }

    /// Invoice for the whole order, or for the acting vendor's lines.
    #[instrument(skip(self, actor), fields(role = %actor.role, order_id = %order_id), err)]
    pub fn invoice(&self, actor: &Actor, order_id: OrderId) -> Result<InvoiceSnapshot, ServiceError> {
        let order = self
            .store
            .load_order(order_id)?
            .filter(|o| can_view(actor, o))
            .ok_or(ServiceError::NotFoundOrUnauthorized)?;
        Ok(invoice_snapshot(&order, actor.acting_vendor(), Utc::now().date_naive())?)
    }

    /// Add a catalog variant. Opening stock is written through the ledger.
    #[instrument(skip(self, seed), fields(variant_id = %seed.catalog.variant_id, initial_stock = seed.initial_stock), err)]
    pub fn register_variant(&self, seed: VariantSeed) -> Result<VariantRow, ServiceError> {
        if seed.initial_stock < 0 {
            return Err(ServiceError::validation("initial_stock cannot be negative"));
        }
        let threshold = seed
            .low_stock_threshold
            .unwrap_or(self.config.default_low_stock_threshold);
        if threshold < 0 {
            return Err(ServiceError::validation("low_stock_threshold cannot be negative"));
        }

        let variant_id = seed.catalog.variant_id;
        let product_id = seed.catalog.product_id;
        self.store.insert_variant(VariantRow {
            catalog: seed.catalog,
            stock: VariantStock::new(0, threshold),
        })?;

        if seed.initial_stock > 0 {
            let at = Utc::now();
            let notifications = self.store.transact(TxScope::Variants(vec![variant_id]), |uow| {
                let outcome = InventoryLedger::adjust(
                    uow.stock_mut(),
                    variant_id,
                    product_id,
                    seed.initial_stock,
                    LedgerReason::InitialStock,
                    None,
                )?;
                Ok::<_, ServiceError>(low_stock_notifications(uow, &outcome.low_stock_crossed, at))
            })?;
            self.publish(notifications);
        }

        self.store
            .variant(variant_id)?
            .ok_or_else(|| ServiceError::Fatal(format!("variant {variant_id} missing after registration")))
    }

    /// Compare every counter with the replay of its ledger.
    pub fn reconcile_stock(&self) -> Result<Vec<StockDrift>, ServiceError> {
        let replayed = replay(&self.store.ledger(None)?);
        let mut drift = Vec::new();
        for variant_id in self.store.variant_ids()? {
            let Some(row) = self.store.variant(variant_id)? else {
                continue;
            };
            let ledger = replayed.get(&variant_id).copied().unwrap_or(0);
            if ledger != row.stock.stock {
                tracing::warn!(variant_id = %variant_id, counter = row.stock.stock, ledger, "stock drift detected");
                drift.push(StockDrift {
                    variant_id,
                    counter: row.stock.stock,
                    ledger,
                });
            }
        }
        Ok(drift)
    }

    /// Run one aggregate command on a locked order, carry out its stock
    /// effects, commit, then publish.
    fn execute_on_order<F>(&self, actor: &Actor, order_id: OrderId, build: F) -> Result<Executed, ServiceError>
    where
        F: FnOnce(&Order, DateTime<Utc>) -> Result<OrderCommand, ServiceError>,
    {
        let at = Utc::now();
        let (executed, notifications) = self.store.transact(TxScope::Order(order_id), |uow| {
            let before = uow
                .order()
                .filter(|o| can_view(actor, o))
                .cloned()
                .ok_or(ServiceError::NotFoundOrUnauthorized)?;

            let command = build(&before, at)?;
            let events = uow
                .order_mut()
                .ok_or(ServiceError::NotFoundOrUnauthorized)?
                .execute(&command)?;

            let applied = apply_stock_effects(uow, &events, at)?;
            let after = uow
                .order()
                .cloned()
                .ok_or_else(|| ServiceError::Fatal("order left the unit of work".into()))?;

            let mut notifications = notifications_for(&before, &events);
            notifications.extend(applied.notifications);
            Ok::<_, ServiceError>((
                Executed {
                    before,
                    after,
                    events,
                    restored: applied.restored,
                },
                notifications,
            ))
        })?;

        self.publish(notifications);
        Ok(executed)
    }

    fn view(&self, actor: &Actor, order: &Order) -> Result<OrderView, ServiceError> {
        view_for(actor, order).ok_or(ServiceError::NotFoundOrUnauthorized)
    }

    fn publish(&self, notifications: Vec<DomainEvent>) {
        for notification in notifications {
            let (aggregate_id, aggregate_type) = notification.stream();
            let event_type = notification.event_type();
            let sequence = self.outbound_sequence.fetch_add(1, Ordering::SeqCst) + 1;
            let envelope = EventEnvelope::new(aggregate_id, aggregate_type, sequence, notification);
            if let Err(err) = self.bus.publish(envelope) {
                tracing::warn!(event_type, sequence, error = ?err, "post-commit publish failed");
            }
        }
    }
}

/// Turn request lines into order lines, snapshotting catalog identity.
fn resolve_lines(uow: &UnitOfWork, lines: &[OrderLineRequest]) -> Result<Vec<NewOrderItem>, ServiceError> {
    let mut errors = Vec::new();
    let mut items = Vec::with_capacity(lines.len());

    for (idx, line) in lines.iter().enumerate() {
        let item = match line.variant_id {
            Some(variant_id) => match uow.catalog(variant_id).filter(|c| c.is_active) {
                None => {
                    errors.push(format!("items.{idx}.variant_id does not reference an active variant"));
                    continue;
                }
                Some(c) if c.product_id != line.product_id || c.vendor_id != line.vendor_id => {
                    errors.push(format!(
                        "items.{idx}.variant_id does not belong to the given product and vendor"
                    ));
                    continue;
                }
                Some(c) => NewOrderItem {
                    item_id: OrderItemId::new(),
                    snapshot: ItemSnapshot {
                        product_id: c.product_id,
                        variant_id: Some(variant_id),
                        vendor_id: c.vendor_id,
                        product_name: c.product_name.clone(),
                        variant_name: Some(c.variant_name.clone()),
                        sku: c.sku.clone(),
                        attributes: c.attributes.clone(),
                    },
                    unit_price: c.price,
                    quantity: line.quantity,
                },
            },
            None => NewOrderItem {
                item_id: OrderItemId::new(),
                snapshot: ItemSnapshot {
                    product_id: line.product_id,
                    variant_id: None,
                    vendor_id: line.vendor_id,
                    product_name: line.product_name.clone(),
                    variant_name: line.variant_name.clone(),
                    sku: line.sku.clone(),
                    attributes: line.attributes.clone(),
                },
                unit_price: line.unit_price,
                quantity: line.quantity,
            },
        };
        items.push(item);
    }

    if errors.is_empty() {
        Ok(items)
    } else {
        Err(ServiceError::ValidationFailure(errors.join("; ")))
    }
}

/// Carry out the stock movements the committed-to-be events describe.
fn apply_stock_effects(
    uow: &mut UnitOfWork,
    events: &[OrderEvent],
    at: DateTime<Utc>,
) -> Result<StockApplied, ServiceError> {
    let mut applied = StockApplied::default();

    for event in events {
        let Some(effect) = event.stock_effect() else {
            continue;
        };
        let order = uow
            .order()
            .ok_or_else(|| ServiceError::Fatal("stock effect without an order".into()))?;
        let order_id = order.id_typed();
        let lines = order.stock_lines(&effect.item_ids);

        if effect.movement == StockMovement::Deduct {
            StockGuard::validate(uow.stock(), &lines)?;
        }

        let outcome = InventoryLedger::apply(uow.stock_mut(), Some(order_id.0), &lines, effect.movement)?;
        if effect.movement != StockMovement::Deduct {
            applied.restored.extend(outcome.touched_variants());
        }
        applied
            .notifications
            .extend(low_stock_notifications(uow, &outcome.low_stock_crossed, at));
    }

    applied.restored.sort();
    applied.restored.dedup();
    Ok(applied)
}

fn low_stock_notifications(uow: &UnitOfWork, crossed: &[VariantId], at: DateTime<Utc>) -> Vec<DomainEvent> {
    crossed
        .iter()
        .filter_map(|variant_id| {
            let row = uow.stock().row(*variant_id)?;
            tracing::info!(variant_id = %variant_id, stock = row.stock.stock, "low stock threshold crossed");
            Some(DomainEvent::LowStockCrossed {
                variant_id: *variant_id,
                stock: row.stock.stock,
                threshold: row.stock.low_stock_threshold,
                occurred_at: at,
            })
        })
        .collect()
}
