use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use parking_lot::{Mutex, MutexGuard, RwLock};

use bazaar_core::VariantId;
use bazaar_inventory::{LedgerEntry, StagedStock, StockChange, VariantRow};
use bazaar_orders::{Order, OrderId, format_order_number};

use super::{StoreError, TransactionalStore, TxScope, UnitOfWork};

type OrderRow = Arc<Mutex<Option<Order>>>;
type VariantHandle = Arc<Mutex<VariantRow>>;

#[derive(Debug, Default)]
struct OrderIndex {
    rows: HashMap<OrderId, OrderRow>,
    numbers: HashSet<String>,
}

#[derive(Debug, Default)]
struct Ledger {
    entries: Vec<LedgerEntry>,
    next_sequence: u64,
}

/// In-memory row store with per-row locks.
///
/// The index maps are only held long enough to find or insert a row handle;
/// they are never held while waiting on a row lock.
#[derive(Debug)]
pub struct InMemoryStore {
    lock_timeout: Duration,
    orders: RwLock<OrderIndex>,
    variants: RwLock<HashMap<VariantId, VariantHandle>>,
    ledger: Mutex<Ledger>,
    counters: Mutex<HashMap<(String, NaiveDate), u32>>,
}

impl InMemoryStore {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            lock_timeout,
            orders: RwLock::new(OrderIndex::default()),
            variants: RwLock::new(HashMap::new()),
            ledger: Mutex::new(Ledger {
                entries: Vec::new(),
                next_sequence: 1,
            }),
            counters: Mutex::new(HashMap::new()),
        }
    }

    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    fn lock<'a, T>(&self, handle: &'a Mutex<T>, what: impl FnOnce() -> String) -> Result<MutexGuard<'a, T>, StoreError> {
        handle.try_lock_for(self.lock_timeout).ok_or_else(|| {
            let what = what();
            tracing::warn!(resource = %what, timeout_ms = self.lock_timeout.as_millis() as u64, "lock wait timed out");
            StoreError::LockTimeout(what)
        })
    }

    fn order_handle(&self, id: OrderId) -> Option<OrderRow> {
        self.orders.read().rows.get(&id).cloned()
    }

    /// Handles for the variants that exist, in ascending id order.
    fn variant_handles(&self, ids: &[VariantId]) -> Vec<(VariantId, VariantHandle)> {
        let mut ids = ids.to_vec();
        ids.sort();
        ids.dedup();
        let variants = self.variants.read();
        ids.into_iter()
            .filter_map(|id| variants.get(&id).map(|h| (id, Arc::clone(h))))
            .collect()
    }

    fn lock_variants<'a>(
        &self,
        handles: &'a [(VariantId, VariantHandle)],
    ) -> Result<Vec<MutexGuard<'a, VariantRow>>, StoreError> {
        let mut guards = Vec::with_capacity(handles.len());
        for (id, handle) in handles {
            guards.push(self.lock(handle, || format!("variant {id}"))?);
        }
        Ok(guards)
    }

    fn stage(guards: &[MutexGuard<'_, VariantRow>]) -> StagedStock {
        StagedStock::new(guards.iter().map(|g| (**g).clone()))
    }

    /// Write staged rows back and commit their ledger entries. Called with
    /// every affected row lock still held.
    fn write_back(&self, guards: &mut [MutexGuard<'_, VariantRow>], stock: StagedStock) {
        let (mut rows, entries) = stock.into_parts();
        for guard in guards.iter_mut() {
            if let Some(row) = rows.remove(&guard.variant_id()) {
                **guard = row;
            }
        }
        self.commit_entries(entries);
    }

    fn commit_entries(&self, entries: Vec<StockChange>) {
        if entries.is_empty() {
            return;
        }
        let now = Utc::now();
        let mut ledger = self.ledger.lock();
        for change in entries {
            let sequence = ledger.next_sequence;
            ledger.next_sequence += 1;
            ledger.entries.push(change.commit(sequence, now));
        }
    }

    fn insert_order(&self, order: Order) -> Result<(), StoreError> {
        let mut index = self.orders.write();
        let id = order.id_typed();
        if index.rows.contains_key(&id) {
            return Err(StoreError::Duplicate(format!("order id {id}")));
        }
        if !index.numbers.insert(order.order_number().to_string()) {
            return Err(StoreError::Duplicate(format!("order number {}", order.order_number())));
        }
        index.rows.insert(id, Arc::new(Mutex::new(Some(order))));
        Ok(())
    }

    fn transact_order<T, E, F>(&self, id: OrderId, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut UnitOfWork) -> Result<T, E>,
        E: From<StoreError>,
    {
        let handle = self.order_handle(id).ok_or(StoreError::OrderNotFound(id))?;
        let mut order_guard = self.lock(&handle, || format!("order {id}"))?;
        let Some(order) = order_guard.as_ref() else {
            return Err(StoreError::OrderNotFound(id).into());
        };

        let variant_handles = self.variant_handles(&order.variant_ids());
        let mut variant_guards = self.lock_variants(&variant_handles)?;

        let mut uow = UnitOfWork::new(Some(order.clone()), Self::stage(&variant_guards));
        let value = work(&mut uow)?;

        let (order, deleted, stock) = uow.into_parts();
        if deleted {
            if let Some(order) = order_guard.take() {
                let mut index = self.orders.write();
                index.rows.remove(&id);
                index.numbers.remove(order.order_number());
            }
        } else if let Some(order) = order {
            *order_guard = Some(order);
        }
        self.write_back(&mut variant_guards, stock);

        Ok(value)
    }

    fn transact_variants<T, E, F>(&self, ids: &[VariantId], work: F) -> Result<T, E>
    where
        F: FnOnce(&mut UnitOfWork) -> Result<T, E>,
        E: From<StoreError>,
    {
        let variant_handles = self.variant_handles(ids);
        let mut variant_guards = self.lock_variants(&variant_handles)?;

        let mut uow = UnitOfWork::new(None, Self::stage(&variant_guards));
        let value = work(&mut uow)?;

        let (order, _, stock) = uow.into_parts();
        if let Some(order) = order {
            self.insert_order(order)?;
        }
        self.write_back(&mut variant_guards, stock);

        Ok(value)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(Duration::from_millis(crate::config::DEFAULT_LOCK_TIMEOUT_MS))
    }
}

impl TransactionalStore for InMemoryStore {
    fn transact<T, E, F>(&self, scope: TxScope, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut UnitOfWork) -> Result<T, E>,
        E: From<StoreError>,
    {
        match scope {
            TxScope::Order(id) => self.transact_order(id, work),
            TxScope::Variants(ids) => self.transact_variants(&ids, work),
        }
    }

    fn next_order_number(&self, prefix: &str, date: NaiveDate) -> Result<String, StoreError> {
        let mut counters = self.counters.lock();
        let seq = counters.entry((prefix.to_string(), date)).or_insert(0);
        *seq += 1;
        Ok(format_order_number(prefix, date, *seq))
    }

    fn load_order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let Some(handle) = self.order_handle(id) else {
            return Ok(None);
        };
        let guard = self.lock(&handle, || format!("order {id}"))?;
        Ok(guard.clone())
    }

    fn orders(&self) -> Result<Vec<Order>, StoreError> {
        let handles: Vec<(OrderId, OrderRow)> = self
            .orders
            .read()
            .rows
            .iter()
            .map(|(id, h)| (*id, Arc::clone(h)))
            .collect();

        let mut out = Vec::with_capacity(handles.len());
        for (id, handle) in handles {
            if let Some(order) = self.lock(&handle, || format!("order {id}"))?.clone() {
                out.push(order);
            }
        }
        Ok(out)
    }

    fn variant(&self, id: VariantId) -> Result<Option<VariantRow>, StoreError> {
        let Some(handle) = self.variants.read().get(&id).cloned() else {
            return Ok(None);
        };
        let guard = self.lock(&handle, || format!("variant {id}"))?;
        Ok(Some(guard.clone()))
    }

    fn variant_ids(&self) -> Result<Vec<VariantId>, StoreError> {
        let mut ids: Vec<VariantId> = self.variants.read().keys().copied().collect();
        ids.sort();
        Ok(ids)
    }

    fn insert_variant(&self, row: VariantRow) -> Result<(), StoreError> {
        let id = row.variant_id();
        let mut variants = self.variants.write();
        if variants.contains_key(&id) {
            return Err(StoreError::Duplicate(format!("variant {id}")));
        }
        variants.insert(id, Arc::new(Mutex::new(row)));
        Ok(())
    }

    fn ledger(&self, variant_id: Option<VariantId>) -> Result<Vec<LedgerEntry>, StoreError> {
        let ledger = self.ledger.lock();
        Ok(ledger
            .entries
            .iter()
            .filter(|e| variant_id.is_none_or(|v| e.variant_id == v))
            .cloned()
            .collect())
    }
}
