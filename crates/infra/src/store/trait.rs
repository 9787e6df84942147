use chrono::NaiveDate;
use thiserror::Error;

use bazaar_core::VariantId;
use bazaar_inventory::{LedgerEntry, VariantRow};
use bazaar_orders::{Order, OrderId};

use super::UnitOfWork;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("timed out waiting for a lock on {0}")]
    LockTimeout(String),

    #[error("order {0} not found")]
    OrderNotFound(OrderId),

    #[error("duplicate {0}")]
    Duplicate(String),
}

/// Which rows a unit of work locks before it runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxScope {
    /// The order row, then every variant row its lines reference.
    Order(OrderId),
    /// Only the named variant rows. An order staged in this scope is inserted
    /// as a new row on commit.
    Variants(Vec<VariantId>),
}

/// Row-locking storage boundary.
///
/// Lock order is fixed: the order row first, then variant rows in ascending id
/// order. Waiting for any single lock is bounded; a timeout aborts the unit of
/// work with [`StoreError::LockTimeout`] and nothing is written.
pub trait TransactionalStore: Send + Sync {
    /// Run `work` against staged copies of the rows in `scope`.
    ///
    /// `Ok` commits the staged order, variant rows and ledger entries together.
    /// `Err` discards all of them.
    fn transact<T, E, F>(&self, scope: TxScope, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut UnitOfWork) -> Result<T, E>,
        E: From<StoreError>;

    /// Allocate the next order number for `date`. Numbers are never reused,
    /// even if the unit of work that asked for one aborts.
    fn next_order_number(&self, prefix: &str, date: NaiveDate) -> Result<String, StoreError>;

    /// Consistent snapshot of one order.
    fn load_order(&self, id: OrderId) -> Result<Option<Order>, StoreError>;

    /// Snapshot of every order. Each order is individually consistent.
    fn orders(&self) -> Result<Vec<Order>, StoreError>;

    fn variant(&self, id: VariantId) -> Result<Option<VariantRow>, StoreError>;

    fn variant_ids(&self) -> Result<Vec<VariantId>, StoreError>;

    /// Register a catalog variant. Its stock must start at zero; initial
    /// stock goes through the ledger like every other change.
    fn insert_variant(&self, row: VariantRow) -> Result<(), StoreError>;

    /// Committed ledger entries in sequence order, optionally for one variant.
    fn ledger(&self, variant_id: Option<VariantId>) -> Result<Vec<LedgerEntry>, StoreError>;
}
