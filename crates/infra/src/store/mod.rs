//! Transactional row storage for orders, variant stock and the stock ledger.
//!
//! Every mutating engine operation runs inside exactly one unit of work. The
//! unit of work works on staged copies of locked rows; nothing is visible to
//! other threads until the closure returns `Ok` and the store writes back.

pub mod in_memory;
pub mod r#trait;
pub mod unit_of_work;

pub use in_memory::InMemoryStore;
pub use r#trait::{StoreError, TransactionalStore, TxScope};
pub use unit_of_work::UnitOfWork;
