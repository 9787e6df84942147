//! Infrastructure layer: transactional storage, the order service, config.

pub mod config;
pub mod error;
pub mod requests;
pub mod service;
pub mod store;


pub use config::{ConfigError, EngineConfig};
pub use error::ServiceError;
pub use requests::{
    CreateOrderRequest, FulfillmentUpdate, OrderLineRequest, PaymentResult, StatusUpdate,
    StockAdjusted, StockAdjustment, StockDrift, VariantSeed, VendorCancellation,
};
pub use service::OrderService;
pub use store::{InMemoryStore, StoreError, TransactionalStore, TxScope, UnitOfWork};
