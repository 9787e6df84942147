//! Orders domain module.
//!
//! Order lifecycle, vendor-scoped cancellation and fulfillment, implemented
//! purely as deterministic domain logic (no IO, no HTTP, no storage). Stock
//! effects are described by the emitted events and carried out by the caller's
//! unit of work through `bazaar-inventory`.

pub mod amounts;
pub mod cancellation;
pub mod customer;
pub mod fulfillment;
pub mod invoice;
pub mod notification;
pub mod number;
pub mod order;
pub mod state_machine;
pub mod status;
pub mod visibility;

#[cfg(test)]
pub(crate) mod fixtures;

pub use amounts::OrderAmounts;
pub use cancellation::{CancellationCoordinator, CancellationOutcome, CancellationPlan};
pub use customer::{Address, CustomerContact};
pub use fulfillment::FulfillmentRules;
pub use invoice::{InvoiceLine, InvoiceSnapshot, invoice_snapshot};
pub use notification::{DomainEvent, notifications_for};
pub use number::{DEFAULT_PREFIX, format_order_number, parse_order_number};
pub use order::{
    AdminNote, CancelVendorItems, ChangeStatus, ItemSnapshot, NewOrderItem, Order, OrderCommand,
    OrderError, OrderEvent, OrderId, OrderItem, PlaceOrder, RecordPayment, StatusTimestamps,
    StockEffect, UpdateFulfillment, MAX_LINE_QUANTITY,
};
pub use state_machine::{
    InvalidTransition, OrderStateMachine, Transition, TransitionDenial, TransitionMode,
};
pub use status::{FulfillmentStatus, OrderStatus, PaymentStatus};
pub use visibility::{OrderFilter, OrderView, Page, can_view, view_for};
