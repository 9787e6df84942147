//! `bazaar-core`: domain foundation building blocks.
//!
//! Pure primitives shared by the order and inventory crates: identifiers,
//! money, the domain error type and the aggregate traits.

pub mod aggregate;
pub mod entity;
pub mod error;
pub mod id;
pub mod money;
pub mod value_object;

pub use aggregate::{Aggregate, AggregateRoot};
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{AggregateId, OrderItemId, ProductId, UserId, VariantId, VendorId};
pub use money::Money;
pub use value_object::ValueObject;
