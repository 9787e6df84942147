//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Implemented by amounts and by the address snapshot captured on an order.
/// Once attached to an order these values are never mutated in place; a
/// different value means a different object.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
