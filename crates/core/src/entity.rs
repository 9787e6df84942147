//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Order lines are entities: two lines with identical product data are still
/// distinct if their ids differ.
pub trait Entity {
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;
}
