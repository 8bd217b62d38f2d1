//! Tag Collection

use std::fmt;

/// Trait for the tag sets attached to products.
pub trait TagCollection: Clone + fmt::Debug + PartialEq {
    /// Create an empty collection.
    fn empty() -> Self;

    /// Iterate over the (lower-cased) tags in this collection.
    fn iter(&self) -> impl Iterator<Item = &str>;

    /// Check if this collection is empty.
    fn is_empty(&self) -> bool;

    /// Get the number of tags in this collection.
    fn len(&self) -> usize;
}
