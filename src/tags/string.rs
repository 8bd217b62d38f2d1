//! String-based Tag Collection
//!
//! A sorted `SmallVec<[String; 5]>` implementation of [`TagCollection`]. Tags are lower-cased
//! on the way in so lookups against tag discounts are case-insensitive.

use smallvec::SmallVec;

use crate::tags::{collection::TagCollection, normalize_tag};

/// A string-based tag collection using `SmallVec<[String; 5]>`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StringTagCollection {
    tags: SmallVec<[String; 5]>,
}

impl StringTagCollection {
    /// Create a new collection, normalising, sorting and de-duplicating the tags.
    #[must_use]
    pub fn new(tags: impl IntoIterator<Item = String>) -> Self {
        let mut tags: SmallVec<[String; 5]> = tags
            .into_iter()
            .map(|tag| normalize_tag(&tag))
            .filter(|tag| !tag.is_empty())
            .collect();

        tags.sort();
        tags.dedup();

        Self { tags }
    }

    /// Create a new collection from string slices.
    pub fn from_strs(tags: &[&str]) -> Self {
        Self::new(tags.iter().map(ToString::to_string))
    }
}

impl TagCollection for StringTagCollection {
    fn empty() -> Self {
        Self {
            tags: SmallVec::new(),
        }
    }

    fn iter(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(String::as_str)
    }

    fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    fn len(&self) -> usize {
        self.tags.len()
    }
}
