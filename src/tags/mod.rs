//! Tags
//!
//! Products carry tags that tag discounts are keyed on. Tags are compared case-insensitively,
//! so every collection stores them lower-cased.

pub mod collection;
pub mod string;

/// Normalise a tag for storage and lookup.
pub fn normalize_tag(tag: &str) -> String {
    tag.trim().to_lowercase()
}
