//! Discounts
//!
//! Percent points, tag discounts, and the minor-unit arithmetic shared by pricing and tax.

use std::fmt;

use jiff::Timestamp;
use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::tags::normalize_tag;

/// Errors specific to discount calculations.
#[derive(Debug, Error, PartialEq)]
pub enum DiscountError {
    /// A discount percentage outside 0-100.
    #[error("discount of {0}% is outside 0-100")]
    OutOfRange(Decimal),

    /// Percentage calculation could not be represented in minor units.
    #[error("percentage calculation overflowed")]
    PercentConversion,
}

/// A discount in percent points, guaranteed to be within 0-100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct DiscountPercent(Decimal);

impl DiscountPercent {
    /// No discount.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a discount from percent points.
    ///
    /// # Errors
    ///
    /// Returns [`DiscountError::OutOfRange`] if `points` is negative or above 100.
    pub fn new(points: impl Into<Decimal>) -> Result<Self, DiscountError> {
        let points = points.into();

        if points < Decimal::ZERO || points > Decimal::ONE_HUNDRED {
            return Err(DiscountError::OutOfRange(points));
        }

        Ok(Self(points.normalize()))
    }

    /// Percent points, e.g. `20` for 20%.
    #[must_use]
    pub fn points(self) -> Decimal {
        self.0
    }

    /// Whether this is a zero discount.
    #[must_use]
    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }
}

impl fmt::Display for DiscountPercent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// An admin-managed discount applied to every product carrying a tag.
#[derive(Debug, Clone, PartialEq)]
pub struct TagDiscount {
    tag: String,
    percent: DiscountPercent,
    active: bool,
    starts_at: Option<Timestamp>,
    ends_at: Option<Timestamp>,
}

impl TagDiscount {
    /// Create an active, open-ended tag discount.
    pub fn new(tag: &str, percent: DiscountPercent) -> Self {
        Self {
            tag: normalize_tag(tag),
            percent,
            active: true,
            starts_at: None,
            ends_at: None,
        }
    }

    /// Set the active flag.
    #[must_use]
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Restrict the discount to a validity window. Either end may be open.
    #[must_use]
    pub fn with_window(mut self, starts_at: Option<Timestamp>, ends_at: Option<Timestamp>) -> Self {
        self.starts_at = starts_at;
        self.ends_at = ends_at;
        self
    }

    /// The lower-cased tag.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// The discount percentage.
    #[must_use]
    pub fn percent(&self) -> DiscountPercent {
        self.percent
    }

    /// Whether the discount applies at `now`: flagged active, and `starts_at <= now < ends_at`.
    #[must_use]
    pub fn is_active_at(&self, now: Timestamp) -> bool {
        self.active
            && self.starts_at.is_none_or(|starts_at| starts_at <= now)
            && self.ends_at.is_none_or(|ends_at| now < ends_at)
    }
}

/// Currently active tag discounts keyed by lower-cased tag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActiveTagDiscounts {
    by_tag: FxHashMap<String, DiscountPercent>,
}

impl ActiveTagDiscounts {
    /// An empty set of discounts.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Keep the discounts active at `now`. If a tag appears twice, the larger percent wins.
    pub fn active_at<'d>(discounts: impl IntoIterator<Item = &'d TagDiscount>, now: Timestamp) -> Self {
        discounts
            .into_iter()
            .filter(|discount| discount.is_active_at(now))
            .map(|discount| (discount.tag.clone(), discount.percent))
            .collect()
    }

    /// Insert a discount for a tag, keeping the larger percent on collision.
    pub fn insert(&mut self, tag: &str, percent: DiscountPercent) {
        let entry = self.by_tag.entry(normalize_tag(tag)).or_default();

        *entry = (*entry).max(percent);
    }

    /// Discount for a tag, if one is active.
    pub fn get(&self, tag: &str) -> Option<DiscountPercent> {
        self.by_tag.get(&normalize_tag(tag)).copied()
    }

    /// Number of active tags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_tag.len()
    }

    /// Whether no discounts are active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_tag.is_empty()
    }
}

impl FromIterator<(String, DiscountPercent)> for ActiveTagDiscounts {
    fn from_iter<I: IntoIterator<Item = (String, DiscountPercent)>>(iter: I) -> Self {
        let mut discounts = Self::default();

        for (tag, percent) in iter {
            discounts.insert(&tag, percent);
        }

        discounts
    }
}

/// Round a non-negative decimal to whole minor units, halves going up.
fn round_minor(value: Decimal) -> Result<i64, DiscountError> {
    value
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or(DiscountError::PercentConversion)
}

/// Calculate `percent` percent of an amount in minor units, rounded half-up.
///
/// # Errors
///
/// Returns [`DiscountError::PercentConversion`] if the result cannot be represented.
pub fn percent_of_minor(minor: i64, percent: Decimal) -> Result<i64, DiscountError> {
    let applied = Decimal::from(minor)
        .checked_mul(percent)
        .and_then(|value| value.checked_div(Decimal::ONE_HUNDRED))
        .ok_or(DiscountError::PercentConversion)?;

    round_minor(applied)
}

/// Apply a percentage discount to an amount in minor units: `round(minor * (1 - percent/100))`.
///
/// # Errors
///
/// Returns [`DiscountError::PercentConversion`] if the result cannot be represented.
pub fn discounted_minor(minor: i64, percent: DiscountPercent) -> Result<i64, DiscountError> {
    let remaining = Decimal::ONE_HUNDRED - percent.points();

    percent_of_minor(minor, remaining)
}

/// Parse a percentage string such as `"15%"` or `"12.5"` into percent points.
///
/// # Errors
///
/// Returns [`DiscountError::PercentConversion`] if the string is not a number.
pub fn parse_percent_points(s: &str) -> Result<Decimal, DiscountError> {
    let trimmed = s.trim();
    let number = trimmed.strip_suffix('%').unwrap_or(trimmed).trim();

    number
        .parse::<Decimal>()
        .map_err(|_err| DiscountError::PercentConversion)
}
