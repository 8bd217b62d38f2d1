//! Pricing
//!
//! Resolves the effective unit price of a product: its base price less the larger of its own
//! discount and the best active discount among its tags. Discounts never stack.

use rusty_money::{Money, iso::Currency};
use thiserror::Error;

use crate::{
    discounts::{ActiveTagDiscounts, DiscountError, DiscountPercent, discounted_minor},
    products::{Product, ProductId},
    tags::collection::TagCollection,
};

/// Errors that can occur while resolving a price.
#[derive(Debug, Error, PartialEq)]
pub enum PricingError {
    /// The stored product record cannot be priced.
    #[error("product {product} cannot be priced: {reason}")]
    InvalidProductState {
        /// Offending product
        product: ProductId,
        /// What is wrong with the record
        reason: &'static str,
    },

    /// Wrapped discount arithmetic error.
    #[error(transparent)]
    Discount(#[from] DiscountError),
}

/// Where an applied discount came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscountSource {
    /// No discount applies.
    None,

    /// The product's own discount.
    Product,

    /// A tag discount, by tag.
    Tag(String),
}

/// An effective unit price.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPrice<'a> {
    /// Base price before any discount
    pub base_price: Money<'a, Currency>,

    /// Base price less the applied discount
    pub effective_price: Money<'a, Currency>,

    /// Discount that was applied
    pub applied_discount: DiscountPercent,

    /// Where the applied discount came from
    pub source: DiscountSource,
}

/// Resolve the effective unit price of a product.
///
/// `applied = max(product discount, max(tag discounts))`, and
/// `effective = round(price * (1 - applied / 100))`, rounding halves up. When the product's
/// own discount ties with a tag discount, the product is reported as the source.
///
/// # Errors
///
/// Returns [`PricingError::InvalidProductState`] if the price is missing or negative, or if
/// the product's own discount is outside 0-100.
pub fn resolve_price<'a, T: TagCollection>(
    product: &Product<'a, T>,
    tag_discounts: &ActiveTagDiscounts,
) -> Result<ResolvedPrice<'a>, PricingError> {
    let invalid = |reason| PricingError::InvalidProductState {
        product: product.id.clone(),
        reason,
    };

    let base_price = product.price.ok_or_else(|| invalid("price is missing"))?;
    let base_minor = base_price.to_minor_units();

    if base_minor < 0 {
        return Err(invalid("price is negative"));
    }

    let own = match product.discount {
        Some(points) => {
            DiscountPercent::new(points).map_err(|_err| invalid("discount is outside 0-100"))?
        }
        None => DiscountPercent::ZERO,
    };

    let best_tag = product
        .tags
        .iter()
        .filter_map(|tag| tag_discounts.get(tag).map(|percent| (tag, percent)))
        .max_by_key(|(_, percent)| *percent);

    let (applied_discount, source) = match best_tag {
        Some((tag, percent)) if percent > own => (percent, DiscountSource::Tag(tag.to_string())),
        _ if !own.is_zero() => (own, DiscountSource::Product),
        _ => (DiscountPercent::ZERO, DiscountSource::None),
    };

    let effective_minor = discounted_minor(base_minor, applied_discount)?;

    Ok(ResolvedPrice {
        base_price,
        effective_price: Money::from_minor(effective_minor, base_price.currency()),
        applied_discount,
        source,
    })
}
