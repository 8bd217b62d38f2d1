//! Lines
//!
//! Line requests from the storefront, their validation against the catalog, the immutable
//! price snapshots stored on carts and orders, and aggregation into totals.

use std::fmt;

use rustc_hash::FxHashMap;
use rusty_money::{Money, iso::Currency};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use thiserror::Error;

use crate::{
    catalog::Catalog,
    discounts::{ActiveTagDiscounts, DiscountPercent},
    inventory::BatchReconciler,
    pricing::{PricingError, resolve_price},
    products::{ColorVariant, Product, ProductId, VariantKey},
};

/// Why a product cannot be sold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unavailable {
    /// Hidden from the storefront.
    Unpublished,

    /// No longer in the catalog.
    Deleted,

    /// Fewer units in stock than requested.
    OutOfStock {
        /// Units in stock
        available: u32,
    },
}

impl fmt::Display for Unavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unpublished => f.write_str("not currently for sale"),
            Self::Deleted => f.write_str("no longer sold"),
            Self::OutOfStock { available: 0 } => f.write_str("out of stock"),
            Self::OutOfStock { available } => write!(f, "only {available} left in stock"),
        }
    }
}

/// Errors raised while validating or pricing a line.
#[derive(Debug, Error, PartialEq)]
pub enum LineError {
    /// Quantity is below 1 or too large to represent.
    #[error("quantity {quantity} for product {product} must be between 1 and {}", u32::MAX)]
    InvalidQuantity {
        /// Product the line refers to
        product: ProductId,
        /// Requested quantity
        quantity: i64,
    },

    /// Product is unpublished, deleted, or out of stock.
    #[error("{name} is {reason}")]
    ProductUnavailable {
        /// Product the line refers to
        product: ProductId,
        /// Product title, or the id when the product is gone
        name: String,
        /// Why it is unavailable
        reason: Unavailable,
    },

    /// The requested colour variant is not offered.
    #[error("{name} does not come in {variant}")]
    UnknownVariant {
        /// Product the line refers to
        product: ProductId,
        /// Product title
        name: String,
        /// Requested variant
        variant: VariantKey,
    },

    /// Product is priced in a different currency from the cart or order.
    #[error("product {product} is priced in {actual}, but the order uses {expected}")]
    CurrencyMismatch {
        /// Product the line refers to
        product: ProductId,
        /// Currency of the cart or order
        expected: &'static str,
        /// Currency of the product
        actual: &'static str,
    },

    /// A line or order total does not fit in minor units.
    #[error("totals for product {0} overflowed")]
    Overflow(ProductId),

    /// Wrapped price resolution error.
    #[error(transparent)]
    Pricing(#[from] PricingError),
}

impl LineError {
    /// The product the error concerns.
    pub fn product(&self) -> Option<&ProductId> {
        match self {
            Self::InvalidQuantity { product, .. }
            | Self::ProductUnavailable { product, .. }
            | Self::UnknownVariant { product, .. }
            | Self::CurrencyMismatch { product, .. }
            | Self::Overflow(product)
            | Self::Pricing(PricingError::InvalidProductState { product, .. }) => Some(product),
            Self::Pricing(PricingError::Discount(_)) => None,
        }
    }
}

/// A line as submitted by the cart or checkout endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineRequest {
    /// Product to buy
    pub product_id: ProductId,

    /// Requested quantity
    pub quantity: i64,

    /// Chosen colour variant, by colour code or name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_variant: Option<VariantKey>,
}

impl LineRequest {
    /// Create a request without a variant.
    pub fn new(product_id: impl Into<ProductId>, quantity: i64) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
            color_variant: None,
        }
    }

    /// Choose a colour variant.
    #[must_use]
    pub fn with_variant(mut self, variant: impl Into<VariantKey>) -> Self {
        self.color_variant = Some(variant.into());
        self
    }
}

/// Identity of a cart line: product plus canonical variant key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LineKey {
    /// Product
    pub product_id: ProductId,

    /// Canonical variant key
    pub variant: Option<VariantKey>,
}

impl LineKey {
    /// Create a line key.
    pub fn new(product_id: impl Into<ProductId>, variant: Option<VariantKey>) -> Self {
        Self {
            product_id: product_id.into(),
            variant,
        }
    }

    /// The same key with a variant given by name mapped onto its canonical key.
    ///
    /// Keys for products or variants the catalog does not know are returned as given.
    #[must_use]
    pub fn canonical(&self, catalog: &Catalog<'_>) -> Self {
        let variant = self.variant.as_ref().map(|requested| {
            catalog
                .get_by_id(&self.product_id)
                .and_then(|product| product.variant(requested))
                .map_or_else(|| requested.clone(), ColorVariant::key)
        });

        Self::new(self.product_id.clone(), variant)
    }
}

impl fmt::Display for LineKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.variant {
            Some(variant) => write!(f, "{} ({variant})", self.product_id),
            None => write!(f, "{}", self.product_id),
        }
    }
}

/// A product, quantity and optional variant, before validation.
#[derive(Debug, Clone)]
pub struct LineInput<'c, 'a> {
    /// Product to price
    pub product: &'c Product<'a>,

    /// Requested quantity
    pub quantity: i64,

    /// Requested variant
    pub variant: Option<VariantKey>,
}

impl<'c, 'a> LineInput<'c, 'a> {
    /// Create an input without a variant.
    pub fn new(product: &'c Product<'a>, quantity: i64) -> Self {
        Self {
            product,
            quantity,
            variant: None,
        }
    }

    /// Choose a colour variant.
    #[must_use]
    pub fn with_variant(mut self, variant: impl Into<VariantKey>) -> Self {
        self.variant = Some(variant.into());
        self
    }

    /// Look up the product a request refers to.
    ///
    /// # Errors
    ///
    /// Returns [`LineError::ProductUnavailable`] if the product is not in the catalog.
    pub fn from_request(catalog: &'c Catalog<'a>, request: &LineRequest) -> Result<Self, LineError> {
        let product = catalog.get_by_id(&request.product_id).ok_or_else(|| {
            LineError::ProductUnavailable {
                product: request.product_id.clone(),
                name: request.product_id.to_string(),
                reason: Unavailable::Deleted,
            }
        })?;

        Ok(Self {
            product,
            quantity: request.quantity,
            variant: request.color_variant.clone(),
        })
    }

    /// Check quantity, publication and variant.
    ///
    /// # Errors
    ///
    /// Returns [`LineError::InvalidQuantity`], [`LineError::ProductUnavailable`] or
    /// [`LineError::UnknownVariant`].
    pub fn validate(&self) -> Result<ValidLine<'c, 'a>, LineError> {
        let product = self.product;

        let quantity = u32::try_from(self.quantity)
            .ok()
            .filter(|quantity| *quantity >= 1)
            .ok_or_else(|| LineError::InvalidQuantity {
                product: product.id.clone(),
                quantity: self.quantity,
            })?;

        if !product.published {
            return Err(LineError::ProductUnavailable {
                product: product.id.clone(),
                name: product.name.clone(),
                reason: Unavailable::Unpublished,
            });
        }

        let variant = match &self.variant {
            Some(key) => Some(product.variant(key).ok_or_else(|| LineError::UnknownVariant {
                product: product.id.clone(),
                name: product.name.clone(),
                variant: key.clone(),
            })?),
            None => None,
        };

        Ok(ValidLine {
            product,
            quantity,
            variant,
        })
    }
}

/// A line whose quantity, product and variant have been checked.
#[derive(Debug, Clone, Copy)]
pub struct ValidLine<'c, 'a> {
    /// Product to price
    pub product: &'c Product<'a>,

    /// Quantity, at least 1
    pub quantity: u32,

    /// Chosen variant
    pub variant: Option<&'c ColorVariant>,
}

impl<'a> ValidLine<'_, 'a> {
    /// Canonical key for this line.
    #[must_use]
    pub fn key(&self) -> LineKey {
        LineKey::new(self.product.id.clone(), self.variant.map(ColorVariant::key))
    }

    /// Price the line at `quantity` units and freeze the result.
    ///
    /// # Errors
    ///
    /// Returns [`LineError::CurrencyMismatch`], [`LineError::Overflow`] or a wrapped
    /// [`PricingError`].
    pub fn snapshot(
        &self,
        quantity: u32,
        tag_discounts: &ActiveTagDiscounts,
        currency: &'a Currency,
    ) -> Result<LineSnapshot<'a>, LineError> {
        let product = self.product;

        if let Some(actual) = product.currency()
            && actual != currency
        {
            return Err(LineError::CurrencyMismatch {
                product: product.id.clone(),
                expected: currency.iso_alpha_code,
                actual: actual.iso_alpha_code,
            });
        }

        let resolved = resolve_price(product, tag_discounts)?;
        let overflow = || LineError::Overflow(product.id.clone());

        let line_total = resolved
            .effective_price
            .to_minor_units()
            .checked_mul(i64::from(quantity))
            .ok_or_else(overflow)?;

        let original_line_total = resolved
            .base_price
            .to_minor_units()
            .checked_mul(i64::from(quantity))
            .ok_or_else(overflow)?;

        Ok(LineSnapshot {
            product_id: product.id.clone(),
            name: product.name.clone(),
            variant: self.variant.map(ColorVariant::key),
            variant_name: self.variant.map(|variant| variant.name.clone()),
            unit_price: resolved.effective_price,
            original_price: resolved.base_price,
            discount_percent: resolved.applied_discount,
            quantity,
            line_total: Money::from_minor(line_total, currency),
            original_line_total: Money::from_minor(original_line_total, currency),
        })
    }
}

/// Point-in-time copy of a priced line. Once written to an order it is never repriced.
#[derive(Debug, Clone, PartialEq)]
pub struct LineSnapshot<'a> {
    product_id: ProductId,
    name: String,
    variant: Option<VariantKey>,
    variant_name: Option<String>,
    unit_price: Money<'a, Currency>,
    original_price: Money<'a, Currency>,
    discount_percent: DiscountPercent,
    quantity: u32,
    line_total: Money<'a, Currency>,
    original_line_total: Money<'a, Currency>,
}

impl<'a> LineSnapshot<'a> {
    /// Product id
    #[must_use]
    pub fn product_id(&self) -> &ProductId {
        &self.product_id
    }

    /// Product title at the time of pricing
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Canonical variant key
    #[must_use]
    pub fn variant(&self) -> Option<&VariantKey> {
        self.variant.as_ref()
    }

    /// Variant display name
    #[must_use]
    pub fn variant_name(&self) -> Option<&str> {
        self.variant_name.as_deref()
    }

    /// Effective unit price
    #[must_use]
    pub fn unit_price(&self) -> Money<'a, Currency> {
        self.unit_price
    }

    /// Base unit price
    #[must_use]
    pub fn original_price(&self) -> Money<'a, Currency> {
        self.original_price
    }

    /// Applied discount
    #[must_use]
    pub fn discount_percent(&self) -> DiscountPercent {
        self.discount_percent
    }

    /// Quantity
    #[must_use]
    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    /// `unit_price * quantity`
    #[must_use]
    pub fn line_total(&self) -> Money<'a, Currency> {
        self.line_total
    }

    /// `original_price * quantity`
    #[must_use]
    pub fn original_line_total(&self) -> Money<'a, Currency> {
        self.original_line_total
    }

    /// `max(0, original_line_total - line_total)`, in minor units.
    #[must_use]
    pub fn savings_minor(&self) -> i64 {
        self.original_line_total
            .to_minor_units()
            .saturating_sub(self.line_total.to_minor_units())
            .max(0)
    }

    /// Key of the cart line this snapshot belongs to.
    #[must_use]
    pub fn key(&self) -> LineKey {
        LineKey::new(self.product_id.clone(), self.variant.clone())
    }

    /// The request that would reproduce this line.
    #[must_use]
    pub fn to_request(&self) -> LineRequest {
        LineRequest {
            product_id: self.product_id.clone(),
            quantity: i64::from(self.quantity),
            color_variant: self.variant.clone(),
        }
    }
}

/// Priced lines with their subtotal and discount total.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate<'a> {
    lines: SmallVec<[LineSnapshot<'a>; 8]>,
    subtotal: Money<'a, Currency>,
    total_discount: Money<'a, Currency>,
    currency: &'a Currency,
}

impl<'a> Aggregate<'a> {
    /// Sum already-priced lines.
    ///
    /// # Errors
    ///
    /// Returns [`LineError::Overflow`] if a total does not fit in minor units.
    pub fn from_snapshots(
        lines: impl IntoIterator<Item = LineSnapshot<'a>>,
        currency: &'a Currency,
    ) -> Result<Self, LineError> {
        let lines: SmallVec<[LineSnapshot<'a>; 8]> = lines.into_iter().collect();

        let mut subtotal: i64 = 0;
        let mut total_discount: i64 = 0;

        for line in &lines {
            let overflow = || LineError::Overflow(line.product_id.clone());

            subtotal = subtotal
                .checked_add(line.line_total.to_minor_units())
                .ok_or_else(overflow)?;

            total_discount = total_discount
                .checked_add(line.savings_minor())
                .ok_or_else(overflow)?;
        }

        Ok(Self {
            lines,
            subtotal: Money::from_minor(subtotal, currency),
            total_discount: Money::from_minor(total_discount, currency),
            currency,
        })
    }

    /// Priced lines, in request order
    #[must_use]
    pub fn lines(&self) -> &[LineSnapshot<'a>] {
        &self.lines
    }

    /// Take ownership of the priced lines.
    #[must_use]
    pub fn into_lines(self) -> SmallVec<[LineSnapshot<'a>; 8]> {
        self.lines
    }

    /// `Σ line_total`
    #[must_use]
    pub fn subtotal(&self) -> Money<'a, Currency> {
        self.subtotal
    }

    /// `Σ max(0, original_line_total - line_total)`
    #[must_use]
    pub fn total_discount(&self) -> Money<'a, Currency> {
        self.total_discount
    }

    /// Currency of every amount
    #[must_use]
    pub fn currency(&self) -> &'a Currency {
        self.currency
    }

    /// Whether there are no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Validate, stock-check and price a set of lines.
///
/// Stock is checked through a [`BatchReconciler`] as a fresh decrement, so two lines for the
/// same product cannot together exceed its stock. The first failing line aborts the call.
///
/// # Errors
///
/// Returns the first [`LineError`] encountered. A line that exceeds stock is reported as
/// [`LineError::ProductUnavailable`] with [`Unavailable::OutOfStock`].
pub fn aggregate<'a>(
    lines: &[LineInput<'_, 'a>],
    tag_discounts: &ActiveTagDiscounts,
    currency: &'a Currency,
) -> Result<Aggregate<'a>, LineError> {
    let mut reconciler = BatchReconciler::new();
    let mut snapshots: SmallVec<[LineSnapshot<'a>; 8]> = SmallVec::with_capacity(lines.len());

    for input in lines {
        let line = input.validate()?;
        let product = line.product;

        reconciler
            .push(
                &product.id,
                line.variant.map(ColorVariant::key).as_ref(),
                0,
                line.quantity,
                product.stock,
            )
            .map_err(|shortfall| LineError::ProductUnavailable {
                product: product.id.clone(),
                name: product.name.clone(),
                reason: Unavailable::OutOfStock {
                    available: shortfall.available,
                },
            })?;

        snapshots.push(line.snapshot(line.quantity, tag_discounts, currency)?);
    }

    Aggregate::from_snapshots(snapshots, currency)
}

/// Validate requests and merge those sharing a key, keeping first-seen order.
pub(crate) fn merge_requests<'c, 'a>(
    catalog: &'c Catalog<'a>,
    requests: &[LineRequest],
) -> Result<Vec<(LineKey, ValidLine<'c, 'a>)>, LineError> {
    let mut merged: Vec<(LineKey, ValidLine<'c, 'a>)> = Vec::with_capacity(requests.len());
    let mut positions: FxHashMap<LineKey, usize> = FxHashMap::default();

    for request in requests {
        let line = LineInput::from_request(catalog, request)?.validate()?;
        let key = line.key();

        match positions.get(&key).and_then(|position| merged.get_mut(*position)) {
            Some((_, existing)) => {
                existing.quantity = existing.quantity.checked_add(line.quantity).ok_or_else(
                    || LineError::InvalidQuantity {
                        product: key.product_id.clone(),
                        quantity: request.quantity,
                    },
                )?;
            }
            None => {
                positions.insert(key.clone(), merged.len());
                merged.push((key, line));
            }
        }
    }

    Ok(merged)
}

/// Resolve requests against the catalog, then [`aggregate`] them.
///
/// # Errors
///
/// Returns the first [`LineError`] encountered, including deleted products.
pub fn aggregate_requests<'a>(
    catalog: &Catalog<'a>,
    requests: &[LineRequest],
    tag_discounts: &ActiveTagDiscounts,
    currency: &'a Currency,
) -> Result<Aggregate<'a>, LineError> {
    let inputs = requests
        .iter()
        .map(|request| LineInput::from_request(catalog, request))
        .collect::<Result<Vec<_>, _>>()?;

    aggregate(&inputs, tag_discounts, currency)
}
