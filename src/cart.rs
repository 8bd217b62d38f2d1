//! Cart
//!
//! A user's cart and wishlist. Mutations never change the cart they are called on: they return
//! the next cart together with the stock directives that must be applied before it is stored.

use std::fmt;

use rusty_money::iso::Currency;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use thiserror::Error;

use crate::{
    catalog::Catalog,
    discounts::ActiveTagDiscounts,
    inventory::{BatchReconciler, InsufficientStock, StockDirective, reconcile},
    lines::{
        Aggregate, LineError, LineInput, LineKey, LineRequest, LineSnapshot, ValidLine,
        merge_requests,
    },
};

/// Errors that can occur while mutating a cart.
#[derive(Debug, Error, PartialEq)]
pub enum CartError {
    /// A line failed validation or pricing.
    #[error(transparent)]
    Line(#[from] LineError),

    /// Not enough stock for the requested quantity.
    #[error(transparent)]
    Stock(#[from] InsufficientStock),

    /// The cart has no line with this key.
    #[error("cart has no line for {0}")]
    LineNotFound(LineKey),
}

/// Identifier of the user owning a cart, as issued by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Create a user id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A cart after a mutation, and the directives that make stock agree with it.
#[derive(Debug, Clone, PartialEq)]
pub struct CartMutation<'a> {
    /// The cart to store once the directives are applied
    pub cart: Cart<'a>,

    /// Stock directives to apply, all or nothing
    pub directives: SmallVec<[StockDirective; 8]>,
}

/// A user's cart. Each `(product, variant)` key appears at most once.
#[derive(Debug, Clone, PartialEq)]
pub struct Cart<'a> {
    user_id: UserId,
    currency: &'a Currency,
    lines: SmallVec<[LineSnapshot<'a>; 8]>,
}

impl<'a> Cart<'a> {
    /// Create an empty cart.
    pub fn new(user_id: impl Into<UserId>, currency: &'a Currency) -> Self {
        Self {
            user_id: user_id.into(),
            currency,
            lines: SmallVec::new(),
        }
    }

    /// Owner of the cart
    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Currency every line is priced in
    #[must_use]
    pub fn currency(&self) -> &'a Currency {
        self.currency
    }

    /// Lines in the order they were added
    #[must_use]
    pub fn lines(&self) -> &[LineSnapshot<'a>] {
        &self.lines
    }

    /// Line for a key.
    pub fn get(&self, key: &LineKey) -> Option<&LineSnapshot<'a>> {
        self.lines.iter().find(|line| line.key() == *key)
    }

    /// Quantity held for a key, zero if there is no such line.
    pub fn quantity_of(&self, key: &LineKey) -> u32 {
        self.get(key).map_or(0, LineSnapshot::quantity)
    }

    /// Number of lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// The request payload that reproduces this cart.
    #[must_use]
    pub fn requests(&self) -> Vec<LineRequest> {
        self.lines.iter().map(LineSnapshot::to_request).collect()
    }

    /// Totals over the stored snapshots.
    ///
    /// # Errors
    ///
    /// Returns [`LineError::Overflow`] if a total does not fit in minor units.
    pub fn aggregate(&self) -> Result<Aggregate<'a>, LineError> {
        Aggregate::from_snapshots(self.lines.iter().cloned(), self.currency)
    }

    /// Add units of a product. An existing line with the same key has its quantity increased.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Line`] if the request is invalid, or [`CartError::Stock`] if the
    /// increase exceeds stock.
    pub fn add(
        &self,
        catalog: &Catalog<'a>,
        tag_discounts: &ActiveTagDiscounts,
        request: &LineRequest,
    ) -> Result<CartMutation<'a>, CartError> {
        let line = LineInput::from_request(catalog, request)?.validate()?;
        let key = line.key();
        let previous = self.quantity_of(&key);

        let quantity =
            previous
                .checked_add(line.quantity)
                .ok_or_else(|| LineError::InvalidQuantity {
                    product: key.product_id.clone(),
                    quantity: request.quantity,
                })?;

        self.set_line(&line, &key, previous, quantity, tag_discounts)
    }

    /// Set the quantity of an existing line.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::LineNotFound`] if there is no such line, [`CartError::Line`] if the
    /// quantity is below 1 or the product can no longer be sold, or [`CartError::Stock`] if the
    /// increase exceeds stock.
    pub fn update_quantity(
        &self,
        catalog: &Catalog<'a>,
        tag_discounts: &ActiveTagDiscounts,
        key: &LineKey,
        quantity: i64,
    ) -> Result<CartMutation<'a>, CartError> {
        let key = key.canonical(catalog);
        let previous = self
            .get(&key)
            .map(LineSnapshot::quantity)
            .ok_or_else(|| CartError::LineNotFound(key.clone()))?;

        let request = LineRequest {
            product_id: key.product_id.clone(),
            quantity,
            color_variant: key.variant.clone(),
        };

        let line = LineInput::from_request(catalog, &request)?.validate()?;

        self.set_line(&line, &key, previous, line.quantity, tag_discounts)
    }

    /// Remove a line, returning its units to stock.
    ///
    /// Lines for products deleted from the catalog are dropped without a directive.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::LineNotFound`] if there is no such line.
    pub fn remove(&self, catalog: &Catalog<'a>, key: &LineKey) -> Result<CartMutation<'a>, CartError> {
        let key = key.canonical(catalog);
        let previous = self
            .get(&key)
            .map(LineSnapshot::quantity)
            .ok_or_else(|| CartError::LineNotFound(key.clone()))?;

        let directive = match catalog.get_by_id(&key.product_id) {
            Some(product) => {
                reconcile(&product.id, key.variant.as_ref(), previous, 0, product.stock)
                    .into_result()?
            }
            None => None,
        };

        let mut cart = self.clone();
        cart.lines.retain(|line| line.key() != key);

        Ok(CartMutation {
            cart,
            directives: directive.into_iter().collect(),
        })
    }

    /// Replace the whole cart with the requested lines, all or nothing.
    ///
    /// Requests sharing a key are merged by summing their quantities. Lines missing from the
    /// request are removed. Every line is reconciled before any directive is emitted, so a
    /// single failure rejects the batch.
    ///
    /// # Errors
    ///
    /// Returns the first [`CartError`] encountered.
    pub fn replace(
        &self,
        catalog: &Catalog<'a>,
        tag_discounts: &ActiveTagDiscounts,
        requests: &[LineRequest],
    ) -> Result<CartMutation<'a>, CartError> {
        let merged = merge_requests(catalog, requests)?;
        let mut batch = BatchReconciler::new();

        for (key, line) in &merged {
            batch.push(
                &key.product_id,
                key.variant.as_ref(),
                self.quantity_of(key),
                line.quantity,
                line.product.stock,
            )?;
        }

        for existing in &self.lines {
            let key = existing.key();

            if merged.iter().any(|(merged_key, _)| *merged_key == key) {
                continue;
            }

            if let Some(product) = catalog.get_by_id(&key.product_id) {
                batch.push(
                    &product.id,
                    key.variant.as_ref(),
                    existing.quantity(),
                    0,
                    product.stock,
                )?;
            }
        }

        let lines = merged
            .iter()
            .map(|(_, line)| line.snapshot(line.quantity, tag_discounts, self.currency))
            .collect::<Result<SmallVec<_>, _>>()?;

        Ok(CartMutation {
            cart: Self {
                user_id: self.user_id.clone(),
                currency: self.currency,
                lines,
            },
            directives: batch.finish(),
        })
    }

    fn set_line(
        &self,
        line: &ValidLine<'_, 'a>,
        key: &LineKey,
        previous: u32,
        quantity: u32,
        tag_discounts: &ActiveTagDiscounts,
    ) -> Result<CartMutation<'a>, CartError> {
        let directive = reconcile(
            &key.product_id,
            key.variant.as_ref(),
            previous,
            quantity,
            line.product.stock,
        )
        .into_result()?;

        let snapshot = line.snapshot(quantity, tag_discounts, self.currency)?;

        let mut cart = self.clone();

        match cart.lines.iter_mut().find(|existing| existing.key() == *key) {
            Some(existing) => *existing = snapshot,
            None => cart.lines.push(snapshot),
        }

        Ok(CartMutation {
            cart,
            directives: directive.into_iter().collect(),
        })
    }
}

/// A user's wishlist of product and variant keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Wishlist {
    items: SmallVec<[LineKey; 8]>,
}

impl Wishlist {
    /// Create an empty wishlist.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the key if absent, remove it if present. Returns whether it is now wished for.
    ///
    /// A variant given by name is stored under its canonical key, so it toggles the same entry
    /// as its colour code.
    pub fn toggle(&mut self, catalog: &Catalog<'_>, key: &LineKey) -> bool {
        let key = key.canonical(catalog);

        if self.contains(&key) {
            self.items.retain(|item| *item != key);
            false
        } else {
            self.items.push(key);
            true
        }
    }

    /// Whether the key is wished for.
    pub fn contains(&self, key: &LineKey) -> bool {
        self.items.contains(key)
    }

    /// Iterate over wished-for keys.
    pub fn iter(&self) -> impl Iterator<Item = &LineKey> {
        self.items.iter()
    }

    /// Number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the wishlist is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Move one unit of a wished-for item into the cart.
    ///
    /// Returns the wishlist without the item and the cart mutation; neither is committed.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::LineNotFound`] if the key is not wished for, or any error from
    /// [`Cart::add`].
    pub fn move_to_cart<'a>(
        &self,
        cart: &Cart<'a>,
        catalog: &Catalog<'a>,
        tag_discounts: &ActiveTagDiscounts,
        key: &LineKey,
    ) -> Result<(Self, CartMutation<'a>), CartError> {
        let key = key.canonical(catalog);

        if !self.contains(&key) {
            return Err(CartError::LineNotFound(key.clone()));
        }

        let request = LineRequest {
            product_id: key.product_id.clone(),
            quantity: 1,
            color_variant: key.variant.clone(),
        };

        let mutation = cart.add(catalog, tag_discounts, &request)?;

        let mut wishlist = self.clone();
        wishlist.items.retain(|item| *item != key);

        Ok((wishlist, mutation))
    }
}
