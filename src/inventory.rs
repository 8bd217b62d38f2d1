//! Inventory
//!
//! Reconciles a line's previous and new quantity into a signed stock delta, and turns accepted
//! deltas into [`StockDirective`]s for the product store to apply.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use thiserror::Error;

use crate::products::{ProductId, VariantKey};

/// Not enough stock to raise a line to the requested quantity.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error(
    "only {available} more of product {product} available; at most {max_quantity} can be ordered"
)]
pub struct InsufficientStock {
    /// Product the line refers to
    pub product: ProductId,

    /// Variant the line refers to
    pub variant: Option<VariantKey>,

    /// Quantity that was asked for
    pub requested: u32,

    /// Units in stock beyond what the line already holds
    pub available: u32,

    /// Largest quantity the line could be set to
    pub max_quantity: u32,
}

/// An atomic increment to apply to a product record: `stock += stock_delta`,
/// `sales_count += sales_count_delta`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockDirective {
    /// Product to update
    pub product_id: ProductId,

    /// Signed change to stock
    pub stock_delta: i64,

    /// Signed change to sales count
    pub sales_count_delta: i64,
}

impl StockDirective {
    /// Directive for a quantity delta: stock moves against it, sales count with it.
    pub fn for_delta(product_id: impl Into<ProductId>, delta: i64) -> Self {
        Self {
            product_id: product_id.into(),
            stock_delta: -delta,
            sales_count_delta: delta,
        }
    }

    /// Whether applying the directive changes nothing.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.stock_delta == 0 && self.sales_count_delta == 0
    }
}

/// Outcome of reconciling one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// Product the line refers to
    pub product: ProductId,

    /// Variant the line refers to
    pub variant: Option<VariantKey>,

    /// Quantity held before the change
    pub previous: u32,

    /// Quantity asked for
    pub requested: u32,

    /// `requested - previous`
    pub delta: i64,

    /// Set when the delta cannot be satisfied
    pub rejection: Option<InsufficientStock>,
}

impl Reconciliation {
    /// Whether the change may be applied.
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        self.rejection.is_none()
    }

    /// The directive to apply, if the change was accepted and moves stock.
    #[must_use]
    pub fn directive(&self) -> Option<StockDirective> {
        (self.is_accepted() && self.delta != 0)
            .then(|| StockDirective::for_delta(self.product.clone(), self.delta))
    }

    /// Convert into the directive to apply, or the rejection.
    ///
    /// # Errors
    ///
    /// Returns [`InsufficientStock`] if the change was rejected.
    pub fn into_result(self) -> Result<Option<StockDirective>, InsufficientStock> {
        let directive = self.directive();

        match self.rejection {
            Some(rejection) => Err(rejection),
            None => Ok(directive),
        }
    }
}

/// Reconcile a line moving from `previous` to `new` units against `current_stock`.
///
/// Adding a line uses `previous = 0`, removing one uses `new = 0`, and finalising an order is a
/// fresh decrement with `previous = 0`. Decreases are always accepted.
#[must_use]
pub fn reconcile(
    product: &ProductId,
    variant: Option<&VariantKey>,
    previous: u32,
    new: u32,
    current_stock: u32,
) -> Reconciliation {
    let delta = i64::from(new) - i64::from(previous);

    let rejection = (delta > i64::from(current_stock)).then(|| InsufficientStock {
        product: product.clone(),
        variant: variant.cloned(),
        requested: new,
        available: current_stock,
        max_quantity: previous.saturating_add(current_stock),
    });

    Reconciliation {
        product: product.clone(),
        variant: variant.cloned(),
        previous,
        requested: new,
        delta,
        rejection,
    }
}

/// Reconciles a batch of lines before any of them is applied.
///
/// Variants share their product's stock, so increases already accepted for a product reduce
/// what later lines in the batch may take. Releases are not counted as available until applied.
#[derive(Debug, Default)]
pub struct BatchReconciler {
    reserved: FxHashMap<ProductId, u32>,
    net: FxHashMap<ProductId, i64>,
    order: SmallVec<[ProductId; 8]>,
}

impl BatchReconciler {
    /// Create an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconcile one line and record its delta.
    ///
    /// # Errors
    ///
    /// Returns [`InsufficientStock`] if the line cannot be satisfied from the stock left after
    /// earlier lines. Nothing is recorded for a rejected line.
    pub fn push(
        &mut self,
        product: &ProductId,
        variant: Option<&VariantKey>,
        previous: u32,
        new: u32,
        current_stock: u32,
    ) -> Result<i64, InsufficientStock> {
        let reserved = self.reserved.get(product).copied().unwrap_or_default();
        let available = current_stock.saturating_sub(reserved);

        let reconciliation = reconcile(product, variant, previous, new, available);

        if let Some(rejection) = reconciliation.rejection {
            return Err(rejection);
        }

        let delta = reconciliation.delta;

        if delta > 0 {
            let taken = u32::try_from(delta).unwrap_or(u32::MAX);

            *self.reserved.entry(product.clone()).or_default() =
                reserved.saturating_add(taken);
        }

        if !self.net.contains_key(product) {
            self.order.push(product.clone());
        }

        *self.net.entry(product.clone()).or_default() += delta;

        Ok(delta)
    }

    /// Net directives per product, in first-seen order, without no-ops.
    #[must_use]
    pub fn finish(self) -> SmallVec<[StockDirective; 8]> {
        let Self { net, order, .. } = self;

        order
            .into_iter()
            .filter_map(|product| {
                let delta = net.get(&product).copied().unwrap_or_default();

                (delta != 0).then(|| StockDirective::for_delta(product, delta))
            })
            .collect()
    }
}
