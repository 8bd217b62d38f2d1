//! Store
//!
//! The persistence boundary. A [`ProductStore`] supplies product records and applies stock
//! directives with increment-if-sufficient semantics: a batch is applied in full or not at all.

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::{catalog::Catalog, inventory::StockDirective, products::ProductId};

/// Errors raised while applying stock directives.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// A directive names a product the store does not hold.
    #[error("product {0} does not exist")]
    UnknownProduct(ProductId),

    /// Applying the batch would drive stock below zero.
    #[error("product {product} has {available} in stock, {requested} requested")]
    InsufficientStock {
        /// Product that ran short
        product: ProductId,
        /// Units in stock
        available: u32,
        /// Units the batch tried to take
        requested: u64,
    },

    /// Applying the batch would push stock past its maximum.
    #[error("stock for product {0} overflowed")]
    StockOverflow(ProductId),
}

/// Product records plus an atomic stock increment primitive.
pub trait ProductStore<'a> {
    /// Current product records.
    fn catalog(&self) -> &Catalog<'a>;

    /// Apply every directive, or none of them.
    ///
    /// # Errors
    ///
    /// Returns a [`LedgerError`] if any directive cannot be applied; the store is unchanged.
    fn apply(&mut self, directives: &[StockDirective]) -> Result<(), LedgerError>;
}

/// In-memory product store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore<'a> {
    catalog: Catalog<'a>,
}

impl<'a> MemoryStore<'a> {
    /// Wrap a catalog.
    #[must_use]
    pub fn new(catalog: Catalog<'a>) -> Self {
        Self { catalog }
    }

    /// Mutable access for admin edits such as repricing or deleting products.
    pub fn catalog_mut(&mut self) -> &mut Catalog<'a> {
        &mut self.catalog
    }

    /// Unwrap the catalog.
    #[must_use]
    pub fn into_catalog(self) -> Catalog<'a> {
        self.catalog
    }
}

impl<'a> ProductStore<'a> for MemoryStore<'a> {
    fn catalog(&self) -> &Catalog<'a> {
        &self.catalog
    }

    fn apply(&mut self, directives: &[StockDirective]) -> Result<(), LedgerError> {
        let mut staged: FxHashMap<&ProductId, (u32, u32)> = FxHashMap::default();

        for directive in directives {
            let id = &directive.product_id;

            let (stock, sales_count) = match staged.get(id) {
                Some(values) => *values,
                None => {
                    let product = self
                        .catalog
                        .get_by_id(id)
                        .ok_or_else(|| LedgerError::UnknownProduct(id.clone()))?;

                    (product.stock, product.sales_count)
                }
            };

            let next_stock = i64::from(stock).saturating_add(directive.stock_delta);

            if next_stock < 0 {
                return Err(LedgerError::InsufficientStock {
                    product: id.clone(),
                    available: stock,
                    requested: directive.stock_delta.unsigned_abs(),
                });
            }

            let next_stock =
                u32::try_from(next_stock).map_err(|_err| LedgerError::StockOverflow(id.clone()))?;

            let next_sales = i64::from(sales_count)
                .saturating_add(directive.sales_count_delta)
                .clamp(0, i64::from(u32::MAX));

            staged.insert(id, (next_stock, u32::try_from(next_sales).unwrap_or(u32::MAX)));
        }

        for (id, (stock, sales_count)) in staged {
            if let Some(product) = self.catalog.get_by_id_mut(id) {
                product.stock = stock;
                product.sales_count = sales_count;
            }
        }

        Ok(())
    }
}
