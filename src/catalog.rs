//! Catalog
//!
//! Products held in a slot map arena, indexed by their external id.

use rustc_hash::FxHashMap;
use slotmap::SlotMap;
use thiserror::Error;

use crate::products::{Product, ProductId, ProductKey};

/// Errors related to catalog construction.
#[derive(Debug, Error, PartialEq)]
pub enum CatalogError {
    /// A product with this id is already in the catalog.
    #[error("product {0} is already in the catalog")]
    DuplicateProduct(ProductId),
}

/// Catalog
#[derive(Debug, Clone, Default)]
pub struct Catalog<'a> {
    products: SlotMap<ProductKey, Product<'a>>,
    index: FxHashMap<ProductId, ProductKey>,
}

impl<'a> Catalog<'a> {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self {
            products: SlotMap::with_key(),
            index: FxHashMap::default(),
        }
    }

    /// Create a catalog from a list of products.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::DuplicateProduct`] if two products share an id.
    pub fn with_products(
        products: impl IntoIterator<Item = Product<'a>>,
    ) -> Result<Self, CatalogError> {
        let mut catalog = Self::new();

        for product in products {
            catalog.insert(product)?;
        }

        Ok(catalog)
    }

    /// Add a product.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::DuplicateProduct`] if the id is taken.
    pub fn insert(&mut self, product: Product<'a>) -> Result<ProductKey, CatalogError> {
        if self.index.contains_key(&product.id) {
            return Err(CatalogError::DuplicateProduct(product.id));
        }

        let id = product.id.clone();
        let key = self.products.insert(product);

        self.index.insert(id, key);

        Ok(key)
    }

    /// Remove a product, as an admin deletion would.
    pub fn remove(&mut self, id: &ProductId) -> Option<Product<'a>> {
        let key = self.index.remove(id)?;

        self.products.remove(key)
    }

    /// Get a product by key.
    pub fn get(&self, key: ProductKey) -> Option<&Product<'a>> {
        self.products.get(key)
    }

    /// Get a product by its external id.
    pub fn get_by_id(&self, id: &ProductId) -> Option<&Product<'a>> {
        self.index.get(id).and_then(|key| self.products.get(*key))
    }

    /// Get a product mutably by its external id.
    pub fn get_by_id_mut(&mut self, id: &ProductId) -> Option<&mut Product<'a>> {
        let key = *self.index.get(id)?;

        self.products.get_mut(key)
    }

    /// Look up the arena key for an external id.
    pub fn key_of(&self, id: &ProductId) -> Option<ProductKey> {
        self.index.get(id).copied()
    }

    /// Current stock for a product, if it exists.
    pub fn stock_of(&self, id: &ProductId) -> Option<u32> {
        self.get_by_id(id).map(|product| product.stock)
    }

    /// Iterate over all products.
    pub fn iter(&self) -> impl Iterator<Item = &Product<'a>> {
        self.products.values()
    }

    /// Number of products.
    #[must_use]
    pub fn len(&self) -> usize {
        self.products.len()
    }

    /// Whether the catalog has no products.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}
