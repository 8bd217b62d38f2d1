//! Fixtures

use std::{fs, path::PathBuf};

use jiff::Timestamp;
use rustc_hash::FxHashMap;
use rusty_money::iso::Currency;
use thiserror::Error;

use crate::{
    catalog::{Catalog, CatalogError},
    checkout::ShippingMethods,
    discounts::TagDiscount,
    events::Publisher,
    fixtures::{
        discounts::TagDiscountsFixture, products::ProductsFixture, requests::RequestsFixture,
        shipping::ShippingFixture,
    },
    lines::LineRequest,
    store::MemoryStore,
    storefront::Storefront,
};

pub mod discounts;
pub mod products;
pub mod requests;
pub mod shipping;

/// Fixture Parsing Errors
#[derive(Debug, Error)]
pub enum FixtureError {
    /// IO error reading fixture files
    #[error("Failed to read fixture file: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_norway::Error),

    /// Invalid price format
    #[error("Invalid price format: {0}")]
    InvalidPrice(String),

    /// Invalid percentage format
    #[error("Invalid percentage format: {0}")]
    InvalidPercentage(String),

    /// Unknown currency code
    #[error("Unknown currency code: {0}")]
    UnknownCurrency(String),

    /// Currency mismatch between records
    #[error("Currency mismatch: expected {0}, found {1}")]
    CurrencyMismatch(String, String),

    /// No priced records loaded yet
    #[error("No products loaded yet; currency unknown")]
    NoCurrency,

    /// Named request not found
    #[error("Request not found: {0}")]
    RequestNotFound(String),

    /// Catalog rejected a product
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Fixture
#[derive(Debug)]
pub struct Fixture<'a> {
    /// Base path for fixture files
    base_path: PathBuf,

    catalog: Catalog<'a>,
    tag_discounts: Vec<TagDiscount>,
    shipping: ShippingMethods<'a>,

    /// Request name -> lines
    requests: FxHashMap<String, Vec<LineRequest>>,

    /// Currency for the fixture set
    currency: Option<&'static Currency>,
}

impl<'a> Fixture<'a> {
    /// Create a new empty fixture with default base path
    pub fn new() -> Self {
        Self::with_base_path("./fixtures")
    }

    /// Create a new empty fixture with custom base path
    pub fn with_base_path(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            catalog: Catalog::new(),
            tag_discounts: Vec::new(),
            shipping: ShippingMethods::default(),
            requests: FxHashMap::default(),
            currency: None,
        }
    }

    fn read(&self, category: &str, name: &str) -> Result<String, FixtureError> {
        let file_path = self.base_path.join(category).join(format!("{name}.yml"));

        Ok(fs::read_to_string(&file_path)?)
    }

    fn check_currency(&mut self, currency: &'static Currency) -> Result<(), FixtureError> {
        match self.currency {
            Some(existing) if existing != currency => Err(FixtureError::CurrencyMismatch(
                existing.iso_alpha_code.to_string(),
                currency.iso_alpha_code.to_string(),
            )),
            Some(_) => Ok(()),
            None => {
                self.currency = Some(currency);

                Ok(())
            }
        }
    }

    /// Load products from a YAML fixture file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or if there are currency mismatches.
    pub fn load_products(&mut self, name: &str) -> Result<&mut Self, FixtureError> {
        let fixture: ProductsFixture = serde_norway::from_str(&self.read("products", name)?)?;

        let mut entries: Vec<_> = fixture.products.into_iter().collect();

        entries.sort_by(|(a, _), (b, _)| a.cmp(b));

        for (id, product_fixture) in entries {
            let product = product_fixture.into_product(id)?;

            if let Some(currency) = product.currency() {
                self.check_currency(currency)?;
            }

            self.catalog.insert(product)?;
        }

        Ok(self)
    }

    /// Load tag discounts from a YAML fixture file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_tag_discounts(&mut self, name: &str) -> Result<&mut Self, FixtureError> {
        let fixture: TagDiscountsFixture =
            serde_norway::from_str(&self.read("tag_discounts", name)?)?;

        for discount in fixture.tag_discounts {
            self.tag_discounts.push(discount.try_into()?);
        }

        Ok(self)
    }

    /// Load shipping methods from a YAML fixture file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or if there are currency mismatches.
    pub fn load_shipping(&mut self, name: &str) -> Result<&mut Self, FixtureError> {
        let fixture: ShippingFixture = serde_norway::from_str(&self.read("shipping", name)?)?;

        for (code, method_fixture) in fixture.shipping {
            let method = method_fixture.into_method(code)?;

            self.check_currency(method.cost.currency())?;
            self.shipping.insert(method);
        }

        Ok(self)
    }

    /// Load named line-item requests from a YAML fixture file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_requests(&mut self, name: &str) -> Result<&mut Self, FixtureError> {
        let fixture: RequestsFixture = serde_norway::from_str(&self.read("requests", name)?)?;

        self.requests.extend(fixture.requests);

        Ok(self)
    }

    /// Load a complete fixture set (products, tag discounts, shipping and requests with the
    /// same name) from the default base path
    ///
    /// # Errors
    ///
    /// Returns an error if any of the fixture files cannot be loaded.
    pub fn from_set(name: &str) -> Result<Self, FixtureError> {
        Self::from_set_in("./fixtures", name)
    }

    /// Load a complete fixture set from `base_path`
    ///
    /// # Errors
    ///
    /// Returns an error if any of the fixture files cannot be loaded.
    pub fn from_set_in(base_path: impl Into<PathBuf>, name: &str) -> Result<Self, FixtureError> {
        let mut fixture = Self::with_base_path(base_path);

        fixture
            .load_products(name)?
            .load_tag_discounts(name)?
            .load_shipping(name)?
            .load_requests(name)?;

        Ok(fixture)
    }

    /// Loaded products
    pub fn catalog(&self) -> &Catalog<'a> {
        &self.catalog
    }

    /// Loaded tag discounts, active or not
    pub fn tag_discounts(&self) -> &[TagDiscount] {
        &self.tag_discounts
    }

    /// Loaded shipping methods
    pub fn shipping(&self) -> &ShippingMethods<'a> {
        &self.shipping
    }

    /// Get a named request
    ///
    /// # Errors
    ///
    /// Returns an error if the request is not found.
    pub fn request(&self, name: &str) -> Result<&[LineRequest], FixtureError> {
        self.requests
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| FixtureError::RequestNotFound(name.to_string()))
    }

    /// Get the currency
    ///
    /// # Errors
    ///
    /// Returns an error if no products have been loaded yet.
    pub fn currency(&self) -> Result<&'static Currency, FixtureError> {
        self.currency.ok_or(FixtureError::NoCurrency)
    }

    /// Build an in-memory storefront over the loaded records, with tag discounts evaluated at
    /// `now`.
    pub fn into_storefront<P>(self, publisher: P, now: Timestamp) -> Storefront<'a, MemoryStore<'a>, P>
    where
        P: Publisher,
    {
        Storefront::new(MemoryStore::new(self.catalog), publisher, self.shipping)
            .with_tag_discounts(self.tag_discounts, now)
    }
}

impl Default for Fixture<'_> {
    fn default() -> Self {
        Self::new()
    }
}
