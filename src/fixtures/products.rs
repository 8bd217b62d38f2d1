//! Product Fixtures

use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use rustc_hash::FxHashMap;
use rusty_money::{
    Money,
    iso::{Currency, EUR, GBP, INR, USD},
};
use serde::Deserialize;

use crate::{
    discounts::{DiscountPercent, parse_percent_points},
    fixtures::FixtureError,
    products::{ColorVariant, Product},
    tags::string::StringTagCollection,
};

/// Wrapper for products in YAML
#[derive(Debug, Deserialize)]
pub struct ProductsFixture {
    /// Map of product id -> product fixture
    pub products: FxHashMap<String, ProductFixture>,
}

/// Product Fixture
#[derive(Debug, Deserialize)]
pub struct ProductFixture {
    /// Product title
    pub name: String,

    /// Product tags
    #[serde(default)]
    pub tags: Vec<String>,

    /// Product price (e.g., "10.00 INR")
    pub price: String,

    /// Product's own discount (e.g., "15%")
    #[serde(default)]
    pub discount: Option<String>,

    /// Units in stock
    pub stock: u32,

    /// Units sold so far
    #[serde(default)]
    pub sales_count: u32,

    /// Whether the product is listed
    #[serde(default = "listed")]
    pub published: bool,

    /// Colour variants
    #[serde(default)]
    pub variants: Vec<VariantFixture>,
}

fn listed() -> bool {
    true
}

/// Colour variant fixture
#[derive(Debug, Deserialize)]
pub struct VariantFixture {
    /// Display name
    pub name: String,

    /// Colour code
    #[serde(default)]
    pub color_code: Option<String>,

    /// Image references
    #[serde(default)]
    pub images: Vec<String>,
}

impl ProductFixture {
    /// Build the product with the given id.
    ///
    /// # Errors
    ///
    /// Returns an error if the price or discount cannot be parsed.
    pub fn into_product<'a>(self, id: String) -> Result<Product<'a>, FixtureError> {
        let (minor_units, currency) = parse_price(&self.price)?;

        let tag_refs: Vec<&str> = self.tags.iter().map(String::as_str).collect();

        let mut product = Product::new(id, self.name, Money::from_minor(minor_units, currency), self.stock)
            .with_tags(StringTagCollection::from_strs(&tag_refs));

        if let Some(discount) = self.discount {
            product = product.with_discount(parse_discount(&discount)?.points());
        }

        product.sales_count = self.sales_count;
        product.published = self.published;

        for variant in self.variants {
            let mut color = ColorVariant::new(variant.name, variant.color_code.as_deref());

            color.images.extend(variant.images);
            product = product.with_variant(color);
        }

        Ok(product)
    }
}

/// Parse price string (e.g., "10.50 INR") into minor units and currency
///
/// # Errors
///
/// Returns an error if the string is not in the format "AMOUNT CURRENCY", if the amount cannot
/// be parsed, or if the currency code is not recognized.
pub fn parse_price(s: &str) -> Result<(i64, &'static Currency), FixtureError> {
    let parts: Vec<&str> = s.split_whitespace().collect();

    if parts.len() != 2 {
        return Err(FixtureError::InvalidPrice(format!(
            "Expected format 'AMOUNT CURRENCY', got: {s}"
        )));
    }

    let amount = parts
        .first()
        .ok_or_else(|| FixtureError::InvalidPrice(s.to_string()))?
        .parse::<Decimal>()
        .map_err(|_err| FixtureError::InvalidPrice(s.to_string()))?;

    let currency = parse_currency(
        parts
            .get(1)
            .ok_or_else(|| FixtureError::InvalidPrice(s.to_string()))?,
    )?;

    let minor_units = amount
        .checked_mul(Decimal::from(10_i64.pow(currency.exponent)))
        .and_then(|value| {
            value
                .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
                .to_i64()
        })
        .ok_or_else(|| FixtureError::InvalidPrice(s.to_string()))?;

    Ok((minor_units, currency))
}

/// Look up a supported ISO currency code.
///
/// # Errors
///
/// Returns [`FixtureError::UnknownCurrency`] for any other code.
pub fn parse_currency(code: &str) -> Result<&'static Currency, FixtureError> {
    match code {
        "INR" => Ok(INR),
        "GBP" => Ok(GBP),
        "USD" => Ok(USD),
        "EUR" => Ok(EUR),
        other => Err(FixtureError::UnknownCurrency(other.to_string())),
    }
}

/// Parse a discount string (e.g., "15%") into a validated percentage.
///
/// # Errors
///
/// Returns [`FixtureError::InvalidPercentage`] if the string is not a number within 0-100.
pub fn parse_discount(s: &str) -> Result<DiscountPercent, FixtureError> {
    parse_percent_points(s)
        .ok()
        .and_then(|points| DiscountPercent::new(points).ok())
        .ok_or_else(|| FixtureError::InvalidPercentage(s.to_string()))
}
