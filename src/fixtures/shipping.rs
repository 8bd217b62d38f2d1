//! Shipping Method Fixtures

use rust_decimal::Decimal;
use rustc_hash::FxHashMap;
use rusty_money::Money;
use serde::Deserialize;

use crate::{
    checkout::ShippingMethod,
    discounts::parse_percent_points,
    fixtures::{FixtureError, products::parse_price},
};

/// Wrapper for shipping methods in YAML
#[derive(Debug, Deserialize)]
pub struct ShippingFixture {
    /// Map of method code -> method fixture
    pub shipping: FxHashMap<String, ShippingMethodFixture>,
}

/// Shipping method fixture
#[derive(Debug, Deserialize)]
pub struct ShippingMethodFixture {
    /// Display name
    pub name: String,

    /// Flat cost (e.g., "1.00 INR")
    pub cost: String,

    /// GST on subtotal plus shipping (e.g., "18%")
    #[serde(default)]
    pub gst: Option<String>,

    /// Estimated delivery time
    #[serde(default)]
    pub estimated_days: u32,
}

impl ShippingMethodFixture {
    /// Build the shipping method with the given code.
    ///
    /// # Errors
    ///
    /// Returns an error if the cost or GST cannot be parsed.
    pub fn into_method<'a>(self, code: String) -> Result<ShippingMethod<'a>, FixtureError> {
        let (minor_units, currency) = parse_price(&self.cost)?;

        let gst = match self.gst.as_deref() {
            Some(gst) => parse_percent_points(gst)
                .ok()
                .filter(|points| *points >= Decimal::ZERO)
                .ok_or_else(|| FixtureError::InvalidPercentage(gst.to_string()))?,
            None => Decimal::ZERO,
        };

        Ok(
            ShippingMethod::new(code, self.name, Money::from_minor(minor_units, currency))
                .with_gst(gst)
                .with_estimated_days(self.estimated_days),
        )
    }
}
