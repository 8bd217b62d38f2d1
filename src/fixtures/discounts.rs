//! Tag Discount Fixtures

use jiff::Timestamp;
use serde::Deserialize;

use crate::{
    discounts::TagDiscount,
    fixtures::{FixtureError, products::parse_discount},
};

/// Wrapper for tag discounts in YAML
#[derive(Debug, Deserialize)]
pub struct TagDiscountsFixture {
    /// Tag discounts
    pub tag_discounts: Vec<TagDiscountFixture>,
}

/// Tag discount fixture
#[derive(Debug, Deserialize)]
pub struct TagDiscountFixture {
    /// Tag the discount applies to
    pub tag: String,

    /// Discount (e.g., "20%")
    pub percent: String,

    /// Whether the discount is switched on
    #[serde(default = "switched_on")]
    pub active: bool,

    /// Start of the validity window
    #[serde(default)]
    pub starts_at: Option<Timestamp>,

    /// End of the validity window (exclusive)
    #[serde(default)]
    pub ends_at: Option<Timestamp>,
}

fn switched_on() -> bool {
    true
}

impl TryFrom<TagDiscountFixture> for TagDiscount {
    type Error = FixtureError;

    fn try_from(fixture: TagDiscountFixture) -> Result<Self, Self::Error> {
        let percent = parse_discount(&fixture.percent)?;

        Ok(TagDiscount::new(&fixture.tag, percent)
            .with_active(fixture.active)
            .with_window(fixture.starts_at, fixture.ends_at))
    }
}
